//! Wires the connector, the fetchers, governance and the health view to one set of shared
//! handles, and drives them from the CLI or the watch loop.

use crate::actions::ActionHandler;
use crate::fetch::{
    balances::BalancesFetcher, gas::GasFetcher, markets::MarketsFetcher,
    positions::PositionsFetcher, prices::PricesFetcher, totals::TotalsFetcher, Ctx, FetchOutcome,
};
use crate::governance::{proposals::ProposalLister, Governance};
use crate::health::{self, HealthFactor, HealthInputs};
use crate::history::HistoryFetcher;
use crate::registry::networks;
use crate::state::ConnectionState;
use crate::wallet::{connector::Connector, WalletEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::time::{interval, MissedTickBehavior};

/// How often the watch loop refreshes gas and polls the node's chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTiming {
    pub gas_every: Duration,
    pub poll_every: Duration,
}

pub struct Dashboard {
    ctx: Ctx,
    connector: Connector,
    pub markets: MarketsFetcher,
    pub prices: PricesFetcher,
    pub balances: BalancesFetcher,
    pub totals: TotalsFetcher,
    pub gas: GasFetcher,
    pub positions: PositionsFetcher,
    pub history: HistoryFetcher,
    pub governance: Governance,
    pub proposals: ProposalLister,
    pub actions: ActionHandler,
}

impl Dashboard {
    pub fn new(ctx: Ctx, proposals_per_page: u64) -> Self {
        let connector = Connector::new(
            Some(Arc::clone(&ctx.wallet)),
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.surface),
        );
        Self {
            connector,
            markets: MarketsFetcher::new(ctx.clone()),
            prices: PricesFetcher::new(ctx.clone()),
            balances: BalancesFetcher::new(ctx.clone()),
            totals: TotalsFetcher::new(ctx.clone()),
            gas: GasFetcher::new(ctx.clone()),
            positions: PositionsFetcher::new(ctx.clone()),
            history: HistoryFetcher::new(ctx.clone()),
            governance: Governance::new(ctx.clone()),
            proposals: ProposalLister::new(ctx.clone(), proposals_per_page),
            actions: ActionHandler::new(ctx.clone()),
            ctx,
        }
    }

    pub const fn ctx(&self) -> &Ctx {
        &self.ctx
    }

    pub async fn connect(&self) -> bool {
        self.connector.connect().await
    }

    /// Recompute the health factor from the cached positions and prices and render it.
    /// `None` until both have been fetched.
    pub fn health(&self) -> Option<HealthFactor> {
        let (Some(positions), Some(prices)) = (self.positions.cached(), self.prices.cached()) else {
            tracing::warn!("positions or prices not loaded; health factor unavailable");
            return None;
        };
        let inputs = HealthInputs::from_snapshots(&positions, &prices);
        let hf = health::compute(&inputs, &self.ctx.registry);
        health::render(self.ctx.surface(), &hf);
        Some(hf)
    }

    /// Run every fetcher once, then the health factor. Each fetcher reports its own skips and
    /// failures; one never stops the next.
    pub async fn refresh_all(&self) {
        let outcomes: [(&str, FetchOutcome); 8] = [
            ("markets", self.markets.refresh().await),
            ("prices", self.prices.refresh().await),
            ("balances", self.balances.refresh().await),
            ("totals", self.totals.refresh().await),
            ("gas", self.gas.refresh().await),
            ("positions", self.positions.refresh().await),
            ("history", self.history.fetch().await),
            ("governance", self.governance.summary().await),
        ];
        for (fetcher, outcome) in outcomes {
            tracing::debug!(fetcher, ?outcome, "refresh finished");
        }
        if self.ctx.store.account().is_some() {
            self.health();
        }
    }

    /// Apply a wallet event, ignoring a chain change to the chain already selected.
    fn apply(&self, event: &WalletEvent) {
        if let WalletEvent::ChainChanged(hex) = event {
            if networks::parse_chain_id(hex) == self.ctx.store.chain_id() {
                tracing::debug!(chain = %hex, "chain unchanged");
                return;
            }
        }
        self.connector.handle_event(event);
    }

    async fn poll_chain(&self) {
        match self.ctx.wallet.chain_id().await {
            Ok(hex) => self.apply(&WalletEvent::ChainChanged(hex)),
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "chain id poll failed"),
        }
    }

    /// Refresh everything, then keep the board current until `shutdown` resolves: wallet events
    /// update state, every state change triggers a full refresh, gas refreshes on its own timer
    /// and the node's chain id is polled.
    pub async fn watch(&self, timing: WatchTiming, shutdown: impl Future<Output = ()>) {
        let mut events = self.ctx.wallet.subscribe();
        let mut events_open = true;
        let (tx, mut changes) = mpsc::unbounded_channel::<u64>();
        let listener = self.ctx.store.subscribe(Arc::new(move |s: &ConnectionState| {
            tx.send(s.revision)
                .map_err(|e| eyre::eyre!("watch loop closed: {e}"))
        }));

        let mut gas = interval(timing.gas_every);
        gas.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll = interval(timing.poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Both intervals fire immediately; refresh_all already covers that first tick.
        gas.tick().await;
        poll.tick().await;

        self.refresh_all().await;
        tracing::info!(?timing, "watching for changes");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                ev = events.recv(), if events_open => match ev {
                    Ok(e) => self.apply(&e),
                    Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "wallet events dropped"),
                    Err(RecvError::Closed) => {
                        tracing::warn!("wallet event stream closed");
                        events_open = false;
                    }
                },
                Some(revision) = changes.recv() => {
                    let mut latest = revision;
                    while let Ok(r) = changes.try_recv() {
                        latest = r;
                    }
                    tracing::info!(revision = latest, "state changed; refreshing");
                    self.refresh_all().await;
                }
                _ = gas.tick() => {
                    self.gas.refresh().await;
                }
                _ = poll.tick() => self.poll_chain().await,
            }
        }
        self.ctx.store.unsubscribe(listener);
        tracing::info!("watch stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        abi::{IComet, IERC20},
        Registry,
    };
    use crate::surface::ids;
    use crate::test_support::{addr, word, Harness, ScriptedWallet, ALICE};
    use alloy::sol_types::SolValue as _;

    const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

    fn registry() -> Registry {
        Registry::default().with_token("DAI", 18, 1, addr(DAI))
    }

    fn harness() -> Harness {
        Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1")
                .with_accounts(&[ALICE])
                .with_gas_price(2_000_000_000)
                .returns::<IERC20::balanceOfCall>(addr(DAI), word(3_000_000_000_000_000_000_u64))
        })
    }

    #[tokio::test]
    async fn refresh_all_fills_what_it_can() {
        let h = harness();
        let d = Dashboard::new(h.ctx.clone(), 10);
        assert!(d.connect().await, "scripted wallet has an account");
        d.refresh_all().await;

        assert_eq!(h.board.text(&ids::balance("DAI")).as_deref(), Some("Balance: 3 DAI"));
        assert_eq!(h.board.text(ids::GAS_PRICE).as_deref(), Some("2 Gwei"));
        assert_eq!(d.positions.cached(), None, "no proxy configured, positions skipped");
        assert_eq!(d.health(), None);
    }

    #[tokio::test]
    async fn health_comes_from_cached_snapshots() {
        const COMET: &str = "0xc3d688B66703497DAA19211EEdff47f25384cdc3";
        const FEED: &str = "0x9999999999999999999999999999999999999999";
        let h = Harness::new(registry().with_proxy(1, addr(COMET)), |_| {
            let c = addr(COMET);
            ScriptedWallet::new("0x1")
                .with_accounts(&[ALICE])
                .returns::<IComet::baseTokenCall>(c, addr(DAI).abi_encode())
                .returns::<IComet::baseTokenPriceFeedCall>(c, addr(FEED).abi_encode())
                .returns::<IComet::getPriceCall>(c, word(100_000_000_u64))
                .returns::<IComet::balanceOfCall>(c, word(100_000_000_000_000_000_000_u128))
                .returns::<IComet::borrowBalanceOfCall>(c, word(150_000_000_000_000_000_000_u128))
        });
        let d = Dashboard::new(h.ctx.clone(), 10);
        assert_eq!(d.health(), None, "nothing cached yet");

        assert!(d.connect().await, "connect");
        d.refresh_all().await;
        assert!(d.health().is_some_and(|hf| hf.at_risk()), "100 DAI against 150 DAI is at risk");
        assert_eq!(h.board.text(ids::HEALTH_FACTOR).as_deref(), Some("0.67"));
        assert_eq!(h.board.text(ids::SUPPLIED).as_deref(), Some("100 DAI"));
        assert_eq!(h.board.text(ids::BORROWED).as_deref(), Some("150 DAI"));
    }

    #[tokio::test]
    async fn watch_follows_chain_changes_until_shutdown() {
        let h = harness();
        let d = Dashboard::new(h.ctx.clone(), 10);
        assert!(d.connect().await, "connect");
        let before = h.store.revision();

        let wallet = Arc::clone(&h.wallet);
        let shutdown = async move {
            wallet.emit(WalletEvent::ChainChanged("0x1".into()));
            wallet.emit(WalletEvent::ChainChanged("0x89".into()));
            tokio::time::sleep(Duration::from_millis(100)).await;
        };
        let timing = WatchTiming {
            gas_every: Duration::from_secs(3600),
            poll_every: Duration::from_secs(3600),
        };
        d.watch(timing, shutdown).await;

        assert_eq!(h.store.chain_id(), Some(137));
        assert_eq!(h.store.revision(), before.saturating_add(1), "same-chain event ignored");
        assert!(h.wallet.calls_with::<IERC20::balanceOfCall>() >= 1, "initial refresh ran");
    }
}
