use super::{Cache, Ctx, FetchOutcome, Need, Reading};
use crate::amount::base_to_decimal;
use crate::registry::abi::IComet;
use crate::surface::{self, ids, Surface, FALLBACK};
use crate::wallet::{read, WalletProvider};
use alloy::{
    primitives::{Address, U256},
    sol_types::SolCall,
};
use rust_decimal::Decimal;
use serde::Serialize;

const NAME: &str = "totals";

/// Protocol-wide supply and borrow on the active proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total_supply: Reading<Decimal>,
    pub total_borrow: Reading<Decimal>,
    /// Base token symbol, when the registry knows it.
    pub unit: Option<String>,
}

impl Totals {
    fn show(&self, r: &Reading<Decimal>) -> String {
        r.display(|v| match &self.unit {
            Some(u) => format!("{} {u}", v.normalize()),
            None => v.normalize().to_string(),
        })
    }
}

async fn normalized<C>(
    wallet: &dyn WalletProvider,
    comet: Address,
    decimals: Option<u8>,
    call: &C,
) -> eyre::Result<Decimal>
where
    C: SolCall<Return = U256> + Sync,
{
    let d = decimals.ok_or_else(|| eyre::eyre!("comet decimals unavailable"))?;
    base_to_decimal(read(wallet, comet, call).await?, u32::from(d))
}

pub struct TotalsFetcher {
    ctx: Ctx,
    cache: Cache<Totals>,
}

impl TotalsFetcher {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            cache: Cache::default(),
        }
    }

    pub async fn fetch(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Proxy) else {
            let s = self.ctx.surface();
            surface::put_text(s, ids::TOTAL_SUPPLY, FALLBACK);
            surface::put_text(s, ids::TOTAL_BORROW, FALLBACK);
            return FetchOutcome::Skipped;
        };
        let w = self.ctx.wallet.as_ref();
        let comet = scope.comet();

        let decimals = Reading::from_result(
            "comet decimals",
            read(w, comet, &IComet::decimalsCall {}).await,
        )
        .value()
        .copied();
        let unit = match read(w, comet, &IComet::baseTokenCall {}).await {
            Ok(base) => self
                .ctx
                .registry
                .token_by_address(scope.chain_id, base)
                .map(|t| t.symbol.clone()),
            Err(e) => {
                tracing::debug!(error = %format!("{e:#}"), "base token unavailable; totals shown without unit");
                None
            }
        };

        let totals = Totals {
            total_supply: Reading::from_result(
                "total supply",
                normalized(w, comet, decimals, &IComet::totalSupplyCall {}).await,
            ),
            total_borrow: Reading::from_result(
                "total borrow",
                normalized(w, comet, decimals, &IComet::totalBorrowCall {}).await,
            ),
            unit,
        };
        self.ctx.commit(NAME, &scope, &self.cache, totals, render)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch().await
    }

    pub fn cached(&self) -> Option<Totals> {
        self.cache.get()
    }
}

fn render(s: &dyn Surface, t: &Totals) {
    surface::put_text(s, ids::TOTAL_SUPPLY, &t.show(&t.total_supply));
    surface::put_text(s, ids::TOTAL_BORROW, &t.show(&t.total_borrow));
}
