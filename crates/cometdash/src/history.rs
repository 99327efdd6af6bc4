//! Account activity on every Comet market of the active chain, newest block first.

use crate::fetch::{Cache, Ctx, FetchOutcome, Need, Scope};
use crate::registry::{abi::IComet, checksum};
use crate::surface::{self, ids, Surface};
use crate::wallet::WalletProvider;
use alloy::{
    primitives::{Address, B256},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

const NAME: &str = "history";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub event: &'static str,
    pub market: String,
    pub tx_hash: Option<B256>,
    pub block: u64,
    /// `None` when the block could not be resolved.
    pub timestamp: Option<String>,
    pub details: Value,
}

fn format_timestamp(secs: u64) -> Option<String> {
    let secs = i64::try_from(secs).ok()?;
    let at: DateTime<Utc> = DateTime::from_timestamp(secs, 0)?;
    Some(at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// One indexed event kind: how to decode it and what to show.
trait Activity: SolEvent {
    const LABEL: &'static str;
    fn details(&self) -> Value;
}

impl Activity for IComet::Supply {
    const LABEL: &'static str = "Supply";
    fn details(&self) -> Value {
        json!({ "from": checksum(self.from), "dst": checksum(self.dst), "amount": self.amount.to_string() })
    }
}

impl Activity for IComet::Withdraw {
    const LABEL: &'static str = "Withdraw";
    fn details(&self) -> Value {
        json!({ "src": checksum(self.src), "to": checksum(self.to), "amount": self.amount.to_string() })
    }
}

impl Activity for IComet::SupplyCollateral {
    const LABEL: &'static str = "SupplyCollateral";
    fn details(&self) -> Value {
        json!({
            "from": checksum(self.from),
            "dst": checksum(self.dst),
            "asset": checksum(self.asset),
            "amount": self.amount.to_string(),
        })
    }
}

impl Activity for IComet::WithdrawCollateral {
    const LABEL: &'static str = "WithdrawCollateral";
    fn details(&self) -> Value {
        json!({
            "src": checksum(self.src),
            "to": checksum(self.to),
            "asset": checksum(self.asset),
            "amount": self.amount.to_string(),
        })
    }
}

impl Activity for IComet::Transfer {
    const LABEL: &'static str = "Transfer";
    fn details(&self) -> Value {
        json!({ "from": checksum(self.from), "to": checksum(self.to), "amount": self.amount.to_string() })
    }
}

/// Logs of `E` on `comet` whose first indexed argument is `account`.
async fn scan<E: Activity>(
    wallet: &dyn WalletProvider,
    comet: Address,
    market: &str,
    account: Address,
) -> Vec<HistoryEntry> {
    let filter = Filter::new()
        .address(comet)
        .event_signature(E::SIGNATURE_HASH)
        .topic1(account.into_word())
        .from_block(0_u64);
    let logs: Vec<Log> = match wallet.get_logs(&filter).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(event = E::LABEL, market, error = %format!("{e:#}"), "event scan failed; skipped");
            return vec![];
        }
    };
    logs.into_iter()
        .filter_map(|log| {
            let decoded = E::decode_log_data(&log.inner.data)
                .inspect_err(|e| tracing::debug!(event = E::LABEL, error = %e, "undecodable log"))
                .ok()?;
            Some(HistoryEntry {
                event: E::LABEL,
                market: market.to_owned(),
                tx_hash: log.transaction_hash,
                block: log.block_number.unwrap_or_default(),
                timestamp: None,
                details: decoded.details(),
            })
        })
        .collect()
}

pub struct HistoryFetcher {
    ctx: Ctx,
    cache: Cache<Vec<HistoryEntry>>,
}

impl HistoryFetcher {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            cache: Cache::default(),
        }
    }

    async fn collect(&self, scope: &Scope) -> Vec<HistoryEntry> {
        let w = self.ctx.wallet.as_ref();
        let account = scope.account;
        let mut entries = vec![];
        for m in self.ctx.registry.markets(scope.chain_id) {
            let (comet, sym) = (m.address, m.symbol.as_str());
            entries.extend(scan::<IComet::Supply>(w, comet, sym, account).await);
            entries.extend(scan::<IComet::Withdraw>(w, comet, sym, account).await);
            entries.extend(scan::<IComet::SupplyCollateral>(w, comet, sym, account).await);
            entries.extend(scan::<IComet::WithdrawCollateral>(w, comet, sym, account).await);
            entries.extend(scan::<IComet::Transfer>(w, comet, sym, account).await);
        }
        entries.sort_by(|a, b| b.block.cmp(&a.block));

        let mut times: HashMap<u64, Option<String>> = HashMap::new();
        for e in &mut entries {
            if let Some(known) = times.get(&e.block) {
                e.timestamp.clone_from(known);
                continue;
            }
            let t = match w.block_timestamp(e.block).await {
                Ok(t) => t.and_then(format_timestamp),
                Err(err) => {
                    tracing::debug!(block = e.block, error = %format!("{err:#}"), "block timestamp unavailable");
                    None
                }
            };
            e.timestamp.clone_from(&t);
            times.insert(e.block, t);
        }
        entries
    }

    pub async fn fetch(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Account) else {
            return FetchOutcome::Skipped;
        };
        let entries = self.collect(&scope).await;
        tracing::info!(count = entries.len(), "transaction history loaded");
        self.ctx
            .commit(NAME, &scope, &self.cache, entries, |s, e| render(s, e))
    }

    pub fn cached(&self) -> Option<Vec<HistoryEntry>> {
        self.cache.get()
    }
}

fn entry_text(e: &HistoryEntry) -> String {
    let hash = e.tx_hash.map_or_else(|| surface::FALLBACK.to_owned(), |h| h.to_string());
    format!(
        "Event: {}\nHash: {hash}\nBlock Number: {}\nTimestamp: {}\nDetails: {}",
        e.event,
        e.block,
        e.timestamp.as_deref().unwrap_or(surface::FALLBACK),
        e.details,
    )
}

fn render(s: &dyn Surface, entries: &[HistoryEntry]) {
    let text: Vec<String> = entries.iter().map(entry_text).collect();
    surface::put_text(s, ids::TRANSACTION_HISTORY, &text.join("\n\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::test_support::{addr, Harness, ScriptedWallet, ALICE, BOB};
    use alloy::primitives::U256;

    const CUSDC: &str = "0x5555555555555555555555555555555555555555";
    const CWETH: &str = "0x6666666666666666666666666666666666666666";

    fn registry() -> Registry {
        Registry::default()
            .with_market(1, "cUSDC", addr(CUSDC))
            .with_market(1, "cWETH", addr(CWETH))
    }

    fn supply(from: &str, amount: u64) -> alloy::primitives::LogData {
        IComet::Supply {
            from: addr(from),
            dst: addr(from),
            amount: U256::from(amount),
        }
        .encode_log_data()
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(format_timestamp(1_700_000_000).as_deref(), Some("2023-11-14 22:13:20 UTC"));
    }

    #[tokio::test]
    async fn entries_sorted_newest_block_first_across_markets() {
        let h = Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1")
                .with_log(addr(CUSDC), 10, supply(ALICE, 5))
                .with_log(addr(CWETH), 30, supply(ALICE, 7))
                .with_log(addr(CUSDC), 20, supply(BOB, 9))
                .with_log(
                    addr(CUSDC),
                    20,
                    IComet::Withdraw {
                        src: addr(ALICE),
                        to: addr(BOB),
                        amount: U256::from(3_u8),
                    }
                    .encode_log_data(),
                )
        })
        .connected(1);
        let f = HistoryFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Committed);

        let entries = f.cached().unwrap_or_default();
        let seen: Vec<(&str, u64, &str)> = entries
            .iter()
            .map(|e| (e.event, e.block, e.market.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![("Supply", 30, "cWETH"), ("Withdraw", 20, "cUSDC"), ("Supply", 10, "cUSDC")],
            "other accounts' events are filtered out"
        );
        assert_eq!(h.wallet.log_queries(), 10, "five event kinds per market");

        let text = h.board.text(ids::TRANSACTION_HISTORY).unwrap_or_default();
        assert!(text.starts_with("Event: Supply\nHash: 0x"), "got {text}");
        assert!(text.contains("Block Number: 20\nTimestamp: 2023-11-14 22:17:20 UTC"), "got {text}");
        assert!(text.contains(r#""amount":"3""#), "got {text}");
    }

    #[tokio::test]
    async fn disconnected_scans_nothing() {
        let h = Harness::new(registry(), |_| ScriptedWallet::new("0x1"));
        let f = HistoryFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Skipped);
        assert_eq!(h.wallet.log_queries(), 0);
    }
}
