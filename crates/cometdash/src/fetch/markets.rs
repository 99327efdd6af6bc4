use super::{Cache, Ctx, FetchOutcome, Need, Reading};
use crate::amount::{base_to_decimal, fixed};
use crate::registry::{abi::IComet, checksum, MarketDescriptor};
use crate::surface::{self, ids, Surface};
use crate::wallet::{read, WalletProvider};
use eyre::OptionExt as _;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

const NAME: &str = "markets";
const SECONDS_PER_YEAR: u32 = 31_536_000;
const RATE_DECIMALS: u32 = 18;

/// Annualized percentage from a per-second 1e18 fixed-point rate.
pub fn apr_percent(per_second: u64) -> eyre::Result<Decimal> {
    Decimal::try_from_i128_with_scale(i128::from(per_second), RATE_DECIMALS)?
        .checked_mul(Decimal::from(SECONDS_PER_YEAR))
        .and_then(|v| v.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_eyre("rate out of range")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketData {
    pub utilization: Decimal,
    pub supply_apr: Decimal,
    pub borrow_apr: Decimal,
    pub total_supply: Decimal,
    pub total_borrow: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketRow {
    pub symbol: String,
    pub data: Reading<MarketData>,
}

/// Keyed by checksummed market address.
pub type MarketSnapshot = BTreeMap<String, MarketRow>;

async fn market_data(wallet: &dyn WalletProvider, m: &MarketDescriptor) -> eyre::Result<MarketData> {
    let comet = m.address;
    let util = read(wallet, comet, &IComet::getUtilizationCall {}).await?;
    let supply_rate = read(wallet, comet, &IComet::getSupplyRateCall { utilization: util }).await?;
    let borrow_rate = read(wallet, comet, &IComet::getBorrowRateCall { utilization: util }).await?;
    let total_supply = read(wallet, comet, &IComet::totalSupplyCall {}).await?;
    let total_borrow = read(wallet, comet, &IComet::totalBorrowCall {}).await?;
    let decimals = u32::from(read(wallet, comet, &IComet::decimalsCall {}).await?);

    Ok(MarketData {
        utilization: base_to_decimal(util, RATE_DECIMALS)?
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_eyre("utilization out of range")?,
        supply_apr: apr_percent(supply_rate)?,
        borrow_apr: apr_percent(borrow_rate)?,
        total_supply: base_to_decimal(total_supply, decimals)?,
        total_borrow: base_to_decimal(total_borrow, decimals)?,
    })
}

pub struct MarketsFetcher {
    ctx: Ctx,
    cache: Cache<MarketSnapshot>,
}

impl MarketsFetcher {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            cache: Cache::default(),
        }
    }

    /// Read rates and totals for every market on the current chain.
    pub async fn fetch(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Account) else {
            return FetchOutcome::Skipped;
        };
        let markets = self.ctx.registry.markets(scope.chain_id);
        if markets.is_empty() {
            tracing::warn!(chain_id = scope.chain_id, "no markets configured for network");
        }

        let mut snapshot = MarketSnapshot::new();
        for m in markets {
            let key = checksum(m.address);
            let data = Reading::from_result(&key, market_data(self.ctx.wallet.as_ref(), m).await);
            snapshot.insert(
                key,
                MarketRow {
                    symbol: m.symbol.clone(),
                    data,
                },
            );
        }
        self.ctx.commit(NAME, &scope, &self.cache, snapshot, render)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch().await
    }

    pub fn cached(&self) -> Option<MarketSnapshot> {
        self.cache.get()
    }
}

fn describe(row: &MarketRow) -> String {
    let field = |f: fn(&MarketData) -> String| row.data.display(f);
    format!(
        "Symbol: {} | Supply Rate: {} % | Borrow Rate: {} % | Utilization: {} % | Total Supply: {} | Total Borrows: {}",
        row.symbol,
        field(|d| fixed(d.supply_apr, 2)),
        field(|d| fixed(d.borrow_apr, 2)),
        field(|d| fixed(d.utilization, 2)),
        field(|d| d.total_supply.normalize().to_string()),
        field(|d| d.total_borrow.normalize().to_string()),
    )
}

fn render(s: &dyn Surface, snapshot: &MarketSnapshot) {
    for (address, row) in snapshot {
        surface::put_text(s, &ids::market(address), &describe(row));
    }
}
