//! Health factor: collateral value over borrow value, from cached positions and prices.
//!
//! All arithmetic happens on base-unit integers. Balances are scaled up by the token's
//! decimals and prices by the feed's eight decimals. Digits finer than those scales are
//! truncated; nothing else is rounded before the final division.

use crate::amount::{base_to_decimal, fixed, parse_ui_to_base};
use crate::fetch::{positions::Positions, prices::PriceSnapshot, prices::PRICE_DECIMALS};
use crate::registry::Registry;
use crate::surface::{self, ids, Surface};
use alloy::primitives::U256;
use eyre::{Context as _, OptionExt as _};
use rust_decimal::prelude::ToPrimitive as _;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const RATIO_DECIMALS: u32 = 18;
pub const INFINITY: &str = "∞";

/// Per-symbol balances and USD prices the calculation runs on.
///
/// This is also the on-disk format read by `cometdash health --snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthInputs {
    pub supplies: BTreeMap<String, Decimal>,
    pub borrows: BTreeMap<String, Decimal>,
    pub prices: BTreeMap<String, Decimal>,
}

impl HealthInputs {
    /// Combine the positions and price snapshots; failed readings are left out.
    pub fn from_snapshots(positions: &Positions, prices: &PriceSnapshot) -> Self {
        Self {
            supplies: positions.supplied(),
            borrows: positions.borrowed(),
            prices: prices
                .iter()
                .filter_map(|(k, v)| Some((k.clone(), *v.value()?)))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read health snapshot {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse health snapshot {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthFactor {
    /// Nothing borrowed.
    Unbounded,
    Ratio(Decimal),
}

impl HealthFactor {
    pub fn display(&self) -> String {
        match self {
            Self::Unbounded => INFINITY.to_owned(),
            Self::Ratio(r) => fixed(*r, 2),
        }
    }

    /// Progress bar width: half the ratio as a percentage, capped at 100.
    pub fn progress(&self) -> u8 {
        match self {
            Self::Unbounded => 100,
            Self::Ratio(r) => r
                .checked_mul(Decimal::from(50_u8))
                .map_or(100, |p| p.min(Decimal::ONE_HUNDRED).floor().to_u8().unwrap_or(100)),
        }
    }

    pub fn at_risk(&self) -> bool {
        matches!(self, Self::Ratio(r) if *r < Decimal::ONE)
    }
}

impl Serialize for HealthFactor {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unbounded => s.serialize_str(INFINITY),
            Self::Ratio(r) => Serialize::serialize(r, s),
        }
    }
}

/// `balance × 10^decimals × price × 10^8`, all in integers. Digits below either scale are
/// truncated.
fn priced(balance: Decimal, decimals: u8, price: Decimal) -> eyre::Result<U256> {
    let scale = u32::from(decimals);
    let base = parse_ui_to_base(
        &balance.round_dp_with_strategy(scale, RoundingStrategy::ToZero).to_string(),
        scale,
    )?;
    let px = parse_ui_to_base(
        &price.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::ToZero).to_string(),
        PRICE_DECIMALS,
    )?;
    base.checked_mul(px).ok_or_eyre("value overflow")
}

/// The value of one side in price-scaled base units.
fn side_value(
    side: &'static str,
    balances: &BTreeMap<String, Decimal>,
    prices: &BTreeMap<String, Decimal>,
    registry: &Registry,
) -> U256 {
    let mut total = U256::ZERO;
    for (symbol, balance) in balances {
        let Some(token) = registry.token(symbol) else {
            tracing::warn!(side, symbol = %symbol, "token not in registry; excluded from health factor");
            continue;
        };
        let Some(price) = prices.get(symbol) else {
            tracing::warn!(side, symbol = %symbol, "no price; excluded from health factor");
            continue;
        };
        match priced(*balance, token.decimals, *price) {
            Ok(v) => total = total.saturating_add(v),
            Err(e) => {
                tracing::warn!(side, symbol = %symbol, error = %e, "unusable amount; excluded from health factor");
            }
        }
    }
    total
}

/// Compute the health factor. Tokens unknown to the registry or without a price count on
/// neither side.
pub fn compute(inputs: &HealthInputs, registry: &Registry) -> HealthFactor {
    let collateral = side_value("supply", &inputs.supplies, &inputs.prices, registry);
    let borrowed = side_value("borrow", &inputs.borrows, &inputs.prices, registry);
    if borrowed.is_zero() {
        return HealthFactor::Unbounded;
    }
    let scaled = collateral
        .checked_mul(U256::from(10_u8).pow(U256::from(RATIO_DECIMALS)))
        .map(|c| c / borrowed);
    match scaled.map(|r| base_to_decimal(r, RATIO_DECIMALS)) {
        Some(Ok(r)) => HealthFactor::Ratio(r),
        Some(Err(_)) | None => {
            tracing::debug!("health ratio beyond display range");
            HealthFactor::Ratio(Decimal::MAX)
        }
    }
}

pub fn render(s: &dyn Surface, hf: &HealthFactor) {
    surface::put_text(s, ids::HEALTH_FACTOR, &hf.display());
    surface::progress(s, ids::HEALTH_PROGRESS, hf.progress());
    surface::show(s, ids::LIQUIDATION_ALERT, hf.at_risk());
    if hf.at_risk() {
        tracing::warn!(health = %hf.display(), "position below liquidation threshold");
    }
}
