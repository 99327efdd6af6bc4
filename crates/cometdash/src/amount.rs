use alloy::primitives::U256;
use eyre::Context as _;
use rust_decimal::Decimal;
use std::str::FromStr as _;

fn pow10(decimals: u32) -> U256 {
    U256::from(10_u8).pow(U256::from(decimals))
}

/// Scale a user-entered decimal string into base units.
///
/// `"1.5"` with 6 decimals is `1_500_000`. Rejects negatives and excess fraction digits.
pub fn parse_ui_to_base(s: &str, decimals: u32) -> eyre::Result<U256> {
    let s = s.trim();
    if s.is_empty() {
        eyre::bail!("empty amount");
    }

    let (whole, frac) = match s.split_once('.') {
        Some((a, b)) => (a, b),
        None => (s, ""),
    };

    if whole.starts_with('-') {
        eyre::bail!("amount must be non-negative");
    }
    if whole.starts_with('+') || frac.starts_with('+') || frac.starts_with('-') {
        eyre::bail!("invalid amount: {s}");
    }

    let whole_v = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).context("parse whole")?
    };

    if frac.len() > decimals as usize {
        eyre::bail!("too many decimal places for token (decimals={decimals})");
    }

    let mut frac_s = frac.to_owned();
    while frac_s.len() < decimals as usize {
        frac_s.push('0');
    }
    let frac_v = if frac_s.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&frac_s, 10).context("parse fractional")?
    };

    whole_v
        .checked_mul(pow10(decimals))
        .and_then(|x| x.checked_add(frac_v))
        .ok_or_else(|| eyre::eyre!("amount overflow"))
}

/// Format a base-unit amount as a decimal string without floats.
///
/// Examples:
/// - base=1500000, decimals=6 => "1.5"
/// - base=1, decimals=6 => "0.000001"
pub fn format_base_to_ui(base: U256, decimals: u32) -> String {
    if decimals == 0 {
        return base.to_string();
    }
    let scale = pow10(decimals);
    let whole = base / scale;
    let frac = base % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let mut frac_s = format!("{frac:0>width$}", frac = frac.to_string(), width = decimals as usize);
    while frac_s.ends_with('0') {
        frac_s.pop();
    }
    format!("{whole}.{frac_s}")
}

/// Normalize a raw on-chain integer into a `Decimal`.
///
/// Values beyond `Decimal`'s 96-bit mantissa are an error; callers treat that like any other
/// failed read.
pub fn base_to_decimal(base: U256, decimals: u32) -> eyre::Result<Decimal> {
    let s = format_base_to_ui(base, decimals);
    Decimal::from_str(&s).with_context(|| format!("amount out of range: {s}"))
}

/// Render a decimal with a fixed number of fraction digits (half-away-from-zero).
pub fn fixed(v: Decimal, dp: u32) -> String {
    let r = v.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    format!("{r:.prec$}", prec = dp as usize)
}
