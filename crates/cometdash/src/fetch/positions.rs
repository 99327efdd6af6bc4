use super::{Cache, Ctx, FetchOutcome, Need, Reading, Scope};
use crate::amount::base_to_decimal;
use crate::registry::{abi::IComet, AssetDescriptor};
use crate::surface::{self, ids, Surface, FALLBACK};
use crate::wallet::read;
use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

const NAME: &str = "positions";

/// What the account has supplied to and borrowed from the active Comet, per symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Positions {
    pub supplies: BTreeMap<String, Reading<Decimal>>,
    pub borrows: BTreeMap<String, Reading<Decimal>>,
}

fn known_values(m: &BTreeMap<String, Reading<Decimal>>) -> BTreeMap<String, Decimal> {
    m.iter()
        .filter_map(|(k, v)| Some((k.clone(), *v.value()?)))
        .collect()
}

impl Positions {
    /// Supplied amounts that were read successfully.
    pub fn supplied(&self) -> BTreeMap<String, Decimal> {
        known_values(&self.supplies)
    }

    pub fn borrowed(&self) -> BTreeMap<String, Decimal> {
        known_values(&self.borrows)
    }
}

pub struct PositionsFetcher {
    ctx: Ctx,
    cache: Cache<Positions>,
}

impl PositionsFetcher {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            cache: Cache::default(),
        }
    }

    async fn base_position(&self, scope: &Scope, base: &AssetDescriptor, out: &mut Positions) {
        let w = self.ctx.wallet.as_ref();
        let comet = scope.comet();
        let account = scope.account;
        let decimals = u32::from(base.decimals);

        let supplied = read(w, comet, &IComet::balanceOfCall { account })
            .await
            .and_then(|v| base_to_decimal(v, decimals));
        out.supplies
            .insert(base.symbol.clone(), Reading::from_result("base supply", supplied));

        let borrowed = read(w, comet, &IComet::borrowBalanceOfCall { account })
            .await
            .and_then(|v| base_to_decimal(v, decimals));
        out.borrows
            .insert(base.symbol.clone(), Reading::from_result("base borrow", borrowed));
    }

    /// Base supply and borrow, plus collateral for every other known token on the chain.
    pub async fn fetch(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Proxy) else {
            return FetchOutcome::Skipped;
        };
        let w = self.ctx.wallet.as_ref();
        let comet = scope.comet();
        let registry = &self.ctx.registry;

        let base = match read(w, comet, &IComet::baseTokenCall {}).await {
            Ok(a) => {
                let t = registry.token_by_address(scope.chain_id, a);
                if t.is_none() {
                    tracing::warn!(base = %a, "base token not in registry; base position skipped");
                }
                t
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "base token unavailable; base position skipped");
                None
            }
        };

        let mut positions = Positions::default();
        if let Some(b) = base {
            self.base_position(&scope, b, &mut positions).await;
        }
        for (token, asset) in registry.tokens_on(scope.chain_id) {
            if base.is_some_and(|b| b.symbol == token.symbol) {
                continue;
            }
            let call = IComet::collateralBalanceOfCall {
                account: scope.account,
                asset,
            };
            let collateral = read(w, comet, &call)
                .await
                .and_then(|v| base_to_decimal(U256::from(v), u32::from(token.decimals)));
            positions
                .supplies
                .insert(token.symbol.clone(), Reading::from_result(&token.symbol, collateral));
        }
        self.ctx.commit(NAME, &scope, &self.cache, positions, render)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch().await
    }

    pub fn cached(&self) -> Option<Positions> {
        self.cache.get()
    }
}

/// `"1.5 USDC, 2 WETH"`, zero entries omitted.
fn summarize(m: &BTreeMap<String, Reading<Decimal>>) -> String {
    let parts: Vec<String> = m
        .iter()
        .filter(|(_, v)| v.value().is_none_or(|d| !d.is_zero()))
        .map(|(sym, v)| format!("{} {sym}", v.display(|d| d.normalize().to_string())))
        .collect();
    if parts.is_empty() {
        return FALLBACK.to_owned();
    }
    parts.join(", ")
}

fn render(s: &dyn Surface, p: &Positions) {
    surface::put_text(s, ids::SUPPLIED, &summarize(&p.supplies));
    surface::put_text(s, ids::BORROWED, &summarize(&p.borrows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::test_support::{addr, word, Harness, ScriptedWallet};
    use alloy::sol_types::SolValue as _;

    const COMET: &str = "0x3333333333333333333333333333333333333333";
    const USDC: &str = "0x4444444444444444444444444444444444444444";
    const WETH: &str = "0x7777777777777777777777777777777777777777";
    const COMP: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

    fn registry() -> Registry {
        Registry::default()
            .with_token("USDC", 6, 1, addr(USDC))
            .with_token("WETH", 18, 1, addr(WETH))
            .with_token("COMP", 18, 1, addr(COMP))
            .with_proxy(1, addr(COMET))
    }

    #[tokio::test]
    async fn base_and_collateral_positions() {
        let h = Harness::new(registry(), |_| {
            let c = addr(COMET);
            ScriptedWallet::new("0x1")
                .returns::<IComet::baseTokenCall>(c, addr(USDC).abi_encode())
                .returns::<IComet::balanceOfCall>(c, word(0_u8))
                .returns::<IComet::borrowBalanceOfCall>(c, word(1_500_000_000_u64))
                .responds::<IComet::collateralBalanceOfCall, _>(c, |call| {
                    if call.asset == addr(WETH) {
                        Ok(word(2_000_000_000_000_000_000_u64))
                    } else {
                        eyre::bail!("not a collateral asset")
                    }
                })
        })
        .connected(1);
        let f = PositionsFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Committed);

        let p = f.cached().unwrap_or_default();
        assert_eq!(p.borrowed().get("USDC"), Some(&Decimal::from(1500)));
        assert_eq!(p.supplied().get("WETH"), Some(&Decimal::from(2)));
        assert_eq!(p.supplies.get("COMP"), Some(&Reading::Fallback));
        assert_eq!(h.board.text(ids::SUPPLIED).as_deref(), Some("-- COMP, 2 WETH"));
        assert_eq!(h.board.text(ids::BORROWED).as_deref(), Some("1500 USDC"));
    }

    #[tokio::test]
    async fn unknown_base_token_skips_base_position_only() {
        let h = Harness::new(registry(), |_| {
            let c = addr(COMET);
            ScriptedWallet::new("0x1")
                .returns::<IComet::baseTokenCall>(c, addr(COMET).abi_encode())
                .returns::<IComet::collateralBalanceOfCall>(c, word(0_u8))
        })
        .connected(1);
        let f = PositionsFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Committed);
        let p = f.cached().unwrap_or_default();
        assert!(p.borrows.is_empty(), "no base token, no borrow entry");
        assert_eq!(p.supplies.len(), 3);
        assert_eq!(h.board.text(ids::SUPPLIED).as_deref(), Some(FALLBACK));
    }
}
