use super::{Cache, Ctx, FetchOutcome, Need, Reading};
use crate::amount::base_to_decimal;
use crate::registry::abi::IERC20;
use crate::surface::{self, ids, Surface};
use crate::wallet::read;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

const NAME: &str = "balances";

/// Wallet token balances per symbol.
pub type BalanceSnapshot = BTreeMap<String, Reading<Decimal>>;

pub struct BalancesFetcher {
    ctx: Ctx,
    cache: Cache<BalanceSnapshot>,
}

impl BalancesFetcher {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            cache: Cache::default(),
        }
    }

    /// ERC-20 `balanceOf` for every known token on the current chain.
    pub async fn fetch(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Account) else {
            return FetchOutcome::Skipped;
        };
        let w = self.ctx.wallet.as_ref();

        let mut snapshot = BalanceSnapshot::new();
        for (token, address) in self.ctx.registry.tokens_on(scope.chain_id) {
            let balance = read(w, address, &IERC20::balanceOfCall { account: scope.account })
                .await
                .and_then(|raw| base_to_decimal(raw, u32::from(token.decimals)));
            snapshot.insert(token.symbol.clone(), Reading::from_result(&token.symbol, balance));
        }
        self.ctx.commit(NAME, &scope, &self.cache, snapshot, render)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch().await
    }

    pub fn cached(&self) -> Option<BalanceSnapshot> {
        self.cache.get()
    }
}

fn render(s: &dyn Surface, snapshot: &BalanceSnapshot) {
    for (symbol, balance) in snapshot {
        let text = format!(
            "Balance: {} {symbol}",
            balance.display(|b| b.normalize().to_string())
        );
        surface::put_text(s, &ids::balance(symbol), &text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::surface::FALLBACK;
    use crate::test_support::{addr, word, Harness, ScriptedWallet, ALICE};
    use alloy::primitives::U256;

    const USDC: &str = "0x4444444444444444444444444444444444444444";
    const WETH: &str = "0x7777777777777777777777777777777777777777";
    const DAI: &str = "0x9999999999999999999999999999999999999999";

    fn registry() -> Registry {
        Registry::default()
            .with_token("USDC", 6, 1, addr(USDC))
            .with_token("WETH", 18, 1, addr(WETH))
            .with_token("DAI", 18, 137, addr(DAI))
    }

    #[tokio::test]
    async fn balances_use_token_decimals_and_skip_other_chains() {
        let h = Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1")
                .responds::<IERC20::balanceOfCall, _>(addr(USDC), |c| {
                    assert_eq!(c.account, addr(ALICE));
                    Ok(word(2_500_000_u64))
                })
                .returns::<IERC20::balanceOfCall>(
                    addr(WETH),
                    word(U256::from(1_250_000_000_000_000_000_u64)),
                )
        })
        .connected(1);
        let f = BalancesFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Committed);

        assert_eq!(h.board.text(&ids::balance("USDC")).as_deref(), Some("Balance: 2.5 USDC"));
        assert_eq!(h.board.text(&ids::balance("WETH")).as_deref(), Some("Balance: 1.25 WETH"));
        assert_eq!(h.board.text(&ids::balance("DAI")), None, "DAI has no mainnet address");
        assert_eq!(h.wallet.call_count(), 2);
    }

    #[tokio::test]
    async fn one_failing_token_keeps_the_rest() {
        let h = Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1")
                .returns::<IERC20::balanceOfCall>(addr(USDC), word(7_000_000_u64))
                .fails::<IERC20::balanceOfCall>(addr(WETH))
        })
        .connected(1);
        let f = BalancesFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Committed);
        assert_eq!(h.board.text(&ids::balance("USDC")).as_deref(), Some("Balance: 7 USDC"));
        assert_eq!(
            h.board.text(&ids::balance("WETH")),
            Some(format!("Balance: {FALLBACK} WETH"))
        );
    }

    #[tokio::test]
    async fn disconnected_fetch_is_skipped() {
        let h = Harness::new(registry(), |_| ScriptedWallet::new("0x1"));
        let f = BalancesFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Skipped);
        assert_eq!(h.wallet.call_count(), 0);
        assert_eq!(f.cached(), None);
    }
}
