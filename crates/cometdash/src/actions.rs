//! Supply, withdraw, borrow and repay against a Comet market.
//!
//! Every submission runs the same pipeline: validate the form, resolve the market and its base
//! token, scale the amount, approve if the allowance is short (supply and repay only), then
//! send the action itself. The first failing step aborts the rest and is reported as a notice.
//! An approval that went through before a later failure stays in place.

use crate::amount::{format_base_to_ui, parse_ui_to_base};
use crate::errors::{DashError, Notice};
use crate::fetch::Ctx;
use crate::registry::{
    abi::{IComet, IERC20},
    checksum,
};
use crate::wallet::{read, send};
use alloy::primitives::{Address, B256, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ActionKind {
    Supply,
    Withdraw,
    Borrow,
    Repay,
}

impl ActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Supply => "Supply",
            Self::Withdraw => "Withdraw",
            Self::Borrow => "Borrow",
            Self::Repay => "Repay",
        }
    }

    /// Supply and repay move tokens into the Comet and need an allowance first.
    const fn pulls_tokens(self) -> bool {
        matches!(self, Self::Supply | Self::Repay)
    }
}

/// What the user filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionForm {
    pub market_symbol: String,
    pub amount: String,
}

/// Everything resolved before the first transaction goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plan {
    account: Address,
    comet: Address,
    base: Address,
    symbol: String,
    decimals: u8,
    amount: U256,
}

pub struct ActionHandler {
    ctx: Ctx,
}

impl ActionHandler {
    pub const fn new(ctx: Ctx) -> Self {
        Self { ctx }
    }

    /// Run one submission, reporting the outcome as a notice. Returns the action's transaction
    /// hash on success.
    pub async fn submit(&self, kind: ActionKind, form: &ActionForm) -> Option<B256> {
        match self.execute(kind, form).await {
            Ok((hash, plan)) => {
                let shown = format_base_to_ui(plan.amount, u32::from(plan.decimals));
                tracing::info!(action = kind.label(), tx = %hash, amount = %shown, symbol = %plan.symbol, "action confirmed");
                self.ctx.surface.notify(Notice::success(format!(
                    "{} of {shown} {} successful! Transaction: {hash}",
                    kind.label(),
                    plan.symbol
                )));
                Some(hash)
            }
            Err(e) => {
                tracing::error!(action = kind.label(), error = %format!("{e:#}"), "action failed");
                self.ctx.surface.notify(Notice::failed(kind.label(), &e));
                None
            }
        }
    }

    async fn plan(&self, form: &ActionForm) -> eyre::Result<Plan> {
        let symbol = form.market_symbol.trim();
        if symbol.is_empty() {
            return Err(DashError::InvalidForm("market symbol is required".into()).into());
        }
        if form.amount.trim().is_empty() {
            return Err(DashError::InvalidForm("amount is required".into()).into());
        }

        let st = self.ctx.store.snapshot();
        let account = st.account.ok_or(DashError::NotConnected)?;
        let chain_id = st.chain_id.ok_or(DashError::NoNetwork)?;
        let registry = &self.ctx.registry;

        let market = registry
            .market(chain_id, symbol)
            .ok_or_else(|| DashError::UnknownMarket {
                symbol: symbol.to_owned(),
                chain_id,
            })?;
        let comet = market.address;

        let base = read(self.ctx.wallet.as_ref(), comet, &IComet::baseTokenCall {}).await?;
        let token = registry
            .token_by_address(chain_id, base)
            .ok_or_else(|| DashError::UnknownBaseToken(checksum(base)))?;

        let amount = parse_ui_to_base(&form.amount, u32::from(token.decimals))
            .map_err(|e| DashError::InvalidForm(format!("{e:#}")))?;
        if amount.is_zero() {
            return Err(DashError::InvalidForm("amount must be greater than zero".into()).into());
        }

        Ok(Plan {
            account,
            comet,
            base,
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            amount,
        })
    }

    async fn ensure_allowance(&self, plan: &Plan) -> eyre::Result<()> {
        let w = self.ctx.wallet.as_ref();
        let allowance = read(
            w,
            plan.base,
            &IERC20::allowanceCall {
                owner: plan.account,
                spender: plan.comet,
            },
        )
        .await?;
        if allowance >= plan.amount {
            tracing::debug!(%allowance, "allowance sufficient; no approval needed");
            return Ok(());
        }
        tracing::info!(%allowance, needed = %plan.amount, token = %plan.symbol, "approving Comet");
        send(
            w,
            plan.account,
            plan.base,
            &IERC20::approveCall {
                spender: plan.comet,
                value: plan.amount,
            },
        )
        .await?;
        Ok(())
    }

    async fn execute(&self, kind: ActionKind, form: &ActionForm) -> eyre::Result<(B256, Plan)> {
        let plan = self.plan(form).await?;
        if kind.pulls_tokens() {
            self.ensure_allowance(&plan).await?;
        }

        let w = self.ctx.wallet.as_ref();
        let hash = if kind.pulls_tokens() {
            let call = IComet::supplyCall {
                asset: plan.base,
                amount: plan.amount,
            };
            send(w, plan.account, plan.comet, &call).await?
        } else {
            let call = IComet::withdrawCall {
                asset: plan.base,
                amount: plan.amount,
            };
            send(w, plan.account, plan.comet, &call).await?
        };
        Ok((hash, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NoticeLevel;
    use crate::registry::Registry;
    use crate::test_support::{addr, word, Harness, ScriptedWallet, ALICE};
    use alloy::sol_types::{SolCall as _, SolValue as _};

    const CUSDC: &str = "0x5555555555555555555555555555555555555555";
    const USDC: &str = "0x4444444444444444444444444444444444444444";

    fn registry() -> Registry {
        Registry::default()
            .with_token("USDC", 6, 1, addr(USDC))
            .with_market(1, "cUSDC", addr(CUSDC))
    }

    fn market() -> ScriptedWallet {
        ScriptedWallet::new("0x1")
            .returns::<IComet::baseTokenCall>(addr(CUSDC), addr(USDC).abi_encode())
    }

    fn form(sym: &str, amount: &str) -> ActionForm {
        ActionForm {
            market_symbol: sym.to_owned(),
            amount: amount.to_owned(),
        }
    }

    #[tokio::test]
    async fn supply_with_enough_allowance_skips_approval() -> eyre::Result<()> {
        let h = Harness::new(registry(), |_| {
            market().returns::<IERC20::allowanceCall>(addr(USDC), word(U256::MAX))
        })
        .connected(1);
        let a = ActionHandler::new(h.ctx.clone());
        assert!(a.submit(ActionKind::Supply, &form("cUSDC", "1.5")).await.is_some());

        let sent = h.wallet.sent();
        assert_eq!(sent.len(), 1, "only the supply goes out");
        let tx = sent.first().ok_or_else(|| eyre::eyre!("nothing sent"))?;
        assert_eq!(tx.selector(), IComet::supplyCall::SELECTOR);
        assert_eq!(tx.from, addr(ALICE));
        assert_eq!(tx.to, addr(CUSDC));
        let call = IComet::supplyCall::abi_decode(&tx.data)?;
        assert_eq!((call.asset, call.amount), (addr(USDC), U256::from(1_500_000_u64)));
        assert_eq!(h.board.notices().first().map(|n| n.level), Some(NoticeLevel::Success));
        Ok(())
    }

    #[tokio::test]
    async fn repay_with_short_allowance_approves_first() {
        let h = Harness::new(registry(), |_| {
            market().returns::<IERC20::allowanceCall>(addr(USDC), word(10_u8))
        })
        .connected(1);
        let a = ActionHandler::new(h.ctx.clone());
        assert!(a.submit(ActionKind::Repay, &form("cusdc", "2")).await.is_some());

        let selectors: Vec<[u8; 4]> = h.wallet.sent().iter().map(|t| t.selector()).collect();
        assert_eq!(selectors, vec![IERC20::approveCall::SELECTOR, IComet::supplyCall::SELECTOR]);
        let approve = h.wallet.sent().first().map(|t| t.to);
        assert_eq!(approve, Some(addr(USDC)));
    }

    #[tokio::test]
    async fn failed_approval_aborts_supply() {
        let h = Harness::new(registry(), |_| {
            market()
                .returns::<IERC20::allowanceCall>(addr(USDC), word(0_u8))
                .reverts::<IERC20::approveCall>()
        })
        .connected(1);
        let a = ActionHandler::new(h.ctx.clone());
        assert!(a.submit(ActionKind::Supply, &form("cUSDC", "1")).await.is_none());
        assert_eq!(h.wallet.sent().len(), 1, "supply must not be sent after a failed approval");
        let notice = h.board.notices().first().cloned();
        assert_eq!(notice.as_ref().map(|n| n.level), Some(NoticeLevel::Error));
        assert!(
            notice.is_some_and(|n| n.message.starts_with("Supply failed")),
            "failure notice expected"
        );
    }

    #[tokio::test]
    async fn borrow_and_withdraw_call_withdraw_without_allowance() {
        let h = Harness::new(registry(), |_| market()).connected(1);
        let a = ActionHandler::new(h.ctx.clone());
        assert!(a.submit(ActionKind::Borrow, &form("cUSDC", "100")).await.is_some());
        assert!(a.submit(ActionKind::Withdraw, &form("cUSDC", "0.5")).await.is_some());
        assert_eq!(h.wallet.calls_with::<IERC20::allowanceCall>(), 0);
        let all_withdraw = h
            .wallet
            .sent()
            .iter()
            .all(|t| t.selector() == IComet::withdrawCall::SELECTOR);
        assert!(all_withdraw, "borrow and withdraw both map to withdraw()");
    }

    #[tokio::test]
    async fn invalid_forms_send_nothing() {
        let h = Harness::new(registry(), |_| market()).connected(1);
        let a = ActionHandler::new(h.ctx.clone());
        for f in [form("", "1"), form("cUSDC", ""), form("cUSDC", "1.0000001"), form("cUSDC", "0"), form("cDAI", "1")] {
            assert!(a.submit(ActionKind::Supply, &f).await.is_none(), "{f:?} should be rejected");
        }
        assert!(h.wallet.sent().is_empty(), "no transaction for invalid input");
        assert_eq!(h.board.notices().len(), 5);
    }

    #[tokio::test]
    async fn disconnected_submission_is_a_warning() {
        let h = Harness::new(registry(), |_| market());
        let a = ActionHandler::new(h.ctx.clone());
        assert!(a.submit(ActionKind::Withdraw, &form("cUSDC", "1")).await.is_none());
        assert_eq!(h.board.notices().first().map(|n| n.level), Some(NoticeLevel::Warning));
        assert_eq!(h.wallet.call_count(), 0);
    }
}
