//! COMP governance: holdings summary, proposal lifecycle and voting.

pub mod proposals;

use crate::amount::{base_to_decimal, fixed};
use crate::errors::{DashError, Notice};
use crate::fetch::{Cache, Ctx, FetchOutcome, Need, Reading, Scope};
use crate::registry::{
    abi::{ICompToken, IGovernorBravo},
    parse_address, GovernanceContracts,
};
use crate::surface::{self, ids, Surface};
use crate::wallet::{read, send};
use alloy::primitives::{Address, Bytes, B256, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr as _;

const COMP_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VoteSupport {
    Against,
    For,
    Abstain,
}

impl VoteSupport {
    pub const fn code(self) -> u8 {
        match self {
            Self::Against => 0,
            Self::For => 1,
            Self::Abstain => 2,
        }
    }
}

/// A proposal as entered by the user, one action per index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDraft {
    pub targets: Vec<Address>,
    pub values: Vec<U256>,
    pub signatures: Vec<String>,
    pub calldatas: Vec<Bytes>,
    pub description: String,
}

impl ProposalDraft {
    /// Parse raw form fields. All action lists must have the same, non-zero length.
    pub fn parse(
        targets: &[String],
        values: &[String],
        signatures: &[String],
        calldatas: &[String],
        description: &str,
    ) -> Result<Self, DashError> {
        let n = targets.len();
        if n == 0 || values.len() != n || signatures.len() != n || calldatas.len() != n {
            return Err(DashError::InvalidForm(
                "targets, values, signatures and calldatas must have the same non-zero length".into(),
            ));
        }
        if description.trim().is_empty() {
            return Err(DashError::InvalidForm("description is required".into()));
        }
        let targets = targets
            .iter()
            .map(|t| parse_address(t).ok_or_else(|| DashError::InvalidAddress(t.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let values = values
            .iter()
            .map(|v| {
                U256::from_str(v.trim()).map_err(|e| DashError::InvalidForm(format!("value {v}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let calldatas = calldatas
            .iter()
            .map(|c| {
                let raw = c.trim();
                hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
                    .map(Bytes::from)
                    .map_err(|e| DashError::InvalidForm(format!("calldata {c}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            targets,
            values,
            signatures: signatures.to_vec(),
            calldatas,
            description: description.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernanceSummary {
    pub comp_balance: Reading<Decimal>,
    pub voting_power: Reading<Decimal>,
}

/// Where governance writes go, resolved from current state.
#[derive(Debug, Clone, Copy)]
struct Target {
    account: Address,
    contracts: GovernanceContracts,
}

/// Resolve the governance contracts for a fetch scope, warning when the chain has none.
pub(crate) fn contracts_for(ctx: &Ctx, what: &'static str, scope: &Scope) -> Option<GovernanceContracts> {
    let c = ctx.registry.governance(scope.chain_id);
    if c.is_none() {
        tracing::warn!(what, chain_id = scope.chain_id, "governance contracts not configured; skipping");
    }
    c
}

pub struct Governance {
    ctx: Ctx,
    summary: Cache<GovernanceSummary>,
}

impl Governance {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            summary: Cache::default(),
        }
    }

    fn target(&self) -> Result<Target, DashError> {
        let st = self.ctx.store.snapshot();
        let account = st.account.ok_or(DashError::NotConnected)?;
        let chain_id = st.chain_id.ok_or(DashError::NoNetwork)?;
        let contracts = self
            .ctx
            .registry
            .governance(chain_id)
            .ok_or(DashError::NoGovernance(chain_id))?;
        Ok(Target { account, contracts })
    }

    /// COMP balance and current votes of the connected account.
    pub async fn summary(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope("governance", Need::Account) else {
            return FetchOutcome::Skipped;
        };
        let Some(contracts) = contracts_for(&self.ctx, "governance", &scope) else {
            return FetchOutcome::Skipped;
        };
        let w = self.ctx.wallet.as_ref();
        let account = scope.account;

        let balance = read(w, contracts.comp_token, &ICompToken::balanceOfCall { account })
            .await
            .and_then(|v| base_to_decimal(v, COMP_DECIMALS));
        let votes = read(w, contracts.comp_token, &ICompToken::getCurrentVotesCall { account })
            .await
            .and_then(|v| base_to_decimal(U256::from(v), COMP_DECIMALS));
        let summary = GovernanceSummary {
            comp_balance: Reading::from_result("COMP balance", balance),
            voting_power: Reading::from_result("voting power", votes),
        };
        self.ctx
            .commit("governance", &scope, &self.summary, summary, render_summary)
    }

    pub fn cached_summary(&self) -> Option<GovernanceSummary> {
        self.summary.get()
    }

    fn report(&self, action: &str, result: eyre::Result<B256>, success: String) -> Option<B256> {
        match result {
            Ok(hash) => {
                tracing::info!(action, tx = %hash, "governance transaction confirmed");
                self.ctx.surface.notify(Notice::success(success));
                Some(hash)
            }
            Err(e) => {
                tracing::error!(action, error = %format!("{e:#}"), "governance transaction failed");
                let notice = match e.downcast_ref::<DashError>() {
                    Some(d @ DashError::NoVotingPower) => Notice::from(d.clone()),
                    _ => Notice::failed(action, &e),
                };
                self.ctx.surface.notify(notice);
                None
            }
        }
    }

    async fn propose_tx(&self, draft: &ProposalDraft) -> eyre::Result<B256> {
        let t = self.target()?;
        let call = IGovernorBravo::proposeCall {
            targets: draft.targets.clone(),
            values: draft.values.clone(),
            signatures: draft.signatures.clone(),
            calldatas: draft.calldatas.clone(),
            description: draft.description.clone(),
        };
        send(self.ctx.wallet.as_ref(), t.account, t.contracts.governor, &call).await
    }

    async fn vote_tx(&self, proposal_id: u64, support: VoteSupport) -> eyre::Result<B256> {
        let t = self.target()?;
        let w = self.ctx.wallet.as_ref();
        let votes = read(
            w,
            t.contracts.comp_token,
            &ICompToken::getCurrentVotesCall { account: t.account },
        )
        .await?;
        if votes.is_zero() {
            return Err(DashError::NoVotingPower.into());
        }
        let call = IGovernorBravo::castVoteCall {
            proposalId: U256::from(proposal_id),
            support: support.code(),
        };
        send(w, t.account, t.contracts.governor, &call).await
    }

    async fn delegate_tx(&self, delegatee: &str) -> eyre::Result<B256> {
        let to = parse_address(delegatee)
            .ok_or_else(|| DashError::InvalidAddress(delegatee.to_owned()))?;
        let t = self.target()?;
        let call = ICompToken::delegateCall { delegatee: to };
        send(self.ctx.wallet.as_ref(), t.account, t.contracts.comp_token, &call).await
    }

    async fn cancel_tx(&self, proposal_id: u64) -> eyre::Result<B256> {
        let t = self.target()?;
        let call = IGovernorBravo::cancelCall {
            proposalId: U256::from(proposal_id),
        };
        send(self.ctx.wallet.as_ref(), t.account, t.contracts.governor, &call).await
    }

    pub async fn propose(&self, draft: &ProposalDraft) -> Option<B256> {
        let result = self.propose_tx(draft).await;
        self.report("Proposal creation", result, "Proposal created successfully!".to_owned())
    }

    /// Vote on `proposal_id`. Refused up front when the account has no voting power.
    pub async fn cast_vote(&self, proposal_id: u64, support: VoteSupport) -> Option<B256> {
        let result = self.vote_tx(proposal_id, support).await;
        self.report(
            "Vote",
            result,
            format!("Vote cast on proposal #{proposal_id} successfully!"),
        )
    }

    pub async fn delegate(&self, delegatee: &str) -> Option<B256> {
        let result = self.delegate_tx(delegatee).await;
        self.report(
            "Delegation",
            result,
            format!("Votes delegated to {delegatee} successfully!"),
        )
    }

    pub async fn cancel(&self, proposal_id: u64) -> Option<B256> {
        let result = self.cancel_tx(proposal_id).await;
        self.report(
            "Cancellation",
            result,
            format!("Proposal #{proposal_id} canceled successfully!"),
        )
    }
}

fn render_summary(s: &dyn Surface, g: &GovernanceSummary) {
    surface::put_text(
        s,
        ids::COMP_BALANCE,
        &format!("{} COMP", g.comp_balance.display(|v| fixed(*v, 4))),
    );
    surface::put_text(
        s,
        ids::VOTING_POWER,
        &format!("{} Voting Power", g.voting_power.display(|v| fixed(*v, 4))),
    );
    surface::show(s, ids::GOVERNANCE_SECTION, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NoticeLevel;
    use crate::registry::Registry;
    use crate::test_support::{addr, word, Harness, ScriptedWallet, ALICE, BOB};
    use alloy::sol_types::SolCall as _;

    pub(super) const COMP: &str = "0xc00e94Cb662C3520282E6f5717214004A7f26888";
    pub(super) const GOVERNOR: &str = "0xc0Da02939E1441F497fd74F78cE7Decb17B66529";

    pub(super) fn registry() -> Registry {
        Registry::default().with_governance(
            1,
            GovernanceContracts {
                comp_token: addr(COMP),
                governor: addr(GOVERNOR),
            },
        )
    }

    #[tokio::test]
    async fn summary_renders_four_decimals_and_shows_section() {
        let h = Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1")
                .returns::<ICompToken::balanceOfCall>(addr(COMP), word(U256::from(12_345_678_900_000_000_000_u128)))
                .returns::<ICompToken::getCurrentVotesCall>(addr(COMP), word(U256::from(500_000_000_000_000_000_u64)))
        })
        .connected(1);
        let g = Governance::new(h.ctx.clone());
        assert_eq!(g.summary().await, FetchOutcome::Committed);
        assert_eq!(h.board.text(ids::COMP_BALANCE).as_deref(), Some("12.3457 COMP"));
        assert_eq!(h.board.text(ids::VOTING_POWER).as_deref(), Some("0.5000 Voting Power"));
        assert_eq!(h.board.element(ids::GOVERNANCE_SECTION).and_then(|e| e.visible), Some(true));
    }

    #[tokio::test]
    async fn chain_without_governance_is_a_no_op() {
        let h = Harness::new(registry(), |_| ScriptedWallet::new("0x89")).connected(137);
        let g = Governance::new(h.ctx.clone());
        assert_eq!(g.summary().await, FetchOutcome::Skipped);
        assert!(g.cast_vote(1, VoteSupport::For).await.is_none());
        assert_eq!(h.wallet.call_count(), 0);
        assert_eq!(h.board.notices().first().map(|n| n.level), Some(NoticeLevel::Warning));
    }

    #[tokio::test]
    async fn vote_refused_without_voting_power() {
        let h = Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1").returns::<ICompToken::getCurrentVotesCall>(addr(COMP), word(0_u8))
        })
        .connected(1);
        let g = Governance::new(h.ctx.clone());
        assert!(g.cast_vote(7, VoteSupport::For).await.is_none());
        assert!(h.wallet.sent().is_empty(), "no castVote without votes");
        let msg = h.board.notices().first().map(|n| n.message.clone());
        assert_eq!(
            msg.as_deref(),
            Some("You have no voting power. Please delegate your COMP tokens first.")
        );
    }

    #[tokio::test]
    async fn vote_sends_support_code() -> eyre::Result<()> {
        let h = Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1").returns::<ICompToken::getCurrentVotesCall>(addr(COMP), word(1_u8))
        })
        .connected(1);
        let g = Governance::new(h.ctx.clone());
        assert!(g.cast_vote(7, VoteSupport::Abstain).await.is_some());
        let sent = h.wallet.sent();
        let tx = sent.first().ok_or_else(|| eyre::eyre!("nothing sent"))?;
        assert_eq!(tx.to, addr(GOVERNOR));
        let call = IGovernorBravo::castVoteCall::abi_decode(&tx.data)?;
        assert_eq!((call.proposalId, call.support), (U256::from(7_u8), 2));
        Ok(())
    }

    #[tokio::test]
    async fn delegate_validates_address_and_targets_comp() {
        let h = Harness::new(registry(), |_| ScriptedWallet::new("0x1")).connected(1);
        let g = Governance::new(h.ctx.clone());
        assert!(g.delegate("not-an-address").await.is_none());
        assert!(h.wallet.sent().is_empty(), "invalid delegatee sends nothing");

        assert!(g.delegate(BOB).await.is_some());
        let tx = h.wallet.sent().first().cloned();
        assert_eq!(tx.as_ref().map(|t| t.to), Some(addr(COMP)));
        assert_eq!(tx.map(|t| t.from), Some(addr(ALICE)));
        assert_eq!(h.board.notices().last().map(|n| n.level), Some(NoticeLevel::Success));
    }

    #[tokio::test]
    async fn propose_and_cancel_go_to_governor() {
        let h = Harness::new(registry(), |_| {
            ScriptedWallet::new("0x1").reverts::<IGovernorBravo::cancelCall>()
        })
        .connected(1);
        let g = Governance::new(h.ctx.clone());
        let draft = ProposalDraft::parse(
            &[BOB.to_owned()],
            &["0".to_owned()],
            &["_setReserveFactor(uint256)".to_owned()],
            &["0x00".to_owned()],
            "Adjust reserve factor",
        );
        assert!(draft.is_ok(), "draft should parse");
        if let Ok(d) = draft {
            assert!(g.propose(&d).await.is_some());
        }
        assert!(g.cancel(3).await.is_none(), "reverted cancel reports failure");

        let selectors: Vec<[u8; 4]> = h.wallet.sent().iter().map(|t| t.selector()).collect();
        assert_eq!(selectors, vec![IGovernorBravo::proposeCall::SELECTOR, IGovernorBravo::cancelCall::SELECTOR]);
        assert_eq!(h.board.notices().last().map(|n| n.level), Some(NoticeLevel::Error));
    }

    #[test]
    fn draft_rejects_mismatched_lengths() {
        let r = ProposalDraft::parse(&[BOB.to_owned()], &[], &[], &[], "x");
        assert!(matches!(r, Err(DashError::InvalidForm(_))), "got {r:?}");
        let r = ProposalDraft::parse(&["0x12".to_owned()], &["0".to_owned()], &[String::new()], &["0x".to_owned()], "x");
        assert!(matches!(r, Err(DashError::InvalidAddress(_))), "got {r:?}");
    }
}
