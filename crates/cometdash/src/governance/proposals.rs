//! Paginated proposal listing.
//!
//! Page 1 holds the newest proposals. Every page render re-reads `proposalCount`, each
//! proposal on the page, and the full `ProposalCreated` history for descriptions. Nothing is
//! cached across pages.

use super::contracts_for;
use crate::amount::base_to_decimal;
use crate::errors::Notice;
use crate::fetch::{Cache, Ctx, FetchOutcome, Need, Reading};
use crate::registry::{abi::IGovernorBravo, checksum};
use crate::surface::{self, ids, Surface};
use crate::wallet::{read, WalletProvider};
use alloy::{
    primitives::{Address, U256},
    rpc::types::Filter,
    sol_types::SolEvent as _,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

const NAME: &str = "proposals";
pub const DEFAULT_PAGE_SIZE: u64 = 10;
const NO_DESCRIPTION: &str = "No Description Available";

/// Page arithmetic over a proposal count. Ids run from 1 to `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page_size: u64,
}

impl Pagination {
    pub const fn new(total: u64, page_size: u64) -> Self {
        Self {
            total,
            page_size: if page_size == 0 { 1 } else { page_size },
        }
    }

    pub const fn page_count(&self) -> u64 {
        self.total.div_ceil(self.page_size)
    }

    /// Proposal ids on `page`, newest first.
    pub fn ids(&self, page: u64) -> Vec<u64> {
        let skipped = page.saturating_sub(1).saturating_mul(self.page_size);
        let start = self.total.saturating_sub(skipped);
        if start == 0 {
            return vec![];
        }
        let end = start.saturating_sub(self.page_size).saturating_add(1).max(1);
        (end..=start).rev().collect()
    }

    /// Clamp a requested page into range. `None` selects the last page (the oldest
    /// proposals), which is where the dashboard opens.
    pub fn select(&self, requested: Option<u64>) -> u64 {
        let last = self.page_count();
        match requested {
            None => last,
            Some(p) if last == 0 => {
                tracing::debug!(requested = p, "no proposals; page ignored");
                0
            }
            Some(p) => p.clamp(1, last),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProposalStatus {
    Active,
    Executed,
    Canceled,
}

impl ProposalStatus {
    /// Canceled wins over executed.
    pub const fn from_flags(executed: bool, canceled: bool) -> Self {
        if canceled {
            Self::Canceled
        } else if executed {
            Self::Executed
        } else {
            Self::Active
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Executed => "Executed",
            Self::Canceled => "Canceled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalView {
    pub id: u64,
    pub proposer: String,
    pub start_block: U256,
    pub end_block: U256,
    pub status: ProposalStatus,
    pub for_votes: Reading<Decimal>,
    pub against_votes: Reading<Decimal>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalPage {
    pub page: u64,
    pub total_pages: u64,
    pub total_proposals: u64,
    pub proposals: Vec<Reading<ProposalView>>,
}

/// `0x1234...abcd`
pub fn shorten_address(addr: Address) -> String {
    let full = checksum(addr);
    let head = full.get(..6).unwrap_or_default();
    let tail = full.get(full.len().saturating_sub(4)..).unwrap_or_default();
    format!("{head}...{tail}")
}

async fn descriptions(wallet: &dyn WalletProvider, governor: Address) -> HashMap<U256, String> {
    let filter = Filter::new()
        .address(governor)
        .event_signature(IGovernorBravo::ProposalCreated::SIGNATURE_HASH)
        .from_block(0_u64);
    let logs = match wallet.get_logs(&filter).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "ProposalCreated scan failed; descriptions unavailable");
            return HashMap::new();
        }
    };
    let mut out = HashMap::new();
    for log in logs {
        match IGovernorBravo::ProposalCreated::decode_log_data(&log.inner.data) {
            Ok(ev) => {
                out.insert(ev.id, ev.description);
            }
            Err(e) => tracing::debug!(error = %e, "skipping undecodable ProposalCreated log"),
        }
    }
    out
}

async fn proposal(
    wallet: &dyn WalletProvider,
    governor: Address,
    id: u64,
    descriptions: &HashMap<U256, String>,
) -> eyre::Result<ProposalView> {
    let key = U256::from(id);
    let p = read(wallet, governor, &IGovernorBravo::proposalsCall { proposalId: key }).await?;
    Ok(ProposalView {
        id,
        proposer: shorten_address(p.proposer),
        start_block: p.startBlock,
        end_block: p.endBlock,
        status: ProposalStatus::from_flags(p.executed, p.canceled),
        for_votes: Reading::from_result("for votes", base_to_decimal(p.forVotes, 18)),
        against_votes: Reading::from_result("against votes", base_to_decimal(p.againstVotes, 18)),
        description: descriptions
            .get(&key)
            .cloned()
            .unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
    })
}

pub struct ProposalLister {
    ctx: Ctx,
    page_size: u64,
    cache: Cache<ProposalPage>,
}

impl ProposalLister {
    pub fn new(ctx: Ctx, page_size: u64) -> Self {
        Self {
            ctx,
            page_size,
            cache: Cache::default(),
        }
    }

    /// Load and render one page. `None` opens the last page.
    pub async fn show(&self, page: Option<u64>) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Account) else {
            return FetchOutcome::Skipped;
        };
        let Some(contracts) = contracts_for(&self.ctx, NAME, &scope) else {
            return FetchOutcome::Skipped;
        };
        let w = self.ctx.wallet.as_ref();
        let governor = contracts.governor;

        let total = match read(w, governor, &IGovernorBravo::proposalCountCall {}).await {
            Ok(n) => u64::try_from(n).unwrap_or(u64::MAX),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "proposalCount failed");
                self.ctx
                    .surface
                    .notify(Notice::error("Failed to display proposals."));
                return FetchOutcome::Skipped;
            }
        };
        let pages = Pagination::new(total, self.page_size);
        let current = pages.select(page);
        let described = descriptions(w, governor).await;

        let mut proposals = vec![];
        for id in pages.ids(current) {
            let view = proposal(w, governor, id, &described).await;
            proposals.push(Reading::from_result(&format!("proposal {id}"), view));
        }
        let out = ProposalPage {
            page: current,
            total_pages: pages.page_count(),
            total_proposals: total,
            proposals,
        };
        self.ctx.commit(NAME, &scope, &self.cache, out, render)
    }

    pub fn cached(&self) -> Option<ProposalPage> {
        self.cache.get()
    }
}

fn card(p: &ProposalView) -> String {
    let votes = |r: &Reading<Decimal>| r.display(|v| v.normalize().to_string());
    format!(
        "Proposal #{} by {}\nStart Block: {}\nEnd Block: {}\nStatus: {}\nFor Votes: {}\nAgainst Votes: {}\nDescription: {}",
        p.id,
        p.proposer,
        p.start_block,
        p.end_block,
        p.status.label(),
        votes(&p.for_votes),
        votes(&p.against_votes),
        p.description,
    )
}

fn render(s: &dyn Surface, page: &ProposalPage) {
    let cards: Vec<String> = page
        .proposals
        .iter()
        .map(|r| r.display(card))
        .collect();
    surface::put_text(s, ids::GOVERNANCE_CONTENT, &cards.join("\n\n"));
    surface::put_text(s, ids::CURRENT_PAGE, &page.page.to_string());
    surface::enable(s, ids::PREV_PAGE, page.page < page.total_pages);
    surface::enable(s, ids::NEXT_PAGE, page.page > 1);
}
