//! Rendering target for the dashboard.
//!
//! Everything the dashboard shows is addressed by a fixed element id. [`Board`] is the
//! in-memory implementation printed by the CLI as JSON.

use crate::errors::Notice;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

pub const FALLBACK: &str = "--";

pub mod ids {
    pub const CONNECT_WALLET: &str = "connectWallet";
    pub const DISCONNECT_WALLET: &str = "disconnectWallet";
    pub const WALLET_INFO: &str = "walletInfo";
    pub const ACCOUNT_ADDRESS: &str = "accountAddress";
    pub const NETWORK_NAME: &str = "networkName";
    pub const TOTAL_SUPPLY: &str = "totalSupply";
    pub const TOTAL_BORROW: &str = "totalBorrow";
    pub const GAS_PRICE: &str = "gasPrice";
    pub const SUPPLIED: &str = "suppliedBalance";
    pub const BORROWED: &str = "borrowedBalance";
    pub const HEALTH_FACTOR: &str = "healthFactor";
    pub const HEALTH_PROGRESS: &str = "healthProgressBar";
    pub const LIQUIDATION_ALERT: &str = "liquidationAlert";
    pub const GOVERNANCE_SECTION: &str = "governanceSection";
    pub const COMP_BALANCE: &str = "compBalance";
    pub const VOTING_POWER: &str = "votingPower";
    pub const GOVERNANCE_CONTENT: &str = "governanceContent";
    pub const CURRENT_PAGE: &str = "currentPage";
    pub const PREV_PAGE: &str = "prevPage";
    pub const NEXT_PAGE: &str = "nextPage";
    pub const TRANSACTION_HISTORY: &str = "transactionHistory";

    pub const FIXED: &[&str] = &[
        CONNECT_WALLET,
        DISCONNECT_WALLET,
        WALLET_INFO,
        ACCOUNT_ADDRESS,
        NETWORK_NAME,
        TOTAL_SUPPLY,
        TOTAL_BORROW,
        GAS_PRICE,
        SUPPLIED,
        BORROWED,
        HEALTH_FACTOR,
        HEALTH_PROGRESS,
        LIQUIDATION_ALERT,
        GOVERNANCE_SECTION,
        COMP_BALANCE,
        VOTING_POWER,
        GOVERNANCE_CONTENT,
        CURRENT_PAGE,
        PREV_PAGE,
        NEXT_PAGE,
        TRANSACTION_HISTORY,
    ];

    /// Per-item element families.
    pub const PREFIXES: &[&str] = &["market-", "price-", "balance-"];

    pub fn market(checksum: &str) -> String {
        format!("market-{checksum}")
    }

    pub fn price(symbol: &str) -> String {
        format!("price-{symbol}")
    }

    pub fn balance(symbol: &str) -> String {
        format!("balance-{symbol}")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("element not found: {0}")]
    MissingElement(String),
}

pub trait Surface: Send + Sync {
    fn set_text(&self, id: &str, text: &str) -> Result<(), SurfaceError>;
    fn set_visible(&self, id: &str, visible: bool) -> Result<(), SurfaceError>;
    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), SurfaceError>;
    /// Width of a progress bar, `0..=100`.
    fn set_progress(&self, id: &str, percent: u8) -> Result<(), SurfaceError>;
    fn notify(&self, notice: Notice);
}

fn log_missing(r: Result<(), SurfaceError>) {
    if let Err(e) = r {
        tracing::warn!(error = %e, "skipping render");
    }
}

/// Set text, logging (not failing) on a missing element.
pub fn put_text(surface: &dyn Surface, id: &str, text: &str) {
    log_missing(surface.set_text(id, text));
}

pub fn show(surface: &dyn Surface, id: &str, visible: bool) {
    log_missing(surface.set_visible(id, visible));
}

pub fn enable(surface: &dyn Surface, id: &str, enabled: bool) {
    log_missing(surface.set_enabled(id, enabled));
}

pub fn progress(surface: &dyn Surface, id: &str, percent: u8) {
    log_missing(surface.set_progress(id, percent.min(100)));
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

#[derive(Debug, Default, Serialize)]
struct BoardState {
    elements: BTreeMap<String, Element>,
    notices: Vec<Notice>,
}

/// In-memory element board.
///
/// A strict board only accepts ids it was built with (plus per-item prefixes); an open board
/// accepts any id.
#[derive(Debug, Default)]
pub struct Board {
    known: Option<(BTreeSet<String>, Vec<String>)>,
    state: Mutex<BoardState>,
}

impl Board {
    #[cfg(test)]
    pub fn open() -> Self {
        Self::default()
    }

    pub fn strict<'a>(ids: impl IntoIterator<Item = &'a str>, prefixes: &[&str]) -> Self {
        Self {
            known: Some((
                ids.into_iter().map(str::to_owned).collect(),
                prefixes.iter().map(|p| (*p).to_owned()).collect(),
            )),
            state: Mutex::default(),
        }
    }

    /// Strict board with the full dashboard layout.
    pub fn dashboard() -> Self {
        Self::strict(ids::FIXED.iter().copied(), ids::PREFIXES)
    }

    fn accepts(&self, id: &str) -> bool {
        match &self.known {
            None => true,
            Some((fixed, prefixes)) => {
                fixed.contains(id) || prefixes.iter().any(|p| id.starts_with(p.as_str()))
            }
        }
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut Element)) -> Result<(), SurfaceError> {
        if !self.accepts(id) {
            return Err(SurfaceError::MissingElement(id.to_owned()));
        }
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(st.elements.entry(id.to_owned()).or_default());
        Ok(())
    }

    pub fn element(&self, id: &str) -> Option<Element> {
        let st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.elements.get(id).cloned()
    }

    pub fn text(&self, id: &str) -> Option<String> {
        self.element(id).and_then(|e| e.text)
    }

    pub fn notices(&self) -> Vec<Notice> {
        let st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.notices.clone()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::json!({
            "elements": st.elements,
            "notices": st.notices,
        })
    }
}

impl Surface for Board {
    fn set_text(&self, id: &str, text: &str) -> Result<(), SurfaceError> {
        self.update(id, |e| e.text = Some(text.to_owned()))
    }

    fn set_visible(&self, id: &str, visible: bool) -> Result<(), SurfaceError> {
        self.update(id, |e| e.visible = Some(visible))
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), SurfaceError> {
        self.update(id, |e| e.enabled = Some(enabled))
    }

    fn set_progress(&self, id: &str, percent: u8) -> Result<(), SurfaceError> {
        self.update(id, |e| e.progress = Some(percent))
    }

    fn notify(&self, notice: Notice) {
        tracing::info!(level = ?notice.level, message = %notice.message, "notice");
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.notices.push(notice);
    }
}
