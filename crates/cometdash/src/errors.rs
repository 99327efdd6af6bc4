use serde::Serialize;
use thiserror::Error;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A message surfaced to the user (the toast/alert of the dashboard).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Report a failed operation. Unmet preconditions stay warnings.
    pub fn failed(action: &str, e: &eyre::Report) -> Self {
        match e.downcast_ref::<DashError>() {
            Some(d) if d.is_precondition() => Self::warning(format!("{action} skipped: {d}")),
            Some(d) => Self::error(format!("{action} failed: {d}")),
            None => Self::error(format!("{action} failed: {e:#}")),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DashError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("wallet not connected")]
    NotConnected,

    #[error("network not selected")]
    NoNetwork,

    #[error("market {symbol} not found on chain {chain_id}")]
    UnknownMarket { symbol: String, chain_id: u64 },

    #[error("token information not found for base token {0}")]
    UnknownBaseToken(String),

    #[error("governance contracts not configured for chain {0}")]
    NoGovernance(u64),

    #[error("invalid form: {0}")]
    InvalidForm(String),

    #[error("no signing key available for {0}")]
    NoSigner(String),

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("You have no voting power. Please delegate your COMP tokens first.")]
    NoVotingPower,
}

impl DashError {
    /// Precondition failures are warnings; everything else is a hard failure for the user.
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::NoNetwork | Self::NoGovernance(_)
        )
    }
}

impl From<DashError> for Notice {
    fn from(e: DashError) -> Self {
        if e.is_precondition() {
            Self::warning(e.to_string())
        } else {
            Self::error(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_become_warnings() {
        let n: Notice = DashError::NotConnected.into();
        assert_eq!(n.level, NoticeLevel::Warning);
        let n: Notice = DashError::Reverted("0xabc".into()).into();
        assert_eq!(n.level, NoticeLevel::Error);
        assert!(n.message.contains("0xabc"), "message: {}", n.message);
    }

    #[test]
    fn failed_reports_keep_precondition_level() {
        let e = eyre::Report::new(DashError::NotConnected).wrap_err("supply");
        assert_eq!(Notice::failed("Supply", &e).level, NoticeLevel::Warning);
        let e = eyre::eyre!("execution reverted");
        let n = Notice::failed("Borrow", &e);
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.message, "Borrow failed: execution reverted");
    }
}
