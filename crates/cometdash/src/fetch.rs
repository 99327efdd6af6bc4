//! Read-only data fetchers.
//!
//! Every fetcher follows the same shape: check preconditions against a state snapshot, issue
//! its reads, then commit the whole result at once. A commit only happens if the state revision
//! is still the one the fetch started from, so a fetch that raced a wallet event never
//! overwrites fresher data.

pub mod balances;
pub mod gas;
pub mod markets;
pub mod positions;
pub mod prices;
pub mod totals;

use crate::registry::Registry;
use crate::state::ConnectionStore;
use crate::surface::{Surface, FALLBACK};
use crate::wallet::WalletProvider;
use alloy::primitives::Address;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared handles every fetcher and handler is built from.
#[derive(Clone)]
pub struct Ctx {
    pub wallet: Arc<dyn WalletProvider>,
    pub store: Arc<ConnectionStore>,
    pub registry: Arc<Registry>,
    pub surface: Arc<dyn Surface>,
}

/// What a fetch needs from connection state before it may issue any call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    /// Account and chain id.
    Account,
    /// Account, chain id and a resolved proxy address.
    Proxy,
}

/// Connection state captured at the start of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub account: Address,
    pub chain_id: u64,
    pub proxy: Option<Address>,
    pub revision: u64,
}

impl Scope {
    /// The proxy, present whenever the scope was taken with [`Need::Proxy`].
    pub fn comet(&self) -> Address {
        self.proxy.unwrap_or_default()
    }
}

impl Ctx {
    pub fn scope(&self, fetcher: &'static str, need: Need) -> Option<Scope> {
        let st = self.store.snapshot();
        let Some(account) = st.account else {
            tracing::warn!(fetcher, "wallet not connected; skipping");
            return None;
        };
        let Some(chain_id) = st.chain_id else {
            tracing::warn!(fetcher, "network not selected; skipping");
            return None;
        };
        if need == Need::Proxy && st.proxy_address.is_none() {
            tracing::warn!(fetcher, chain_id, "no proxy address for network; skipping");
            return None;
        }
        Some(Scope {
            account,
            chain_id,
            proxy: st.proxy_address,
            revision: st.revision,
        })
    }

    fn still_current(&self, fetcher: &'static str, scope: &Scope) -> bool {
        let now = self.store.revision();
        if now != scope.revision {
            tracing::debug!(fetcher, started = scope.revision, now, "state changed during fetch; discarding");
            return false;
        }
        true
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Commit `value` into `cache` if `scope` is still current, then run `render`.
    pub(crate) fn commit<T: Clone>(
        &self,
        fetcher: &'static str,
        scope: &Scope,
        cache: &Cache<T>,
        value: T,
        render: impl FnOnce(&dyn Surface, &T),
    ) -> FetchOutcome {
        if !self.still_current(fetcher, scope) {
            return FetchOutcome::Superseded;
        }
        render(self.surface(), &value);
        cache.replace(value);
        tracing::debug!(fetcher, revision = scope.revision, "snapshot committed");
        FetchOutcome::Committed
    }
}

/// A fetched value, or the fallback marker when its read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading<T> {
    Value(T),
    Fallback,
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(s),
            Self::Fallback => s.serialize_str(FALLBACK),
        }
    }
}

impl<T> Reading<T> {
    pub fn from_result(what: &str, r: eyre::Result<T>) -> Self {
        match r {
            Ok(v) => Self::Value(v),
            Err(e) => {
                tracing::warn!(item = what, error = %format!("{e:#}"), "read failed; using fallback");
                Self::Fallback
            }
        }
    }

    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Fallback => None,
        }
    }

    pub fn display(&self, f: impl FnOnce(&T) -> String) -> String {
        self.value().map_or_else(|| FALLBACK.to_owned(), f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Preconditions were not met; nothing was read or written.
    Skipped,
    /// State changed while reading; the result was dropped.
    Superseded,
    Committed,
}

/// Last committed snapshot of one fetcher.
#[derive(Debug)]
pub struct Cache<T>(Mutex<Option<T>>);

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self(Mutex::new(None))
    }
}

impl<T: Clone> Cache<T> {
    pub fn get(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, v: T) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(v);
    }
}
