//! Connection state holder.
//!
//! One [`ConnectionStore`] is created per process and shared behind an `Arc`. Mutations go
//! through validated setters; each successful one bumps the revision and synchronously runs
//! every listener, in subscription order, with the new snapshot.

use crate::errors::DashError;
use crate::registry::{self, Registry};
use alloy::primitives::Address;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub proxy_address: Option<Address>,
    /// Number of successful mutations so far.
    pub revision: u64,
}

pub type Listener = Arc<dyn Fn(&ConnectionState) -> eyre::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

pub struct ConnectionStore {
    registry: Arc<Registry>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ConnectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStore")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl ConnectionStore {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            inner: Mutex::default(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.lock().state.clone()
    }

    pub fn account(&self) -> Option<Address> {
        self.lock().state.account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.lock().state.chain_id
    }

    pub fn proxy_address(&self) -> Option<Address> {
        self.lock().state.proxy_address
    }

    pub fn revision(&self) -> u64 {
        self.lock().state.revision
    }

    pub fn set_account(&self, raw: &str) -> Result<(), DashError> {
        let Some(addr) = registry::parse_address(raw) else {
            tracing::warn!(input = raw, "rejecting malformed account address");
            return Err(DashError::InvalidAddress(raw.to_owned()));
        };
        self.mutate(|s| s.account = Some(addr));
        Ok(())
    }

    pub fn clear_account(&self) {
        self.mutate(|s| s.account = None);
    }

    pub fn set_proxy_address(&self, raw: &str) -> Result<(), DashError> {
        let Some(addr) = registry::parse_address(raw) else {
            tracing::warn!(input = raw, "rejecting malformed proxy address");
            return Err(DashError::InvalidAddress(raw.to_owned()));
        };
        self.mutate(|s| s.proxy_address = Some(addr));
        Ok(())
    }

    /// Set the active chain and re-resolve the proxy from the static table.
    pub fn set_chain_id(&self, chain_id: u64) {
        let proxy = self.registry.proxy_address(chain_id);
        if proxy.is_none() {
            tracing::warn!(chain_id, "no proxy address configured for network");
        }
        self.mutate(|s| {
            s.chain_id = Some(chain_id);
            s.proxy_address = proxy;
        });
    }

    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener = inner.next_listener.saturating_add(1);
        inner.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(l, _)| *l != id);
        inner.listeners.len() != before
    }

    fn mutate(&self, f: impl FnOnce(&mut ConnectionState)) {
        let (snapshot, listeners) = {
            let mut inner = self.lock();
            f(&mut inner.state);
            inner.state.revision = inner.state.revision.saturating_add(1);
            let listeners: Vec<Listener> =
                inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (inner.state.clone(), listeners)
        };
        // Lock is released so listeners may read or mutate the store.
        for listener in listeners {
            if let Err(e) = listener(&snapshot) {
                tracing::error!(error = %e, revision = snapshot.revision, "state listener failed");
            }
        }
    }
}
