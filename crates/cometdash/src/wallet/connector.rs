use super::{WalletEvent, WalletProvider};
use crate::errors::Notice;
use crate::registry::{checksum, networks};
use crate::state::ConnectionStore;
use crate::surface::{self, ids, Surface, FALLBACK};
use std::sync::Arc;

/// Binds a wallet to the state holder and the identity part of the surface.
pub struct Connector {
    wallet: Option<Arc<dyn WalletProvider>>,
    store: Arc<ConnectionStore>,
    surface: Arc<dyn Surface>,
}

impl Connector {
    pub fn new(
        wallet: Option<Arc<dyn WalletProvider>>,
        store: Arc<ConnectionStore>,
        surface: Arc<dyn Surface>,
    ) -> Self {
        Self {
            wallet,
            store,
            surface,
        }
    }

    /// Request accounts and chain id, then publish them.
    ///
    /// Returns whether a connection was established. Failures are reported to the user as a
    /// notice rather than to the caller.
    pub async fn connect(&self) -> bool {
        let Some(wallet) = self.wallet.as_deref() else {
            tracing::error!("no wallet provider available");
            self.surface.notify(Notice::error(
                "No wallet provider found. Configure an RPC endpoint and try again.",
            ));
            return false;
        };

        let accounts = match wallet.request_accounts().await {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(error = %e, "account request failed");
                self.surface.notify(Notice::error("Failed to connect to wallet."));
                return false;
            }
        };
        let Some(first) = accounts.first() else {
            tracing::warn!("wallet returned no accounts");
            self.surface.notify(Notice::warning(
                "No accounts found. Provide a signing key or a watch address.",
            ));
            return false;
        };

        let chain_hex = match wallet.chain_id().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "chain id request failed");
                self.surface.notify(Notice::error("Failed to connect to wallet."));
                return false;
            }
        };

        if self.store.set_account(first).is_err() {
            self.surface
                .notify(Notice::error(format!("Wallet returned an invalid account: {first}")));
            return false;
        }
        match networks::parse_chain_id(&chain_hex) {
            Some(id) => self.store.set_chain_id(id),
            None => tracing::warn!(chain = %chain_hex, "unparseable chain id"),
        }

        let account = self.store.account().map_or_else(|| first.clone(), checksum);
        let name = networks::network_name(&chain_hex);
        let s = self.surface.as_ref();
        surface::put_text(s, ids::ACCOUNT_ADDRESS, &account);
        surface::put_text(s, ids::NETWORK_NAME, name);
        surface::show(s, ids::WALLET_INFO, true);
        surface::show(s, ids::CONNECT_WALLET, false);
        surface::show(s, ids::DISCONNECT_WALLET, true);
        tracing::info!(%account, network = name, "wallet connected");
        true
    }

    /// Reset the identity display. State and the wallet's own permissions are left alone.
    pub fn disconnect(&self) {
        let s = self.surface.as_ref();
        surface::put_text(s, ids::ACCOUNT_ADDRESS, FALLBACK);
        surface::put_text(s, ids::NETWORK_NAME, FALLBACK);
        surface::show(s, ids::WALLET_INFO, false);
        surface::show(s, ids::CONNECT_WALLET, true);
        surface::show(s, ids::DISCONNECT_WALLET, false);
        tracing::info!("wallet disconnected");
    }

    /// Apply a pushed wallet event to state and the identity display.
    pub fn handle_event(&self, event: &WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(a) => {
                    if self.store.set_account(a).is_ok() {
                        let shown = self.store.account().map_or_else(|| a.clone(), checksum);
                        surface::put_text(self.surface.as_ref(), ids::ACCOUNT_ADDRESS, &shown);
                    }
                }
                None => {
                    if self.store.account().is_some() {
                        self.store.clear_account();
                    }
                    self.disconnect();
                }
            },
            WalletEvent::ChainChanged(hex) => match networks::parse_chain_id(hex) {
                Some(id) => {
                    self.store.set_chain_id(id);
                    surface::put_text(
                        self.surface.as_ref(),
                        ids::NETWORK_NAME,
                        networks::network_name(hex),
                    );
                }
                None => tracing::warn!(chain = %hex, "ignoring unparseable chain id"),
            },
        }
    }
}
