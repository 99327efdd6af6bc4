//! Wallet provider capability.
//!
//! The dashboard never talks to a node directly: every read, write, log scan and event goes
//! through a [`WalletProvider`]. [`rpc::RpcWallet`] is the JSON-RPC implementation; tests use a
//! scripted double.

pub mod connector;
pub mod rpc;

use alloy::{
    primitives::{Address, Bytes, B256},
    rpc::types::{Filter, Log},
    sol_types::SolCall,
};
use async_trait::async_trait;
use eyre::Context as _;
use tokio::sync::broadcast;

/// Notifications a wallet pushes without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// New account list; empty means the user locked or disconnected the wallet.
    AccountsChanged(Vec<String>),
    /// New chain id in hex (`"0x89"`).
    ChainChanged(String),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for its accounts. Entries are unvalidated strings.
    async fn request_accounts(&self) -> eyre::Result<Vec<String>>;

    /// Current chain id as a hex string.
    async fn chain_id(&self) -> eyre::Result<String>;

    async fn call(&self, to: Address, data: Bytes) -> eyre::Result<Bytes>;

    /// Submit a transaction from `from` and wait until it is included. A reverted receipt is an
    /// error.
    async fn send_transaction(&self, from: Address, to: Address, data: Bytes)
        -> eyre::Result<B256>;

    /// Gas price in wei.
    async fn gas_price(&self) -> eyre::Result<u128>;

    async fn get_logs(&self, filter: &Filter) -> eyre::Result<Vec<Log>>;

    async fn block_timestamp(&self, block: u64) -> eyre::Result<Option<u64>>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Run a read-only contract call and decode its return value.
pub async fn read<C>(wallet: &dyn WalletProvider, to: Address, call: &C) -> eyre::Result<C::Return>
where
    C: SolCall + Sync,
{
    let out = wallet
        .call(to, Bytes::from(call.abi_encode()))
        .await
        .with_context(|| format!("eth_call {} on {to}", C::SIGNATURE))?;
    C::abi_decode_returns(&out).with_context(|| format!("decode {} result", C::SIGNATURE))
}

/// Encode and submit a state-changing call.
pub async fn send<C>(
    wallet: &dyn WalletProvider,
    from: Address,
    to: Address,
    call: &C,
) -> eyre::Result<B256>
where
    C: SolCall + Sync,
{
    tracing::info!(method = C::SIGNATURE, %from, %to, "sending transaction");
    let hash = wallet
        .send_transaction(from, to, Bytes::from(call.abi_encode()))
        .await
        .with_context(|| format!("send {}", C::SIGNATURE))?;
    tracing::info!(method = C::SIGNATURE, tx = %hash, "transaction confirmed");
    Ok(hash)
}
