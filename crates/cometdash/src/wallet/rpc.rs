use super::{WalletEvent, WalletProvider};
use crate::errors::DashError;
use crate::registry::networks;
use alloy::{
    consensus::{SignableTransaction as _, TxEip1559, TxEnvelope, TxLegacy},
    network::TransactionBuilder as _,
    primitives::{Address, Bytes, TxKind, B256, U256},
    providers::{Provider as _, RootProvider},
    rpc::types::{BlockNumberOrTag, Filter, Log, TransactionReceipt, TransactionRequest},
    signers::{local::PrivateKeySigner, SignerSync as _},
};
use async_trait::async_trait;
use eyre::Context as _;
use reqwest::Client;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use zeroize::Zeroizing;

const DEFAULT_RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct RpcWalletOpts {
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    pub receipt_timeout: Duration,
    /// Name of the environment variable holding a hex private key.
    pub private_key_env: Option<String>,
    /// Read-only account used when no key is available.
    pub watch_address: Option<Address>,
}

/// Wallet backed by a JSON-RPC node and an optional local signing key.
pub struct RpcWallet {
    provider: RootProvider,
    signer: Option<PrivateKeySigner>,
    watch_address: Option<Address>,
    receipt_timeout: Duration,
    last_chain: Mutex<Option<u64>>,
    events: broadcast::Sender<WalletEvent>,
}

impl std::fmt::Debug for RpcWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcWallet")
            .field("signer", &self.signer.as_ref().map(PrivateKeySigner::address))
            .field("watch_address", &self.watch_address)
            .finish_non_exhaustive()
    }
}

fn provider_for_url(url: &str, timeout: Duration) -> eyre::Result<RootProvider> {
    let u: reqwest::Url = url
        .parse()
        .with_context(|| format!("invalid rpc url: {url}"))?;
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(DEFAULT_RPC_CONNECT_TIMEOUT)
        .build()
        .context("build rpc http client")?;
    let http = alloy::transports::http::Http::with_client(client, u);
    let rpc_client = alloy::rpc::client::RpcClient::new(http, false);
    Ok(RootProvider::new(rpc_client))
}

/// Read a hex private key from `var`. The raw bytes never outlive this call.
fn signer_from_env(var: &str) -> eyre::Result<Option<PrivateKeySigner>> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    let raw = Zeroizing::new(raw);
    let hex_str = raw.trim();
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = Zeroizing::new(hex::decode(hex_str).with_context(|| format!("{var} is not hex"))?);
    let signer = PrivateKeySigner::from_slice(&bytes).context("parse evm private key")?;
    Ok(Some(signer))
}

pub fn compute_eip1559_fees(base_fee: u128, gas_price: u128) -> (u128, u128) {
    // priority: max(1.5 gwei, gas_price / 10); max_fee: base_fee * 2 + priority
    let min_priority: u128 = 1_500_000_000;
    let priority = std::cmp::max(min_priority, gas_price / 10);

    let mut max_fee = base_fee.saturating_mul(2).saturating_add(priority);
    let min_fee = base_fee.saturating_add(priority);
    if max_fee < min_fee {
        max_fee = min_fee;
    }
    (max_fee, priority)
}

/// Prefer EIP-1559 fees when the chain reports a base fee; otherwise use a legacy gas price.
pub fn apply_fee_policy(
    mut tx: TransactionRequest,
    base_fee: Option<u128>,
    gas_price: u128,
    from: Address,
    chain_id: u64,
) -> TransactionRequest {
    if tx.max_fee_per_gas.is_some()
        || tx.max_priority_fee_per_gas.is_some()
        || tx.gas_price.is_some()
    {
        return tx;
    }

    if tx.chain_id.is_none() {
        tx.chain_id = Some(chain_id);
    }
    if tx.from.is_none() {
        tx.from = Some(from);
    }

    if let Some(base_fee) = base_fee {
        let (max_fee, priority) = compute_eip1559_fees(base_fee, gas_price);
        tx.max_fee_per_gas = Some(max_fee);
        tx.max_priority_fee_per_gas = Some(priority);
    } else {
        tx.gas_price = Some(gas_price);
    }
    tx
}

fn build_and_sign_tx(
    signer: &PrivateKeySigner,
    tx: &TransactionRequest,
) -> eyre::Result<(TxEnvelope, B256)> {
    let to = tx.to.unwrap_or(TxKind::Create);
    let value = tx.value.unwrap_or(U256::ZERO);
    let input = tx.input.clone().into_input().unwrap_or_default();
    let nonce = tx.nonce.unwrap_or(0);
    let gas_limit = tx.gas.unwrap_or(21_000);

    if tx.max_fee_per_gas.is_some() {
        let consensus_tx = TxEip1559 {
            chain_id: tx.chain_id.unwrap_or(networks::ETHEREUM_MAINNET),
            nonce,
            gas_limit,
            max_fee_per_gas: tx.max_fee_per_gas.unwrap_or(0),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or(0),
            to,
            value,
            input,
            access_list: tx.access_list.clone().unwrap_or_default(),
        };
        let hash = consensus_tx.signature_hash();
        let sig = signer.sign_hash_sync(&hash).context("sign eip1559")?;
        let signed_tx = consensus_tx.into_signed(sig);
        let tx_hash = *signed_tx.hash();
        Ok((TxEnvelope::Eip1559(signed_tx), tx_hash))
    } else {
        let consensus_tx = TxLegacy {
            chain_id: tx.chain_id,
            nonce,
            gas_price: tx.gas_price.unwrap_or(0),
            gas_limit,
            to,
            value,
            input,
        };
        let hash = consensus_tx.signature_hash();
        let sig = signer.sign_hash_sync(&hash).context("sign legacy")?;
        let signed_tx = consensus_tx.into_signed(sig);
        let tx_hash = *signed_tx.hash();
        Ok((TxEnvelope::Legacy(signed_tx), tx_hash))
    }
}

fn broadcast_err_is_ok(err: &eyre::Report) -> bool {
    let s = format!("{err:#}").to_lowercase();
    s.contains("already known") || s.contains("known transaction")
}

impl RpcWallet {
    pub fn new(opts: &RpcWalletOpts) -> eyre::Result<Self> {
        let provider = provider_for_url(&opts.rpc_url, opts.rpc_timeout)?;
        let signer = match opts.private_key_env.as_deref() {
            Some(var) => signer_from_env(var)?,
            None => None,
        };
        if let (Some(s), Some(w)) = (&signer, opts.watch_address) {
            if s.address() != w {
                tracing::warn!(signer = %s.address(), watch = %w, "watch address ignored; signing key takes precedence");
            }
        }
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            provider,
            signer,
            watch_address: opts.watch_address,
            receipt_timeout: opts.receipt_timeout,
            last_chain: Mutex::new(None),
            events,
        })
    }

    fn account(&self) -> Option<Address> {
        self.signer
            .as_ref()
            .map(PrivateKeySigner::address)
            .or(self.watch_address)
    }

    fn observe_chain(&self, chain_id: u64) {
        let prev = {
            let mut last = self.last_chain.lock().unwrap_or_else(PoisonError::into_inner);
            last.replace(chain_id)
        };
        if prev.is_some_and(|p| p != chain_id) {
            tracing::info!(from = ?prev, to = chain_id, "node chain changed");
            // No subscribers is fine.
            drop(
                self.events
                    .send(WalletEvent::ChainChanged(networks::chain_id_hex(chain_id))),
            );
        }
    }

    async fn wait_for_receipt(&self, tx: B256) -> eyre::Result<TransactionReceipt> {
        let start = std::time::Instant::now();
        loop {
            if start.elapsed() > self.receipt_timeout {
                eyre::bail!("timed out waiting for tx receipt {tx}");
            }
            if let Some(r) = self
                .provider
                .get_transaction_receipt(tx)
                .await
                .context("get transaction receipt")?
            {
                return Ok(r);
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> eyre::Result<Vec<String>> {
        Ok(self
            .account()
            .map(|a| a.to_checksum(None))
            .into_iter()
            .collect())
    }

    async fn chain_id(&self) -> eyre::Result<String> {
        let id = self.provider.get_chain_id().await.context("get chain id")?;
        self.observe_chain(id);
        Ok(networks::chain_id_hex(id))
    }

    async fn call(&self, to: Address, data: Bytes) -> eyre::Result<Bytes> {
        let mut tx = TransactionRequest::default().with_to(to).with_input(data);
        if let Some(from) = self.account() {
            tx = tx.with_from(from);
        }
        let out = self.provider.call(tx).await.context("eth_call")?;
        Ok(out)
    }

    async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> eyre::Result<B256> {
        let signer = self
            .signer
            .as_ref()
            .filter(|s| s.address() == from)
            .ok_or_else(|| DashError::NoSigner(from.to_checksum(None)))?;

        let chain_id = self.provider.get_chain_id().await.context("get chain id")?;
        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(data);
        tx.chain_id = Some(chain_id);

        let base_fee = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Pending)
            .await
            .ok()
            .flatten()
            .and_then(|b| b.header.base_fee_per_gas.map(u128::from));
        let gp = self.provider.get_gas_price().await.context("get gas price")?;
        tx = apply_fee_policy(tx, base_fee, gp, from, chain_id);

        let nonce = self
            .provider
            .get_transaction_count(from)
            .pending()
            .await
            .context("get nonce")?;
        tx.nonce = Some(nonce);

        let gas = self
            .provider
            .estimate_gas(tx.clone())
            .await
            .context("estimate gas")?;
        tx.gas = Some(gas.saturating_mul(120) / 100);

        let (envelope, tx_hash) = build_and_sign_tx(signer, &tx).context("sign tx")?;
        let raw_bytes = alloy::eips::eip2718::Encodable2718::encoded_2718(&envelope);
        if let Err(e) = self.provider.send_raw_transaction(&raw_bytes).await {
            let ae: eyre::Report = e.into();
            if !broadcast_err_is_ok(&ae) {
                return Err(ae).context("broadcast raw tx");
            }
        }
        tracing::debug!(tx = %tx_hash, "broadcast; waiting for receipt");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.status() {
            return Err(DashError::Reverted(tx_hash.to_string()).into());
        }
        Ok(tx_hash)
    }

    async fn gas_price(&self) -> eyre::Result<u128> {
        self.provider.get_gas_price().await.context("get gas price")
    }

    async fn get_logs(&self, filter: &Filter) -> eyre::Result<Vec<Log>> {
        self.provider.get_logs(filter).await.context("get logs")
    }

    async fn block_timestamp(&self, block: u64) -> eyre::Result<Option<u64>> {
        let b = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .with_context(|| format!("get block {block}"))?;
        Ok(b.map(|b| b.header.timestamp))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
