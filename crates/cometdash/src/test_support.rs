//! Scripted in-process wallet for unit tests.

use crate::errors::DashError;
use crate::fetch::Ctx;
use crate::registry::Registry;
use crate::state::ConnectionStore;
use crate::surface::{Board, Surface};
use crate::wallet::{WalletEvent, WalletProvider};
use alloy::{
    primitives::{Address, Bytes, LogData, B256, U256},
    rpc::types::{Filter, Log},
    sol_types::{SolCall, SolValue as _},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

pub const ALICE: &str = "0x1111111111111111111111111111111111111111";
pub const BOB: &str = "0x2222222222222222222222222222222222222222";

pub fn addr(s: &str) -> Address {
    crate::registry::parse_address(s).unwrap_or_default()
}

pub fn word<T>(v: T) -> Vec<u8>
where
    U256: alloy::primitives::ruint::UintTryFrom<T>,
{
    U256::from(v).abi_encode()
}

/// A [`Ctx`] wired to a scripted wallet and an open board.
pub struct Harness {
    pub ctx: Ctx,
    pub wallet: Arc<ScriptedWallet>,
    pub store: Arc<ConnectionStore>,
    pub board: Arc<Board>,
}

impl Harness {
    /// `script` gets the store so call hooks can mutate state mid-fetch.
    pub fn new(registry: Registry, script: impl FnOnce(&Arc<ConnectionStore>) -> ScriptedWallet) -> Self {
        let registry = Arc::new(registry);
        let store = Arc::new(ConnectionStore::new(Arc::clone(&registry)));
        let wallet = Arc::new(script(&store));
        let board = Arc::new(Board::open());
        let surface: Arc<dyn Surface> = Arc::<Board>::clone(&board);
        let provider: Arc<dyn WalletProvider> = Arc::<ScriptedWallet>::clone(&wallet);
        let ctx = Ctx {
            wallet: provider,
            store: Arc::clone(&store),
            registry,
            surface,
        };
        Self {
            ctx,
            wallet,
            store,
            board,
        }
    }

    /// Connect [`ALICE`] on `chain_id`.
    pub fn connected(self, chain_id: u64) -> Self {
        assert!(self.store.set_account(ALICE).is_ok(), "ALICE is a valid account");
        self.store.set_chain_id(chain_id);
        self
    }
}

type Responder = Box<dyn Fn(&[u8]) -> eyre::Result<Vec<u8>> + Send + Sync>;
type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
}

impl SentTx {
    pub fn selector(&self) -> [u8; 4] {
        let mut out = [0_u8; 4];
        for (o, b) in out.iter_mut().zip(self.data.iter()) {
            *o = *b;
        }
        out
    }
}

pub struct ScriptedWallet {
    chain: String,
    accounts: Vec<String>,
    gas_price: Option<u128>,
    responders: HashMap<(Address, [u8; 4]), Responder>,
    failing_sends: HashSet<[u8; 4]>,
    logs: Vec<Log>,
    call_hook: Option<Hook>,
    calls: Mutex<Vec<(Address, Bytes)>>,
    sent: Mutex<Vec<SentTx>>,
    log_queries: Mutex<usize>,
    events: broadcast::Sender<WalletEvent>,
}

impl ScriptedWallet {
    pub fn new(chain_hex: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            chain: chain_hex.to_owned(),
            accounts: vec![],
            gas_price: None,
            responders: HashMap::new(),
            failing_sends: HashSet::new(),
            logs: vec![],
            call_hook: None,
            calls: Mutex::default(),
            sent: Mutex::default(),
            log_queries: Mutex::default(),
            events,
        }
    }

    pub fn with_accounts(mut self, accounts: &[&str]) -> Self {
        self.accounts = accounts.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub const fn with_gas_price(mut self, wei: u128) -> Self {
        self.gas_price = Some(wei);
        self
    }

    /// Answer every `C` call on `to` with the given ABI-encoded bytes.
    pub fn returns<C: SolCall>(mut self, to: Address, encoded: Vec<u8>) -> Self {
        self.responders
            .insert((to, C::SELECTOR), Box::new(move |_| Ok(encoded.clone())));
        self
    }

    /// Answer `C` calls on `to` by inspecting the decoded arguments.
    pub fn responds<C, F>(mut self, to: Address, f: F) -> Self
    where
        C: SolCall,
        F: Fn(C) -> eyre::Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.responders.insert(
            (to, C::SELECTOR),
            Box::new(move |data| f(C::abi_decode(data)?)),
        );
        self
    }

    pub fn fails<C: SolCall>(mut self, to: Address) -> Self {
        self.responders.insert(
            (to, C::SELECTOR),
            Box::new(|_| Err(eyre::eyre!("execution reverted"))),
        );
        self
    }

    /// Make every transaction whose calldata starts with `C`'s selector revert.
    pub fn reverts<C: SolCall>(mut self) -> Self {
        self.failing_sends.insert(C::SELECTOR);
        self
    }

    pub fn with_log(mut self, address: Address, block: u64, data: LogData) -> Self {
        let n = u8::try_from(self.logs.len() % 256).unwrap_or_default();
        self.logs.push(Log {
            inner: alloy::primitives::Log { address, data },
            block_number: Some(block),
            transaction_hash: Some(B256::repeat_byte(n)),
            ..Default::default()
        });
        self
    }

    /// Run `hook` at the start of every `eth_call`.
    pub fn on_call(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.call_hook = Some(Box::new(hook));
        self
    }

    pub fn emit(&self, event: WalletEvent) {
        drop(self.events.send(event));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn calls_with<C: SolCall>(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, d)| d.starts_with(&C::SELECTOR))
            .count()
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn log_queries(&self) -> usize {
        *self.log_queries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    async fn request_accounts(&self) -> eyre::Result<Vec<String>> {
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> eyre::Result<String> {
        Ok(self.chain.clone())
    }

    async fn call(&self, to: Address, data: Bytes) -> eyre::Result<Bytes> {
        if let Some(hook) = &self.call_hook {
            hook();
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((to, data.clone()));
        let sel = SentTx {
            from: Address::ZERO,
            to,
            data: data.clone(),
        }
        .selector();
        let responder = self
            .responders
            .get(&(to, sel))
            .ok_or_else(|| eyre::eyre!("unscripted call 0x{} on {to}", hex::encode(sel)))?;
        Ok(Bytes::from(responder(&data)?))
    }

    async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> eyre::Result<B256> {
        let tx = SentTx { from, to, data };
        let reverted = self.failing_sends.contains(&tx.selector());
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.push(tx);
        let hash = B256::from(U256::from(sent.len()));
        if reverted {
            return Err(DashError::Reverted(hash.to_string()).into());
        }
        Ok(hash)
    }

    async fn gas_price(&self) -> eyre::Result<u128> {
        self.gas_price
            .ok_or_else(|| eyre::eyre!("gas price unavailable"))
    }

    async fn get_logs(&self, filter: &Filter) -> eyre::Result<Vec<Log>> {
        *self.log_queries.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(self
            .logs
            .iter()
            .filter(|l| filter.address.matches(&l.inner.address))
            .filter(|l| {
                filter.topics.iter().enumerate().all(|(i, want)| {
                    want.is_empty() || l.inner.data.topics().get(i).is_some_and(|t| want.matches(t))
                })
            })
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block: u64) -> eyre::Result<Option<u64>> {
        Ok(Some(1_700_000_000_u64.saturating_add(block.saturating_mul(12))))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
