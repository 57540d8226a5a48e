//! In-memory engine doubles shared by the integration tests.

#![allow(dead_code)]

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::transaction::Version;
use bitcoin::{Amount, ScriptBuf, Transaction, TxIn, TxOut};
use deskwallet::codec;
use deskwallet::engine::{
    BalanceChanged, Engine, EngineTransaction, PeerManager, PeerManagerParams, TransactionAdded, Wallet,
};
use deskwallet::{EngineError, Key, MasterPubKey, Network, Notification, UiQueue};
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_PHRASE: &str = "test test test test test test test test test test test junk";
pub const ABANDON_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const MAINNET_ADDR: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
pub const SIGNET_ADDR: &str = "tb1q6rz28mcfaxtmd6v789l9rrlrusdprr9pqcpvkl";

pub static TEST_KEY_SEED: Lazy<[u8; 64]> = Lazy::new(|| *Key::from_passphrase(TEST_PHRASE).expect("derive").seed());

pub fn test_key() -> Key {
    Key::from_seed(*TEST_KEY_SEED)
}

pub fn tx_paying(values: &[u64]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn::default()],
        output: values.iter().map(|v| TxOut { value: Amount::from_sat(*v), script_pubkey: ScriptBuf::new() }).collect(),
    }
}

/// Engine calls in the order they happened.
#[derive(Debug, Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| c.as_str() == call).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTx {
    pub bytes: Vec<u8>,
    pub index: i32,
    pub signed: bool,
}

impl MockTx {
    pub fn paying(values: &[u64]) -> Self {
        Self { bytes: encode::serialize(&tx_paying(values)), index: -1, signed: false }
    }
}

impl EngineTransaction for MockTx {
    fn serialize(&self) -> Vec<u8> { self.bytes.clone() }
    fn index(&self) -> i32 { self.index }
}

pub struct MockWallet {
    log: Arc<CallLog>,
    balance: AtomicU64,
    address: Mutex<String>,
    fee_per_kb: AtomicU64,
    fail_build: AtomicBool,
    fail_sign: AtomicBool,
    on_balance: Mutex<Vec<BalanceChanged>>,
    on_tx: Mutex<Vec<TransactionAdded<MockTx>>>,
}

impl MockWallet {
    pub fn set_balance(&self, balance: u64) {
        self.balance.store(balance, Ordering::SeqCst);
    }

    /// Sets the balance and fires the balance callbacks, as an engine sync would.
    pub fn emit_balance(&self, balance: u64) {
        self.set_balance(balance);
        for callback in self.on_balance.lock().unwrap().iter() {
            callback(balance);
        }
    }

    pub fn emit_transaction(&self, tx: &MockTx) {
        for callback in self.on_tx.lock().unwrap().iter() {
            callback(tx);
        }
    }

    pub fn rotate_address(&self, address: &str) {
        *self.address.lock().unwrap() = address.to_string();
    }

    pub fn fee_per_kb(&self) -> u64 { self.fee_per_kb.load(Ordering::SeqCst) }
    pub fn fail_build(&self) { self.fail_build.store(true, Ordering::SeqCst) }
    pub fn fail_sign(&self) { self.fail_sign.store(true, Ordering::SeqCst) }
}

impl Wallet for MockWallet {
    type Transaction = MockTx;

    fn balance(&self) -> u64 {
        self.log.record("balance");
        self.balance.load(Ordering::SeqCst)
    }

    fn receive_address(&self) -> String { self.address.lock().unwrap().clone() }

    fn set_fee_per_kb(&self, fee_per_kb: u64) { self.fee_per_kb.store(fee_per_kb, Ordering::SeqCst) }

    fn create_transaction(&self, amount: u64, _address: &str) -> Result<MockTx, EngineError> {
        self.log.record("build");
        if self.fail_build.load(Ordering::SeqCst) {
            return Err(EngineError::new("no spendable outputs"));
        }
        Ok(MockTx::paying(&[amount]))
    }

    fn sign_transaction(&self, tx: &mut MockTx, _key: &Key) -> Result<(), EngineError> {
        self.log.record("sign");
        if self.fail_sign.load(Ordering::SeqCst) {
            return Err(EngineError::new("key does not own inputs"));
        }
        tx.signed = true;
        Ok(())
    }

    fn on_balance_changed(&self, callback: BalanceChanged) { self.on_balance.lock().unwrap().push(callback) }
    fn on_transaction_added(&self, callback: TransactionAdded<MockTx>) { self.on_tx.lock().unwrap().push(callback) }
}

pub struct MockPeerManager {
    log: Arc<CallLog>,
    readings: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
    fail_connect: bool,
    pub params: PeerManagerParams,
    pub published: Mutex<Vec<MockTx>>,
}

impl PeerManager for MockPeerManager {
    type Transaction = MockTx;

    fn connect(&self) -> Result<(), EngineError> {
        self.log.record("connect");
        if self.fail_connect {
            return Err(EngineError::new("no peers reachable"));
        }
        Ok(())
    }

    /// Next scripted reading; the last one repeats once the script runs out.
    fn progress(&self) -> f64 {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.readings.lock().unwrap().pop_front() {
            *last = next;
        }
        *last
    }

    fn publish_transaction(&self, tx: MockTx) {
        self.log.record("broadcast");
        self.published.lock().unwrap().push(tx);
    }
}

#[derive(Default)]
pub struct MockEngine {
    pub network: Network,
    pub log: Arc<CallLog>,
    pub progress_script: Vec<f64>,
    pub fail_connect: bool,
    pub wallets: Mutex<Vec<Arc<MockWallet>>>,
    pub peer_managers: Mutex<Vec<Arc<MockPeerManager>>>,
}

impl MockEngine {
    pub fn new() -> Self { Self::default() }

    pub fn with_progress(mut self, readings: &[f64]) -> Self {
        self.progress_script = readings.to_vec();
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn last_wallet(&self) -> Arc<MockWallet> {
        self.wallets.lock().unwrap().last().cloned().expect("no wallet created")
    }

    pub fn last_peer_manager(&self) -> Arc<MockPeerManager> {
        self.peer_managers.lock().unwrap().last().cloned().expect("no peer manager created")
    }
}

impl Engine for MockEngine {
    type Wallet = MockWallet;
    type PeerManager = MockPeerManager;

    fn network(&self) -> Network { self.network }

    fn is_valid_address(&self, address: &str) -> bool {
        self.log.record("validate");
        codec::validate(address, self.network)
    }

    /// The receive address is the account xpub, so equal keys give equal addresses.
    fn new_wallet(&self, seed_txs: Vec<MockTx>, mpk: &MasterPubKey) -> Result<Arc<MockWallet>, EngineError> {
        assert!(seed_txs.is_empty());
        let wallet = Arc::new(MockWallet {
            log: self.log.clone(),
            balance: AtomicU64::new(0),
            address: Mutex::new(mpk.xpub.to_string()),
            fee_per_kb: AtomicU64::new(0),
            fail_build: AtomicBool::new(false),
            fail_sign: AtomicBool::new(false),
            on_balance: Mutex::new(Vec::new()),
            on_tx: Mutex::new(Vec::new()),
        });
        self.wallets.lock().unwrap().push(wallet.clone());
        Ok(wallet)
    }

    fn new_peer_manager(&self, _wallet: Arc<MockWallet>, params: PeerManagerParams) -> Result<Arc<MockPeerManager>, EngineError> {
        let pm = Arc::new(MockPeerManager {
            log: self.log.clone(),
            readings: Mutex::new(self.progress_script.iter().copied().collect()),
            last: Mutex::new(0.0),
            fail_connect: self.fail_connect,
            params,
            published: Mutex::new(Vec::new()),
        });
        self.peer_managers.lock().unwrap().push(pm.clone());
        Ok(pm)
    }
}

/// Receives the next notification or panics after `wait`.
pub async fn next_notification(queue: &mut UiQueue, wait: Duration) -> Notification {
    tokio::time::timeout(wait, queue.recv()).await.expect("timed out waiting for notification").expect("queue closed")
}

pub fn progress_values(notifications: &[Notification]) -> Vec<f64> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}
