//! BDK engine - watch-only bdk_wallet 2.x wallet plus an Electrum peer manager.
//!
//! The wallet is built from the account xpub alone. Signing derives input keys
//! from the session [`Key`] on demand, so no private material lives in the
//! engine. Nothing is persisted: every session starts from a full scan.

use bdk_electrum::electrum_client::{Client, ElectrumApi};
use bdk_electrum::BdkElectrumClient;
use bdk_wallet::bitcoin::{consensus::encode, Amount, FeeRate, Psbt, Transaction, Txid};
use bdk_wallet::template::Bip84Public;
use bdk_wallet::{KeychainKind, SignOptions};
use bitcoin::secp256k1::Secp256k1;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::{BalanceChanged, Engine, EngineTransaction, PeerManager, PeerManagerParams, TransactionAdded, Wallet, UNKNOWN_INDEX};
use crate::codec;
use crate::config::{Network, MIN_FEE};
use crate::error::EngineError;
use crate::key::{Key, MasterPubKey};

const STOP_GAP: usize = 10;
const BATCH_SIZE: usize = 10;

pub fn default_electrum_url(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "ssl://electrum.blockstream.info:50002",
        Network::Testnet => "ssl://electrum.blockstream.info:60002",
        Network::Signet => "ssl://mempool.space:60602",
        Network::Regtest => "tcp://127.0.0.1:50001",
    }
}

/// A wallet transaction. Built transactions carry their PSBT until signed.
#[derive(Debug, Clone)]
pub struct BdkTransaction {
    tx: Transaction,
    psbt: Option<Psbt>,
}

impl BdkTransaction {
    pub fn new(tx: Transaction) -> Self { Self { tx, psbt: None } }
    pub fn txid(&self) -> Txid { self.tx.compute_txid() }
    pub fn transaction(&self) -> &Transaction { &self.tx }
    pub fn is_signed(&self) -> bool { self.psbt.is_none() }
}

impl EngineTransaction for BdkTransaction {
    fn serialize(&self) -> Vec<u8> { encode::serialize(&self.tx) }
    fn index(&self) -> i32 { UNKNOWN_INDEX }
}

struct WalletState {
    wallet: bdk_wallet::Wallet,
    balance: u64,
    seen: HashSet<Txid>,
}

/// Changes since the last notification, fired after the wallet lock is released.
struct Changes {
    balance: Option<u64>,
    added: Vec<BdkTransaction>,
}

pub struct BdkWallet {
    network: Network,
    state: Mutex<WalletState>,
    fee_per_kb: AtomicU64,
    on_balance: Mutex<Vec<BalanceChanged>>,
    on_tx: Mutex<Vec<TransactionAdded<BdkTransaction>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BdkWallet {
    pub fn watch_only(mpk: &MasterPubKey, network: Network) -> Result<Self, EngineError> {
        let external = Bip84Public(mpk.xpub, mpk.fingerprint, KeychainKind::External);
        let internal = Bip84Public(mpk.xpub, mpk.fingerprint, KeychainKind::Internal);
        let wallet = bdk_wallet::Wallet::create(external, internal)
            .network(network.to_bitcoin())
            .create_wallet_no_persist()
            .map_err(|e| EngineError::new(format!("create wallet: {}", e)))?;

        Ok(Self {
            network,
            state: Mutex::new(WalletState { wallet, balance: 0, seen: HashSet::new() }),
            fee_per_kb: AtomicU64::new(MIN_FEE),
            on_balance: Mutex::new(Vec::new()),
            on_tx: Mutex::new(Vec::new()),
        })
    }

    /// Runs `f` against the wallet, then notifies for anything it changed.
    fn update<T>(&self, f: impl FnOnce(&mut bdk_wallet::Wallet) -> Result<T, EngineError>) -> Result<T, EngineError> {
        let (out, changes) = {
            let mut state = lock(&self.state);
            let out = f(&mut state.wallet)?;
            (out, Self::diff(&mut state))
        };
        self.fire(changes);
        Ok(out)
    }

    fn diff(state: &mut WalletState) -> Changes {
        let balance = state.wallet.balance().total().to_sat();
        let balance = (balance != state.balance).then(|| {
            state.balance = balance;
            balance
        });

        let mut added = Vec::new();
        for wtx in state.wallet.transactions() {
            let txid = wtx.tx_node.txid;
            if state.seen.insert(txid) {
                added.push(BdkTransaction::new((*wtx.tx_node.tx).clone()));
            }
        }
        Changes { balance, added }
    }

    fn fire(&self, changes: Changes) {
        for tx in &changes.added {
            debug!(txid = %tx.txid(), "wallet transaction added");
            for callback in lock(&self.on_tx).iter() {
                callback(tx);
            }
        }
        if let Some(balance) = changes.balance {
            for callback in lock(&self.on_balance).iter() {
                callback(balance);
            }
        }
    }

    fn fee_rate(&self) -> FeeRate {
        // sat per 1000 vbytes → sat per 1000 weight units
        FeeRate::from_sat_per_kwu(self.fee_per_kb.load(Ordering::Relaxed) / 4)
    }

    fn apply_unconfirmed(&self, txs: Vec<Transaction>) -> Result<(), EngineError> {
        let seen_at = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        self.update(|wallet| {
            wallet.apply_unconfirmed_txs(txs.into_iter().map(|tx| (tx, seen_at)));
            Ok(())
        })
    }
}

impl Wallet for BdkWallet {
    type Transaction = BdkTransaction;

    fn balance(&self) -> u64 {
        lock(&self.state).wallet.balance().total().to_sat()
    }

    fn receive_address(&self) -> String {
        lock(&self.state).wallet.next_unused_address(KeychainKind::External).address.to_string()
    }

    fn set_fee_per_kb(&self, fee_per_kb: u64) {
        self.fee_per_kb.store(fee_per_kb, Ordering::Relaxed);
    }

    fn create_transaction(&self, amount: u64, address: &str) -> Result<BdkTransaction, EngineError> {
        let address = codec::decode_for_network(address, self.network).map_err(|e| EngineError::new(e.to_string()))?;

        let mut state = lock(&self.state);
        let mut builder = state.wallet.build_tx();
        builder.add_recipient(address.script_pubkey(), Amount::from_sat(amount));
        builder.fee_rate(self.fee_rate());
        let psbt = builder.finish().map_err(|e| EngineError::new(format!("build: {}", e)))?;

        Ok(BdkTransaction { tx: psbt.unsigned_tx.clone(), psbt: Some(psbt) })
    }

    fn sign_transaction(&self, tx: &mut BdkTransaction, key: &Key) -> Result<(), EngineError> {
        let xpriv = key.master_xpriv(self.network).map_err(|e| EngineError::new(e.to_string()))?;
        let mut psbt = tx.psbt.take().ok_or_else(|| EngineError::new("transaction is already signed"))?;

        let restore = |tx: &mut BdkTransaction, psbt: Psbt, message: String| {
            tx.psbt = Some(psbt);
            Err(EngineError::new(message))
        };

        if let Err((_, errors)) = psbt.sign(&xpriv, &Secp256k1::new()) {
            return restore(tx, psbt, format!("sign: {:?}", errors));
        }
        match lock(&self.state).wallet.finalize_psbt(&mut psbt, SignOptions::default()) {
            Ok(true) => {}
            Ok(false) => return restore(tx, psbt, "key does not own every input".into()),
            Err(e) => return restore(tx, psbt, format!("finalize: {}", e)),
        }

        tx.tx = psbt.extract_tx().map_err(|e| EngineError::new(format!("extract: {}", e)))?;
        Ok(())
    }

    fn on_balance_changed(&self, callback: BalanceChanged) {
        lock(&self.on_balance).push(callback);
    }

    fn on_transaction_added(&self, callback: TransactionAdded<BdkTransaction>) {
        lock(&self.on_tx).push(callback);
    }
}

/// Syncs a [`BdkWallet`] over Electrum. Progress moves in coarse steps:
/// connected, scanned, applied.
pub struct ElectrumPeerManager {
    wallet: Arc<BdkWallet>,
    url: String,
    client: Mutex<Option<Arc<BdkElectrumClient<Client>>>>,
    progress: AtomicU64,
}

impl ElectrumPeerManager {
    pub fn new(wallet: Arc<BdkWallet>, url: impl Into<String>) -> Self {
        Self { wallet, url: url.into(), client: Mutex::new(None), progress: AtomicU64::new(0f64.to_bits()) }
    }

    pub fn url(&self) -> &str { &self.url }

    fn set_progress(&self, progress: f64) {
        self.progress.store(progress.to_bits(), Ordering::Relaxed);
    }
}

impl PeerManager for ElectrumPeerManager {
    type Transaction = BdkTransaction;

    fn connect(&self) -> Result<(), EngineError> {
        self.set_progress(0.0);
        info!(url = %self.url, "connecting to electrum");
        let inner = Client::new(&self.url).map_err(|e| EngineError::new(format!("electrum: {}", e)))?;
        let client = Arc::new(BdkElectrumClient::new(inner));
        *lock(&self.client) = Some(client.clone());
        self.set_progress(0.1);

        let request = lock(&self.wallet.state).wallet.start_full_scan().build();
        let update = client
            .full_scan(request, STOP_GAP, BATCH_SIZE, false)
            .map_err(|e| EngineError::new(format!("sync: {}", e)))?;
        self.set_progress(0.9);

        self.wallet.update(|wallet| wallet.apply_update(update).map_err(|e| EngineError::new(format!("apply: {}", e))))?;
        self.set_progress(1.0);
        info!(balance = self.wallet.balance(), "electrum sync complete");
        Ok(())
    }

    fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    fn publish_transaction(&self, tx: BdkTransaction) {
        if !tx.is_signed() {
            warn!(txid = %tx.txid(), "refusing to publish unsigned transaction");
            return;
        }
        let Some(client) = lock(&self.client).clone() else {
            warn!(txid = %tx.txid(), "not connected, transaction dropped");
            return;
        };
        match client.inner.transaction_broadcast(&tx.tx) {
            Ok(txid) => {
                info!(%txid, "transaction broadcast");
                if let Err(e) = self.wallet.apply_unconfirmed(vec![tx.tx]) {
                    warn!(error = %e, "cannot track broadcast transaction");
                }
            }
            Err(e) => warn!(txid = %tx.txid(), error = %e, "broadcast failed"),
        }
    }
}

/// Engine over bdk_wallet + Electrum for one network.
#[derive(Debug, Clone)]
pub struct BdkEngine {
    network: Network,
    electrum_url: Option<String>,
}

impl BdkEngine {
    pub fn new(network: Network, electrum_url: Option<String>) -> Self { Self { network, electrum_url } }
}

impl Engine for BdkEngine {
    type Wallet = BdkWallet;
    type PeerManager = ElectrumPeerManager;

    fn network(&self) -> Network { self.network }

    fn is_valid_address(&self, address: &str) -> bool {
        codec::validate(address, self.network)
    }

    fn new_wallet(&self, seed_txs: Vec<BdkTransaction>, mpk: &MasterPubKey) -> Result<Arc<BdkWallet>, EngineError> {
        let wallet = BdkWallet::watch_only(mpk, self.network)?;
        if !seed_txs.is_empty() {
            wallet.apply_unconfirmed(seed_txs.into_iter().map(|t| t.tx).collect())?;
        }
        Ok(Arc::new(wallet))
    }

    fn new_peer_manager(&self, wallet: Arc<BdkWallet>, params: PeerManagerParams) -> Result<Arc<ElectrumPeerManager>, EngineError> {
        let url = params
            .known_peers
            .first()
            .cloned()
            .or_else(|| self.electrum_url.clone())
            .unwrap_or_else(|| default_electrum_url(self.network).to_string());
        Ok(Arc::new(ElectrumPeerManager::new(wallet, url)))
    }
}
