//! Engine contract - what the bridge needs from a wallet engine and a peer manager.
//!
//! The bridge never touches UTXOs, signatures or peers itself; it drives these
//! traits. Engines are blocking: the bridge calls them from `spawn_blocking`.
//!
//! ```text
//! Engine
//!   ├── new_wallet(seed_txs, mpk) ──► Wallet
//!   │                                   ├── balance / receive_address / set_fee_per_kb
//!   │                                   ├── create_transaction / sign_transaction
//!   │                                   └── on_balance_changed / on_transaction_added
//!   │                                         (fire on engine threads)
//!   └── new_peer_manager(wallet, params) ──► PeerManager
//!                                              ├── connect (blocks until synced)
//!                                              ├── progress ∈ [0.0, 1.0]
//!                                              └── publish_transaction (fire-and-forget)
//! ```

#[cfg(feature = "bdk")]
pub mod bdk;

use std::sync::Arc;

use crate::config::Network;
use crate::error::EngineError;
use crate::key::{Key, MasterPubKey};

/// Block position reported when the engine does not know where a tx landed.
pub const UNKNOWN_INDEX: i32 = -1;

pub trait EngineTransaction: Send + Sync + 'static {
    /// Consensus serialization.
    fn serialize(&self) -> Vec<u8>;
    fn index(&self) -> i32 { UNKNOWN_INDEX }
}

pub type BalanceChanged = Box<dyn Fn(u64) + Send + Sync>;
pub type TransactionAdded<T> = Box<dyn Fn(&T) + Send + Sync>;

pub trait Wallet: Send + Sync + 'static {
    type Transaction: EngineTransaction;

    fn balance(&self) -> u64;
    /// First unused receive address. Rotates once it has been paid.
    fn receive_address(&self) -> String;
    fn set_fee_per_kb(&self, fee_per_kb: u64);
    fn create_transaction(&self, amount: u64, address: &str) -> Result<Self::Transaction, EngineError>;
    fn sign_transaction(&self, tx: &mut Self::Transaction, key: &Key) -> Result<(), EngineError>;

    /// Callbacks must not block; they run on engine threads.
    fn on_balance_changed(&self, callback: BalanceChanged);
    fn on_transaction_added(&self, callback: TransactionAdded<Self::Transaction>);
}

pub trait PeerManager: Send + Sync + 'static {
    type Transaction: EngineTransaction;

    /// Blocks until the initial sync finishes or fails.
    fn connect(&self) -> Result<(), EngineError>;
    fn progress(&self) -> f64;
    fn publish_transaction(&self, tx: Self::Transaction);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownBlock {
    pub height: u32,
    pub hash: String,
}

/// Peer-manager construction parameters. Empty lists mean engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerManagerParams {
    pub earliest_key_time: u64,
    pub known_blocks: Vec<KnownBlock>,
    pub known_peers: Vec<String>,
}

pub trait Engine: Send + Sync + 'static {
    type Wallet: Wallet;
    type PeerManager: PeerManager<Transaction = TxOf<Self>>;

    fn network(&self) -> Network;
    fn is_valid_address(&self, address: &str) -> bool;
    fn new_wallet(&self, seed_txs: Vec<TxOf<Self>>, mpk: &MasterPubKey) -> Result<Arc<Self::Wallet>, EngineError>;
    fn new_peer_manager(&self, wallet: Arc<Self::Wallet>, params: PeerManagerParams) -> Result<Arc<Self::PeerManager>, EngineError>;
}

pub type TxOf<E> = <<E as Engine>::Wallet as Wallet>::Transaction;
