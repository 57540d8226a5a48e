//! WalletBridge - owns the session key and wallet handle, relays engine events to the UI.

use bitcoin::consensus::encode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{Engine, EngineTransaction, Wallet};
use crate::error::Result;
use crate::key::Key;
use crate::ui::{Notification, Notifier};

/// Read-only view of an engine transaction, as shown in the UI table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Protocol version.
    pub version: i32,
    /// Index in block or mempool; -1 when unknown.
    pub index: i32,
    pub lock_time: u32,
    pub hash: String,
    /// Sum of all output values.
    pub value: u64,
}

impl TransactionRecord {
    pub fn from_engine<T: EngineTransaction>(tx: &T) -> std::result::Result<Self, encode::Error> {
        let decoded: bitcoin::Transaction = encode::deserialize(&tx.serialize())?;
        Ok(Self {
            version: decoded.version.0,
            index: tx.index(),
            lock_time: decoded.lock_time.to_consensus_u32(),
            hash: decoded.compute_txid().to_string(),
            value: decoded.output.iter().fold(0u64, |sum, out| sum.saturating_add(out.value.to_sat())),
        })
    }
}

pub struct WalletBridge<W: Wallet> {
    key: Key,
    wallet: Arc<W>,
    /// Cleared by [`detach`](Self::detach); callbacks stay silent afterwards.
    attached: Arc<AtomicBool>,
}

impl<W: Wallet> WalletBridge<W> {
    /// Builds the engine wallet for `key` and wires its callbacks to `notifier`.
    /// Blocking.
    pub fn initialize<E>(engine: &E, key: Key, notifier: Notifier, fee_per_kb: u64) -> Result<Self>
    where
        E: Engine<Wallet = W>,
    {
        let mpk = key.master_public_key(engine.network())?;
        let wallet = engine.new_wallet(Vec::new(), &mpk)?;
        wallet.set_fee_per_kb(fee_per_kb);

        // Weak: the wallet owns these closures.
        let handle = Arc::downgrade(&wallet);
        let attached = Arc::new(AtomicBool::new(true));
        let (balance_notifier, balance_attached) = (notifier.clone(), attached.clone());
        wallet.on_balance_changed(Box::new(move |balance| {
            if !balance_attached.load(Ordering::Acquire) {
                return;
            }
            let Some(wallet) = handle.upgrade() else { return };
            balance_notifier.notify(Notification::Balance { balance, address: wallet.receive_address() });
        }));

        let tx_attached = attached.clone();
        wallet.on_transaction_added(Box::new(move |tx: &W::Transaction| {
            if !tx_attached.load(Ordering::Acquire) {
                return;
            }
            match TransactionRecord::from_engine(tx) {
                Ok(record) => notifier.notify(Notification::TransactionAdded(record)),
                Err(e) => warn!(error = %e, "dropping undecodable wallet transaction"),
            }
        }));

        info!(network = engine.network().as_str(), fingerprint = %mpk.fingerprint, "wallet initialized");
        Ok(Self { key, wallet, attached })
    }

    pub fn key(&self) -> &Key { &self.key }
    pub fn wallet(&self) -> &Arc<W> { &self.wallet }
    pub fn balance(&self) -> u64 { self.wallet.balance() }
    pub fn receive_address(&self) -> String { self.wallet.receive_address() }

    pub fn announce_address(&self, notifier: &Notifier) {
        notifier.notify(Notification::Address(self.receive_address()));
    }

    /// Stops relaying wallet events. The engine may keep the wallet alive
    /// (a running sync holds it), so dropping the bridge is not enough.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool { self.attached.load(Ordering::Acquire) }
}
