//! TransactionSubmitter - validate, build, sign, broadcast. No retries.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bridge::WalletBridge;
use crate::config::MIN_FEE;
use crate::engine::{Engine, PeerManager, Wallet};
use crate::error::{Error, Result};
use crate::sync::SyncSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub address: String,
    /// Smallest units.
    pub amount: u64,
}

/// Blocking. Each step only runs if the previous one passed; nothing is rolled
/// back. Success emits no UI notification: the wallet's balance callback
/// reports the spend once the engine updates its state.
pub fn send<E: Engine>(
    engine: &E,
    bridge: &WalletBridge<E::Wallet>,
    sync: &SyncSession<E::PeerManager>,
    request: &SendRequest,
) -> Result<()> {
    if !engine.is_valid_address(&request.address) {
        return Err(Error::InvalidAddress(request.address.clone()));
    }

    let balance = bridge.balance();
    match request.amount.checked_add(MIN_FEE) {
        Some(required) if required <= balance => {}
        _ => return Err(Error::InsufficientFunds { balance, amount: request.amount, fee: MIN_FEE }),
    }

    let wallet = bridge.wallet();
    let mut tx = wallet
        .create_transaction(request.amount, &request.address)
        .map_err(|e| Error::TransactionBuildFailed(e.to_string()))?;
    wallet
        .sign_transaction(&mut tx, bridge.key())
        .map_err(|e| Error::SigningFailed(e.to_string()))?;

    sync.peer_manager().publish_transaction(tx);
    info!(address = %request.address, amount = request.amount, "transaction published");
    Ok(())
}
