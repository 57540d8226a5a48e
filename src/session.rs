//! Session - one connect-to-sync-completion lifecycle for a derived key.

use crate::bridge::WalletBridge;
use crate::engine::Engine;
use crate::error::Result;
use crate::submit::{self, SendRequest};
use crate::sync::SyncSession;

pub struct Session<E: Engine> {
    bridge: WalletBridge<E::Wallet>,
    sync: SyncSession<E::PeerManager>,
}

impl<E: Engine> Session<E> {
    pub fn new(bridge: WalletBridge<E::Wallet>, sync: SyncSession<E::PeerManager>) -> Self { Self { bridge, sync } }
    pub fn bridge(&self) -> &WalletBridge<E::Wallet> { &self.bridge }
    pub fn sync(&self) -> &SyncSession<E::PeerManager> { &self.sync }

    /// Blocking.
    pub fn send(&self, engine: &E, request: &SendRequest) -> Result<()> {
        submit::send(engine, &self.bridge, &self.sync, request)
    }

    /// Silences the wallet's callbacks and stops the progress poll loop. The
    /// engine keeps its own state.
    pub async fn cancel(&self) {
        self.bridge.detach();
        self.sync.cancel().await
    }
}
