//! EventRouter - single entry point for inbound UI actions.
//!
//! | Message | Behaviour |
//! |---------|-----------|
//! | `{"fn":"connect","data":"<phrase>"}` | spawn key derivation + wallet + sync, return at once |
//! | `{"fn":"send","data":{"address":"..","amount":n}}` | validate/build/sign/broadcast, return the outcome |
//!
//! Anything else is a [`Error::DecodeFailure`] for the caller; the session
//! stays alive. A second `connect` retires the first session: its wallet goes
//! quiet and the UI receives [`Notification::Reset`] before the new address.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::bridge::WalletBridge;
use crate::config::BridgeConfig;
use crate::engine::{Engine, PeerManagerParams};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::session::Session;
use crate::submit::SendRequest;
use crate::sync::SyncCoordinator;
use crate::ui::{Notification, Notifier};

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "fn", content = "data", rename_all = "lowercase")]
pub enum Action {
    Connect(String),
    Send(SendRequest),
}

impl Action {
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::DecodeFailure(e.to_string()))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Connect(_) => f.write_str("Connect(<passphrase>)"),
            Action::Send(request) => f.debug_tuple("Send").field(request).finish(),
        }
    }
}

type SessionSlot<E> = Arc<RwLock<Option<Arc<Session<E>>>>>;

pub struct EventRouter<E: Engine> {
    engine: Arc<E>,
    notifier: Notifier,
    session: SessionSlot<E>,
    poll_interval: Duration,
    fee_per_kb: u64,
}

impl<E: Engine> EventRouter<E> {
    pub fn new(engine: Arc<E>, notifier: Notifier, config: &BridgeConfig) -> Self {
        Self {
            engine,
            notifier,
            session: Arc::new(RwLock::new(None)),
            poll_interval: config.poll_interval,
            fee_per_kb: config.fee_per_kb,
        }
    }

    pub fn engine(&self) -> &Arc<E> { &self.engine }

    pub async fn session(&self) -> Option<Arc<Session<E>>> {
        self.session.read().await.clone()
    }

    pub async fn dispatch(&self, raw: &str) -> Result<()> {
        match Action::decode(raw) {
            Ok(Action::Connect(passphrase)) => {
                self.connect(passphrase);
                Ok(())
            }
            Ok(Action::Send(request)) => self.send(request).await,
            Err(e) => {
                warn!(error = %e, "rejected UI message");
                Err(e)
            }
        }
    }

    /// Fire-and-forget. The handle resolves when the session's poll loop ends.
    pub fn connect(&self, passphrase: String) -> JoinHandle<()> {
        info!("[connect] starting wallet session");
        let passphrase = Zeroizing::new(passphrase);
        let engine = self.engine.clone();
        let notifier = self.notifier.clone();
        let slot = self.session.clone();
        let (poll_interval, fee_per_kb) = (self.poll_interval, self.fee_per_kb);

        tokio::spawn(async move {
            if let Err(e) = run_session(engine, notifier.clone(), slot, passphrase, poll_interval, fee_per_kb).await {
                error!(error = %e, "wallet session failed");
                notifier.notify(Notification::Error(e.to_string()));
            }
        })
    }

    /// Failures are returned and also shown to the user.
    pub async fn send(&self, request: SendRequest) -> Result<()> {
        info!(address = %request.address, amount = request.amount, "[send]");
        let result = match self.session().await {
            Some(session) => {
                let engine = self.engine.clone();
                tokio::task::spawn_blocking(move || session.send(&engine, &request))
                    .await
                    .map_err(Error::from)
                    .and_then(|r| r)
            }
            None => Err(Error::NotConnected),
        };
        if let Err(e) = &result {
            warn!(error = %e, "send rejected");
            self.notifier.notify(Notification::Error(e.to_string()));
        }
        result
    }

    /// Cancels the active session, if any.
    pub async fn shutdown(&self) {
        if let Some(session) = self.session.write().await.take() {
            session.cancel().await;
            info!("wallet session closed");
        }
    }
}

async fn run_session<E: Engine>(
    engine: Arc<E>,
    notifier: Notifier,
    slot: SessionSlot<E>,
    passphrase: Zeroizing<String>,
    poll_interval: Duration,
    fee_per_kb: u64,
) -> Result<()> {
    let bridge = {
        let (engine, notifier) = (engine.clone(), notifier.clone());
        tokio::task::spawn_blocking(move || -> Result<WalletBridge<E::Wallet>> {
            let key = Key::from_passphrase(&passphrase)?;
            WalletBridge::initialize(&*engine, key, notifier, fee_per_kb)
        })
        .await??
    };

    // Held until the new session is installed so concurrent connects queue up
    // and the UI never sees two sessions interleave.
    let mut current = slot.write().await;
    if let Some(previous) = current.take() {
        previous.cancel().await;
        notifier.notify(Notification::Reset);
        info!("previous wallet session replaced");
    }
    bridge.announce_address(&notifier);

    let sync = SyncCoordinator::start(&*engine, bridge.wallet().clone(), notifier.clone(), PeerManagerParams::default())?;
    let session = Arc::new(Session::new(bridge, sync));
    *current = Some(session.clone());
    drop(current);

    let outcome = SyncCoordinator::poll_loop(session.sync(), &notifier, poll_interval).await;
    info!(?outcome, "sync polling finished");
    Ok(())
}
