//! Deskwallet: desktop wallet bridge. One key, one wallet, one UI.
//!
//! # Architecture
//!
//! ```text
//! UI (HTML/JS)
//!   │  POST /api {"fn":"connect"|"send","data":..}      GET /events (script lines)
//!   ▼                                                    ▲
//! EventRouter ──connect──► Key ─► WalletBridge ─► SyncCoordinator (500 ms poll)
//!   │                                │                   │
//!   └──send──► TransactionSubmitter  │ engine callbacks  │ progress
//!                                    ▼                   ▼
//!                              Notifier ──► UiQueue ──► UiDispatcher ──► ViewState
//!
//! GET /img/{address} ──► AddressCodec ──► PNG QR of "bitcoin:{address}"
//! ```
//!
//! The wallet engine sits behind the [`engine::Engine`] traits. The `bdk`
//! feature supplies [`engine::bdk::BdkEngine`] (bdk_wallet + Electrum).
//!
//! # Features
//!
//! - `bdk` (default) - BDK 2.x engine adapter and the `deskwallet` binary
//!
//! # Usage
//!
//! ```ignore
//! use deskwallet::{ui, BridgeConfig, EventRouter, UiDispatcher};
//! use deskwallet::engine::bdk::BdkEngine;
//!
//! let config = BridgeConfig::from_env()?;
//! let (notifier, queue) = ui::channel();
//! let dispatcher = UiDispatcher::default();
//! tokio::spawn(dispatcher.clone().run(queue));
//!
//! let engine = Arc::new(BdkEngine::new(config.network, config.electrum_url.clone()));
//! let router = EventRouter::new(engine, notifier, &config);
//! router.dispatch(r#"{"fn":"connect","data":"abandon ..."}"#).await?;
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod logging;
pub mod router;
pub mod runtime;
pub mod server;
pub mod session;
pub mod submit;
pub mod sync;
pub mod ui;

pub use bridge::{TransactionRecord, WalletBridge};
pub use config::{BridgeConfig, Network, COIN, MIN_FEE};
pub use error::{EngineError, Error, Result};
pub use key::{Key, MasterPubKey};
pub use router::{Action, EventRouter};
pub use runtime::{install_signal_handlers, Shutdown};
pub use server::{create_router, AppState, ImageEndpoint};
pub use session::Session;
pub use submit::SendRequest;
pub use sync::{PollOutcome, SyncCoordinator, SyncSession};
pub use ui::{Notification, Notifier, UiDispatcher, UiQueue, ViewState};
