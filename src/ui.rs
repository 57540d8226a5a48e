//! UI side of the bridge: notifications, the single-consumer queue, ViewState.
//!
//! Engine callbacks and the poll loop never touch UI state. They push a
//! [`Notification`] through a [`Notifier`]; one [`UiDispatcher`] drains the
//! [`UiQueue`], applies each notification to the [`ViewState`] and fans it out
//! to every connected surface as a script line (`app.balance = 5`).

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc};

use crate::bridge::TransactionRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Address(String),
    /// Percentage, 0-100, two decimals.
    Progress(f64),
    Balance { balance: u64, address: String },
    TransactionAdded(TransactionRecord),
    Error(String),
    /// A new session replaced the previous one; forget everything shown.
    Reset,
}

impl Notification {
    /// Scale a `[0.0, 1.0]` progress reading to a percentage.
    pub fn progress(fraction: f64) -> Self {
        Notification::Progress((fraction * 10_000.0).round() / 100.0)
    }

    /// The assignment evaluated against the UI-side `app` object.
    pub fn to_script(&self) -> serde_json::Result<String> {
        Ok(match self {
            Notification::Address(address) => format!("app.address = {}", serde_json::to_string(address)?),
            Notification::Progress(percent) => format!("app.progress = {:.2}", percent),
            Notification::Balance { balance, address } => {
                format!("app.balance = {}; app.address = {}", balance, serde_json::to_string(address)?)
            }
            Notification::TransactionAdded(record) => format!("app.tableData.unshift({})", serde_json::to_string(record)?),
            Notification::Error(message) => format!("app.error = {}", serde_json::to_string(message)?),
            Notification::Reset => {
                r#"app.address = ""; app.balance = 0; app.progress = 0.00; app.tableData = []; app.error = null"#.to_string()
            }
        })
    }
}

/// Producer half. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("UI queue closed, dropping notification");
        }
    }
}

/// Consumer half. Exactly one per UI surface.
#[derive(Debug)]
pub struct UiQueue {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl UiQueue {
    pub async fn recv(&mut self) -> Option<Notification> { self.rx.recv().await }
    pub fn try_recv(&mut self) -> Option<Notification> { self.rx.try_recv().ok() }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

pub fn channel() -> (Notifier, UiQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier { tx }, UiQueue { rx })
}

/// What the UI shows. Only changes by applying notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub address: String,
    pub balance: u64,
    pub progress: f64,
    /// Most recent first.
    pub transactions: VecDeque<TransactionRecord>,
    pub error: Option<String>,
}

impl ViewState {
    pub fn apply(&mut self, notification: &Notification) {
        match notification {
            Notification::Address(address) => self.address = address.clone(),
            Notification::Progress(percent) => self.progress = *percent,
            Notification::Balance { balance, address } => {
                self.balance = *balance;
                self.address = address.clone();
            }
            Notification::TransactionAdded(record) => self.transactions.push_front(record.clone()),
            Notification::Error(message) => self.error = Some(message.clone()),
            Notification::Reset => *self = ViewState::default(),
        }
    }

    /// Notifications that rebuild this state on a fresh surface.
    pub fn replay(&self) -> Vec<Notification> {
        let mut out = vec![
            Notification::Balance { balance: self.balance, address: self.address.clone() },
            Notification::Progress(self.progress),
        ];
        out.extend(self.transactions.iter().rev().cloned().map(Notification::TransactionAdded));
        out.extend(self.error.clone().map(Notification::Error));
        out
    }
}

#[derive(Debug, Clone)]
pub struct UiDispatcher {
    view: Arc<RwLock<ViewState>>,
    events: broadcast::Sender<Notification>,
}

impl Default for UiDispatcher {
    fn default() -> Self { Self::new(256) }
}

impl UiDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { view: Arc::new(RwLock::new(ViewState::default())), events }
    }

    pub fn view(&self) -> ViewState {
        self.view.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot plus live feed. Nothing is lost or repeated between the two.
    pub fn subscribe(&self) -> (Vec<Notification>, broadcast::Receiver<Notification>) {
        let view = self.view.read().unwrap_or_else(PoisonError::into_inner);
        (view.replay(), self.events.subscribe())
    }

    /// Sole consumer of the queue. Returns when every `Notifier` is gone.
    pub async fn run(self, mut queue: UiQueue) {
        while let Some(notification) = queue.recv().await {
            let mut view = self.view.write().unwrap_or_else(PoisonError::into_inner);
            view.apply(&notification);
            let _ = self.events.send(notification);
        }
        tracing::debug!("UI queue drained, dispatcher stopping");
    }
}
