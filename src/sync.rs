//! SyncCoordinator - connects the peer manager and reports sync progress to the UI.
//!
//! `start` kicks off `connect()` on a blocking thread and returns immediately.
//! `poll_loop` then reads progress once per interval and ends the first time a
//! reading reaches 1.0, or when the session is cancelled.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::engine::{Engine, PeerManager, PeerManagerParams};
use crate::error::Result;
use crate::runtime::Shutdown;
use crate::ui::{Notification, Notifier};

/// One peer-manager connection/sync run.
pub struct SyncSession<P: PeerManager> {
    peer_manager: Arc<P>,
    cancel: Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { ticks: u64 },
    Cancelled { ticks: u64 },
}

impl<P: PeerManager> SyncSession<P> {
    pub fn peer_manager(&self) -> &Arc<P> { &self.peer_manager }
    pub fn progress(&self) -> f64 { self.peer_manager.progress() }
    pub async fn cancel(&self) { self.cancel.trigger().await }
    pub async fn is_cancelled(&self) -> bool { self.cancel.is_triggered().await }
}

pub struct SyncCoordinator;

impl SyncCoordinator {
    /// Must run inside a tokio runtime. A failed `connect()` is reported to the
    /// UI and cancels the session.
    pub fn start<E: Engine>(
        engine: &E,
        wallet: Arc<E::Wallet>,
        notifier: Notifier,
        params: PeerManagerParams,
    ) -> Result<SyncSession<E::PeerManager>> {
        let peer_manager = engine.new_peer_manager(wallet, params)?;
        let cancel = Shutdown::new();

        let (pm, stop) = (peer_manager.clone(), cancel.clone());
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || pm.connect()).await {
                Ok(Ok(())) => info!("peer manager connected"),
                Ok(Err(e)) => {
                    error!(error = %e, "peer manager failed to connect");
                    // A replaced session stays quiet.
                    if !stop.is_triggered().await {
                        notifier.notify(Notification::Error(format!("sync failed: {}", e)));
                    }
                    stop.trigger().await;
                }
                Err(e) => {
                    error!(error = %e, "peer manager connect task panicked");
                    stop.trigger().await;
                }
            }
        });

        Ok(SyncSession { peer_manager, cancel })
    }

    pub async fn poll_loop<P: PeerManager>(session: &SyncSession<P>, notifier: &Notifier, every: Duration) -> PollOutcome {
        let mut stop = session.cancel.subscribe();
        if session.is_cancelled().await {
            return PollOutcome::Cancelled { ticks: 0 };
        }

        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.recv() => {
                    info!(ticks, "sync polling cancelled");
                    return PollOutcome::Cancelled { ticks };
                }
            }

            let progress = session.progress();
            ticks += 1;
            debug!(progress, ticks, "sync progress");
            notifier.notify(Notification::progress(progress));
            if progress >= 1.0 {
                info!(ticks, "sync complete");
                return PollOutcome::Completed { ticks };
            }
        }
    }
}
