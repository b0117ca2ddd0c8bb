//! Background reclamation of idle sessions.

use crate::manager::MemoryManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically evicts sessions idle past the manager's expiry window.
///
/// Runs until its cancellation token fires. The scan interval is independent
/// of the expiry window.
pub struct Reclaimer {
    manager: Arc<MemoryManager>,
    interval: Duration,
}

impl Reclaimer {
    /// Reclaimer using the manager's configured interval.
    pub fn new(manager: Arc<MemoryManager>) -> Self {
        let interval = manager.config().reclaim_interval;
        Self { manager, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(manager: Arc<MemoryManager>, cancel: CancellationToken) -> JoinHandle<()> {
        let reclaimer = Self::new(manager);
        tokio::spawn(reclaimer.run(cancel))
    }

    /// Scan every interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::debug!(
            interval_secs = self.interval.as_secs_f64(),
            "Session reclaimer started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; nothing can be idle yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.sweep();
        }

        tracing::debug!("Session reclaimer stopped");
    }

    /// One reclamation pass.
    pub fn sweep(&self) -> usize {
        let reclaimed = self.manager.reclaim_expired();
        if reclaimed > 0 {
            tracing::info!(
                reclaimed,
                active = self.manager.active_count(),
                "Reclaimed expired chat sessions"
            );
        }
        reclaimed
    }
}
