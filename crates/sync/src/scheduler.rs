//! Background loop driving reconciliation passes on an interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::{ReconciliationEngine, SyncSummary};
use crate::error::SyncError;

/// In-memory loop state. Not persisted across restarts.
#[derive(Debug, Clone, Default)]
pub struct SyncCursor {
    pub last_full_cleanup_at: Option<Instant>,
}

impl SyncCursor {
    pub fn cleanup_due(&self, now: Instant, interval: Duration) -> bool {
        self.last_full_cleanup_at
            .is_none_or(|last| now.saturating_duration_since(last) >= interval)
    }

    pub fn record_cleanup(&mut self, at: Instant) {
        self.last_full_cleanup_at = Some(at);
    }
}

/// Resets the running flag when the loop exits.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    engine: Arc<ReconciliationEngine>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine, running: Arc::new(AtomicBool::new(false)) }
    }

    /// Whether the loop is currently alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cleanup when due, then one pass.
    pub async fn tick(&self, cursor: &mut SyncCursor, cancel: &CancellationToken) -> Result<SyncSummary, SyncError> {
        let settings = &self.engine.context().settings;
        let now = Instant::now();
        if cursor.cleanup_due(now, settings.cleanup_interval) {
            match self.engine.run_cleanup(cancel).await {
                Ok(_) => cursor.record_cleanup(now),
                Err(SyncError::AlreadyRunning) => tracing::debug!("cleanup skipped; a pass is in progress"),
                Err(e) => tracing::error!(error = %e, "cleanup failed"),
            }
        }
        self.engine.run_pass(cancel).await
    }

    /// Run until `cancel` fires. A failing pass never ends the loop.
    ///
    /// Cancellation interrupts the sleep immediately; a pass in flight stops
    /// launching new work and returns once its running items finish.
    pub async fn run(&self, cancel: CancellationToken) {
        if self.running.swap(true, Ordering::AcqRel) {
            tracing::warn!("scheduler already running");
            return;
        }
        let _running = RunningGuard(Arc::clone(&self.running));

        let settings = &self.engine.context().settings;
        let mut cursor = SyncCursor::default();
        tracing::info!(
            interval_secs = settings.sync_interval.as_secs(),
            cleanup_interval_secs = settings.cleanup_interval.as_secs(),
            "scheduler started"
        );

        while !cancel.is_cancelled() {
            let wait = match self.tick(&mut cursor, &cancel).await {
                Ok(_) => settings.sync_interval,
                Err(SyncError::AlreadyRunning) => {
                    tracing::debug!("pass skipped; another pass is in progress");
                    settings.sync_interval
                }
                Err(e) => {
                    tracing::error!(error = %e, cooldown_secs = settings.error_cooldown.as_secs(), "pass failed");
                    settings.error_cooldown
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("scheduler stopped");
    }
}
