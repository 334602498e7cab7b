//! Reconciliation pass.
//!
//! For each local record: probe existence, diff content when stale, then
//! write the smallest change that converges the store (timestamps only,
//! a content upsert, or a delete). Records run through the batch runner;
//! deletion notices go out one by one after the batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pagesync_core::{PageRecord, RecordStore};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchItemError, run_batch};
use crate::cleanup::{self, CleanupReport};
use crate::context::EngineContext;
use crate::differ::ContentDiffer;
use crate::error::SyncError;
use crate::import;
use crate::notify::{self, DeletionNotice};
use crate::prober::{Existence, ExistenceProber};

/// Aggregate result of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub processed: usize,
    pub unchanged: usize,
    pub updated: usize,
    pub removed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub imported: usize,
    pub cancelled: usize,
}

#[derive(Debug)]
enum RecordOutcome {
    Unchanged,
    Updated,
    Removed(Box<DeletionNotice>),
    Skipped,
}

/// Clears the in-progress flag when the pass ends, however it ends.
pub(crate) struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-record worker; cloned into every batch task.
#[derive(Clone)]
struct Reconciler {
    store: Arc<dyn RecordStore>,
    prober: ExistenceProber,
    differ: ContentDiffer,
    fresh_window: Duration,
}

impl Reconciler {
    async fn reconcile(&self, record: PageRecord) -> Result<RecordOutcome, SyncError> {
        let id = record.external_id.as_str();
        if !record.has_valid_id() {
            tracing::warn!(external_id = %id, "skipping record with malformed id");
            return Ok(RecordOutcome::Skipped);
        }

        let now = Utc::now();
        let existence = self.prober.probe(id).await;
        if existence == Existence::Gone {
            self.store.delete(id).await?;
            tracing::info!(external_id = %id, title = %record.title, "record removed");
            return Ok(RecordOutcome::Removed(Box::new(DeletionNotice::from_record(&record, now))));
        }

        if record.is_fresh(now, self.fresh_window) {
            if existence == Existence::Exists {
                self.store.mark_checked(id, now).await?;
            }
            tracing::debug!(external_id = %id, "fresh; probe only");
            return Ok(RecordOutcome::Unchanged);
        }

        let known = record.last_synced_at.map(|_| record.content.as_str());
        let diff = match self.differ.fetch_and_diff(id, known).await {
            Ok(diff) => diff,
            Err(e) => {
                tracing::warn!(external_id = %id, error = %e, "content fetch failed; record left as is");
                return Err(e.into());
            }
        };

        if diff.changed {
            let mut updated = record.clone();
            updated.set_content(diff.content);
            updated.last_synced_at = Some(now);
            updated.last_checked_at = Some(now);
            self.store.upsert(&updated).await?;
            tracing::debug!(external_id = %id, content_length = updated.content_length, "content updated");
            Ok(RecordOutcome::Updated)
        } else {
            self.store.mark_synced(id, now).await?;
            tracing::debug!(external_id = %id, "content unchanged");
            Ok(RecordOutcome::Unchanged)
        }
    }
}

/// Runs reconciliation and cleanup passes, one at a time.
pub struct ReconciliationEngine {
    ctx: Arc<EngineContext>,
    in_progress: AtomicBool,
    last_summary: Mutex<Option<SyncSummary>>,
}

impl ReconciliationEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx, in_progress: AtomicBool::new(false), last_summary: Mutex::new(None) }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn is_pass_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn last_summary(&self) -> Option<SyncSummary> {
        self.last_summary.lock().ok().and_then(|s| s.clone())
    }

    pub(crate) fn begin(&self) -> Result<PassGuard<'_>, SyncError> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRunning)?;
        Ok(PassGuard(&self.in_progress))
    }

    /// Run one reconciliation pass over every stored record.
    ///
    /// An empty store is bulk-imported first. Per-record failures are
    /// counted in the summary; only store bookkeeping errors fail the pass.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<SyncSummary, SyncError> {
        let _guard = self.begin()?;
        let clock = Instant::now();
        let mut summary = SyncSummary { started_at: Utc::now(), ..Default::default() };

        let mut records = self.ctx.store.find_all().await?;
        if records.is_empty() {
            let report = import::import_all(&self.ctx, cancel).await;
            summary.imported = report.imported;
            records = self.ctx.store.find_all().await?;
        }

        summary.total = records.len();
        let batch = &self.ctx.settings.batch;
        let limit = batch.concurrency_for(records.len());
        tracing::info!(total = summary.total, limit, "reconciliation pass started");

        let reconciler = Reconciler {
            store: Arc::clone(&self.ctx.store),
            prober: self.ctx.prober(),
            differ: self.ctx.differ(),
            fresh_window: self.ctx.settings.fresh_window,
        };
        let results = run_batch(records, limit, batch, cancel, move |record| {
            let reconciler = reconciler.clone();
            async move { reconciler.reconcile(record).await }
        })
        .await;

        let mut notices = Vec::new();
        for result in results {
            match result {
                Ok(outcome) => {
                    summary.processed += 1;
                    match outcome {
                        RecordOutcome::Unchanged => summary.unchanged += 1,
                        RecordOutcome::Updated => summary.updated += 1,
                        RecordOutcome::Skipped => summary.skipped += 1,
                        RecordOutcome::Removed(notice) => {
                            summary.removed += 1;
                            notices.push(*notice);
                        }
                    }
                }
                Err(BatchItemError::Cancelled) => summary.cancelled += 1,
                Err(e) => {
                    summary.processed += 1;
                    summary.errored += 1;
                    if !matches!(e, BatchItemError::Failed(_)) {
                        tracing::warn!(error = %e, "record processing aborted");
                    }
                }
            }
        }

        notify::dispatch(self.ctx.notifier.as_ref(), &notices).await;

        summary.duration_ms = clock.elapsed().as_millis() as u64;
        tracing::info!(
            total = summary.total,
            updated = summary.updated,
            unchanged = summary.unchanged,
            removed = summary.removed,
            errored = summary.errored,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms,
            "reconciliation pass finished"
        );

        if let Ok(mut last) = self.last_summary.lock() {
            *last = Some(summary.clone());
        }
        Ok(summary)
    }

    /// Remove malformed records, then probe everything for orphans.
    ///
    /// Shares the pass guard, so it never overlaps a reconciliation pass.
    pub async fn run_cleanup(&self, cancel: &CancellationToken) -> Result<CleanupReport, SyncError> {
        let _guard = self.begin()?;
        let invalid_removed = cleanup::remove_invalid_records(self.ctx.store.as_ref()).await?;
        let report = cleanup::sweep_orphans(&self.ctx, cancel).await?;
        let report = CleanupReport { invalid_removed, ..report };
        tracing::info!(
            invalid_removed = report.invalid_removed,
            checked = report.checked,
            orphans_removed = report.orphans_removed,
            "cleanup finished"
        );
        Ok(report)
    }
}
