//! Periodic store hygiene: malformed records and orphans.

use std::sync::Arc;

use chrono::Utc;
use pagesync_core::{PageRecord, RecordStore};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::batch::run_batch;
use crate::context::EngineContext;
use crate::error::SyncError;
use crate::notify::{self, DeletionNotice};
use crate::prober::Existence;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub invalid_removed: usize,
    pub checked: usize,
    pub orphans_removed: usize,
    pub notified: usize,
}

fn is_malformed(record: &PageRecord) -> bool {
    !record.has_valid_id() || record.container_id.trim().is_empty()
}

/// Delete records whose id cannot name a remote page or that have no container.
pub async fn remove_invalid_records(store: &dyn RecordStore) -> Result<usize, SyncError> {
    let mut removed = 0;
    for record in store.find_all().await?.iter().filter(|r| is_malformed(r)) {
        if store.delete(&record.external_id).await? {
            tracing::warn!(external_id = %record.external_id, "removed malformed record");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Probe every record and drop the ones the remote reports gone.
///
/// Only a definite `Gone` deletes; `Unknown` keeps the record.
pub async fn sweep_orphans(ctx: &EngineContext, cancel: &CancellationToken) -> Result<CleanupReport, SyncError> {
    let records = ctx.store.find_all().await?;
    let mut report = CleanupReport { checked: records.len(), ..Default::default() };

    let prober = ctx.prober();
    let store = Arc::clone(&ctx.store);
    let limit = ctx.settings.batch.concurrency_for(records.len());
    let results = run_batch(records, limit, &ctx.settings.batch, cancel, move |record: PageRecord| {
        let prober = prober.clone();
        let store = Arc::clone(&store);
        async move {
            if prober.probe(&record.external_id).await != Existence::Gone {
                return Ok::<_, SyncError>(None);
            }
            store.delete(&record.external_id).await?;
            tracing::info!(external_id = %record.external_id, title = %record.title, "orphan removed");
            Ok(Some(DeletionNotice::from_record(&record, Utc::now())))
        }
    })
    .await;

    let mut notices = Vec::new();
    for result in results {
        match result {
            Ok(Some(notice)) => notices.push(notice),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "orphan check failed"),
        }
    }

    report.orphans_removed = notices.len();
    report.notified = notify::dispatch(ctx.notifier.as_ref(), &notices).await;
    Ok(report)
}
