//! Bulk import of every page from the configured containers.
//!
//! Runs when the store is empty. Each source is queried in full, untitled and
//! archived pages are dropped, content is fetched best-effort through the
//! batch runner, and the source's records land in one transaction.

use chrono::Utc;
use pagesync_client::Page;
use pagesync_core::records::parse_timestamp;
use pagesync_core::{PageRecord, RecordStore, SourceConfig};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::batch::run_batch;
use crate::context::EngineContext;
use crate::error::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped_untitled: usize,
    pub skipped_archived: usize,
    /// Pages stored with empty content because the fetch failed.
    pub content_failures: usize,
    pub failed_sources: Vec<String>,
}

/// Import every configured source. A failing source is logged and skipped.
pub async fn import_all(ctx: &EngineContext, cancel: &CancellationToken) -> ImportReport {
    let mut report = ImportReport::default();
    if ctx.settings.sources.is_empty() {
        tracing::warn!("store is empty and no sources are configured; nothing to import");
        return report;
    }

    for source in &ctx.settings.sources {
        if cancel.is_cancelled() {
            break;
        }
        if let Err(e) = import_source(ctx, source, cancel, &mut report).await {
            tracing::error!(container_id = %source.container_id, error = %e, "source import failed");
            report.failed_sources.push(source.container_id.clone());
        }
    }

    tracing::info!(
        imported = report.imported,
        skipped_untitled = report.skipped_untitled,
        skipped_archived = report.skipped_archived,
        failed_sources = report.failed_sources.len(),
        "bulk import finished"
    );
    report
}

async fn import_source(
    ctx: &EngineContext, source: &SourceConfig, cancel: &CancellationToken, report: &mut ImportReport,
) -> Result<(), SyncError> {
    let pages = pagesync_client::query_all_pages(ctx.api.as_ref(), &source.container_id).await?;
    let candidates = source.title_candidates();

    let mut titled = Vec::with_capacity(pages.len());
    for page in pages {
        if page.is_removed() {
            report.skipped_archived += 1;
            continue;
        }
        match page.resolve_title(&candidates) {
            Some(title) => titled.push((page, title)),
            None => {
                tracing::warn!(page_id = %page.id, container_id = %source.container_id, "page has no title; skipped");
                report.skipped_untitled += 1;
            }
        }
    }

    let differ = ctx.differ();
    let limit = ctx.settings.batch.concurrency_for(titled.len());
    let ids: Vec<String> = titled.iter().map(|(page, _)| page.id.clone()).collect();
    let contents = run_batch(ids, limit, &ctx.settings.batch, cancel, move |id| {
        let differ = differ.clone();
        async move { differ.get_content(&id, false).await }
    })
    .await;

    let now = Utc::now();
    let mut records = Vec::with_capacity(titled.len());
    for ((page, title), content) in titled.into_iter().zip(contents) {
        let mut record = to_record(&page, title, source);
        match content {
            Ok(text) => {
                record.set_content(text);
                record.last_synced_at = Some(now);
                record.last_checked_at = Some(now);
            }
            Err(e) => {
                // Left unsynced so the next pass fetches it again.
                tracing::warn!(page_id = %page.id, error = %e, "content fetch failed during import");
                report.content_failures += 1;
            }
        }
        records.push(record);
    }

    let stored = ctx.store.upsert_many(&records).await?;
    report.imported += stored;
    tracing::info!(container_id = %source.container_id, record_kind = %source.record_kind, stored, "source imported");
    Ok(())
}

fn to_record(page: &Page, title: String, source: &SourceConfig) -> PageRecord {
    let mut record = PageRecord::new(&page.id, &source.container_id, &source.record_kind).with_title(title);
    record.owner_id = page.owner_id().unwrap_or_default().to_string();
    record.url = page.url.clone();
    record.source_created_at = page.created_time.as_deref().and_then(parse_timestamp);
    record.source_modified_at = page.last_edited_time.as_deref().and_then(parse_timestamp);
    record
}
