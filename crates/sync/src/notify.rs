//! Inbound seams for deletion notices and secondary mappings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagesync_core::PageRecord;
use serde::Serialize;

use crate::error::SyncError;

/// What a sink needs to announce that a record disappeared remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionNotice {
    pub external_id: String,
    pub title: String,
    pub record_kind: String,
    pub owner_id: String,
    pub secondary_mapping_id: Option<String>,
    pub container_id: String,
    pub url: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl DeletionNotice {
    pub fn from_record(record: &PageRecord, detected_at: DateTime<Utc>) -> Self {
        Self {
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            record_kind: record.record_kind.clone(),
            owner_id: record.owner_id.clone(),
            secondary_mapping_id: record.secondary_mapping_id.clone(),
            container_id: record.container_id.clone(),
            url: record.url.clone(),
            detected_at,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_deletion(&self, notice: &DeletionNotice) -> Result<(), SyncError>;
}

/// Creates secondary objects (e.g. chat threads) keyed by container and key.
#[async_trait]
pub trait MappingProvider: Send + Sync {
    /// Returns the new handle id.
    async fn create_mapping(&self, container_id: &str, mapping_key: &str) -> Result<String, SyncError>;
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify_deletion(&self, notice: &DeletionNotice) -> Result<(), SyncError> {
        tracing::info!(
            external_id = %notice.external_id,
            title = %notice.title,
            record_kind = %notice.record_kind,
            container_id = %notice.container_id,
            "record removed remotely"
        );
        Ok(())
    }
}

/// Deliver notices one at a time. Failures are logged, never retried.
///
/// Returns how many were delivered.
pub(crate) async fn dispatch(sink: &dyn NotificationSink, notices: &[DeletionNotice]) -> usize {
    let mut delivered = 0;
    for notice in notices {
        match sink.notify_deletion(notice).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(external_id = %notice.external_id, error = %e, "deletion notice failed"),
        }
    }
    delivered
}
