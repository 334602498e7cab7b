//! Webhook-backed notification sink and mapping provider.

use async_trait::async_trait;
use pagesync_client::{Embed, EmbedField, WebhookClient, WebhookMessage};
use pagesync_core::records::format_timestamp;
use pagesync_sync::{DeletionNotice, MappingProvider, NotificationSink, SyncError};

const REMOVED_COLOR: u32 = 0xFF6B6B;

/// Last four characters of an owner id, enough to tell people apart.
fn owner_suffix(owner_id: &str) -> &str {
    let start = owner_id.char_indices().rev().nth(3).map_or(0, |(i, _)| i);
    &owner_id[start..]
}

/// Embed announcing that a record disappeared from the source.
pub fn deletion_message(notice: &DeletionNotice) -> WebhookMessage {
    let title = if notice.title.trim().is_empty() { "(untitled)" } else { notice.title.as_str() };
    let owner = if notice.owner_id.is_empty() {
        "unknown".to_string()
    } else {
        format!("user …{}", owner_suffix(&notice.owner_id))
    };

    let embed = Embed {
        title: "Page removed".into(),
        description: Some(format!("**{title}** no longer exists in the source; its content can no longer be fetched.")),
        url: notice.url.clone(),
        color: Some(REMOVED_COLOR),
        fields: vec![
            EmbedField { name: "Title".into(), value: title.to_string(), inline: true },
            EmbedField { name: "Kind".into(), value: notice.record_kind.clone(), inline: true },
            EmbedField { name: "Owner".into(), value: owner, inline: true },
        ],
        timestamp: Some(format_timestamp(notice.detected_at)),
    };
    WebhookMessage { embeds: vec![embed], ..Default::default() }
}

/// Posts deletion notices to a webhook, into the record's thread when it has one.
pub struct WebhookNotifier {
    client: WebhookClient,
}

impl WebhookNotifier {
    pub fn new(client: WebhookClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify_deletion(&self, notice: &DeletionNotice) -> Result<(), SyncError> {
        self.client
            .post_message(&deletion_message(notice), notice.secondary_mapping_id.as_deref())
            .await
            .map_err(|e| SyncError::Notify(e.to_string()))
    }
}

/// Opens one webhook thread per mapping key.
pub struct WebhookThreads {
    client: WebhookClient,
}

impl WebhookThreads {
    pub fn new(client: WebhookClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MappingProvider for WebhookThreads {
    async fn create_mapping(&self, container_id: &str, mapping_key: &str) -> Result<String, SyncError> {
        let opening = WebhookMessage { content: Some(format!("Thread for {mapping_key}")), ..Default::default() };
        let name: String = mapping_key.chars().take(100).collect();
        let thread_id = self
            .client
            .create_thread(&name, &opening)
            .await
            .map_err(|e| SyncError::Mapping(e.to_string()))?;
        tracing::debug!(container_id, mapping_key, thread_id = %thread_id, "webhook thread opened");
        Ok(thread_id)
    }
}

/// Used when no webhook is configured; every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredMappings;

#[async_trait]
impl MappingProvider for UnconfiguredMappings {
    async fn create_mapping(&self, _container_id: &str, _mapping_key: &str) -> Result<String, SyncError> {
        Err(SyncError::Mapping("no mapping provider configured (set PAGESYNC_WEBHOOK_URL)".into()))
    }
}
