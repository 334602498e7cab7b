//! The `PageRecord` model and its identifier rules.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Remote page ids: 32 hex digits, optionally in 8-4-4-4-12 dashed form.
static EXTERNAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9a-fA-F]{32}|[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})$")
        .expect("external id pattern is a valid regex")
});

/// Whether `id` can name a remote page.
pub fn is_valid_external_id(id: &str) -> bool {
    EXTERNAL_ID.is_match(id)
}

/// Fixed-width RFC 3339 with millisecond precision and a `Z` suffix,
/// so stored timestamps compare chronologically as strings.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored or remote RFC 3339 timestamp. Malformed input yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
}

/// The local view of one remote page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub external_id: String,
    pub container_id: String,
    pub record_kind: String,
    pub title: String,
    pub content: String,
    pub content_length: usize,
    pub owner_id: String,
    pub secondary_mapping_id: Option<String>,
    pub url: Option<String>,
    /// Last time content was fetched and compared. Never moves backwards.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last successful existence probe.
    pub last_checked_at: Option<DateTime<Utc>>,
    pub source_created_at: Option<DateTime<Utc>>,
    pub source_modified_at: Option<DateTime<Utc>>,
}

impl PageRecord {
    pub fn new(external_id: impl Into<String>, container_id: impl Into<String>, record_kind: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            container_id: container_id.into(),
            record_kind: record_kind.into(),
            title: String::new(),
            content: String::new(),
            content_length: 0,
            owner_id: String::new(),
            secondary_mapping_id: None,
            url: None,
            last_synced_at: None,
            last_checked_at: None,
            source_created_at: None,
            source_modified_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Replace the content, keeping `content_length` in step.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.set_content(content.into());
        self
    }

    pub fn set_content(&mut self, content: String) {
        self.content_length = content.chars().count();
        self.content = content;
    }

    pub fn has_valid_id(&self) -> bool {
        is_valid_external_id(&self.external_id)
    }

    /// Whether content was synced less than `window` before `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        let Some(synced) = self.last_synced_at else {
            return false;
        };
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(synced) < window
    }
}
