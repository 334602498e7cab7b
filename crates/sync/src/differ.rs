//! Content differ: fetch rendered page text and compare it with what we have.

use std::sync::Arc;

use pagesync_client::{ApiError, ContentApi, fetch_page_text};
use pagesync_core::TtlCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDiff {
    pub content: String,
    pub changed: bool,
}

#[derive(Clone)]
pub struct ContentDiffer {
    api: Arc<dyn ContentApi>,
    cache: TtlCache,
}

impl ContentDiffer {
    pub fn new(api: Arc<dyn ContentApi>, cache: TtlCache) -> Self {
        Self { api, cache }
    }

    /// Rendered text of a page, served from the content cache when allowed.
    ///
    /// A fresh fetch always repopulates the cache, empty content included.
    pub async fn get_content(&self, external_id: &str, use_cache: bool) -> Result<String, ApiError> {
        if use_cache && let Some(cached) = self.cache.get(external_id).await {
            tracing::debug!(external_id, "content cache hit");
            return Ok(cached);
        }

        let content = fetch_page_text(self.api.as_ref(), external_id).await?;
        self.cache.put(external_id, &content).await;
        Ok(content)
    }

    /// Current content (cache-first) compared byte-for-byte with `known`.
    ///
    /// `known == None` means the record was never synced, which always counts
    /// as a change. Fetch failures are returned as-is and never imply deletion.
    pub async fn fetch_and_diff(&self, external_id: &str, known: Option<&str>) -> Result<ContentDiff, ApiError> {
        let content = self.get_content(external_id, true).await?;
        let changed = known.is_none_or(|known| known != content);
        Ok(ContentDiff { content, changed })
    }
}
