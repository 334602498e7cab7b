//! Cursor-following helpers over the paginated endpoints.

use crate::api::ContentApi;
use crate::notion::{ApiError, Page};

/// Guard against a remote that keeps answering `has_more` forever.
const MAX_PAGES: usize = 10_000;

/// Fetch every block of a page and join the non-blank text segments with `\n`.
///
/// Segments are trimmed and kept in page order. Blocks without rich text
/// (dividers, images, ...) contribute nothing.
pub async fn fetch_page_text(api: &dyn ContentApi, page_id: &str) -> Result<String, ApiError> {
    let mut segments: Vec<String> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut blocks = 0usize;

    for _ in 0..MAX_PAGES {
        let batch = api.list_block_children(page_id, cursor.as_deref()).await?;
        blocks += batch.results.len();
        segments.extend(
            batch
                .results
                .iter()
                .filter_map(|block| block.plain_text())
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
        );

        match batch.continuation() {
            Some(next) => cursor = Some(next.to_string()),
            None => {
                if batch.has_more {
                    tracing::warn!(page_id, "has_more without next_cursor; stopping");
                }
                break;
            }
        }
    }

    let text = segments.join("\n");
    tracing::debug!(page_id, blocks, chars = text.len(), "page text extracted");
    Ok(text)
}

/// Collect every page returned by a database query.
pub async fn query_all_pages(api: &dyn ContentApi, database_id: &str) -> Result<Vec<Page>, ApiError> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let batch = api.query_database(database_id, cursor.as_deref()).await?;
        let next = batch.continuation().map(str::to_string);
        pages.extend(batch.results);
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::debug!(database_id, pages = pages.len(), "database query complete");
    Ok(pages)
}
