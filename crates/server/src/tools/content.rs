//! page_content tool implementation.
//!
//! Returns the rendered plain text of one page.

use pagesync_sync::SyncService;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageContentParams {
    /// Page id (32 hex digits, dashed or not).
    pub external_id: String,

    /// Serve from the content cache when present (default: true).
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageContentOutput {
    pub external_id: String,
    pub content: String,
    /// Length in characters.
    pub content_length: usize,
}

pub async fn content_impl(service: &SyncService, params: PageContentParams) -> Result<CallToolResult, McpError> {
    let content = service
        .get_content(&params.external_id, params.use_cache)
        .await
        .map_err(ToolError::from)?;
    let output = PageContentOutput {
        content_length: content.chars().count(),
        external_id: params.external_id,
        content,
    };
    Ok(json_result(&output)?)
}
