//! cache_purge tool implementation.
//!
//! Drops expired entries from the schema, content and mapping caches. Reads
//! already evict lazily; this compacts entries nobody asks for again.

use pagesync_sync::SyncService;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

pub async fn purge_impl(service: &SyncService) -> Result<CallToolResult, McpError> {
    let deleted = service.purge_caches().await.map_err(ToolError::from)?;
    Ok(json_result(&CachePurgeOutput { deleted })?)
}
