//! mapping_get_or_create tool implementation.

use pagesync_sync::SyncService;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MappingParams {
    pub container_id: String,
    /// Caller-chosen key, usually a page id.
    pub mapping_key: String,
}

pub async fn get_or_create_impl(service: &SyncService, params: MappingParams) -> Result<CallToolResult, McpError> {
    let handle = service
        .get_or_create_mapping(&params.container_id, &params.mapping_key)
        .await
        .map_err(ToolError::from)?;
    Ok(json_result(&handle)?)
}
