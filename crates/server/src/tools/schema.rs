//! schema_get, schema_invalidate and schema_ensure_option tools.

use pagesync_sync::SyncService;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaParams {
    /// Remote container (database) id.
    pub container_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaInvalidateOutput {
    pub container_id: String,
    /// Whether a cached schema was dropped.
    pub invalidated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnsureOptionParams {
    pub container_id: String,
    /// Select, multi-select or status property; matched case-insensitively.
    pub property: String,
    pub option: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnsureOptionOutput {
    /// Whether the remote schema was changed.
    pub added: bool,
}

pub async fn get_impl(service: &SyncService, params: SchemaParams) -> Result<CallToolResult, McpError> {
    let schema = service.get_schema(&params.container_id).await.map_err(ToolError::from)?;
    Ok(json_result(&schema)?)
}

pub async fn invalidate_impl(service: &SyncService, params: SchemaParams) -> Result<CallToolResult, McpError> {
    let invalidated = service
        .invalidate_schema(&params.container_id)
        .await
        .map_err(ToolError::from)?;
    Ok(json_result(&SchemaInvalidateOutput { container_id: params.container_id, invalidated })?)
}

pub async fn ensure_option_impl(service: &SyncService, params: EnsureOptionParams) -> Result<CallToolResult, McpError> {
    let added = service
        .ensure_select_option(&params.container_id, &params.property, &params.option)
        .await
        .map_err(ToolError::from)?;
    Ok(json_result(&EnsureOptionOutput { added })?)
}
