//! sync_trigger and sync_status tools.

use pagesync_sync::SyncService;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;
use crate::error::ToolError;

/// Run a reconciliation pass now and return its summary.
pub async fn trigger_impl(service: &SyncService) -> Result<CallToolResult, McpError> {
    let summary = service.trigger_manual_sync().await.map_err(ToolError::from)?;
    Ok(json_result(&summary)?)
}

pub async fn status_impl(service: &SyncService) -> Result<CallToolResult, McpError> {
    let status = service.get_sync_status().await.map_err(ToolError::from)?;
    Ok(json_result(&status)?)
}
