//! Structured errors for the pagesync tools.
//!
//! Tool failures are folded into `pagesync_core::Error` so the MCP surface
//! reports the same stable codes everywhere.

use pagesync_client::ApiError;
use pagesync_core::Error;
use pagesync_sync::SyncError;
use rmcp::model::ErrorData as McpError;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Tool output could not be encoded.
    #[error("SERIALIZATION_ERROR: {0}")]
    Encode(#[from] serde_json::Error),
}

fn api_error(err: ApiError) -> Error {
    match err {
        ApiError::NotFound(_) | ApiError::Forbidden(_) | ApiError::Unauthorized(_) => {
            Error::RemoteNotFound(err.to_string())
        }
        ApiError::BadRequest(msg) => Error::InvalidInput(msg),
        other => Error::RemoteUnavailable(other.to_string()),
    }
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Sync(SyncError::Store(e)) => e,
            ToolError::Sync(SyncError::Api(e)) => api_error(e),
            ToolError::Sync(SyncError::AlreadyRunning) => Error::SyncInProgress,
            ToolError::Sync(SyncError::Notify(msg)) => Error::RemoteUnavailable(msg),
            ToolError::Sync(SyncError::Mapping(msg)) => Error::MappingFailed(msg),
            ToolError::Sync(SyncError::InvalidInput(msg)) => Error::InvalidInput(msg),
            ToolError::Encode(e) => Error::Serialization(e.to_string()),
        }
    }
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        Error::from(err).into()
    }
}
