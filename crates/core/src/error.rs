//! Unified error types for pagesync.
//!
//! The string prefixes double as stable error codes on the MCP surface.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the pagesync engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty container id).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A cached or stored value could not be (de)serialized.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(String),

    /// A local record is malformed (e.g., empty external id).
    #[error("INVALID_RECORD: {0}")]
    InvalidRecord(String),

    /// The remote record or container does not exist or is not accessible.
    #[error("REMOTE_NOT_FOUND: {0}")]
    RemoteNotFound(String),

    /// The remote API failed in a way that may succeed later.
    #[error("REMOTE_UNAVAILABLE: {0}")]
    RemoteUnavailable(String),

    /// A reconciliation pass is already running.
    #[error("SYNC_IN_PROGRESS")]
    SyncInProgress,

    /// Creating a secondary mapping (e.g., a thread) failed.
    #[error("MAPPING_FAILED: {0}")]
    MappingFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Serialization(msg) => (-32003, msg.clone()),
            Error::InvalidRecord(msg) => (-32004, msg.clone()),
            Error::RemoteNotFound(msg) => (-32005, msg.clone()),
            Error::RemoteUnavailable(msg) => (-32006, msg.clone()),
            Error::SyncInProgress => (-32007, "A reconciliation pass is already running".to_string()),
            Error::MappingFailed(msg) => (-32008, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
