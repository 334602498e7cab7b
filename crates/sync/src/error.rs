//! Sync error types.

use pagesync_client::ApiError;

/// Errors surfaced by the reconciliation engine and `SyncService`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[from] pagesync_core::Error),

    /// Remote API failure after retries.
    #[error("remote error: {0}")]
    Api(#[from] ApiError),

    #[error("a reconciliation pass is already running")]
    AlreadyRunning,

    /// The notification sink rejected a deletion notice.
    #[error("notification failed: {0}")]
    Notify(String),

    /// The mapping provider could not create a handle.
    #[error("mapping failed: {0}")]
    Mapping(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
