//! Reconciliation engine for pagesync.
//!
//! This crate keeps the local page store consistent with the remote content
//! API. It provides:
//!
//! - A bounded-concurrency batch runner with per-item timeouts
//! - The existence prober and content differ
//! - The reconciliation pass, bulk import and cleanup sweeps
//! - The scheduler loop driving passes on an interval
//! - `SyncService`, the outbound surface used by operators

pub mod batch;
pub mod cleanup;
pub mod context;
pub mod differ;
pub mod engine;
pub mod error;
pub mod import;
pub mod notify;
pub mod prober;
pub mod scheduler;
pub mod service;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchConfig, BatchItemError, run_batch};
pub use context::EngineContext;
pub use differ::{ContentDiff, ContentDiffer};
pub use engine::{ReconciliationEngine, SyncSummary};
pub use error::SyncError;
pub use notify::{DeletionNotice, LogNotifier, MappingProvider, NotificationSink};
pub use prober::{Existence, ExistenceProber};
pub use scheduler::{Scheduler, SyncCursor};
pub use service::{MappingHandle, PropertySchema, Schema, SyncService, SyncStatus};
pub use settings::SyncSettings;
