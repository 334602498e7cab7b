//! Core types and shared functionality for pagesync.
//!
//! This crate provides:
//! - Local SQLite database with migrations
//! - TTL cache store (schema, content and mapping caches)
//! - Page record store
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod records;

pub use cache::{CacheEntry, CacheNamespace, Caches, TtlCache};
pub use config::{AppConfig, ConfigError, SourceConfig};
pub use db::LocalDb;
pub use error::Error;
pub use records::{PageRecord, RecordStore};
