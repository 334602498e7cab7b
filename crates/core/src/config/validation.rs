//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - the request timeout is not shorter than the sync interval
    /// - `item_timeout_ms` is shorter than the request timeout
    /// - concurrency bounds are zero or inverted
    /// - `sub_batch_size` or `retry_attempts` is zero
    /// - a source has an empty container id or an empty title field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.timeout() >= self.sync_interval() {
            return Err(invalid("timeout_ms", "must be shorter than sync_interval_secs"));
        }
        if self.item_timeout_ms < self.timeout_ms {
            return Err(invalid("item_timeout_ms", "must not be shorter than timeout_ms"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.min_concurrency == 0 {
            return Err(invalid("min_concurrency", "must be greater than 0"));
        }
        if self.min_concurrency > self.max_concurrency {
            return Err(invalid("min_concurrency", "must not exceed max_concurrency"));
        }
        if self.items_per_worker == 0 {
            return Err(invalid("items_per_worker", "must be greater than 0"));
        }
        if self.sub_batch_size == 0 {
            return Err(invalid("sub_batch_size", "must be greater than 0"));
        }
        if self.retry_attempts == 0 {
            return Err(invalid("retry_attempts", "must be at least 1"));
        }

        for source in &self.sources {
            if source.container_id.trim().is_empty() {
                return Err(invalid("sources.container_id", "must not be empty"));
            }
            if source.title_fields.iter().any(|f| f.trim().is_empty()) {
                return Err(invalid("sources.title_fields", "must not contain empty names"));
            }
        }

        if self.sources.is_empty() {
            tracing::warn!("no sources configured; bulk import will find nothing");
        }

        Ok(())
    }
}
