//! Engine tunables derived from `AppConfig`.

use std::time::Duration;

use pagesync_core::{AppConfig, SourceConfig};

use crate::batch::BatchConfig;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub sync_interval: Duration,
    pub cleanup_interval: Duration,
    pub error_cooldown: Duration,
    /// Records synced within this window only get an existence probe.
    pub fresh_window: Duration,
    pub recent_window: Duration,
    pub batch: BatchConfig,
    pub sources: Vec<SourceConfig>,
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sync_interval: config.sync_interval(),
            cleanup_interval: config.cleanup_interval(),
            error_cooldown: config.error_cooldown(),
            fresh_window: config.fresh_window(),
            recent_window: config.recent_window(),
            batch: BatchConfig::from_config(config),
            sources: config.sources.clone(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
