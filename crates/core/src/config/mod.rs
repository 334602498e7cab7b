//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PAGESYNC_*)
//! 2. TOML config file (if PAGESYNC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// One remote container (database) that bulk import reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Remote container (database) id.
    pub container_id: String,

    /// Kind assigned to records imported from this container (e.g. "task").
    pub record_kind: String,

    /// Candidate title property names, tried in order.
    ///
    /// Empty means "use the default table for `record_kind`".
    #[serde(default)]
    pub title_fields: Vec<String>,
}

impl SourceConfig {
    pub fn new(container_id: impl Into<String>, record_kind: impl Into<String>) -> Self {
        Self { container_id: container_id.into(), record_kind: record_kind.into(), title_fields: Vec::new() }
    }

    /// Title property candidates, falling back to the per-kind defaults.
    pub fn title_candidates(&self) -> Vec<String> {
        if !self.title_fields.is_empty() {
            return self.title_fields.clone();
        }
        default_title_fields(&self.record_kind)
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }
}

/// Built-in title field resolution table per record kind.
pub fn default_title_fields(record_kind: &str) -> &'static [&'static str] {
    match record_kind {
        "task" => &["Task name", "Title", "Name", "title", "name"],
        _ => &["Name"],
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PAGESYNC_*)
/// 2. TOML config file (if PAGESYNC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Integration token for the content API.
    ///
    /// Set via PAGESYNC_API_TOKEN environment variable.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Base URL of the content API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Value of the API version header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Path to the SQLite database holding caches and records.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between API requests in milliseconds.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Attempts per API call, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff between retries in milliseconds (doubled per attempt).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound of the uniform random jitter added to each backoff.
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// Seconds between reconciliation passes.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Seconds between invalid-record cleanup and orphan sweeps.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Sleep after a failed pass before the loop retries.
    #[serde(default = "default_error_cooldown_secs")]
    pub error_cooldown_secs: u64,

    /// Records synced more recently than this only get an existence probe.
    #[serde(default = "default_fresh_window_secs")]
    pub fresh_window_secs: u64,

    /// Window used by status to count "recently synced" records.
    #[serde(default = "default_recent_window_secs")]
    pub recent_window_secs: u64,

    #[serde(default = "default_schema_cache_ttl_secs")]
    pub schema_cache_ttl_secs: u64,

    #[serde(default = "default_content_cache_ttl_secs")]
    pub content_cache_ttl_secs: u64,

    #[serde(default = "default_mapping_cache_ttl_secs")]
    pub mapping_cache_ttl_secs: u64,

    /// Records per sub-batch released to the batch runner at once.
    #[serde(default = "default_sub_batch_size")]
    pub sub_batch_size: usize,

    /// Pause between sub-batches in milliseconds.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Safety-net timeout for one record's whole processing.
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,

    #[serde(default = "default_min_concurrency")]
    pub min_concurrency: usize,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Items per worker when deriving a batch's concurrency.
    #[serde(default = "default_items_per_worker")]
    pub items_per_worker: usize,

    /// Outbound webhook for deletion notices and thread creation.
    ///
    /// When unset, deletion notices are only logged.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Containers read during bulk import.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_api_base_url() -> String {
    "https://api.notion.com/v1".into()
}

fn default_api_version() -> String {
    "2022-06-28".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pagesync.sqlite")
}

fn default_user_agent() -> String {
    "pagesync/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_min_request_interval_ms() -> u64 {
    334
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_retry_jitter_ms() -> u64 {
    1_000
}

fn default_sync_interval_secs() -> u64 {
    600
}

fn default_cleanup_interval_secs() -> u64 {
    3_600
}

fn default_error_cooldown_secs() -> u64 {
    60
}

fn default_fresh_window_secs() -> u64 {
    7_200
}

fn default_recent_window_secs() -> u64 {
    3_600
}

fn default_schema_cache_ttl_secs() -> u64 {
    3_600
}

fn default_content_cache_ttl_secs() -> u64 {
    600
}

fn default_mapping_cache_ttl_secs() -> u64 {
    30 * 24 * 3_600
}

fn default_sub_batch_size() -> usize {
    20
}

fn default_batch_pause_ms() -> u64 {
    500
}

fn default_item_timeout_ms() -> u64 {
    120_000
}

fn default_min_concurrency() -> usize {
    2
}

fn default_max_concurrency() -> usize {
    5
}

fn default_items_per_worker() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            sync_interval_secs: default_sync_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            error_cooldown_secs: default_error_cooldown_secs(),
            fresh_window_secs: default_fresh_window_secs(),
            recent_window_secs: default_recent_window_secs(),
            schema_cache_ttl_secs: default_schema_cache_ttl_secs(),
            content_cache_ttl_secs: default_content_cache_ttl_secs(),
            mapping_cache_ttl_secs: default_mapping_cache_ttl_secs(),
            sub_batch_size: default_sub_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            item_timeout_ms: default_item_timeout_ms(),
            min_concurrency: default_min_concurrency(),
            max_concurrency: default_max_concurrency(),
            items_per_worker: default_items_per_worker(),
            webhook_url: None,
            sources: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    pub fn fresh_window(&self) -> Duration {
        Duration::from_secs(self.fresh_window_secs)
    }

    pub fn recent_window(&self) -> Duration {
        Duration::from_secs(self.recent_window_secs)
    }

    pub fn schema_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_cache_ttl_secs)
    }

    pub fn content_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.content_cache_ttl_secs)
    }

    pub fn mapping_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.mapping_cache_ttl_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn retry_jitter(&self) -> Duration {
        Duration::from_millis(self.retry_jitter_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PAGESYNC_`
    /// 2. TOML file from `PAGESYNC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAGESYNC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("PAGESYNC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Check if the API token is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the token is not set.
    pub fn require_api_token(&self) -> Result<&str, ConfigError> {
        self.api_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "api_token".into(),
                hint: "Set PAGESYNC_API_TOKEN environment variable".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./pagesync.sqlite"));
        assert_eq!(config.user_agent, "pagesync/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.sync_interval_secs, 600);
        assert_eq!(config.cleanup_interval_secs, 3_600);
        assert_eq!(config.fresh_window_secs, 7_200);
        assert_eq!(config.schema_cache_ttl_secs, 3_600);
        assert_eq!(config.content_cache_ttl_secs, 600);
        assert_eq!(config.mapping_cache_ttl_secs, 2_592_000);
        assert!(config.api_token.is_none());
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.sync_interval(), Duration::from_secs(600));
        assert_eq!(config.error_cooldown(), Duration::from_secs(60));
        assert_eq!(config.mapping_cache_ttl(), Duration::from_secs(30 * 24 * 3_600));
    }

    #[test]
    fn test_require_api_token() {
        let config = AppConfig::default();
        assert!(matches!(config.require_api_token(), Err(ConfigError::Missing { .. })));

        let config = AppConfig { api_token: Some("   ".into()), ..Default::default() };
        assert!(config.require_api_token().is_err());

        let config = AppConfig { api_token: Some("secret".into()), ..Default::default() };
        assert_eq!(config.require_api_token().unwrap(), "secret");
    }

    #[test]
    fn test_title_candidates() {
        let task = SourceConfig::new("db-1", "task");
        assert_eq!(task.title_candidates()[0], "Task name");
        assert_eq!(task.title_candidates().len(), 5);

        let meeting = SourceConfig::new("db-2", "meeting");
        assert_eq!(meeting.title_candidates(), vec!["Name".to_string()]);

        let custom = SourceConfig { title_fields: vec!["Subject".into()], ..SourceConfig::new("db-3", "task") };
        assert_eq!(custom.title_candidates(), vec!["Subject".to_string()]);
    }

    #[test]
    fn test_load_layers_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "pagesync.toml",
                r#"
                sync_interval_secs = 300
                [[sources]]
                container_id = "db-task"
                record_kind = "task"
                "#,
            )?;
            jail.set_env("PAGESYNC_CONFIG_FILE", "pagesync.toml");
            jail.set_env("PAGESYNC_API_TOKEN", "secret");
            jail.set_env("PAGESYNC_MAX_CONCURRENCY", "8");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.sync_interval_secs, 300);
            assert_eq!(config.max_concurrency, 8);
            assert_eq!(config.api_token.as_deref(), Some("secret"));
            assert_eq!(config.sources.len(), 1);
            assert_eq!(config.sources[0].record_kind, "task");
            Ok(())
        });
    }
}
