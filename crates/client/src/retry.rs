//! Retry with exponential backoff and jitter.
//!
//! `Retrying<A>` wraps any `ContentApi` and routes every call through a
//! `RetryPolicy`, so callers never see a transient failure until the
//! attempts are used up.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use pagesync_core::AppConfig;
use rand::Rng;

use crate::api::ContentApi;
use crate::notion::{ApiError, Block, Database, Page, Paginated};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound of the uniform random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1), jitter: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { max_attempts: config.retry_attempts, base_delay: config.retry_backoff(), jitter: config.retry_jitter() }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt + jitter`,
    /// never shorter than what the remote asked for.
    pub fn delay_for(&self, attempt: u32, err: &ApiError) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 { Duration::ZERO } else { Duration::from_millis(rand::rng().random_range(0..=jitter_ms)) };
        let delay = backoff.saturating_add(jitter);
        match err.retry_after() {
            Some(requested) => delay.max(requested),
            None => delay,
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The last error is returned unchanged.
    pub async fn call<T, F, Fut>(&self, op: &str, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt + 1 >= attempts => {
                    tracing::warn!(op, attempts, error = %err, "retries exhausted");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt, &err);
                    tracing::debug!(op, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// A `ContentApi` decorator that retries transient failures.
#[derive(Debug, Clone)]
pub struct Retrying<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A> Retrying<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: ContentApi> ContentApi for Retrying<A> {
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, ApiError> {
        self.policy.call("retrieve_page", || self.inner.retrieve_page(page_id)).await
    }

    async fn list_block_children(&self, block_id: &str, cursor: Option<&str>) -> Result<Paginated<Block>, ApiError> {
        self.policy
            .call("list_block_children", || self.inner.list_block_children(block_id, cursor))
            .await
    }

    async fn query_database(&self, database_id: &str, cursor: Option<&str>) -> Result<Paginated<Page>, ApiError> {
        self.policy
            .call("query_database", || self.inner.query_database(database_id, cursor))
            .await
    }

    async fn retrieve_database(&self, database_id: &str) -> Result<Database, ApiError> {
        self.policy
            .call("retrieve_database", || self.inner.retrieve_database(database_id))
            .await
    }

    async fn update_database_properties(
        &self, database_id: &str, properties: serde_json::Value,
    ) -> Result<Database, ApiError> {
        self.policy
            .call("update_database_properties", || {
                self.inner.update_database_properties(database_id, properties.clone())
            })
            .await
    }
}
