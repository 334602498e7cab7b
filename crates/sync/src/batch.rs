//! Bounded-concurrency batch runner.
//!
//! Items are released in sub-batches with a pause in between. Inside a
//! sub-batch at most `limit` tasks run at once (semaphore permits), each
//! under a timeout. One item failing, timing out, or panicking never affects
//! its siblings. Cancellation lets the current sub-batch drain and stops
//! later sub-batches from starting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pagesync_core::AppConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub sub_batch_size: usize,
    pub pause: Duration,
    pub item_timeout: Duration,
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub items_per_worker: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl BatchConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sub_batch_size: config.sub_batch_size,
            pause: config.batch_pause(),
            item_timeout: config.item_timeout(),
            min_concurrency: config.min_concurrency,
            max_concurrency: config.max_concurrency,
            items_per_worker: config.items_per_worker,
        }
    }

    /// Concurrency for `items` work items: one worker per `items_per_worker`,
    /// clamped to `[min_concurrency, max_concurrency]`.
    pub fn concurrency_for(&self, items: usize) -> usize {
        let max = self.max_concurrency.max(1);
        let min = self.min_concurrency.clamp(1, max);
        (items / self.items_per_worker.max(1)).clamp(min, max)
    }
}

/// Why one item produced no result.
#[derive(Debug, thiserror::Error)]
pub enum BatchItemError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("timed out")]
    TimedOut,

    #[error("task panicked: {0}")]
    Panicked(String),

    /// Never started because the batch was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// Run `work` over `items` with at most `limit` in flight.
///
/// Results come back in input order.
pub async fn run_batch<T, R, E, F, Fut>(
    items: Vec<T>, limit: usize, config: &BatchConfig, cancel: &CancellationToken, work: F,
) -> Vec<Result<R, BatchItemError<E>>>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let total = items.len();
    let mut results: Vec<Option<Result<R, BatchItemError<E>>>> = (0..total).map(|_| None).collect();
    let work = Arc::new(work);
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let sub_batch_size = config.sub_batch_size.max(1);

    let mut pending = items.into_iter().enumerate().peekable();
    let mut sub_batch = 0usize;

    'outer: while pending.peek().is_some() {
        if sub_batch > 0 && !config.pause.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(config.pause) => {}
                _ = cancel.cancelled() => break 'outer,
            }
        }
        if cancel.is_cancelled() {
            break;
        }

        let mut join_set = JoinSet::new();
        let mut spawned = Vec::with_capacity(sub_batch_size);

        for (idx, item) in pending.by_ref().take(sub_batch_size) {
            // Cancellation is only observed between sub-batches.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };

            let work = Arc::clone(&work);
            let item_timeout = config.item_timeout;
            spawned.push(idx);
            join_set.spawn(async move {
                let _permit = permit;
                let outcome = match tokio::time::timeout(item_timeout, work(item)).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(BatchItemError::Failed(err)),
                    Err(_) => Err(BatchItemError::TimedOut),
                };
                (idx, outcome)
            });
        }

        let mut panics = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => results[idx] = Some(outcome),
                Err(err) => panics.push(err.to_string()),
            }
        }

        // A joined task only fails to report when it panicked.
        let mut panics = panics.into_iter();
        for idx in spawned {
            if results[idx].is_none() {
                let message = panics.next().unwrap_or_else(|| "task aborted".into());
                tracing::error!(item = idx, error = %message, "batch item panicked");
                results[idx] = Some(Err(BatchItemError::Panicked(message)));
            }
        }

        sub_batch += 1;
        tracing::debug!(sub_batch, total, "sub-batch complete");
    }

    results
        .into_iter()
        .map(|r| r.unwrap_or(Err(BatchItemError::Cancelled)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> BatchConfig {
        BatchConfig {
            sub_batch_size: 20,
            pause: Duration::ZERO,
            item_timeout: Duration::from_secs(5),
            min_concurrency: 2,
            max_concurrency: 5,
            items_per_worker: 10,
        }
    }

    #[test]
    fn test_concurrency_for() {
        let config = config();
        assert_eq!(config.concurrency_for(0), 2);
        assert_eq!(config.concurrency_for(5), 2);
        assert_eq!(config.concurrency_for(30), 3);
        assert_eq!(config.concurrency_for(50), 5);
        assert_eq!(config.concurrency_for(10_000), 5);
    }

    #[tokio::test]
    async fn test_results_in_input_order() {
        let items: Vec<u64> = (0..30).collect();
        let results = run_batch(items, 4, &config(), &CancellationToken::new(), |n| async move {
            tokio::time::sleep(Duration::from_millis(30 - n)).await;
            Ok::<_, String>(n * 2)
        })
        .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..30).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (in_flight_c, peak_c) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let results = run_batch((0..40).collect(), 3, &config(), &CancellationToken::new(), move |_: u32| {
            let in_flight = Arc::clone(&in_flight_c);
            let peak = Arc::clone(&peak_c);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            }
        })
        .await;

        assert_eq!(results.len(), 40);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let results = run_batch((0..6).collect(), 2, &config(), &CancellationToken::new(), |n: u32| async move {
            match n {
                1 => Err("boom".to_string()),
                3 => panic!("item three"),
                _ => Ok(n),
            }
        })
        .await;

        assert_eq!(results.len(), 6);
        assert!(matches!(results[0], Ok(0)));
        assert!(matches!(&results[1], Err(BatchItemError::Failed(e)) if e == "boom"));
        assert!(matches!(results[2], Ok(2)));
        assert!(matches!(results[3], Err(BatchItemError::Panicked(_))));
        assert!(matches!(results[4], Ok(4)));
        assert!(matches!(results[5], Ok(5)));
    }

    #[tokio::test]
    async fn test_item_timeout() {
        let config = BatchConfig { item_timeout: Duration::from_millis(20), ..config() };
        let results = run_batch(vec![0u64, 500], 2, &config, &CancellationToken::new(), |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, ()>(ms)
        })
        .await;

        assert!(matches!(results[0], Ok(0)));
        assert!(matches!(results[1], Err(BatchItemError::TimedOut)));
    }

    #[tokio::test]
    async fn test_cancel_stops_later_sub_batches() {
        let config = BatchConfig { sub_batch_size: 2, pause: Duration::from_secs(30), ..config() };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let results = run_batch((0..6).collect(), 2, &config, &cancel, move |n: u32| {
            let trigger = trigger.clone();
            async move {
                if n == 1 {
                    trigger.cancel();
                }
                Ok::<_, ()>(n)
            }
        })
        .await;

        assert!(matches!(results[0], Ok(0)));
        assert!(matches!(results[1], Ok(1)));
        assert!(results[2..].iter().all(|r| matches!(r, Err(BatchItemError::Cancelled))));
    }

    #[tokio::test]
    async fn test_cancel_drains_current_sub_batch() {
        let config = BatchConfig { sub_batch_size: 4, ..config() };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let results = run_batch((0..8).collect(), 1, &config, &cancel, move |n: u32| {
            let trigger = trigger.clone();
            async move {
                if n == 0 {
                    trigger.cancel();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, ()>(n)
            }
        })
        .await;

        for (n, result) in results[..4].iter().enumerate() {
            assert!(matches!(result, Ok(v) if *v as usize == n));
        }
        assert!(results[4..].iter().all(|r| matches!(r, Err(BatchItemError::Cancelled))));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results =
            run_batch(Vec::<u32>::new(), 2, &config(), &CancellationToken::new(), |n| async move { Ok::<_, ()>(n) })
                .await;
        assert!(results.is_empty());
    }
}
