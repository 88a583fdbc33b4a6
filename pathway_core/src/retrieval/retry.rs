//! Retry logic with exponential backoff and jitter
//!
//! Content-store calls may time out or fail on transient I/O. Each attempt
//! runs under its own timeout; failed attempts are retried a bounded number
//! of times with exponentially growing delays.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::StoreError;

/// Configuration for retry behavior
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff multiplier (default: 2.0 for exponential)
    pub backoff_factor: f64,
    /// Whether to add jitter to delay
    pub jitter: bool,
    /// Time limit for each individual attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default())
    }
}

impl RetryConfig {
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.retry_limit,
            initial_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            backoff_factor: 2.0,
            jitter: true,
            attempt_timeout: config.io_timeout(),
        }
    }

    /// Delay before retry number `retry` (0-based), before jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(retry as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// Final result of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, StoreError>,
    /// Number of attempts made, including the first
    pub attempts: u32,
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
///
/// An attempt that exceeds `attempt_timeout` counts as `StoreError::Timeout`.
pub async fn execute_with_retry<F, Fut, T>(mut operation: F, config: &RetryConfig) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = match tokio::time::timeout(config.attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(config.attempt_timeout)),
        };

        match result {
            Ok(value) => {
                return RetryOutcome { result: Ok(value), attempts };
            }
            Err(err) if err.is_retryable() && attempts <= config.max_retries => {
                let mut delay = config.delay_for(attempts - 1);
                if config.jitter && !delay.is_zero() {
                    let spread = delay.as_millis() as u64 / 4;
                    let extra = rand::thread_rng().gen_range(0..=spread);
                    delay += Duration::from_millis(extra);
                }
                warn!(attempt = attempts, error = %err, ?delay, "content store call failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return RetryOutcome { result: Err(err), attempts };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            jitter: false,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = fast_config(5);
        assert_eq!(config.delay_for(0), Duration::from_millis(10));
        assert_eq!(config.delay_for(1), Duration::from_millis(20));
        assert_eq!(config.delay_for(2), Duration::from_millis(40));
        assert_eq!(config.delay_for(10), Duration::from_millis(100));
    }

    #[test]
    fn test_from_engine_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.attempt_timeout, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome = execute_with_retry(
            || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StoreError::Io("connection reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
            &fast_config(2),
        )
        .await;

        assert_eq!(outcome.result, Ok(42));
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome: RetryOutcome<()> = execute_with_retry(
            || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::Unavailable("down".into()))
                }
            },
            &fast_config(2),
        )
        .await;

        assert!(matches!(outcome.result, Err(StoreError::Unavailable(_))));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let outcome: RetryOutcome<()> = execute_with_retry(
            || async { Err(StoreError::InvalidQuery("bad".into())) },
            &fast_config(2),
        )
        .await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let mut config = fast_config(1);
        config.attempt_timeout = Duration::from_millis(50);
        let outcome: RetryOutcome<()> = execute_with_retry(
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            &config,
        )
        .await;

        assert_eq!(outcome.result, Err(StoreError::Timeout(Duration::from_millis(50))));
        assert_eq!(outcome.attempts, 2);
    }
}
