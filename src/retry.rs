//! Retry utilities with exponential backoff and jitter.
//!
//! The engine itself enforces no wall-clock timeout or retry policy (§5 of the engine
//! spec) — that is left to provider adapters and tool implementations. This module is
//! made public so callers can apply the same backoff strategy to their own operations
//! (HTTP calls, tool execution, storage I/O) without re-deriving it.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Configuration for [`with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Base delay for the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay, before jitter is applied.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`-th retry (0-indexed: 0 is the delay before the first
    /// retry after the initial attempt), full exponential backoff with +/-25% jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let capped = exp.min(self.max_delay.as_millis() as u64);
        let jitter_frac = rand::thread_rng().gen_range(0.75..=1.25);
        let jittered = (capped as f64 * jitter_frac).round() as u64;
        Duration::from_millis(jittered)
    }
}

/// Classifies whether an error is worth retrying. Consumers typically check for
/// transport-level failures (5xx, 429, timeout, connection reset) and return false for
/// anything else so permanent errors fail fast.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `operation` with exponential backoff, retrying while `should_retry` returns true
/// for the error and attempts remain.
///
/// Logs a warning via the `log` facade before each retry.
pub async fn with_retry<T, E, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= config.max_attempts || !err.is_retryable() {
                    return Err(err);
                }
                let delay = config.delay_for(attempt - 1);
                log::warn!(
                    "retrying after error (attempt {}/{}, waiting {:?}): {}",
                    attempt,
                    config.max_attempts,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Flaky(bool);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky error")
        }
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn succeeds_after_retries() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };

        let result: Result<u32, Flaky> = with_retry(config, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Flaky(true))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };

        let result: Result<u32, Flaky> = with_retry(config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(Flaky(false)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };

        let result: Result<u32, Flaky> = with_retry(config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(Flaky(true)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
