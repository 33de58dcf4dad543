//! Shared retry policy: bounded attempts, per-attempt timeout, exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::{PipelineError, Result};

/// Retry settings applied to every generation and extraction call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = no retries, run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
    /// Maximum wall-clock time for a single attempt (milliseconds).
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
            timeout_ms: 180_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting. Handy for tests and dry runs.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 0,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before attempt `attempt + 1`: `base * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Result of a retried call plus the number of attempts it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl<T> Retried<T> {
    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. The last error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Retried<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let timeout = Duration::from_millis(policy.timeout_ms);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(PipelineError::generation(format!(
                "{label} timed out after {} ms",
                policy.timeout_ms
            ))),
        };

        match result {
            Ok(value) => {
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                debug!(
                    op = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return Retried {
                    result: Err(err),
                    attempts: attempt,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base_ms: 1,
            timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            backoff_base_ms: 100,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let counter = Arc::new(AtomicU32::new(0));
        let out = retry_with_backoff(&fast(2), "outline", || {
            let c = counter.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(PipelineError::generation("flaky"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(out.attempts, 3);
        assert_eq!(out.result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let counter = Arc::new(AtomicU32::new(0));
        let out: Retried<()> = retry_with_backoff(&fast(1), "body", || {
            let c = counter.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::generation("down"))
            }
        })
        .await;
        assert_eq!(out.attempts, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(matches!(out.result, Err(PipelineError::Generation { .. })));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let out: Retried<()> = retry_with_backoff(&fast(5), "extract", || {
            let c = counter.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::Validation("bad".into()))
            }
        })
        .await;
        assert_eq!(out.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_generation_failure() {
        let policy = RetryPolicy {
            max_retries: 0,
            backoff_base_ms: 0,
            timeout_ms: 50,
        };
        let out: Retried<()> = retry_with_backoff(&policy, "image", || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        let err = out.result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
