//! Retry utilities for per-city weather fetches.
//!
//! Transient failures are retried with a fixed delay up to a bounded number of
//! attempts. Permanent failures return immediately. The delay suspends only the
//! future being retried, so other cities in the same task keep progressing.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use weathervane_core::RetryConfig;
use weathervane_weather::FetchError;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay())
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Should retry the operation
    Retry,
    /// Should not retry - permanent failure
    NoRetry,
}

/// Errors that know whether another attempt may succeed
pub trait Retryable {
    fn retry_decision(&self) -> RetryDecision;
}

impl Retryable for FetchError {
    fn retry_decision(&self) -> RetryDecision {
        if self.is_retryable() {
            RetryDecision::Retry
        } else {
            RetryDecision::NoRetry
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up.
///
/// `operation` receives the 1-based attempt number. On exhaustion the error of
/// the last attempt is returned.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("Succeeded on attempt {} of {}", attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(e) => {
                if e.retry_decision() == RetryDecision::NoRetry {
                    tracing::debug!("Non-retryable error: {}", e);
                    return Err(e);
                }

                if attempt >= max_attempts {
                    tracing::error!("All {} attempts exhausted: {}", max_attempts, e);
                    return Err(e);
                }

                tracing::warn!(
                    "Retryable error on attempt {} of {}, waiting {:?}: {}",
                    attempt,
                    max_attempts,
                    policy.delay,
                    e
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(RetryDecision);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error ({:?})", self.0)
        }
    }

    impl Retryable for TestError {
        fn retry_decision(&self) -> RetryDecision {
            self.0
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(60));
        assert_eq!(policy, RetryPolicy::from_config(&RetryConfig::default()));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_always_transient_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = with_retry(&fast(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError(RetryDecision::Retry)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = with_retry(&fast(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError(RetryDecision::NoRetry)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_on_later_attempt() {
        let result: Result<u32, TestError> = with_retry(&fast(3), |attempt| async move {
            if attempt < 2 {
                Err(TestError(RetryDecision::Retry))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_waits_between_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(20));
        let started = std::time::Instant::now();
        let _: Result<(), TestError> =
            with_retry(&policy, |_| async { Err(TestError(RetryDecision::Retry)) }).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
