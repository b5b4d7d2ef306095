//! Rate-limit retry policy for ledger reads

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::ports::LedgerError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Non-retryable error, returned on first occurrence
    #[error(transparent)]
    Fatal(LedgerError),
    #[error("Gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: LedgerError },
}

/// Exponential backoff applied only to `LedgerError::RateLimited`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the n-th failed attempt (1-based): `base * 2^(n-1)`
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Total time slept when every attempt is rate limited
    pub fn worst_case_delay(&self) -> Duration {
        (1..self.max_attempts).map(|n| self.delay_after(n)).sum()
    }

    /// Run `operation` until it succeeds, fails fatally, or the attempt
    /// ceiling is reached. No sleep follows the final attempt.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, RetryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(RetryError::Fatal(e)),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        "{} rate limited (attempt {}/{}), retrying in {:?}",
                        operation_name,
                        attempt,
                        self.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
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

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
        assert_eq!(policy.worst_case_delay(), Duration::from_secs(15));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::from_millis(5)).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let result = RetryPolicy::default()
            .run("getSlot", || async { Ok::<_, LedgerError>(7u64) })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_fatal_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();

        let result = RetryPolicy::default()
            .run("getAccountInfo", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(LedgerError::Fatal("invalid param".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_sleeps_fifteen_seconds() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();
        let start = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run("getLatestBlockhash", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(LedgerError::RateLimited("429".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 5, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();

        let result = RetryPolicy::default()
            .run("getSlot", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(LedgerError::RateLimited("429".into()))
                    } else {
                        Ok(42u64)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
