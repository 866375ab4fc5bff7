//! Async retry utilities with exponential backoff

use std::future::Future;
use std::time::Duration;

use crate::core::constants::{DEFAULT_PERSIST_MAX_ATTEMPTS, DEFAULT_PERSIST_RETRY_BASE_DELAY_MS};

/// Retry policy: attempt budget and backoff base.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, so the
/// defaults wait 100ms then 200ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_PERSIST_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_PERSIST_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Backoff delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Retry an async operation while its error is classified as transient.
///
/// Returns `Ok((value, attempts))` on success, or `Err((error, attempts))` once
/// the error is permanent or the attempt budget is spent.
pub async fn retry_transient<T, E, F, Fut, C>(
    policy: RetryPolicy,
    is_transient: C,
    mut operation: F,
) -> Result<(T, u32), (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok((value, attempts)),
            Err(e) => {
                if attempts >= policy.max_attempts || !is_transient(&e) {
                    return Err((e, attempts));
                }
                let delay = policy.delay_for(attempts);
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient error"
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

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, 1)
    }

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, 10).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_on_first_try() {
        let result = retry_transient(fast_policy(), |_: &&str| true, || async {
            Ok::<_, &str>(7)
        })
        .await;
        assert_eq!(result, Ok((7, 1)));
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(fast_policy(), |_: &&str| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 { Err("connection reset") } else { Ok(n) }
            }
        })
        .await;
        assert_eq!(result, Ok((3, 3)));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let result =
            retry_transient(fast_policy(), |_: &&str| true, || async {
                Err::<(), _>("timeout")
            })
            .await;
        assert_eq!(result, Err(("timeout", 3)));
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(fast_policy(), |_: &&str| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("constraint violated") }
        })
        .await;
        assert_eq!(result, Err(("constraint violated", 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
