//! Shared exponential-backoff-with-jitter retry helper: provider 429/5xx
//! responses get bounded retries with exponential backoff plus jitter, and
//! the pending-memory retry loop reuses the same policy with capped
//! attempts.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::rng().random_range(0..250);
        capped.saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// Whether a given retry-policy decision should keep retrying, and if so
/// after how long. Retriable classification is the caller's job — this
/// function only owns the attempt-count/delay bookkeeping.
pub async fn with_backoff<T, E, Fut>(
    policy: BackoffPolicy,
    is_retriable: impl Fn(&E) -> bool,
    mut attempt_fn: impl FnMut(u32) -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < policy.max_attempts && is_retriable(&e) => {
                let delay = policy.delay_for_attempt(attempt);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_and_is_capped() {
        let policy = BackoffPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            max_attempts: 10,
        };
        assert!(policy.delay_for_attempt(0) >= Duration::from_millis(100));
        assert!(policy.delay_for_attempt(0) < Duration::from_millis(350));
        // attempt 3 would be 800ms uncapped -> capped to max_delay + jitter
        assert!(policy.delay_for_attempt(3) < Duration::from_millis(750));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: 5,
        };

        let result: Result<u32, &str> = with_backoff(
            policy,
            |_: &&str| true,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("not yet")
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let policy = BackoffPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: 3,
        };

        let result: Result<u32, &str> =
            with_backoff(policy, |_: &&str| true, |_| async { Err("always fails") }).await;

        assert_eq!(result, Err("always fails"));
    }

    #[tokio::test]
    async fn non_retriable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy::default();

        let result: Result<u32, &str> = with_backoff(
            policy,
            |_: &&str| false,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("non-retriable") }
            },
        )
        .await;

        assert_eq!(result, Err("non-retriable"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
