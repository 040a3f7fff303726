//! Retry policies for import submission and job polling
//!
//! Transport retries live in the HTTP client; these policies wrap whole
//! engine operations (submitting a chunk, running a poll loop).

use std::future::Future;
use std::time::Duration;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base * attempt^2`
    Quadratic { base: Duration },

    /// `initial * 2^(attempt-1)`, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn quadratic(max_attempts: usize, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Quadratic { base },
        }
    }

    pub fn exponential(max_attempts: usize, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { initial, max },
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1) as u32;
        match self.backoff {
            Backoff::Quadratic { base } => base.saturating_mul(attempt.saturating_mul(attempt)),
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt - 1);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Runs `operation` until it succeeds or the policy is exhausted
///
/// Returns the last error on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: F,
    on_retry: impl FnMut(usize, &E, Duration),
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff_if(policy, operation, |_| true, on_retry).await
}

/// Like [`retry_with_backoff`], but only errors accepted by `should_retry`
/// are retried; others are returned immediately.
///
/// `operation` receives the 1-based attempt number. `on_retry` is called with
/// the attempt that failed, its error and the delay before the next attempt.
pub async fn retry_with_backoff_if<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
    mut on_retry: impl FnMut(usize, &E, Duration),
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = policy.delay_for(attempt);
                on_retry(attempt, &e, delay);
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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_case::test_case;

    #[test_case(1, 500)]
    #[test_case(2, 2000)]
    #[test_case(3, 4500)]
    fn test_quadratic_delays(attempt: usize, expected_ms: u64) {
        let policy = RetryPolicy::quadratic(3, Duration::from_millis(500));
        assert_eq!(policy.delay_for(attempt), Duration::from_millis(expected_ms));
    }

    #[test_case(1, 2)]
    #[test_case(2, 4)]
    #[test_case(4, 16)]
    #[test_case(5, 30)]
    #[test_case(60, 30)]
    fn test_exponential_delays_are_capped(attempt: usize, expected_secs: u64) {
        let policy =
            RetryPolicy::exponential(1000, Duration::from_secs(2), Duration::from_secs(30));
        assert_eq!(policy.delay_for(attempt), Duration::from_secs(expected_secs));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicUsize::new(0);
        let mut notified = Vec::new();
        let policy = RetryPolicy::quadratic(3, Duration::from_millis(5));

        let result: Result<&str, String> = retry_with_backoff(
            &policy,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt} failed"))
                    } else {
                        Ok("done")
                    }
                }
            },
            |attempt, _err, delay| notified.push((attempt, delay)),
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            notified,
            vec![
                (1, Duration::from_millis(5)),
                (2, Duration::from_millis(20))
            ]
        );
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let policy = RetryPolicy::quadratic(3, Duration::from_millis(1));
        let result: Result<(), String> = retry_with_backoff(
            &policy,
            |attempt| async move { Err(format!("failure {attempt}")) },
            |_, _, _| {},
        )
        .await;
        assert_eq!(result.unwrap_err(), "failure 3");
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::exponential(1000, Duration::from_secs(2), Duration::from_secs(30));
        let result: Result<(), &str> = retry_with_backoff_if(
            &policy,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("job failed") }
            },
            |e| *e != "job failed",
            |_, _, _| {},
        )
        .await;
        assert_eq!(result.unwrap_err(), "job failed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
