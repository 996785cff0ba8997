//! Retry utilities shared by the fal.ai and OpenAI clients.
//!
//! Attempts are bounded: an operation runs at most `max_retries + 1` times.
//! Between attempts the caller's decision function picks the wait, or aborts
//! for errors that will not resolve on retry (content policy rejections).

use std::future::Future;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait the given delay, then try again (if attempts remain).
    RetryAfter(Duration),
    /// Give up immediately.
    Abort,
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total number of attempts this policy allows.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Decision function that retries every error after the fixed delay.
    pub fn fixed<E>(&self) -> impl Fn(&E) -> RetryDecision {
        let delay = self.delay;
        move |_| RetryDecision::RetryAfter(delay)
    }
}

/// Final failure after the retry loop stopped.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Number of attempts actually made.
    pub attempts: u32,
    /// Error returned by the last attempt.
    pub last: E,
}

/// Run `operation` until it succeeds, the decision aborts, or attempts run out.
///
/// The operation receives the zero-based attempt index.
pub async fn retry_async<T, E, F, Fut, D>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    decide: D,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    D: Fn(&E) -> RetryDecision,
{
    let total = policy.total_attempts();
    let mut attempt = 0u32;

    loop {
        log::info!("{} (attempt {}/{})", label, attempt + 1, total);

        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        log::error!("{} failed (attempt {}): {}", label, attempt + 1, error);

        let attempts = attempt + 1;
        if attempts >= total {
            log::error!("All {} attempts failed", total);
            return Err(RetryError {
                attempts,
                last: error,
            });
        }

        match decide(&error) {
            RetryDecision::Abort => {
                log::warn!("Not retrying after: {}", error);
                return Err(RetryError {
                    attempts,
                    last: error,
                });
            }
            RetryDecision::RetryAfter(delay) => {
                if !delay.is_zero() {
                    log::info!("Retrying in {:?}...", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_total_attempts() {
        assert_eq!(RetryPolicy::new(2, Duration::ZERO).total_attempts(), 3);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).total_attempts(), 1);
    }

    #[tokio::test]
    async fn test_every_attempt_fails() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result: Result<(), _> = retry_async(
            &policy,
            "op",
            |_| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>("boom") }
            },
            policy.fixed(),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last, "boom");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_succeeds_on_second_attempt() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result = retry_async(
            &policy,
            "op",
            |attempt| async move {
                if attempt == 0 {
                    Err("transient")
                } else {
                    Ok(attempt)
                }
            },
            policy.fixed(),
        )
        .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_abort_stops_immediately() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let result: Result<(), _> = retry_async(
            &policy,
            "op",
            |_| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>("policy") }
            },
            |_: &&str| RetryDecision::Abort,
        )
        .await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts_only() {
        let policy = RetryPolicy::new(2, Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        let _: Result<(), _> =
            retry_async(&policy, "op", |_| async { Err::<(), _>("x") }, policy.fixed()).await;
        // Two waits between three attempts, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
