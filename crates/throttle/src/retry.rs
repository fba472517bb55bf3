//! Generic retry-with-backoff runner.
//!
//! Re-invokes a fallible async operation until success, a
//! non-retryable error, attempt exhaustion, or cancellation. The delay
//! schedule is deterministic: `initial * multiplier^(n-1)` before the
//! n-th retry.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use atelier_core::backoff::retry_delay;

/// Tunable parameters for a retry schedule.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Total invocations allowed, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

/// Outcome of an exhausted or abandoned retry loop.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The cancellation token fired before or between attempts.
    #[error("Operation cancelled")]
    Cancelled,

    /// The last operation error, propagated unchanged.
    #[error(transparent)]
    Operation(E),
}

impl<E> RetryError<E> {
    /// Unwrap the operation error, if that is what ended the loop.
    pub fn into_operation(self) -> Option<E> {
        match self {
            RetryError::Cancelled => None,
            RetryError::Operation(e) => Some(e),
        }
    }
}

/// Run `operation` until it succeeds or retries are exhausted.
///
/// - `is_retryable` decides per error whether another attempt is
///   worthwhile; a `false` verdict propagates the error immediately.
/// - `on_retry`, when present, observes `(error, attempt, delay)` just
///   before each backoff sleep.
/// - An already-fired `cancel` token fails the call before the first
///   invocation; a token fired during a backoff sleep interrupts it.
pub async fn run_with_retry<T, E, Op, Fut, Retryable>(
    mut operation: Op,
    options: &RetryOptions,
    mut is_retryable: Retryable,
    mut on_retry: Option<&mut (dyn FnMut(&E, u32, Duration) + Send)>,
    cancel: &CancellationToken,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Retryable: FnMut(&E) -> bool,
    E: std::error::Error,
{
    if cancel.is_cancelled() {
        return Err(RetryError::Cancelled);
    }

    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let out_of_attempts = attempt >= options.max_attempts;
                if out_of_attempts || !is_retryable(&error) || cancel.is_cancelled() {
                    return Err(RetryError::Operation(error));
                }

                let delay = retry_delay(options.initial_delay, options.multiplier, attempt);
                tracing::debug!(
                    attempt,
                    max_attempts = options.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, backing off before retry",
                );
                if let Some(observer) = on_retry.as_mut() {
                    observer(&error, attempt, delay);
                }

                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error, PartialEq)]
    enum FakeError {
        #[error("transient glitch")]
        Transient,
        #[error("fatal: {0}")]
        Fatal(String),
    }

    fn options(max_attempts: u32, initial_ms: u64) -> RetryOptions {
        RetryOptions {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
            multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = Arc::clone(&calls);
        let cancel = CancellationToken::new();

        let mut observed: Vec<(u32, Duration)> = Vec::new();
        let mut observer = |_: &FakeError, attempt: u32, delay: Duration| {
            observed.push((attempt, delay));
        };

        let result = run_with_retry(
            move || {
                let calls = Arc::clone(&calls_inner);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= 2 {
                        Err(FakeError::Transient)
                    } else {
                        Ok(n)
                    }
                }
            },
            &options(5, 100),
            |_| true,
            Some(&mut observer),
            &cancel,
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // on_retry fired exactly twice with the deterministic schedule.
        assert_eq!(
            observed,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_last_error_unchanged() {
        let cancel = CancellationToken::new();
        let result: Result<u32, _> = run_with_retry(
            || async { Err(FakeError::Fatal("disk full".into())) },
            &options(3, 10),
            |_| true,
            None,
            &cancel,
        )
        .await;

        let err = result.unwrap_err().into_operation().unwrap();
        assert_eq!(err, FakeError::Fatal("disk full".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_fails_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = Arc::clone(&calls);
        let cancel = CancellationToken::new();

        let result: Result<u32, _> = run_with_retry(
            move || {
                let calls = Arc::clone(&calls_inner);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FakeError::Fatal("bad request".into()))
                }
            },
            &options(5, 10),
            |e| matches!(e, FakeError::Transient),
            None,
            &cancel,
        )
        .await;

        assert_matches!(result, Err(RetryError::Operation(FakeError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_skips_the_operation() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = Arc::clone(&calls);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<u32, _> = run_with_retry(
            move || {
                let calls = Arc::clone(&calls_inner);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FakeError::Transient)
                }
            },
            &options(3, 10),
            |_| true,
            None,
            &cancel,
        )
        .await;

        assert_matches!(result, Err(RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_interrupts_the_sleep() {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        // Fire the token partway through the first backoff sleep.
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let result: Result<u32, _> = run_with_retry(
            || async { Err(FakeError::Transient) },
            &options(3, 1_000),
            |_| true,
            None,
            &cancel,
        )
        .await;

        assert_matches!(result, Err(RetryError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_needs_no_retries() {
        let cancel = CancellationToken::new();
        let result: Result<&str, RetryError<FakeError>> =
            run_with_retry(|| async { Ok("done") }, &options(3, 10), |_| true, None, &cancel)
                .await;
        assert_eq!(result.unwrap(), "done");
    }
}
