//! Status poller: tracks a submitted job to a terminal state.
//!
//! The completion protocol is poll-based: the remote service exposes a
//! single "get current status" call, and the poller re-issues it with
//! a 1.5x adaptive backoff capped at a ceiling until the job reaches a
//! terminal state, attempts run out, or the caller cancels. Every
//! status call passes through the shared rate limiter.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use atelier_core::backoff::{next_poll_interval, validate_schedule};
use atelier_core::error::CoreError;
use atelier_core::format::format_duration;
use atelier_core::progress::{ProgressReporter, ProgressUpdate};
use atelier_throttle::{run_with_retry, RateLimiter, RetryError, RetryOptions};

use crate::contract::GenerationClient;
use crate::types::{JobHandle, JobRequest, RemoteStatus};

/// Tunable parameters for one polling run.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Status checks allowed before giving up.
    pub max_attempts: u32,
    /// Wait after the first "still processing" answer.
    pub initial_interval: Duration,
    /// Ceiling for the growing wait.
    pub max_interval: Duration,
    /// Per-call timeout override passed to the transport. `None` uses
    /// the transport default.
    pub call_timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            call_timeout: None,
        }
    }
}

impl PollOptions {
    /// Fail fast on schedules that could never terminate sensibly.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_schedule(self.max_attempts, 1.0)?;
        if self.initial_interval.is_zero() {
            return Err(CoreError::Configuration(
                "initial poll interval must be positive".to_string(),
            ));
        }
        if self.max_interval < self.initial_interval {
            return Err(CoreError::Configuration(
                "max poll interval must be >= initial interval".to_string(),
            ));
        }
        Ok(())
    }
}

/// Terminal result of a successful polling run.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// Handle of the job that completed.
    pub handle: JobHandle,
    /// Output payload returned by the service.
    pub payload: serde_json::Value,
    /// Status checks issued, including the terminal one.
    pub attempts: u32,
    /// Wall-clock time from first check to terminal answer.
    pub elapsed: Duration,
}

/// Tracks remote jobs to completion on behalf of all callers.
///
/// Constructed once at the composition root; the client, rate limiter
/// and retry schedule are injected so tests can substitute scripted
/// instances.
pub struct StatusPoller {
    client: Arc<dyn GenerationClient>,
    limiter: Arc<RateLimiter>,
    submit_retry: RetryOptions,
}

impl StatusPoller {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        limiter: Arc<RateLimiter>,
        submit_retry: RetryOptions,
    ) -> Self {
        Self {
            client,
            limiter,
            submit_retry,
        }
    }

    /// Submit a job, then poll it to a terminal state.
    ///
    /// The submission call is rate-limited and retried on transient
    /// transport failures; the polling loop has its own attempt
    /// budget and is never retried as a whole.
    pub async fn submit_and_poll(
        &self,
        request: &JobRequest,
        opts: &PollOptions,
        progress: Option<&dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, CoreError> {
        opts.validate()?;

        let handle = run_with_retry(
            || async {
                self.limiter.acquire(cancel).await?;
                self.client
                    .submit(request, cancel, opts.call_timeout)
                    .await
                    .map_err(CoreError::from)
            },
            &self.submit_retry,
            CoreError::is_retryable,
            None,
            cancel,
        )
        .await
        .map_err(|e| match e {
            RetryError::Cancelled => CoreError::Cancelled,
            RetryError::Operation(err) => err,
        })?;

        self.poll_for_result(&handle, opts, progress, cancel).await
    }

    /// Poll an already-submitted job until a terminal state, timeout,
    /// or cancellation.
    ///
    /// Never returns a "still processing" result: the outcome is
    /// success, [`CoreError::GenerationFailed`],
    /// [`CoreError::PollTimeout`], [`CoreError::TransientNetwork`]
    /// (when the final allowed check itself failed), or
    /// [`CoreError::Cancelled`].
    pub async fn poll_for_result(
        &self,
        handle: &JobHandle,
        opts: &PollOptions,
        progress: Option<&dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, CoreError> {
        opts.validate()?;

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let started = Instant::now();
        let mut interval = opts.initial_interval;
        let mut attempt: u32 = 1;

        loop {
            self.limiter.acquire(cancel).await?;
            let status = self
                .client
                .get_status(handle, cancel, opts.call_timeout)
                .await;

            if let Some(reporter) = progress {
                reporter.report(ProgressUpdate::with_message(
                    attempt,
                    opts.max_attempts,
                    format!("status check {attempt}/{}", opts.max_attempts),
                ));
            }

            match status {
                Ok(RemoteStatus::Completed(payload)) => {
                    let elapsed = started.elapsed();
                    tracing::info!(
                        handle = %handle,
                        attempts = attempt,
                        elapsed = %format_duration(elapsed),
                        "Job completed",
                    );
                    return Ok(PollOutcome {
                        handle: handle.clone(),
                        payload,
                        attempts: attempt,
                        elapsed,
                    });
                }
                Ok(RemoteStatus::Failed(detail)) => {
                    tracing::warn!(handle = %handle, attempts = attempt, "Job failed remotely");
                    return Err(CoreError::GenerationFailed { detail });
                }
                Ok(RemoteStatus::Processing) => {
                    if attempt >= opts.max_attempts {
                        return Err(CoreError::PollTimeout { attempts: attempt });
                    }
                }
                Err(err) if err.is_transient() => {
                    // One failed check spends one attempt but does not
                    // end the run; the job may still be progressing.
                    tracing::warn!(
                        handle = %handle,
                        attempt,
                        error = %err,
                        "Status check failed, will poll again",
                    );
                    if attempt >= opts.max_attempts {
                        return Err(CoreError::TransientNetwork(err.to_string()));
                    }
                }
                Err(err) => return Err(err.into()),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }

            interval = next_poll_interval(interval, opts.max_interval);
            attempt += 1;
        }
    }
}
