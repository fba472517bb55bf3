//! Batch processing: many files through the remote service at once.
//!
//! Runs each file's submit-and-poll cycle under the bounded
//! concurrency limiter. Per-file failures are isolated by default (a
//! failed file becomes a recorded outcome and the batch continues);
//! `stop_on_error` converts the first failure into a batch error after
//! in-flight files settle. Cancellation always aborts the batch.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use atelier_client::{PollOptions, StatusPoller};
use atelier_core::error::CoreError;
use atelier_core::progress::{ProgressReporter, ProgressUpdate};
use atelier_throttle::{map_with_concurrency, LimitError};

use crate::history::{HistoryRecord, HistoryStore};
use crate::job::{FileJob, FileOutcome, OutcomeStatus};

/// Tunable parameters for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Files in flight at once.
    pub concurrency: usize,
    /// Fail the whole batch on the first file error instead of
    /// recording it and continuing.
    pub stop_on_error: bool,
    /// Polling schedule applied to every file's job.
    pub poll: PollOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            stop_on_error: false,
            poll: PollOptions::default(),
        }
    }
}

/// Summary of a finished batch.
#[derive(Debug)]
pub struct BatchReport {
    /// Per-file outcomes, index-aligned with the input.
    pub outcomes: Vec<FileOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Process `jobs` through the remote service with bounded concurrency.
///
/// Every outcome, success or failure, lands in `history`. Progress is
/// reported once per settled file as `{completed, total}`.
pub async fn process_files(
    jobs: Vec<FileJob>,
    opts: &BatchOptions,
    poller: &StatusPoller,
    history: &HistoryStore,
    progress: Option<&dyn ProgressReporter>,
    cancel: &CancellationToken,
) -> Result<BatchReport, CoreError> {
    let total = jobs.len() as u32;
    let completed = AtomicU32::new(0);
    let started = Instant::now();

    let outcomes = map_with_concurrency(jobs, opts.concurrency, cancel, |job, _index| {
        let completed = &completed;
        async move {
            let outcome = run_one(&job, opts, poller, history, cancel).await?;

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(reporter) = progress {
                reporter.report(ProgressUpdate::with_message(
                    done,
                    total,
                    job.input.display().to_string(),
                ));
            }
            Ok::<_, CoreError>(outcome)
        }
    })
    .await
    .map_err(|e| match e {
        LimitError::InvalidLimit => {
            CoreError::Configuration("batch concurrency must be at least 1".to_string())
        }
        LimitError::Cancelled => CoreError::Cancelled,
        LimitError::Worker(err) => err,
    })?;

    let succeeded = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Succeeded)
        .count();
    let failed = outcomes.len() - succeeded;
    let elapsed = started.elapsed();

    tracing::info!(
        total = outcomes.len(),
        succeeded,
        failed,
        elapsed_ms = elapsed.as_millis() as u64,
        "Batch finished",
    );

    Ok(BatchReport {
        outcomes,
        succeeded,
        failed,
        elapsed,
    })
}

/// Submit-and-poll one file, recording the result in history.
///
/// Returns `Err` only for cancellation or, under `stop_on_error`, the
/// file's own failure; otherwise failures are folded into the outcome.
async fn run_one(
    job: &FileJob,
    opts: &BatchOptions,
    poller: &StatusPoller,
    history: &HistoryStore,
    cancel: &CancellationToken,
) -> Result<FileOutcome, CoreError> {
    let request = job.to_request();

    match poller
        .submit_and_poll(&request, &opts.poll, None, cancel)
        .await
    {
        Ok(result) => {
            history
                .record(HistoryRecord {
                    input: Some(job.input.clone()),
                    handle: Some(result.handle.clone()),
                    status: OutcomeStatus::Succeeded,
                    detail: result.payload.clone(),
                    attempts: result.attempts,
                    elapsed_ms: result.elapsed.as_millis() as u64,
                    ..HistoryRecord::draft(&job.operation)
                })
                .await;
            Ok(FileOutcome::succeeded(
                job.input.clone(),
                result.handle,
                result.payload,
            ))
        }
        Err(CoreError::Cancelled) => Err(CoreError::Cancelled),
        Err(err) => {
            tracing::warn!(
                input = %job.input.display(),
                operation = %job.operation,
                error = %err,
                "File processing failed",
            );
            let detail = serde_json::json!({
                "kind": err.kind(),
                "message": err.to_string(),
            });
            history
                .record(HistoryRecord {
                    input: Some(job.input.clone()),
                    status: OutcomeStatus::Failed,
                    detail: detail.clone(),
                    ..HistoryRecord::draft(&job.operation)
                })
                .await;

            if opts.stop_on_error {
                Err(err)
            } else {
                Ok(FileOutcome::failed(job.input.clone(), None, detail))
            }
        }
    }
}
