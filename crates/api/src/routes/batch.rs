use std::path::PathBuf;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use atelier_pipeline::{process_files, BatchOptions, FileJob, FileOutcome};

use crate::error::AppResult;
use crate::state::AppState;

/// Request body for processing many files through one operation.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchRequest {
    /// Service-side operation name applied to every file.
    #[validate(length(min = 1, max = 128))]
    pub operation: String,
    /// Operation parameters shared by every file.
    #[serde(default)]
    pub params: Value,
    /// Files to process.
    #[validate(length(min = 1))]
    pub inputs: Vec<PathBuf>,
    /// Where the service should place results, if the caller cares.
    pub output_folder: Option<PathBuf>,
    /// Fail the whole batch on the first file error instead of
    /// recording it and continuing.
    #[serde(default)]
    pub stop_on_error: bool,
    /// Override the configured per-batch concurrency.
    pub concurrency: Option<usize>,
}

/// Summary of a finished batch.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub outcomes: Vec<FileOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// POST /api/v1/batch -- run every input through the operation with
/// bounded concurrency.
async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> AppResult<Json<BatchResponse>> {
    request.validate()?;

    let opts = BatchOptions {
        concurrency: request
            .concurrency
            .unwrap_or(state.config.batch_concurrency),
        stop_on_error: request.stop_on_error,
        poll: state.poll_options(None, None, None),
    };

    let jobs: Vec<FileJob> = request
        .inputs
        .into_iter()
        .map(|input| FileJob {
            input,
            operation: request.operation.clone(),
            params: request.params.clone(),
            output_folder: request.output_folder.clone(),
        })
        .collect();

    let cancel = state.shutdown.child_token();
    let report = process_files(
        jobs,
        &opts,
        &state.poller,
        &state.history,
        None,
        &cancel,
    )
    .await?;

    Ok(Json(BatchResponse {
        succeeded: report.succeeded,
        failed: report.failed,
        elapsed_ms: report.elapsed.as_millis() as u64,
        outcomes: report.outcomes,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/batch", post(run_batch))
}
