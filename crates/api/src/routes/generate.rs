use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use atelier_client::{JobHandle, JobRequest};
use atelier_core::backoff::estimate_max_poll_time;
use atelier_core::format::format_duration;
use atelier_pipeline::{HistoryRecord, OutcomeStatus};

use crate::error::AppResult;
use crate::state::AppState;

/// Request body for a single generation job.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    /// Service-side operation name.
    #[validate(length(min = 1, max = 128))]
    pub operation: String,
    /// Operation parameters, passed through verbatim.
    #[serde(default)]
    pub params: Value,
    /// Override the configured poll attempt budget.
    pub max_attempts: Option<u32>,
    /// Override the configured initial poll interval.
    pub initial_interval_ms: Option<u64>,
    /// Override the configured poll interval ceiling.
    pub max_interval_ms: Option<u64>,
}

/// Terminal outcome of a generation request.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub handle: JobHandle,
    pub payload: Value,
    pub attempts: u32,
    pub elapsed_ms: u64,
    /// Human-readable form of `elapsed_ms`.
    pub elapsed: String,
    /// Worst-case poll time the schedule allowed, for comparison.
    pub max_poll_time: String,
}

/// POST /api/v1/generate -- submit one job and poll it to completion.
///
/// Holds the connection until the job reaches a terminal state; the
/// poll budget caps how long that can take.
async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    request.validate()?;

    let opts = state.poll_options(
        request.max_attempts,
        request.initial_interval_ms,
        request.max_interval_ms,
    );
    let cancel = state.shutdown.child_token();
    let operation = request.operation.clone();
    let job = JobRequest::new(request.operation, request.params);

    let result = state
        .poller
        .submit_and_poll(&job, &opts, None, &cancel)
        .await;

    match result {
        Ok(outcome) => {
            state
                .history
                .record(HistoryRecord {
                    handle: Some(outcome.handle.clone()),
                    status: OutcomeStatus::Succeeded,
                    detail: outcome.payload.clone(),
                    attempts: outcome.attempts,
                    elapsed_ms: outcome.elapsed.as_millis() as u64,
                    ..HistoryRecord::draft(&operation)
                })
                .await;

            Ok(Json(GenerateResponse {
                handle: outcome.handle,
                payload: outcome.payload,
                attempts: outcome.attempts,
                elapsed_ms: outcome.elapsed.as_millis() as u64,
                elapsed: format_duration(outcome.elapsed),
                max_poll_time: format_duration(estimate_max_poll_time(
                    opts.max_attempts,
                    opts.initial_interval,
                    opts.max_interval,
                )),
            }))
        }
        Err(err) => {
            state
                .history
                .record(HistoryRecord {
                    status: OutcomeStatus::Failed,
                    detail: serde_json::json!({
                        "kind": err.kind(),
                        "message": err.to_string(),
                    }),
                    ..HistoryRecord::draft(&operation)
                })
                .await;
            Err(err.into())
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}
