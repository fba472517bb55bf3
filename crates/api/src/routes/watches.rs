use std::path::PathBuf;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use atelier_watch::{StartWatch, WatchEntry};

use crate::error::AppResult;
use crate::state::AppState;

/// Request body for starting a watch.
#[derive(Debug, Deserialize, Validate)]
pub struct StartWatchRequest {
    /// Directory to observe.
    pub path: PathBuf,
    /// Operation applied to each new or changed file.
    #[validate(length(min = 1, max = 128))]
    pub operation: String,
    /// Operation parameters, passed through verbatim.
    #[serde(default)]
    pub params: Value,
    /// Where the service should place results, if the caller cares.
    pub output_folder: Option<PathBuf>,
    /// Override the configured quiet period.
    pub debounce_ms: Option<u64>,
    /// Observe subdirectories too.
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    /// Exclude stopped watches from the listing.
    #[serde(default)]
    pub active_only: bool,
}

/// POST /api/v1/watches -- start watching a directory.
async fn start_watch(
    State(state): State<AppState>,
    Json(request): Json<StartWatchRequest>,
) -> AppResult<(StatusCode, Json<WatchEntry>)> {
    request.validate()?;

    let entry = state
        .watches
        .start(StartWatch {
            path: request.path,
            operation: request.operation,
            params: request.params,
            output_folder: request.output_folder,
            debounce: request.debounce_ms.map(Duration::from_millis),
            recursive: request.recursive,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/v1/watches -- list watches, optionally active only.
async fn list_watches(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<WatchEntry>> {
    Json(state.watches.list(params.active_only).await)
}

/// GET /api/v1/watches/{id} -- one watch including its last scan time.
async fn watch_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WatchEntry>> {
    Ok(Json(state.watches.status(id).await?))
}

/// DELETE /api/v1/watches/{id} -- soft-deactivate a watch.
async fn stop_watch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WatchEntry>> {
    Ok(Json(state.watches.stop(id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/watches", post(start_watch).get(list_watches))
        .route("/watches/{id}", get(watch_status).delete(stop_watch))
}
