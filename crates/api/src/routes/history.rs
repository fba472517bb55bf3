use axum::extract::{Path, Query, State};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use atelier_core::error::CoreError;
use atelier_pipeline::HistoryRecord;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    /// Maximum records to return, newest first.
    pub limit: Option<usize>,
}

/// GET /api/v1/history -- recent job outcomes, newest first.
async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Vec<HistoryRecord>> {
    Json(state.history.list(params.limit).await)
}

/// GET /api/v1/history/{id} -- one recorded outcome.
async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<HistoryRecord>> {
    let record = state
        .history
        .get(id)
        .await
        .ok_or(CoreError::NotFound {
            entity: "history record",
            id: id.to_string(),
        })?;
    Ok(Json(record))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/history", get(list_history))
        .route("/history/{id}", get(get_history))
}
