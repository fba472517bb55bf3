use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Tokens currently available in the shared rate limiter.
    pub limiter_available: f64,
    /// Watches still observing their directory.
    pub active_watches: usize,
}

/// GET /health -- service status plus limiter and watch pressure.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        limiter_available: state.limiter.available().await,
        active_watches: state.watches.active_count().await,
    })
}

/// Mount health check routes (root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
