//! HTTP route handlers.

pub mod batch;
pub mod generate;
pub mod health;
pub mod history;
pub mod watches;

use axum::Router;

use crate::state::AppState;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(generate::router())
        .merge(batch::router())
        .merge(watches::router())
        .merge(history::router())
}
