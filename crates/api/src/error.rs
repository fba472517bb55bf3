use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use atelier_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON
/// error envelopes of the form `{"error": ..., "code": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A taxonomy error from the connector core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => (core_status(core), core.kind(), core.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a taxonomy error to its HTTP status.
///
/// `PollTimeout` and the gateway-ish failures deliberately land in the
/// 5xx range: the request was well-formed, the remote side (or our
/// budget for it) is what gave out.
fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CoreError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
        CoreError::TransientNetwork(_) => StatusCode::BAD_GATEWAY,
        CoreError::Configuration(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}
