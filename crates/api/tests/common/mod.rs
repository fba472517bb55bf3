use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use atelier_api::config::Settings;
use atelier_api::router::build_router;
use atelier_api::state::AppState;
use atelier_client::{ClientError, GenerationClient, JobHandle, JobRequest, RemoteStatus};

/// Scripted transport keyed on the operation name:
///
/// - `"reject"`   -- submission fails with HTTP 422
/// - `"explode"`  -- completes submission, then reports remote failure
/// - `"slow"`     -- never leaves the processing state
/// - anything else completes on the first status check
pub struct FakeRenderService;

#[async_trait]
impl GenerationClient for FakeRenderService {
    async fn submit(
        &self,
        request: &JobRequest,
        _cancel: &CancellationToken,
        _timeout: Option<Duration>,
    ) -> Result<JobHandle, ClientError> {
        if request.operation == "reject" {
            return Err(ClientError::Api {
                status: 422,
                body: "unknown operation".to_string(),
            });
        }
        Ok(JobHandle::new(format!("job-{}", request.operation)))
    }

    async fn get_status(
        &self,
        handle: &JobHandle,
        _cancel: &CancellationToken,
        _timeout: Option<Duration>,
    ) -> Result<RemoteStatus, ClientError> {
        match handle.as_str() {
            "job-explode" => Ok(RemoteStatus::Failed(
                serde_json::json!({"reason": "sampler crashed"}),
            )),
            "job-slow" => Ok(RemoteStatus::Processing),
            _ => Ok(RemoteStatus::Completed(
                serde_json::json!({"image": "out.png"}),
            )),
        }
    }
}

/// Build test `Settings` with fast poll defaults and safe local
/// values; no environment variables involved.
pub fn test_settings() -> Settings {
    Settings {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        render_api_url: "http://localhost:0".to_string(),
        rate_limit_capacity: 1_000.0,
        rate_limit_refill_per_sec: 1_000.0,
        poll_max_attempts: 5,
        poll_initial_interval: Duration::from_millis(5),
        poll_max_interval: Duration::from_millis(20),
        watch_debounce: Duration::from_millis(50),
        batch_concurrency: 3,
    }
}

/// Build the application state around the scripted transport, through
/// the production composition root.
pub fn build_test_state() -> AppState {
    AppState::new(test_settings(), Arc::new(FakeRenderService)).expect("valid test settings")
}

/// Full router with the production middleware stack.
pub fn build_test_app() -> Router {
    build_router(build_test_state())
}

/// Router over a caller-supplied state (for tests that need to
/// inspect history or the registry afterwards).
pub fn app_with_state(state: &AppState) -> Router {
    build_router(state.clone())
}

// ---- request helpers ----

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request build"),
    )
    .await
    .expect("request run")
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request build"),
    )
    .await
    .expect("request run")
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .expect("request build"),
    )
    .await
    .expect("request run")
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Assert the standard error envelope and return its `code`.
pub async fn error_code(response: Response<Body>, expected_status: StatusCode) -> String {
    assert_eq!(response.status(), expected_status);
    let json = body_json(response).await;
    assert!(json["error"].is_string(), "envelope missing error: {json}");
    json["code"].as_str().expect("envelope missing code").to_string()
}
