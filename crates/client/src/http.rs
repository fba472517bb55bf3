//! Reqwest-based implementation of the render-service contract.
//!
//! Wraps the service's HTTP API: `POST /v1/jobs` to submit, `GET
//! /v1/jobs/{id}` for the single "get current status" call the poller
//! depends on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::contract::{ClientError, GenerationClient};
use crate::types::{JobHandle, JobRequest, RemoteStatus};

/// Default timeout for a single HTTP call when no per-call override is
/// given.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single render-service endpoint.
pub struct RenderApi {
    client: reqwest::Client,
    base_url: String,
    /// Correlation id sent with every submission so the service can
    /// attribute jobs to this connector instance.
    client_id: String,
}

/// Response returned by the submission endpoint.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Response returned by the status endpoint.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl RenderApi {
    /// Create a client for a service instance.
    ///
    /// * `base_url` - base HTTP URL, e.g. `http://host:8800`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_CALL_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url,
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across instances).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url,
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Base HTTP URL of the service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    /// Run `request`, racing it against the cancellation token. A
    /// fired token drops the in-flight request.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = request.send() => result.map_err(|e| ClientError::Transport(e.to_string())),
        }
    }

    /// Ensure a success status, surfacing the body text otherwise.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GenerationClient for RenderApi {
    async fn submit(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<JobHandle, ClientError> {
        let body = serde_json::json!({
            "operation": request.operation,
            "params": request.params,
            "client_id": self.client_id,
        });

        let mut builder = self
            .client
            .post(format!("{}/v1/jobs", self.base_url))
            .json(&body);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        let response = self.execute(builder, cancel).await?;
        let submitted: SubmitResponse = Self::parse_response(response).await?;

        tracing::info!(
            operation = %request.operation,
            job_id = %submitted.job_id,
            "Job submitted to render service",
        );

        Ok(JobHandle::new(submitted.job_id))
    }

    async fn get_status(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<RemoteStatus, ClientError> {
        let mut builder = self
            .client
            .get(format!("{}/v1/jobs/{}", self.base_url, handle));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        let response = self.execute(builder, cancel).await?;
        let status: StatusResponse = Self::parse_response(response).await?;

        match status.status.as_str() {
            "queued" | "processing" => Ok(RemoteStatus::Processing),
            "completed" => Ok(RemoteStatus::Completed(
                status.output.unwrap_or(serde_json::Value::Null),
            )),
            "failed" => Ok(RemoteStatus::Failed(
                status.error.unwrap_or(serde_json::Value::Null),
            )),
            other => Err(ClientError::Decode(format!(
                "unknown job status: '{other}'"
            ))),
        }
    }
}
