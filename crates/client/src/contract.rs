//! The contract every render-service transport must satisfy.
//!
//! The poller and the batch pipeline only ever see this trait, so
//! tests can substitute a scripted in-memory client and the HTTP
//! implementation stays swappable.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use atelier_core::error::CoreError;

use crate::types::{JobHandle, JobRequest, RemoteStatus};

/// Transport-level errors from a render-service client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The cancellation token fired while the call was in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// The request itself failed: timeout, DNS, connection reset.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status code.
    #[error("Render service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether re-issuing the same call could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Api { status, .. } => *status >= 500,
            ClientError::Cancelled | ClientError::Decode(_) => false,
        }
    }
}

impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Cancelled => CoreError::Cancelled,
            ClientError::Transport(msg) => CoreError::TransientNetwork(msg),
            ClientError::Api { status, body } if status >= 500 => {
                CoreError::TransientNetwork(format!("HTTP {status}: {body}"))
            }
            ClientError::Api { status, body } => CoreError::GenerationFailed {
                detail: serde_json::json!({ "status": status, "body": body }),
            },
            ClientError::Decode(msg) => CoreError::TransientNetwork(msg),
        }
    }
}

/// A transport capable of submitting jobs and reporting their status.
///
/// Both calls accept a cancellation token (dropping the in-flight
/// request when it fires) and an optional per-call timeout override.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Submit a job for execution and return its handle.
    async fn submit(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<JobHandle, ClientError>;

    /// Query the current status of a previously submitted job.
    async fn get_status(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<RemoteStatus, ClientError>;
}
