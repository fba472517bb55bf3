//! Error taxonomy shared across the connector.
//!
//! Every terminal error a caller can observe is one of these variants.
//! Other crates keep their own `thiserror` enums for transport-level
//! detail and convert into [`CoreError`] at the seam, so higher layers
//! can match on a single taxonomy.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The caller (or its cancellation token) abandoned the operation.
    /// Never retried.
    #[error("Operation cancelled")]
    Cancelled,

    /// Polling attempts were exhausted while the remote job was still
    /// processing. Distinct from a true failure: the job may yet
    /// complete on the remote side.
    #[error("Job still processing after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    /// The remote service reported a terminal error for the job.
    /// Carries the raw diagnostic payload returned by the service.
    #[error("Generation failed: {detail}")]
    GenerationFailed { detail: Value },

    /// A timeout or connection failure on a single call. Retryable
    /// when composed with the retry runner.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Invalid limiter/concurrency/poll arguments. Fails fast before
    /// any work starts.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A registry or history lookup found nothing.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The request conflicts with existing state (e.g. a path that is
    /// already being watched).
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl CoreError {
    /// Machine-checkable kind, stable across message wording changes.
    /// Used as the `code` field of API error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Cancelled => "CANCELLED",
            CoreError::PollTimeout { .. } => "POLL_TIMEOUT",
            CoreError::GenerationFailed { .. } => "GENERATION_FAILED",
            CoreError::TransientNetwork(_) => "TRANSIENT_NETWORK",
            CoreError::Configuration(_) => "CONFIGURATION",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
        }
    }

    /// Whether a retry of the whole operation could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::TransientNetwork(_) | CoreError::PollTimeout { .. }
        )
    }
}
