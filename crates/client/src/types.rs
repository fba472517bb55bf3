//! Wire-level types shared by the client contract and its consumers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque token correlating a submitted remote job with later status
/// queries. Created at submission, held only while polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A generation job as submitted to the remote service.
///
/// The connector treats `params` as an opaque document; building and
/// validating it is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Service-side operation name (e.g. `upscale`, `generate`).
    pub operation: String,
    /// Operation parameters, passed through verbatim.
    pub params: Value,
}

impl JobRequest {
    pub fn new(operation: impl Into<String>, params: Value) -> Self {
        Self {
            operation: operation.into(),
            params,
        }
    }
}

/// Remote job status as reported by a single "get current status"
/// call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteStatus {
    /// Not yet terminal; poll again later.
    Processing,
    /// Terminal success, with the service's output payload.
    Completed(Value),
    /// Terminal failure, with the service's diagnostic payload.
    Failed(Value),
}

impl RemoteStatus {
    /// Whether no further transition can occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoteStatus::Processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_through_display() {
        let handle = JobHandle::new("job-123");
        assert_eq!(handle.to_string(), "job-123");
        assert_eq!(handle.as_str(), "job-123");
    }

    #[test]
    fn processing_is_not_terminal() {
        assert!(!RemoteStatus::Processing.is_terminal());
        assert!(RemoteStatus::Completed(Value::Null).is_terminal());
        assert!(RemoteStatus::Failed(Value::Null).is_terminal());
    }

    #[test]
    fn handle_serializes_as_bare_string() {
        let handle = JobHandle::new("abc");
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"abc\"");
    }
}
