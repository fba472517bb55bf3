//! File-level job descriptions and outcomes.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};

use atelier_client::{JobHandle, JobRequest};

/// One local file scheduled for a remote operation.
#[derive(Debug, Clone)]
pub struct FileJob {
    /// The file to process.
    pub input: PathBuf,
    /// Service-side operation name.
    pub operation: String,
    /// Operation parameters, passed through verbatim.
    pub params: Value,
    /// Where the service should place results, if the caller cares.
    pub output_folder: Option<PathBuf>,
}

impl FileJob {
    /// Build the wire request for this file.
    ///
    /// The input path (and output folder, when present) are merged
    /// into the parameter document; a non-object `params` value is
    /// nested under a `params` key rather than discarded.
    pub fn to_request(&self) -> JobRequest {
        let mut params = match &self.params {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("params".to_string(), other.clone());
                map
            }
        };
        params.insert(
            "input".to_string(),
            Value::String(self.input.display().to_string()),
        );
        if let Some(folder) = &self.output_folder {
            params.insert(
                "output_folder".to_string(),
                Value::String(folder.display().to_string()),
            );
        }
        JobRequest::new(self.operation.clone(), Value::Object(params))
    }
}

/// Terminal disposition of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
}

/// What happened to one file of a batch or scan.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    /// Remote handle, when submission got that far.
    pub handle: Option<JobHandle>,
    pub status: OutcomeStatus,
    /// Output payload on success, error detail on failure.
    pub detail: Value,
}

impl FileOutcome {
    pub fn succeeded(input: PathBuf, handle: JobHandle, payload: Value) -> Self {
        Self {
            input,
            handle: Some(handle),
            status: OutcomeStatus::Succeeded,
            detail: payload,
        }
    }

    pub fn failed(input: PathBuf, handle: Option<JobHandle>, detail: Value) -> Self {
        Self {
            input,
            handle,
            status: OutcomeStatus::Failed,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_merges_input_into_object_params() {
        let job = FileJob {
            input: PathBuf::from("/data/in/photo.png"),
            operation: "upscale".to_string(),
            params: serde_json::json!({"scale": 4}),
            output_folder: Some(PathBuf::from("/data/out")),
        };

        let request = job.to_request();
        assert_eq!(request.operation, "upscale");
        assert_eq!(request.params["scale"], 4);
        assert_eq!(request.params["input"], "/data/in/photo.png");
        assert_eq!(request.params["output_folder"], "/data/out");
    }

    #[test]
    fn request_preserves_non_object_params() {
        let job = FileJob {
            input: PathBuf::from("a.png"),
            operation: "restyle".to_string(),
            params: serde_json::json!("sketch"),
            output_folder: None,
        };

        let request = job.to_request();
        assert_eq!(request.params["params"], "sketch");
        assert_eq!(request.params["input"], "a.png");
        assert!(request.params.get("output_folder").is_none());
    }

    #[test]
    fn null_params_become_an_empty_object() {
        let job = FileJob {
            input: PathBuf::from("a.png"),
            operation: "restyle".to_string(),
            params: serde_json::Value::Null,
            output_folder: None,
        };
        let request = job.to_request();
        assert_eq!(request.params["input"], "a.png");
    }
}
