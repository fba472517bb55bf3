//! Watch records exposed to the command layer.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Parameters for starting a new watch.
#[derive(Debug, Clone)]
pub struct StartWatch {
    /// Directory to observe.
    pub path: PathBuf,
    /// Operation applied to each new or changed file.
    pub operation: String,
    /// Operation parameters, passed through verbatim.
    pub params: Value,
    /// Where the service should place results, if the caller cares.
    pub output_folder: Option<PathBuf>,
    /// Quiet period before a scan fires. `None` uses the registry
    /// default.
    pub debounce: Option<Duration>,
    /// Observe subdirectories too.
    pub recursive: bool,
}

impl StartWatch {
    pub fn new(path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: operation.into(),
            params: Value::Null,
            output_folder: None,
            debounce: None,
            recursive: false,
        }
    }
}

/// One registered watch, as reported by list/status.
#[derive(Debug, Clone, Serialize)]
pub struct WatchEntry {
    pub id: Uuid,
    pub path: PathBuf,
    pub operation: String,
    pub params: Value,
    pub output_folder: Option<PathBuf>,
    /// `false` once stopped; stopped entries remain queryable.
    pub active: bool,
    pub recursive: bool,
    pub debounce_ms: u64,
    /// Start instant of the last completed scan. `None` until the
    /// first scan finishes.
    pub last_scan_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
