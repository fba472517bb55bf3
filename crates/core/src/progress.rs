//! Progress-reporting contract.
//!
//! Reporters are fire-and-forget: `report` must not block and carries
//! no delivery guarantee. Call sites take `Option<&dyn
//! ProgressReporter>` and silently skip reporting when absent.

use serde::Serialize;

/// A single progress observation.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    /// Units of work finished so far (poll attempts, files processed).
    pub completed: u32,
    /// Total units of work expected.
    pub total: u32,
    /// Optional human-readable context for the update.
    pub message: Option<String>,
}

impl ProgressUpdate {
    pub fn new(completed: u32, total: u32) -> Self {
        Self {
            completed,
            total,
            message: None,
        }
    }

    pub fn with_message(completed: u32, total: u32, message: impl Into<String>) -> Self {
        Self {
            completed,
            total,
            message: Some(message.into()),
        }
    }
}

/// Observer for long-running operations.
pub trait ProgressReporter: Send + Sync {
    /// Record one observation. Implementations must not block.
    fn report(&self, update: ProgressUpdate);
}

/// Reporter that collects updates in memory. Intended for tests and
/// for building batch summaries.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    updates: std::sync::Mutex<Vec<ProgressUpdate>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates observed so far, in arrival order.
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().expect("reporter lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().expect("reporter lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, update: ProgressUpdate) {
        self.updates
            .lock()
            .expect("reporter lock poisoned")
            .push(update);
    }
}
