//! Per-file operation pipeline.
//!
//! Turns a set of local files into generation jobs, runs them through
//! the remote service with bounded concurrency, and records every
//! outcome in the in-memory history store. Both the batch command
//! surface and the directory watcher dispatch through here.

pub mod batch;
pub mod history;
pub mod job;

pub use batch::{process_files, BatchOptions, BatchReport};
pub use history::{HistoryRecord, HistoryStore};
pub use job::{FileJob, FileOutcome, OutcomeStatus};
