//! Debounced directory watching.
//!
//! Observes filesystem locations, coalesces bursts of change events
//! into single scans, and dispatches newly seen files through the
//! per-file operation pipeline. The [`WatchRegistry`](registry::WatchRegistry)
//! owns every watch and exposes the start/stop/list/status lifecycle;
//! all of its state is process-memory-only and vanishes on restart by
//! design.

pub mod entry;
pub mod registry;
pub mod scanner;

pub use entry::{StartWatch, WatchEntry};
pub use registry::{WatchDefaults, WatchRegistry};
