//! HTTP command surface for the atelier connector.
//!
//! Exposes single-job generation, batch processing, the watch
//! lifecycle, and the in-memory history over a small axum API. The
//! [`state::AppState`] constructor doubles as the composition root:
//! every shared component (rate limiter, poller, registry, history) is
//! built there and passed down by reference.

pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
