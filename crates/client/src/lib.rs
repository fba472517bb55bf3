//! Client library for the remote render service.
//!
//! Provides the [`GenerationClient`](contract::GenerationClient)
//! contract, its reqwest-based HTTP implementation, and the status
//! poller that tracks submitted jobs to completion.

pub mod contract;
pub mod http;
pub mod poll;
pub mod types;

pub use contract::{ClientError, GenerationClient};
pub use http::RenderApi;
pub use poll::{PollOptions, PollOutcome, StatusPoller};
pub use types::{JobHandle, JobRequest, RemoteStatus};
