//! Execution primitives that protect the remote service and bound
//! local resource usage.
//!
//! - [`RateLimiter`]: a token bucket gating every outbound call.
//! - [`run_with_retry`]: re-invokes a fallible operation with
//!   exponential backoff.
//! - [`map_with_concurrency`]: runs a batch of homogeneous jobs with
//!   at most N in flight, preserving input order.
//!
//! All three are cancellation-aware via `tokio_util`'s
//! [`CancellationToken`](tokio_util::sync::CancellationToken).

pub mod limit;
pub mod rate;
pub mod retry;

pub use limit::{map_with_concurrency, LimitError};
pub use rate::RateLimiter;
pub use retry::{run_with_retry, RetryError, RetryOptions};
