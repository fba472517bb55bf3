//! Bounded-concurrency map over a batch of homogeneous jobs.
//!
//! Workers start greedily in input order, at most `limit` unsettled at
//! a time. Results come back index-aligned with the input regardless
//! of completion order. A failing worker stops new starts but lets
//! already-started workers settle before the error propagates.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

/// Why a bounded map ended without a full result set.
#[derive(Debug, thiserror::Error)]
pub enum LimitError<E> {
    /// `limit` was zero. Raised before any worker starts.
    #[error("Concurrency limit must be at least 1")]
    InvalidLimit,

    /// The cancellation token fired; in-flight workers were drained,
    /// unstarted items abandoned.
    #[error("Batch cancelled")]
    Cancelled,

    /// The first worker error, surfaced after in-flight workers
    /// settled.
    #[error(transparent)]
    Worker(E),
}

impl<E> LimitError<E> {
    /// Unwrap the worker error, if that is what ended the batch.
    pub fn into_worker(self) -> Option<E> {
        match self {
            LimitError::Worker(e) => Some(e),
            _ => None,
        }
    }
}

/// Map `items` through `worker` with at most `limit` in flight.
///
/// Each worker receives `(item, index)`; the result vector has the
/// same length and index correspondence as the input. Empty input
/// returns immediately without spawning anything. Cancellation is
/// checked before each new start; workers already running are never
/// force-cancelled by the limiter itself.
pub async fn map_with_concurrency<T, R, E, W, Fut>(
    items: Vec<T>,
    limit: usize,
    cancel: &CancellationToken,
    worker: W,
) -> Result<Vec<R>, LimitError<E>>
where
    W: Fn(T, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    if limit == 0 {
        return Err(LimitError::InvalidLimit);
    }

    let total = items.len();
    let mut results: Vec<Option<R>> = Vec::with_capacity(total);
    results.resize_with(total, || None);

    let worker = &worker;
    // One closure so every pushed future has the same opaque type.
    let start = |index: usize, item: T| async move { (index, worker(item, index).await) };

    let mut pending = items.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();
    let mut first_error: Option<LimitError<E>> = None;
    let mut feeding = true;

    loop {
        while feeding && in_flight.len() < limit {
            if cancel.is_cancelled() {
                feeding = false;
                first_error.get_or_insert(LimitError::Cancelled);
                break;
            }
            match pending.next() {
                Some((index, item)) => in_flight.push(start(index, item)),
                None => {
                    feeding = false;
                    break;
                }
            }
        }

        match in_flight.next().await {
            Some((index, Ok(result))) => results[index] = Some(result),
            Some((_, Err(error))) => {
                feeding = false;
                first_error.get_or_insert(LimitError::Worker(error));
            }
            // All started workers have settled.
            None => break,
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }

    Ok(results
        .into_iter()
        .map(|slot| slot.expect("every input index produced a result"))
        .collect())
}
