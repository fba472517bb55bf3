//! Token-bucket rate limiter for outbound calls to the remote service.
//!
//! One instance is constructed at the composition root and shared (via
//! `Arc`) by everything that talks to the service: the status poller,
//! job submission, and the batch pipeline. The check-refill-decrement
//! sequence runs under a mutex so the bucket stays consistent on a
//! multi-threaded runtime.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use atelier_core::error::CoreError;

/// Token bucket with continuous refill.
///
/// Tokens accumulate at `refill_per_sec` up to `capacity`; each
/// permitted call spends exactly one.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a bucket that starts full.
    ///
    /// Fails with a configuration error if `capacity` or
    /// `refill_per_sec` is not strictly positive.
    pub fn new(capacity: f64, refill_per_sec: f64) -> Result<Self, CoreError> {
        if capacity <= 0.0 || !capacity.is_finite() {
            return Err(CoreError::Configuration(format!(
                "rate limiter capacity must be positive, got {capacity}"
            )));
        }
        if refill_per_sec <= 0.0 || !refill_per_sec.is_finite() {
            return Err(CoreError::Configuration(format!(
                "rate limiter refill rate must be positive, got {refill_per_sec}"
            )));
        }

        Ok(Self {
            capacity,
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Maximum number of stored tokens.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Reserve one token, waiting for refill if the bucket is empty.
    ///
    /// If `cancel` fires while waiting, the acquisition fails with
    /// [`CoreError::Cancelled`] and no token is consumed.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }

                // Time until the bucket reaches one whole token.
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Reserve one token only if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refill. Diagnostic only.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_per_sec", &self.refill_per_sec)
            .finish()
    }
}
