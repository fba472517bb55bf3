//! Pure backoff math.
//!
//! Both the retry runner and the status poller derive their wait times
//! from these functions; keeping the arithmetic here makes the delay
//! schedules testable without a clock.

use std::time::Duration;

use crate::error::CoreError;

/// Interval growth factor for status polling.
///
/// Generation jobs typically finish within seconds to tens of seconds:
/// a flat interval wastes calls early, while unbounded growth risks
/// large detection latency late. 1.5x growth capped at a ceiling sits
/// between the two.
pub const POLL_BACKOFF_FACTOR: f64 = 1.5;

/// Delay before the n-th retry (1-based): `initial * multiplier^(n-1)`.
///
/// Attempt 0 is treated as attempt 1 so callers cannot produce a
/// negative exponent.
pub fn retry_delay(initial: Duration, multiplier: f64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let scale = multiplier.powi(exponent as i32);
    Duration::from_millis((initial.as_millis() as f64 * scale) as u64)
}

/// Next polling interval: `current * 1.5`, clamped to `max`.
pub fn next_poll_interval(current: Duration, max: Duration) -> Duration {
    let next_ms = (current.as_millis() as f64 * POLL_BACKOFF_FACTOR) as u64;
    Duration::from_millis(next_ms).min(max)
}

/// Worst-case total wait across a full polling run.
///
/// Sums the capped 1.5x series for `max_attempts` intervals starting at
/// `initial`. Used only for user-facing time estimates, never for
/// control flow.
pub fn estimate_max_poll_time(max_attempts: u32, initial: Duration, max: Duration) -> Duration {
    let mut total = Duration::ZERO;
    let mut interval = initial.min(max);
    for _ in 0..max_attempts {
        total += interval;
        interval = next_poll_interval(interval, max);
    }
    total
}

/// Validate a retry/poll schedule before any work starts.
pub fn validate_schedule(max_attempts: u32, multiplier: f64) -> Result<(), CoreError> {
    if max_attempts == 0 {
        return Err(CoreError::Configuration(
            "max_attempts must be at least 1".to_string(),
        ));
    }
    if multiplier < 1.0 {
        return Err(CoreError::Configuration(format!(
            "backoff multiplier must be >= 1.0, got {multiplier}"
        )));
    }
    Ok(())
}
