//! Human-readable duration formatting for progress messages and time
//! estimates.

use std::time::Duration;

/// Format a duration the way it is shown to users.
///
/// Sub-second values render as milliseconds, sub-minute values as whole
/// seconds, and larger values as `"Xm Ys"` / `"Xh Ym"` with zero
/// remainders omitted.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis() as u64;

    if ms < 1_000 {
        return format!("{ms}ms");
    }

    let secs = ms / 1_000;
    if secs < 60 {
        return format!("{secs}s");
    }

    let mins = secs / 60;
    let rem_secs = secs % 60;
    if mins < 60 {
        return if rem_secs == 0 {
            format!("{mins}m")
        } else {
            format!("{mins}m {rem_secs}s")
        };
    }

    let hours = mins / 60;
    let rem_mins = mins % 60;
    if rem_mins == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {rem_mins}m")
    }
}
