//! Conversions between wire-format float seconds and [`Duration`].
//!
//! The protocol carries positions as JSON floats. These helpers convert them
//! with explicit saturation instead of lossy `as` casts.

use std::time::Duration;

/// Convert float seconds to a duration.
///
/// Negative and NaN inputs map to zero; values beyond the representable
/// range saturate at [`Duration::MAX`].
#[must_use]
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Format a position as `m:ss`, truncating fractional seconds.
#[must_use]
pub fn format_clock(secs: f64) -> String {
    let total = duration_from_secs(secs).as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}
