//! Elapsed-time formatting shared by manifest footers and console summaries.
//!
//! Durations are rendered as `HH:MM:SS:mmm`. Hours are total hours rather than
//! hours-of-day, so a run longer than a day keeps counting (`25:00:00:000`)
//! instead of wrapping.

use std::time::Duration;

/// Formats a duration as `HH:MM:SS:mmm` (zero-padded, millisecond precision).
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_millis = elapsed.as_millis();

    let millis = total_millis % 1000;
    let total_seconds = total_millis / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;

    format!("{hours:02}:{minutes:02}:{seconds:02}:{millis:03}")
}
