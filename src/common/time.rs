//! Forensic timestamps
//!
//! Capture timestamps are UTC, ISO-8601 with a `Z` suffix and microsecond
//! resolution. Within one process they never go backwards, even if the wall
//! clock is stepped.

use std::sync::atomic::{AtomicI64, Ordering};
use chrono::{DateTime, SecondsFormat, Utc};

/// Last timestamp handed out, in microseconds since the Unix epoch
static LAST_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current UTC time as a monotonic, non-decreasing instant
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    let micros = now.timestamp_micros();
    let previous = LAST_MICROS.fetch_max(micros, Ordering::SeqCst);
    if previous > micros {
        DateTime::from_timestamp_micros(previous).unwrap_or(now)
    } else {
        now
    }
}

/// Current time formatted for evidence records, e.g. `2024-05-01T12:00:00.123456Z`
pub fn now_forensic() -> String {
    format_forensic(&now_utc())
}

/// Format an instant the way all evidence timestamps are written
pub fn format_forensic(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}
