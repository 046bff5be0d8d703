// ABOUTME: Utilities for working with times and timestamps.
// ABOUTME: Provides RFC3339 formatting, wall-clock labels and uptime rendering.
use ::time::{format_description::well_known::Rfc3339, OffsetDateTime};
use chrono::{DateTime, Local};
use std::time::{Duration, SystemTime};

/// Convert a SystemTime to an RFC3339 timestamp string
///
/// # Examples
///
/// ```
/// use bd_core::to_rfc3339;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let time = UNIX_EPOCH + Duration::from_secs(1_609_459_200); // 2021-01-01
/// assert_eq!(to_rfc3339(time), "2021-01-01T00:00:00Z");
/// ```
pub fn to_rfc3339(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Current time as an RFC3339 string
pub fn now_rfc3339() -> String {
    to_rfc3339(SystemTime::now())
}

/// Local wall-clock label used for chart points and table rows (`HH:MM:SS`)
pub fn clock_label(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// Label for the current local time
pub fn now_label() -> String {
    clock_label(Local::now())
}

/// Human readable uptime, e.g. `1h 2m 5s`
///
/// # Examples
///
/// ```
/// use bd_core::time::format_uptime;
/// assert_eq!(format_uptime(3725), "1h 2m 5s");
/// assert_eq!(format_uptime(0), "0s");
/// ```
pub fn format_uptime(seconds: u64) -> String {
    humantime::format_duration(Duration::from_secs(seconds)).to_string()
}
