//! Lenient parsing of the date/time strings clients send.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Storage format for date/time columns; sorts lexicographically.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]`, `YYYY-MM-DD HH:MM[:SS]` or
/// RFC 3339. A bare date means midnight; an offset is dropped after
/// converting to UTC.
#[must_use]
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Formats a value for storage.
#[must_use]
pub fn to_storage(value: &NaiveDateTime) -> String {
    value.format(STORAGE_FORMAT).to_string()
}

/// Reads a stored value back; `None` for anything unparseable.
#[must_use]
pub fn from_storage(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, STORAGE_FORMAT).ok()
}
