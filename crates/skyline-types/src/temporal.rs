use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::TypeError;

/// Parse an author-supplied `createdAt` value.
///
/// Records carry RFC 3339 datetimes with an explicit offset. Anything else
/// (missing offset, bare dates, free text) is rejected.
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TypeError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Canonical storage form: UTC, millisecond precision, `Z` suffix.
///
/// This form sorts lexicographically in time order, which the index relies
/// on for `ORDER BY indexedAt`.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse and normalize in one step.
pub fn normalize_datetime(value: &str) -> Result<String, TypeError> {
    parse_datetime(value).map(|dt| format_datetime(&dt))
}

/// Current wall-clock time in storage form.
pub fn now_timestamp() -> String {
    format_datetime(&Utc::now())
}
