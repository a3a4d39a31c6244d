//! Lenient timestamp parsing for issue-tracker dates.
//!
//! Accepts RFC 3339 / ISO-8601 with `Z` or an offset (with or without a
//! colon), offset-less ISO-8601, and a few `date[ time]` layouts.
//! Offset-less values are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Layouts that carry an explicit offset, tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Offset-less layouts, read as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

const DATE_ONLY_FORMAT: &str = "%Y-%m-%d";

/// Parse a timestamp in any supported layout, or `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>>
{
    let s = raw.trim();
    if s.is_empty()
    {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s)
    {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS
    {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt)
        {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS
    {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt)
        {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, DATE_ONLY_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days between two instants, floored (so -1h is -1 day).
pub fn whole_days_between(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> i64
{
    (end - start)
        .num_seconds()
        .div_euclid(86_400)
}
