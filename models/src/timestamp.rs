// models/src/timestamp.rs
//! Parsing of caller-supplied dates. Appointment times are normalized to UTC;
//! everything is stored and emitted as RFC 3339.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

use crate::errors::{ValidationErrors, ValidationResult};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Accepts RFC 3339, a naive ISO datetime (taken as UTC) or a bare date (midnight UTC).
/// Sub-millisecond digits are dropped; slots are compared at millisecond precision.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    parse_any_datetime(raw).map(|dt| dt.trunc_subsecs(3))
}

fn parse_any_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Same as [`parse_datetime`], but reports the offending field.
pub fn parse_datetime_field(field: &str, raw: &str) -> ValidationResult<DateTime<Utc>> {
    parse_datetime(raw)
        .ok_or_else(|| ValidationErrors::single(field, format!("'{}' is not a valid date", raw)))
}

/// Accepts `YYYY-MM-DD` or any RFC 3339 timestamp (its date part is kept).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}
