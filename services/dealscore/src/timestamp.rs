//! Tolerant timestamp parsing for CRM exports

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde_json::Value;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse a raw JSON timestamp value into a UTC instant.
///
/// Strings are read as ISO-8601; numbers as epoch milliseconds, where a
/// float must be a whole number. Anything else (null, bool, objects)
/// yields `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => epoch_millis(n).and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn epoch_millis(n: &serde_json::Number) -> Option<i64> {
    if let Some(ms) = n.as_i64() {
        return Some(ms);
    }
    let ms = n.as_f64()?;
    // i64::MAX as f64 rounds up, so the upper bound is exclusive
    if ms.fract() != 0.0 || ms < i64::MIN as f64 || ms >= i64::MAX as f64 {
        return None;
    }
    Some(ms as i64)
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(dt) = parse_with_offset(s) {
        return Some(dt);
    }

    // Exports append a literal "Z" even after an explicit offset
    // ("...+00:00Z"), so strip it and retry before falling back to naive UTC.
    let stripped = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix('z'))
        .unwrap_or(s);
    if stripped.len() != s.len() {
        if let Some(dt) = parse_with_offset(stripped) {
            return Some(dt);
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(stripped, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_with_offset(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Elapsed time in fractional seconds, falling back to whole seconds when
/// the span is too large for microsecond precision.
pub fn delta_seconds(delta: TimeDelta) -> f64 {
    delta
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| delta.num_seconds() as f64)
}

pub fn delta_hours(delta: TimeDelta) -> f64 {
    delta_seconds(delta) / 3600.0
}

pub fn delta_days(delta: TimeDelta) -> f64 {
    delta_seconds(delta) / 86_400.0
}
