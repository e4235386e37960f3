//! Replication-key timestamps
//!
//! dbt Cloud returns timestamps in several shapes (`2023-06-01T10:00:00Z`,
//! `2023-06-01 10:00:00.123456+00:00`, offset-less values). All of them are
//! compared as UTC instants with full sub-second precision.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Ordering;

/// Upper bound of range filters
pub const RANGE_MAX: &str = "9999-12-31T23:59:59.999999";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Parse a replication-key value into a UTC instant
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(Error::InvalidTimestamp {
        value: value.to_string(),
        message: "expected an ISO-8601 date-time".to_string(),
    })
}

/// Format an instant for upstream filters: UTC, offset stripped
///
/// Microseconds are printed only when non-zero.
pub fn format_upstream(at: DateTime<Utc>) -> String {
    let naive = at.naive_utc();
    if at.timestamp_subsec_micros() == 0 {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Value of the `<key>__range` filter starting at `start`
pub fn range_filter(start: DateTime<Utc>) -> String {
    let quote = |s: &str| serde_json::Value::from(s).to_string();
    format!("[{}, {}]", quote(&format_upstream(start)), quote(RANGE_MAX))
}

/// A replication-key value as received, with its parsed instant
#[derive(Debug, Clone)]
pub struct Watermark {
    raw: String,
    at: DateTime<Utc>,
}

impl Watermark {
    /// Parse a stored or received value
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let at = parse_timestamp(&raw)?;
        Ok(Self { raw, at })
    }

    /// Value exactly as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed UTC instant
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl PartialEq for Watermark {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl Eq for Watermark {}

impl PartialOrd for Watermark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Watermark {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at)
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
