//! Format checks for string-valued settings: cron schedules, durations, URLs
//! and the name patterns shared by several passes.
//!
//! Each checker returns a typed error; the passes always wrap it into a
//! [`crate::errors::ValidationError`].

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

static EVENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)+$").expect("valid regex"));
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));
static IDENTIFIER_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid regex")
});
static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid regex"));
static PASCAL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("valid regex"));
static VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v?\d+(\.\d+)*$").expect("valid regex"));

/// Lowercase dotted segments with at least one dot, e.g. `user.created`.
pub fn is_event_name(s: &str) -> bool {
    EVENT_NAME.is_match(s)
}

pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// An identifier or a dotted path of identifiers (`user.id`).
pub fn is_identifier_path(s: &str) -> bool {
    IDENTIFIER_PATH.is_match(s)
}

pub fn is_numeric(s: &str) -> bool {
    NUMERIC.is_match(s)
}

pub fn is_pascal_case(s: &str) -> bool {
    PASCAL_CASE.is_match(s)
}

/// `1`, `v2`, `v1.2.3`.
pub fn is_version(s: &str) -> bool {
    VERSION.is_match(s)
}

// ============================================================================
// Durations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("expected a number at '{0}'")]
    MissingNumber(String),
    #[error("missing unit after '{0}' (use ns, us, ms, s, m or h)")]
    MissingUnit(String),
    #[error("unknown unit '{0}' (use ns, us, ms, s, m or h)")]
    UnknownUnit(String),
    #[error("duration out of range")]
    OutOfRange,
}

/// Parses a duration such as `30m`, `1h30m` or `1.5s`.
///
/// A bare `0` is accepted; every other component needs a unit.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let mut rest = s;
    let mut total_secs = 0.0f64;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..num_len];
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(DurationError::MissingNumber(rest.to_string()));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| DurationError::MissingNumber(rest.to_string()))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let scale = match unit {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(DurationError::MissingUnit(number.to_string())),
            other => return Err(DurationError::UnknownUnit(other.to_string())),
        };
        total_secs += value * scale;
        rest = &rest[unit_len..];
    }
    Duration::try_from_secs_f64(total_secs).map_err(|_| DurationError::OutOfRange)
}

// ============================================================================
// Cron
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("unknown descriptor '{0}'")]
    UnknownDescriptor(String),
    #[error("invalid {field} field '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

const DESCRIPTORS: &[&str] = &[
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

const MONTHS: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAYS: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

struct CronField {
    name: &'static str,
    min: u32,
    max: u32,
    /// Symbolic names; index 0 maps to `min`.
    names: &'static [&'static str],
}

const FIELDS: [CronField; 5] = [
    CronField { name: "minute", min: 0, max: 59, names: &[] },
    CronField { name: "hour", min: 0, max: 23, names: &[] },
    CronField { name: "day-of-month", min: 1, max: 31, names: &[] },
    CronField { name: "month", min: 1, max: 12, names: MONTHS },
    CronField { name: "day-of-week", min: 0, max: 7, names: WEEKDAYS },
];

/// Checks a standard five-field cron expression or an `@descriptor`.
pub fn validate_cron(expr: &str) -> Result<(), CronError> {
    let expr = expr.trim();
    if expr.starts_with('@') {
        return if DESCRIPTORS.contains(&expr) {
            Ok(())
        } else {
            Err(CronError::UnknownDescriptor(expr.to_string()))
        };
    }
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() != FIELDS.len() {
        return Err(CronError::FieldCount(parts.len()));
    }
    for (part, field) in parts.iter().zip(FIELDS.iter()) {
        for item in part.split(',') {
            check_cron_item(item, field)?;
        }
    }
    Ok(())
}

fn check_cron_item(item: &str, field: &CronField) -> Result<(), CronError> {
    let invalid = || CronError::InvalidField {
        field: field.name,
        value: item.to_string(),
    };
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    if let Some(step) = step {
        match step.parse::<u32>() {
            Ok(n) if n > 0 => {}
            _ => return Err(invalid()),
        }
    }
    if base == "*" {
        return Ok(());
    }
    match base.split_once('-') {
        Some((lo, hi)) => {
            let lo = cron_value(lo, field).ok_or_else(invalid)?;
            let hi = cron_value(hi, field).ok_or_else(invalid)?;
            check_range(lo, field)?;
            check_range(hi, field)?;
            if lo > hi {
                return Err(invalid());
            }
        }
        None => {
            let value = cron_value(base, field).ok_or_else(invalid)?;
            check_range(value, field)?;
        }
    }
    Ok(())
}

fn cron_value(text: &str, field: &CronField) -> Option<u32> {
    if let Ok(n) = text.parse::<u32>() {
        return Some(n);
    }
    let upper = text.to_ascii_uppercase();
    field
        .names
        .iter()
        .position(|n| *n == upper)
        .map(|i| field.min + i as u32)
}

fn check_range(value: u32, field: &CronField) -> Result<(), CronError> {
    if value < field.min || value > field.max {
        return Err(CronError::OutOfRange {
            field: field.name,
            value,
            min: field.min,
            max: field.max,
        });
    }
    Ok(())
}

// ============================================================================
// URLs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("{0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
    #[error("missing host")]
    MissingHost,
}

/// Checks that `s` is an absolute http(s) URL with a host.
pub fn validate_url(s: &str) -> Result<(), UrlError> {
    let url = Url::parse(s)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }
    Ok(())
}
