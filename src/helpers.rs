//! Shared helpers for loosely typed upstream values.
//!
//! Upstream payloads are inconsistent about types: SMHI delivers observation
//! values as strings, station `updated` fields as epoch milliseconds, and other
//! sources use ISO-8601 strings. Everything that has to cope with that lives
//! here so call sites deal with one representation only:
//!
//! - `normalize_timestamp`: string or number → `DateTime<Utc>`
//! - `parse_numeric`: string or number → finite `f64`
//! - `f64_to_decimal_1dp`: display rounding for digest values

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

/// Normalize a timestamp delivered either as epoch milliseconds (number or
/// numeric string) or as an ISO-8601 string into a single instant.
///
/// Naive date-times and bare dates are interpreted as UTC. Returns `None` for
/// anything unparseable; callers skip such entries instead of failing.
pub(crate) fn normalize_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(millis) = s.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a reading that may arrive as a JSON number or a numeric string.
///
/// Accepts a decimal comma. Non-finite values count as unparseable.
pub(crate) fn parse_numeric(raw: &Value) -> Option<f64> {
    let v = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Convert an f64 to Decimal, rounded to 1 decimal place.
///
/// Non-finite inputs become zero.
pub(crate) fn f64_to_decimal_1dp(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "f64_to_decimal_1dp received non-finite value {}, defaulting to 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_str_exact(&format!("{:.1}", v)).unwrap_or_default()
}

/// Escape text for interpolation into HTML element content or attribute values.
pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
