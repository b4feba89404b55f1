//! Record values and the equality rule used for change detection
//!
//! Values are compared by meaning, not by representation: a number imported
//! as the text `"5"` equals a stored `5`, and two dates are equal when they
//! denote the same instant. Change detection relies on this so that a
//! re-import of unchanged data never reports spurious modifications.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Relative tolerance for numeric equality
pub const NUMBER_EPSILON: f64 = 1e-9;

/// A canonical record: canonical key to value, absent keys mean "never set"
pub type Record = BTreeMap<String, Value>;

/// Typed scalar stored in a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
}

impl Value {
    /// Trimmed text value; `None` for empty or whitespace-only input
    pub fn text(raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Value::Text(trimmed.to_string()))
        }
    }

    /// Value-type-aware equality
    ///
    /// - text/text: exact after trimming surrounding whitespace
    /// - number/number: within [`NUMBER_EPSILON`] relative tolerance
    /// - number/text: text parsed as a number first
    /// - date/date: same instant
    /// - date/text: text parsed as a date first
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.trim() == b.trim(),
            (Value::Number(a), Value::Number(b)) => numbers_equal(*a, *b),
            (Value::Number(n), Value::Text(t)) | (Value::Text(t), Value::Number(n)) => {
                parse_number(t).is_some_and(|parsed| numbers_equal(*n, parsed))
            }
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Date(d), Value::Text(t)) | (Value::Text(t), Value::Date(d)) => {
                parse_date(t).is_some_and(|parsed| parsed == *d)
            }
            _ => false,
        }
    }

    /// Canonical string used to match primary keys across representations
    pub fn identity_key(&self) -> String {
        match self {
            Value::Text(s) => s.trim().to_string(),
            Value::Number(n) => format_number(*n),
            Value::Date(d) => d.to_rfc3339(),
        }
    }

    /// JSON form used by structured-text export
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => number_to_json(*n),
            Value::Date(d) => serde_json::Value::String(format_date(d)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Date(d) => write!(f, "{}", format_date(d)),
        }
    }
}

/// One cell of a tabular payload, as read from a spreadsheet or CSV file
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Text(s) => Cell::Text(s.clone()),
            Value::Number(n) => Cell::Number(*n),
            Value::Date(d) => Cell::Date(*d),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => write!(f, "{}", format_number(*n)),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Date(d) => write!(f, "{}", format_date(d)),
        }
    }
}

pub fn numbers_equal(a: f64, b: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= NUMBER_EPSILON * scale
}

/// Parse trimmed text as a finite number
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Shortest decimal form; integral values carry no fractional part
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Avoid "-0"
        return "0".to_string();
    }
    n.to_string()
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Dates at midnight UTC are written as plain dates, anything else as RFC 3339
pub fn format_date(d: &DateTime<Utc>) -> String {
    if d.num_seconds_from_midnight() == 0 && d.nanosecond() == 0 {
        d.format("%Y-%m-%d").to_string()
    } else {
        d.to_rfc3339()
    }
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse the date spellings accepted in import files; naive values are UTC
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(t, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// Convert an Excel serial date (days since 1899-12-30) to a UTC instant
pub fn excel_serial_to_date(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let offset = TimeDelta::try_milliseconds(millis)?;
    epoch.checked_add_signed(offset).map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_number_text_coercion() {
        assert!(Value::Number(5.0).matches(&Value::Text("5".into())));
        assert!(Value::Text(" 5.0 ".into()).matches(&Value::Number(5.0)));
        assert!(!Value::Number(5.0).matches(&Value::Text("five".into())));
        assert!(!Value::Number(5.0).matches(&Value::Text("5.5".into())));
    }

    #[test]
    fn test_number_tolerance() {
        assert!(Value::Number(0.1 + 0.2).matches(&Value::Number(0.3)));
        assert!(!Value::Number(1.0).matches(&Value::Number(1.001)));
    }

    #[test]
    fn test_text_whitespace_insensitive_at_edges_only() {
        assert!(Value::Text("  Ada ".into()).matches(&Value::Text("Ada".into())));
        assert!(!Value::Text("Ada".into()).matches(&Value::Text("ada".into())));
        assert!(!Value::Text("A da".into()).matches(&Value::Text("Ada".into())));
    }

    #[test]
    fn test_dates_compare_by_instant() {
        let a = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        let offset_text = "2024-09-01T08:00:00-04:00";

        assert!(Value::Date(a).matches(&Value::Text(offset_text.into())));
        assert!(Value::Date(a).matches(&Value::Date(parse_date(offset_text).unwrap())));
        assert!(!Value::Date(a).matches(&Value::Text("not a date".into())));
        assert!(!Value::Date(a).matches(&Value::Number(45536.0)));
    }

    #[test]
    fn test_parse_date_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2024-09-01"), Some(midnight));
        assert_eq!(parse_date("2024/09/01"), Some(midnight));
        assert_eq!(parse_date("09/01/2024"), Some(midnight));
        assert_eq!(
            parse_date("2024-09-01 13:30:00"),
            Some(Utc.with_ymd_and_hms(2024, 9, 1, 13, 30, 0).unwrap())
        );
        assert_eq!(parse_date("Sept 1"), None);
    }

    #[test]
    fn test_excel_serial_dates() {
        assert_eq!(
            excel_serial_to_date(45536.0),
            Some(Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            excel_serial_to_date(45536.5),
            Some(Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(excel_serial_to_date(-1.0), None);
    }

    #[test]
    fn test_identity_key_normalizes_numbers() {
        assert_eq!(Value::Number(1001234567.0).identity_key(), "1001234567");
        assert_eq!(Value::Text(" 1001234567 ".into()).identity_key(), "1001234567");
    }

    #[test]
    fn test_format_date_plain_at_midnight() {
        let midnight = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        let noon = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        assert_eq!(format_date(&midnight), "2024-09-01");
        assert_eq!(parse_date(&format_date(&noon)), Some(noon));
    }

    #[test]
    fn test_json_numbers_integral_when_possible() {
        assert_eq!(Value::Number(65.0).to_json(), serde_json::json!(65));
        assert_eq!(Value::Number(2.5).to_json(), serde_json::json!(2.5));
    }
}
