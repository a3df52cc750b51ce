//! Value helpers shared by the templates, the join engine and the functions.
//!
//! - parse_value: date-aware normalisation of literals and row values
//! - deep_equal / values_equal: order-independent structural equality
//! - partial_compare / compare_values: ordering for GT/LT and for sorting
//! - loose_equal: numeric-aware equality used by joins
//! - like_regex: SQL LIKE pattern to anchored regex

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a date string into epoch milliseconds.
pub fn parse_date_millis(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Strings that read as dates become their millisecond timestamp; everything
/// else is returned unchanged.
pub fn parse_value(value: &Value) -> Value {
    match value {
        Value::String(s) => match parse_date_millis(s) {
            Some(millis) => Value::Number(millis.into()),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Structural equality. Object key order is irrelevant and numbers compare
/// by their f64 value.
pub fn deep_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| deep_equal(v, other)))
        }
        _ => left == right,
    }
}

/// EQ semantics: both sides date-parsed, then compared structurally.
#[inline]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    deep_equal(&parse_value(left), &parse_value(right))
}

/// Numeric view of a value. Numeric strings count as numbers.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Join predicate: numeric comparison when both sides are numeric,
/// strict value equality otherwise.
pub fn loose_equal(left: &Value, right: &Value) -> bool {
    match (to_number(left), to_number(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// Ordering for GT/LT. `None` when the two values are not comparable.
pub fn partial_compare(left: &Value, right: &Value) -> Option<Ordering> {
    let (left, right) = (parse_value(left), parse_value(right));
    match (&left, &right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, _) | (_, Value::Null) => None,
        _ => match (to_number(&left), to_number(&right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

/// Total ordering used by ORDER BY and GROUP BY.
///
/// Null < Bool < Number < String < Array < Object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a_f64 = a.as_f64().unwrap_or(0.0);
            let b_f64 = b.as_f64().unwrap_or(0.0);
            a_f64.partial_cmp(&b_f64).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_values(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Create a serde_json::Number from an f64 value.
#[inline]
pub fn number_from_f64(n: f64) -> serde_json::Number {
    serde_json::Number::from_f64(n).unwrap_or_else(|| serde_json::Number::from(0))
}

/// Numeric result as JSON, integral values stay integers.
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::Number((n as i64).into())
    } else {
        Value::Number(number_from_f64(n))
    }
}

/// Safely compile a regex with size limits.
pub fn safe_regex(pattern: &str) -> Result<Regex, regex::Error> {
    if pattern.len() > 1000 {
        return Err(regex::Error::Syntax(
            "Pattern too long (max 1000 chars)".to_string(),
        ));
    }
    Regex::new(pattern)
}

/// Convert a LIKE pattern to an anchored regex. `%` and `_` are wildcards
/// unless preceded by a backslash.
pub fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut regex_pattern = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => regex_pattern.push_str(&regex::escape(&escaped.to_string())),
                None => regex_pattern.push_str("\\\\"),
            },
            '%' => regex_pattern.push_str(".*"),
            '_' => regex_pattern.push('.'),
            other => regex_pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex_pattern.push('$');
    safe_regex(&regex_pattern)
}

/// Every scalar reachable inside a value, depth first.
pub fn flatten_scalars(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| flatten_scalars(v, out)),
        Value::Object(map) => map.values().for_each(|v| flatten_scalars(v, out)),
        other => out.push(other.clone()),
    }
}

/// Render a value the way string functions see it.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
