//! CAST / BINARY conversions.

use chrono::{DateTime, NaiveTime, Utc};
use serde_json::Value;

use crate::helpers::{parse_date_millis, to_number, value_to_string};

/// Call a cast function. Returns None if function not found.
pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    let value = args.first().cloned().unwrap_or(Value::Null);
    let result = match name {
        "BINARY" | "CAST_AS_BINARY" | "CAST_AS_CHAR" => match value {
            Value::Null => Value::Null,
            other => Value::String(value_to_string(&other)),
        },
        "CAST_AS_DATE" => format_datetime(&value, "%Y-%m-%d"),
        "CAST_AS_DATETIME" => format_datetime(&value, "%Y-%m-%d %H:%M:%S"),
        "CAST_AS_TIME" => match &value {
            Value::String(s) => match NaiveTime::parse_from_str(s.trim(), "%H:%M:%S") {
                Ok(time) => Value::String(time.format("%H:%M:%S").to_string()),
                Err(_) => format_datetime(&value, "%H:%M:%S"),
            },
            _ => format_datetime(&value, "%H:%M:%S"),
        },
        "CAST_AS_SIGNED" => match value {
            Value::Null => Value::Null,
            other => Value::Number(signed(&other).into()),
        },
        "CAST_AS_UNSIGNED" => match value {
            Value::Null => Value::Null,
            other => Value::Number((signed(&other) as u64).into()),
        },
        _ => return None,
    };
    Some(result)
}

/// Epoch milliseconds or a date string, rendered with `format`.
fn format_datetime(value: &Value, format: &str) -> Value {
    let millis = match value {
        Value::Number(n) => n.as_f64().map(|f| f as i64),
        Value::String(s) => parse_date_millis(s),
        _ => None,
    };
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| Value::String(dt.format(format).to_string()))
        .unwrap_or(Value::Null)
}

/// Integer value, reading the leading digits of strings like `"12abc"`.
fn signed(value: &Value) -> i64 {
    if let Some(n) = to_number(value) {
        return n.trunc() as i64;
    }
    match value {
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => {
            let s = s.trim_start();
            let end = s
                .char_indices()
                .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
                .count();
            s[..end].parse().unwrap_or(0)
        }
        _ => 0,
    }
}
