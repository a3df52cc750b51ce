//! String functions. Positions are 1-based and counted in characters.
//!
//! A NULL string argument makes the result NULL.

use serde_json::Value;

use crate::helpers::{number_value, value_to_string};

use super::{arg_int, arg_text};

/// Longest string a function may build, in characters. Longer results are
/// NULL, as MySQL does past `max_allowed_packet`.
pub const MAX_RESULT_CHARS: usize = 64 * 1024 * 1024;

/// Call a string function. Returns None if function not found.
pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    let result = match name {
        "ASCII" => text_then(args, |s| {
            number_value(s.bytes().next().map_or(0.0, f64::from))
        }),

        "CHAR_LENGTH" | "CHARACTER_LENGTH" => {
            text_then(args, |s| number_value(s.chars().count() as f64))
        }

        "LENGTH" => text_then(args, |s| number_value(s.len() as f64)),

        "CONCAT" => {
            if args.iter().any(Value::is_null) {
                Value::Null
            } else {
                Value::String(args.iter().map(value_to_string).collect())
            }
        }

        "CONCAT_WS" => match arg_text(args, 0) {
            Some(separator) => {
                let parts: Vec<String> = args[1..]
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(value_to_string)
                    .collect();
                Value::String(parts.join(&separator))
            }
            None => Value::Null,
        },

        "FIELD" => match arg_text(args, 0) {
            Some(needle) => {
                let position = args[1..]
                    .iter()
                    .position(|v| !v.is_null() && value_to_string(v) == needle)
                    .map_or(0, |i| i + 1);
                number_value(position as f64)
            }
            None => number_value(0.0),
        },

        "FIND_IN_SET" => match (arg_text(args, 0), arg_text(args, 1)) {
            (Some(needle), Some(list)) => {
                let position = if list.is_empty() {
                    0
                } else {
                    list.split(',').position(|item| item == needle).map_or(0, |i| i + 1)
                };
                number_value(position as f64)
            }
            _ => Value::Null,
        },

        "INSERT" => match (arg_text(args, 0), arg_int(args, 1), arg_int(args, 2), arg_text(args, 3)) {
            (Some(s), Some(pos), Some(len), Some(new)) => {
                let chars: Vec<char> = s.chars().collect();
                if pos < 1 || pos as usize > chars.len() {
                    Value::String(s)
                } else {
                    let start = pos as usize - 1;
                    let end = if len < 0 {
                        chars.len()
                    } else {
                        start.saturating_add(len as usize).min(chars.len())
                    };
                    let mut out: String = chars[..start].iter().collect();
                    out.push_str(&new);
                    out.extend(&chars[end..]);
                    Value::String(out)
                }
            }
            _ => Value::Null,
        },

        "INSTR" => match (arg_text(args, 0), arg_text(args, 1)) {
            (Some(s), Some(sub)) => number_value(locate(&sub, &s, 1) as f64),
            _ => Value::Null,
        },

        "LOCATE" | "POSITION" => match (arg_text(args, 0), arg_text(args, 1)) {
            (Some(sub), Some(s)) => {
                let from = arg_int(args, 2).unwrap_or(1);
                number_value(locate(&sub, &s, from) as f64)
            }
            _ => Value::Null,
        },

        "LCASE" | "LOWER" => text_then(args, |s| Value::String(s.to_lowercase())),
        "UCASE" | "UPPER" => text_then(args, |s| Value::String(s.to_uppercase())),

        "LEFT" => match (arg_text(args, 0), arg_int(args, 1)) {
            (Some(s), Some(n)) => Value::String(s.chars().take(n.max(0) as usize).collect()),
            _ => Value::Null,
        },

        "RIGHT" => match (arg_text(args, 0), arg_int(args, 1)) {
            (Some(s), Some(n)) => {
                let count = s.chars().count();
                let skip = count.saturating_sub(n.max(0) as usize);
                Value::String(s.chars().skip(skip).collect())
            }
            _ => Value::Null,
        },

        "LPAD" => pad(args, true),
        "RPAD" => pad(args, false),

        "LTRIM" => text_then(args, |s| Value::String(s.trim_start_matches(' ').to_string())),
        "RTRIM" => text_then(args, |s| Value::String(s.trim_end_matches(' ').to_string())),
        "TRIM" => text_then(args, |s| Value::String(s.trim_matches(' ').to_string())),

        "MID" | "SUBSTR" | "SUBSTRING" => match (arg_text(args, 0), arg_int(args, 1)) {
            (Some(s), Some(pos)) => Value::String(substring(&s, pos, arg_int(args, 2))),
            _ => Value::Null,
        },

        "REPEAT" => match (arg_text(args, 0), arg_int(args, 1)) {
            (Some(s), Some(n)) => {
                let times = n.max(0) as usize;
                match s.chars().count().checked_mul(times) {
                    Some(total) if total <= MAX_RESULT_CHARS => Value::String(s.repeat(times)),
                    _ => Value::Null,
                }
            }
            _ => Value::Null,
        },

        "REPLACE" => match (arg_text(args, 0), arg_text(args, 1), arg_text(args, 2)) {
            (Some(s), Some(from), Some(to)) if !from.is_empty() => Value::String(s.replace(&from, &to)),
            (Some(s), Some(_), Some(_)) => Value::String(s),
            _ => Value::Null,
        },

        "REVERSE" => text_then(args, |s| Value::String(s.chars().rev().collect())),

        "SPACE" => match arg_int(args, 0) {
            Some(n) if n.max(0) as usize <= MAX_RESULT_CHARS => Value::String(" ".repeat(n.max(0) as usize)),
            Some(_) => Value::Null,
            None => Value::Null,
        },

        "STRCMP" => match (arg_text(args, 0), arg_text(args, 1)) {
            (Some(a), Some(b)) => number_value(match a.cmp(&b) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            }),
            _ => Value::Null,
        },

        "SUBSTRING_INDEX" => match (arg_text(args, 0), arg_text(args, 1), arg_int(args, 2)) {
            (Some(s), Some(delim), Some(count)) => Value::String(substring_index(&s, &delim, count)),
            _ => Value::Null,
        },

        _ => return None,
    };
    Some(result)
}

fn text_then(args: &[Value], f: impl FnOnce(String) -> Value) -> Value {
    match arg_text(args, 0) {
        Some(s) => f(s),
        None => Value::Null,
    }
}

/// 1-based character position of `sub` in `s`, searching from `from`.
fn locate(sub: &str, s: &str, from: i64) -> usize {
    if from < 1 {
        return 0;
    }
    let start = from as usize - 1;
    let chars: Vec<char> = s.chars().collect();
    let needle: Vec<char> = sub.chars().collect();
    if start > chars.len() {
        return 0;
    }
    if needle.is_empty() {
        return start + 1;
    }
    chars[start..]
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .map_or(0, |i| start + i + 1)
}

/// MySQL SUBSTRING: a negative position counts from the end, position 0
/// yields the empty string.
fn substring(s: &str, pos: i64, len: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let count = chars.len() as i64;
    let start = match pos {
        0 => return String::new(),
        p if p > 0 => p - 1,
        p => count + p,
    };
    if start < 0 || start >= count {
        return String::new();
    }
    let end = match len {
        Some(l) if l <= 0 => return String::new(),
        Some(l) => start.saturating_add(l).min(count),
        None => count,
    };
    chars[start as usize..end as usize].iter().collect()
}

fn substring_index(s: &str, delim: &str, count: i64) -> String {
    if delim.is_empty() || count == 0 {
        return String::new();
    }
    let parts: Vec<&str> = s.split(delim).collect();
    let n = count.unsigned_abs() as usize;
    if n >= parts.len() {
        return s.to_string();
    }
    if count > 0 {
        parts[..n].join(delim)
    } else {
        parts[parts.len() - n..].join(delim)
    }
}

fn pad(args: &[Value], left: bool) -> Value {
    let (Some(s), Some(len), Some(padding)) = (arg_text(args, 0), arg_int(args, 1), arg_text(args, 2))
    else {
        return Value::Null;
    };
    if len < 0 || len as u64 > MAX_RESULT_CHARS as u64 {
        return Value::Null;
    }
    let len = len as usize;
    let chars: Vec<char> = s.chars().collect();
    if chars.len() >= len {
        return Value::String(chars[..len].iter().collect());
    }
    if padding.is_empty() {
        return Value::Null;
    }
    let fill: String = padding.chars().cycle().take(len - chars.len()).collect();
    if left {
        Value::String(fill + &s)
    } else {
        Value::String(s + &fill)
    }
}
