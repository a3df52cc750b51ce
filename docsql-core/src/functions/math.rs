//! Math functions.
//!
//! Missing or non-numeric arguments make the result 0, as do results that
//! are not finite.

use std::cmp::Ordering;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::Value;

use crate::helpers::{compare_values, number_value, to_number};

use super::{arg_int, arg_number};

/// Call a math function. Returns None if function not found.
pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    let result = match name {
        "ABS" => unary(args, f64::abs),
        "ACOS" => unary(args, f64::acos),
        "ASIN" => unary(args, f64::asin),
        "ATAN" if args.len() > 1 => binary(args, f64::atan2),
        "ATAN" => unary(args, f64::atan),
        "ATAN2" => binary(args, f64::atan2),
        "CEIL" | "CEILING" => unary(args, f64::ceil),
        "COS" => unary(args, f64::cos),
        "COT" => unary(args, |x| 1.0 / x.tan()),
        "DEGREES" => unary(args, f64::to_degrees),
        "EXP" => unary(args, f64::exp),
        "FLOOR" => unary(args, f64::floor),
        "LN" => unary(args, f64::ln),
        "LOG" if args.len() > 1 => binary(args, |base, x| x.ln() / base.ln()),
        "LOG" => unary(args, f64::ln),
        "LOG10" => unary(args, f64::log10),
        "LOG2" => unary(args, f64::log2),
        "RADIANS" => unary(args, f64::to_radians),
        "SIGN" => unary(args, |x| {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        }),
        "SIN" => unary(args, f64::sin),
        "SQRT" => unary(args, f64::sqrt),
        "TAN" => unary(args, f64::tan),
        "PI" => number_value(std::f64::consts::PI),
        "POW" | "POWER" => binary(args, f64::powf),

        "DIV" => binary(args, |a, b| if b == 0.0 { 0.0 } else { (a / b).trunc() }),
        "MOD" => binary(args, |a, b| if b == 0.0 { 0.0 } else { a % b }),

        "ROUND" => match arg_number(args, 0) {
            Some(x) => {
                let multiplier = 10f64.powi(decimals(args));
                number_value((x * multiplier).round() / multiplier)
            }
            None => number_value(0.0),
        },

        "TRUNCATE" => match arg_number(args, 0) {
            Some(x) => {
                let multiplier = 10f64.powi(decimals(args));
                number_value((x * multiplier).trunc() / multiplier)
            }
            None => number_value(0.0),
        },

        "FORMAT" => match arg_number(args, 0) {
            Some(x) => Value::String(format_number(x, decimals(args).max(0) as usize)),
            None => Value::Null,
        },

        "RAND" => {
            let n: f64 = match arg_int(args, 0) {
                Some(seed) => StdRng::seed_from_u64(seed as u64).gen(),
                None => rand::thread_rng().gen(),
            };
            number_value(n)
        }

        "LEAST" => extreme(args, Ordering::Less),
        "GREATEST" => extreme(args, Ordering::Greater),

        "COALESCE" => args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null),

        "BIN" => match arg_number(args, 0) {
            Some(x) => Value::String(format!("{:b}", x.trunc() as i64 as u64)),
            None => Value::Null,
        },

        _ => return None,
    };
    Some(result)
}

fn unary(args: &[Value], f: fn(f64) -> f64) -> Value {
    match arg_number(args, 0) {
        Some(x) => number_value(f(x)),
        None => number_value(0.0),
    }
}

fn binary(args: &[Value], f: fn(f64, f64) -> f64) -> Value {
    match (arg_number(args, 0), arg_number(args, 1)) {
        (Some(a), Some(b)) => number_value(f(a, b)),
        _ => number_value(0.0),
    }
}

/// LEAST / GREATEST: NULL if any argument is NULL, numeric comparison when
/// every argument is numeric.
fn extreme(args: &[Value], wanted: Ordering) -> Value {
    if args.is_empty() || args.iter().any(Value::is_null) {
        return Value::Null;
    }
    let numbers: Option<Vec<f64>> = args.iter().map(to_number).collect();
    if let Some(numbers) = numbers {
        let best = numbers.into_iter().reduce(|best, n| {
            if n.partial_cmp(&best) == Some(wanted) {
                n
            } else {
                best
            }
        });
        return best.map(number_value).unwrap_or(Value::Null);
    }
    args.iter()
        .cloned()
        .reduce(|best, v| {
            if compare_values(&v, &best) == wanted {
                v
            } else {
                best
            }
        })
        .unwrap_or(Value::Null)
}

/// Decimal places argument, capped at 30 like MySQL.
fn decimals(args: &[Value]) -> i32 {
    arg_int(args, 1)
        .unwrap_or(0)
        .clamp(-MAX_DECIMALS, MAX_DECIMALS) as i32
}

const MAX_DECIMALS: i64 = 30;

/// `1234567.891, 2` -> `1,234,567.89`
fn format_number(x: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, x.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed.clone(), None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if x < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rounding() {
        assert_eq!(call("FLOOR", &[json!(3.7)]), Some(json!(3)));
        assert_eq!(call("CEILING", &[json!(3.2)]), Some(json!(4)));
        assert_eq!(call("ROUND", &[json!(2.346), json!(2)]), Some(json!(2.35)));
        assert_eq!(call("ROUND", &[json!(-2.5)]), Some(json!(-3)));
        assert_eq!(call("TRUNCATE", &[json!(1.999), json!(1)]), Some(json!(1.9)));
    }

    #[test]
    fn test_huge_decimals_are_capped() {
        let rounded = call("ROUND", &[json!(2.5), json!(1e19)]).and_then(|v| v.as_f64()).unwrap();
        assert!((rounded - 2.5).abs() < 1e-9);
        assert_eq!(call("TRUNCATE", &[json!(1.5), json!(-1e19)]), Some(json!(0)));
        let formatted = call("FORMAT", &[json!(1), json!(1e19)]).unwrap();
        assert_eq!(formatted.as_str().map(str::len), Some(32));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(call("POWER", &[json!(2), json!(10)]), Some(json!(1024)));
        assert_eq!(call("MOD", &[json!(10), json!(3)]), Some(json!(1)));
        assert_eq!(call("DIV", &[json!(7), json!(2)]), Some(json!(3)));
        assert_eq!(call("DIV", &[json!(7), json!(0)]), Some(json!(0)));
        assert_eq!(call("LOG", &[json!(2), json!(8)]), Some(json!(3)));
        assert_eq!(call("SIGN", &[json!(-4)]), Some(json!(-1)));
    }

    #[test]
    fn test_non_numeric_is_zero() {
        assert_eq!(call("SQRT", &[json!("abc")]), Some(json!(0)));
        assert_eq!(call("COS", &[]), Some(json!(0)));
        assert_eq!(call("LOG", &[json!(-1)]), Some(json!(0)));
        assert_eq!(call("ABS", &[json!("-5")]), Some(json!(5)));
    }

    #[test]
    fn test_least_greatest_coalesce() {
        assert_eq!(call("LEAST", &[json!(3), json!(1), json!(2)]), Some(json!(1)));
        assert_eq!(call("GREATEST", &[json!("b"), json!("c"), json!("a")]), Some(json!("c")));
        assert_eq!(call("GREATEST", &[json!(1), Value::Null]), Some(Value::Null));
        assert_eq!(call("COALESCE", &[Value::Null, json!(2)]), Some(json!(2)));
    }

    #[test]
    fn test_format_bin_rand() {
        assert_eq!(call("FORMAT", &[json!(1234567.891), json!(2)]), Some(json!("1,234,567.89")));
        assert_eq!(call("FORMAT", &[json!(-999.6), json!(0)]), Some(json!("-1,000")));
        assert_eq!(call("BIN", &[json!(12)]), Some(json!("1100")));

        let seeded = call("RAND", &[json!(7)]);
        assert_eq!(seeded, call("RAND", &[json!(7)]));
        let n = call("RAND", &[]).and_then(|v| v.as_f64()).unwrap();
        assert!((0.0..1.0).contains(&n));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(call("NOPE", &[]), None);
    }
}
