//! Aggregate functions over one column of a row set.

use std::cmp::Ordering;

use serde_json::Value;

use crate::helpers::{compare_values, number_value, to_number};

pub fn is_aggregate(name: &str) -> bool {
    matches!(name, "MIN" | "MAX" | "SUM" | "AVG" | "COUNT")
}

/// Fold `column` with the named aggregate. `all_rows` is set for `COUNT(*)`.
pub fn call(name: &str, column: &[Value], all_rows: bool) -> Option<Value> {
    let result = match name {
        "COUNT" if all_rows => number_value(column.len() as f64),
        "COUNT" => number_value(column.iter().filter(|v| !v.is_null()).count() as f64),
        "SUM" => number_value(column.iter().filter_map(to_number).sum()),
        "AVG" => {
            let numbers: Vec<f64> = column.iter().filter_map(to_number).collect();
            if numbers.is_empty() {
                number_value(0.0)
            } else {
                number_value(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        "MIN" => extreme(column, Ordering::Less),
        "MAX" => extreme(column, Ordering::Greater),
        _ => return None,
    };
    Some(result)
}

fn extreme(column: &[Value], wanted: Ordering) -> Value {
    column
        .iter()
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if compare_values(v, b) != wanted => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sum_avg_count() {
        let column = vec![json!(1), json!(2), Value::Null, json!("3")];
        assert_eq!(call("SUM", &column, false), Some(json!(6)));
        assert_eq!(call("AVG", &column, false), Some(json!(2)));
        assert_eq!(call("COUNT", &column, false), Some(json!(3)));
        assert_eq!(call("COUNT", &column, true), Some(json!(4)));
    }

    #[test]
    fn test_empty_column() {
        assert_eq!(call("SUM", &[], false), Some(json!(0)));
        assert_eq!(call("AVG", &[], false), Some(json!(0)));
        assert_eq!(call("COUNT", &[], true), Some(json!(0)));
        assert_eq!(call("MIN", &[], false), Some(Value::Null));
    }

    #[test]
    fn test_min_max() {
        let single = vec![json!("only")];
        assert_eq!(call("MIN", &single, false), Some(json!("only")));
        assert_eq!(call("MAX", &single, false), Some(json!("only")));

        let column = vec![json!(3), Value::Null, json!(1), json!(7)];
        assert_eq!(call("MIN", &column, false), Some(json!(1)));
        assert_eq!(call("MAX", &column, false), Some(json!(7)));
    }
}
