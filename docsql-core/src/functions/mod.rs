//! Scalar and aggregate functions used in projections.
//!
//! Names are matched case-insensitively. Unknown names are logged and the
//! call is skipped.

mod aggregate;
mod cast;
mod math;
mod string;

use serde_json::Value;

use crate::helpers::{to_number, value_to_string};
use crate::types::{FunctionData, Param, Row, Table};

pub use aggregate::is_aggregate;

/// Container for function implementations.
pub struct Functions;

impl Functions {
    /// Call a scalar function by name. Returns None for unknown names.
    pub fn call(name: &str, args: &[Value]) -> Option<Value> {
        let upper_name = name.to_uppercase();

        if let Some(result) = string::call(&upper_name, args) {
            return Some(result);
        }

        if let Some(result) = math::call(&upper_name, args) {
            return Some(result);
        }

        cast::call(&upper_name, args)
    }

    /// Call an aggregate by name over one column.
    pub fn aggregate(name: &str, column: &[Value], all_rows: bool) -> Option<Value> {
        aggregate::call(&name.to_uppercase(), column, all_rows)
    }

    pub fn is_known(name: &str) -> bool {
        let upper_name = name.to_uppercase();
        is_aggregate(&upper_name) || Self::call(&upper_name, &[]).is_some()
    }
}

pub(crate) fn arg_number(args: &[Value], index: usize) -> Option<f64> {
    args.get(index).and_then(to_number)
}

pub(crate) fn arg_int(args: &[Value], index: usize) -> Option<i64> {
    arg_number(args, index).map(|n| n.trunc() as i64)
}

pub(crate) fn arg_text(args: &[Value], index: usize) -> Option<String> {
    match args.get(index) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value_to_string(value)),
    }
}

fn param_value(row: &Row, param: &Param) -> Value {
    match param {
        Param::Property(property) if property.is_all() => Value::Null,
        Param::Property(property) => row.value_of(property),
        Param::Value { value } => value.clone(),
    }
}

/// Apply every function of a projection to one row set.
///
/// Aggregates are computed from the same input rows and collapse the set to
/// one row (a copy of the first row, or an empty row of `table`). Scalar
/// functions then run in order over the remaining rows, so a scalar may read
/// an earlier alias.
pub fn apply_functions(rows: Vec<Row>, functions: &[FunctionData], table: &Table) -> Vec<Row> {
    let known: Vec<&FunctionData> = functions
        .iter()
        .filter(|f| {
            let known = Functions::is_known(&f.function);
            if !known {
                tracing::warn!(function = %f.function, "unknown function ignored");
            }
            known
        })
        .collect();
    if known.is_empty() {
        return rows;
    }

    let (aggregates, scalars): (Vec<&FunctionData>, Vec<&FunctionData>) = known
        .into_iter()
        .partition(|f| is_aggregate(&f.function.to_uppercase()));

    let mut rows = if aggregates.is_empty() {
        rows
    } else {
        let mut base = rows
            .first()
            .cloned()
            .unwrap_or_else(|| Row::new(table.clone(), String::new(), Value::Null));
        for function in &aggregates {
            let all_rows = match function.params.first() {
                Some(Param::Property(property)) => property.is_all(),
                None => true,
                _ => false,
            };
            let column: Vec<Value> = match function.params.first() {
                Some(param) => rows.iter().map(|row| param_value(row, param)).collect(),
                None => Vec::new(),
            };
            let column = if all_rows && column.is_empty() {
                vec![Value::Null; rows.len()]
            } else {
                column
            };
            if let Some(result) = Functions::aggregate(&function.function, &column, all_rows) {
                set_field(&mut base, &function.alias, result);
            }
        }
        vec![base]
    };

    for function in &scalars {
        for row in &mut rows {
            let args: Vec<Value> = function.params.iter().map(|p| param_value(row, p)).collect();
            if let Some(result) = Functions::call(&function.function, &args) {
                set_field(row, &function.alias, result);
            }
        }
    }
    rows
}

fn set_field(row: &mut Row, field: &str, value: Value) {
    if !row.scheme.iter().any(|f| f == field) {
        row.scheme.push(field.to_string());
    }
    row.content.insert(field.to_string(), value);
}
