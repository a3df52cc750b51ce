//! Query plan assembled from a scheme, plus its shared result holder.

mod builder;
mod validators;

pub use builder::{build_context, QueryContextBuilder};

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use crate::conditions::Conditions;
use crate::helpers::flatten_scalars;
use crate::syntax::QuerySyntax;
use crate::types::{FetchLimit, FunctionData, Join, Limit, Property, SortingData, Table, Union};

/// Write-once slot holding a query's output.
///
/// Cloning shares the slot, so a handle captured as a sub-query operand sees
/// the value once the owning pipeline sets it.
#[derive(Clone, Default)]
pub struct QueryResult(Arc<OnceCell<Value>>);

impl QueryResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Self {
        let result = Self::new();
        result.set(value);
        result
    }

    /// Store the output. Returns false if a value was already stored.
    pub fn set(&self, value: Value) -> bool {
        self.0.set(value).is_ok()
    }

    pub fn get(&self) -> Option<&Value> {
        self.0.get()
    }

    pub fn is_ready(&self) -> bool {
        self.0.get().is_some()
    }

    /// Every scalar of the result, across all tables and rows.
    pub fn values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        if let Some(value) = self.get() {
            flatten_scalars(value, &mut out);
        }
        out
    }

    /// Result rows as (table, object) pairs. Non-tabular results yield nothing.
    pub fn rows(&self) -> Vec<(String, Map<String, Value>)> {
        let mut out = Vec::new();
        if let Some(Value::Object(tables)) = self.get() {
            for (table, rows) in tables {
                if let Value::Array(rows) = rows {
                    out.extend(rows.iter().filter_map(|r| match r {
                        Value::Object(obj) => Some((table.clone(), obj.clone())),
                        _ => None,
                    }));
                }
            }
        }
        out
    }

    /// Number of rows produced, `None` while the query has not run.
    pub fn row_count(&self) -> Option<usize> {
        self.get().map(|value| match value {
            Value::Object(tables) => tables
                .values()
                .map(|rows| rows.as_array().map_or(1, Vec::len))
                .sum(),
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        })
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueryResult").field(&self.get()).finish()
    }
}

/// The query plan consumed by a pipeline.
#[derive(Debug, Default)]
pub struct QueryContext {
    /// Primary command, fixed by the first one seen.
    pub command: Option<QuerySyntax>,
    pub result: QueryResult,
    /// Projection for SELECT, target columns for DELETE.
    pub properties: Vec<Property>,
    /// INSERT payload objects.
    pub data: Vec<Value>,
    /// UPDATE payload.
    pub set: Option<Map<String, Value>>,
    pub distinct: bool,
    pub tables: Vec<Table>,
    pub joins: Vec<Join>,
    pub limit: Option<Limit>,
    pub order_by: Vec<SortingData>,
    pub group_by: Vec<SortingData>,
    pub functions: Vec<FunctionData>,
    pub unions: Vec<Union>,
    pub conditions: Conditions,
    pub having: Conditions,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_table(&self) -> Option<&Table> {
        self.tables.first()
    }

    /// Store-side limit, only when nothing between fetch and output can
    /// change which rows survive.
    pub fn fetch_limit(&self) -> Option<FetchLimit> {
        let limit = self.limit?;
        let reshaped = !self.conditions.is_empty()
            || !self.having.is_empty()
            || !self.joins.is_empty()
            || !self.unions.is_empty()
            || !self.functions.is_empty()
            || !self.group_by.is_empty()
            || !self.order_by.is_empty()
            || self.distinct;
        if reshaped {
            None
        } else {
            Some(limit.fetch_limit())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_is_write_once() {
        let result = QueryResult::new();
        let shared = result.clone();
        assert!(!shared.is_ready());
        assert_eq!(shared.row_count(), None);

        assert!(result.set(json!({"users": [{"id": 1}, {"id": 2}]})));
        assert!(!result.set(json!(null)));
        assert_eq!(shared.row_count(), Some(2));
        assert_eq!(shared.values(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_result_rows() {
        let result = QueryResult::from_value(json!({"a": [{"x": 1}], "b": [{"y": 2}]}));
        let rows = result.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "a");
    }

    #[test]
    fn test_fetch_limit_pushdown() {
        let mut ctx = QueryContext::new();
        ctx.limit = Some(Limit::new(-3, None));
        assert_eq!(ctx.fetch_limit(), Some(FetchLimit::Last(3)));

        ctx.order_by.push(SortingData {
            property: Property::new("age"),
            order: Default::default(),
        });
        assert_eq!(ctx.fetch_limit(), None);
    }
}
