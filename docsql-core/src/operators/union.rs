//! DISTINCT and UNION over row sets.

use crate::context::QueryResult;
use crate::helpers::deep_equal;
use crate::types::{Row, Table};

/// Drop rows whose content equals an earlier row's. First occurrence wins.
pub fn distinct(rows: Vec<Row>) -> Vec<Row> {
    let mut seen: Vec<serde_json::Value> = Vec::with_capacity(rows.len());
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        let content = serde_json::Value::Object(row.content.clone());
        if !seen.iter().any(|s| deep_equal(s, &content)) {
            seen.push(content);
            kept.push(row);
        }
    }
    kept
}

/// Append the rows of another query's output to `rows`, as rows of `table`.
///
/// Appended rows are keyed `<source table>/<index>`.
pub fn union(mut rows: Vec<Row>, other: &QueryResult, table: &Table) -> Vec<Row> {
    for (i, (source, content)) in other.rows().into_iter().enumerate() {
        let mut row = Row::new(
            table.clone(),
            format!("{}/{}", source, i),
            serde_json::Value::Object(content),
        );
        if source != table.name {
            row.joined.push(source);
        }
        rows.push(row);
    }
    rows
}
