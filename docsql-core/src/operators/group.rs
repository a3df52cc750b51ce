//! GROUP BY and ORDER BY.

use std::cmp::Ordering;

use serde_json::Value;

use crate::helpers::{compare_values, deep_equal};
use crate::types::{Property, Row, SortingData};

/// Value a sorting entry reads from a row. Falls back to the label for
/// columns that were renamed by the projection.
fn sort_value(row: &Row, property: &Property) -> Value {
    match row.value_of(property) {
        Value::Null => row
            .content
            .get(property.label())
            .cloned()
            .unwrap_or(Value::Null),
        value => value,
    }
}

/// Split rows into groups of equal key values, in first-seen order.
pub fn partition(rows: Vec<Row>, group_by: &[SortingData]) -> Vec<Vec<Row>> {
    if group_by.is_empty() {
        return vec![rows];
    }
    let mut keys: Vec<Vec<Value>> = Vec::new();
    let mut groups: Vec<Vec<Row>> = Vec::new();
    for row in rows {
        let key: Vec<Value> = group_by
            .iter()
            .map(|entry| sort_value(&row, &entry.property))
            .collect();
        let existing = keys.iter().position(|k| {
            k.iter().zip(&key).all(|(a, b)| deep_equal(a, b))
        });
        match existing {
            Some(i) => groups[i].push(row),
            None => {
                keys.push(key);
                groups.push(vec![row]);
            }
        }
    }
    groups
}

/// Make rows of one group contiguous. Groups keep first-seen order.
pub fn group(rows: Vec<Row>, group_by: &[SortingData]) -> Vec<Row> {
    if group_by.is_empty() {
        return rows;
    }
    partition(rows, group_by).into_iter().flatten().collect()
}

/// Stable sort by every entry in priority order.
pub fn order(mut rows: Vec<Row>, order_by: &[SortingData]) -> Vec<Row> {
    if order_by.is_empty() {
        return rows;
    }
    rows.sort_by(|a, b| {
        order_by
            .iter()
            .map(|entry| {
                let ordering = compare_values(
                    &sort_value(a, &entry.property),
                    &sort_value(b, &entry.property),
                );
                entry.order.apply(ordering)
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    rows
}
