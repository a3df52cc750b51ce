//! Row-set joins.

use serde_json::Value;

use crate::helpers::loose_equal;
use crate::syntax::JoinType;
use crate::types::{Join, Row, Table};

/// Join the rows of the table named by `join.property_b` into `primary`.
pub fn join(primary: Vec<Row>, secondary: &[Row], join: &Join) -> Vec<Row> {
    let target = join
        .property_b
        .table
        .clone()
        .or_else(|| secondary.first().map(|r| r.table.clone()))
        .unwrap_or_else(|| Table::new(""));

    match join.join_type {
        JoinType::Inner => inner(&primary, secondary, join),
        JoinType::Left => left(&primary, secondary, join, &target),
        JoinType::Right => right(&primary, secondary, join),
        JoinType::Full => {
            let mut rows = left(&primary, secondary, join, &target);
            rows.extend(right(&primary, secondary, join));
            rows
        }
    }
}

fn matches(a: &Row, b: &Row, join: &Join) -> bool {
    let left = a.value_of(&join.property_a);
    let right = b.value_of(&join.property_b);
    if left.is_null() || right.is_null() {
        return false;
    }
    loose_equal(&left, &right)
}

fn inner(primary: &[Row], secondary: &[Row], join: &Join) -> Vec<Row> {
    primary
        .iter()
        .flat_map(|a| {
            secondary
                .iter()
                .filter(move |b| matches(a, b, join))
                .map(move |b| combine(a, b))
        })
        .collect()
}

fn left(primary: &[Row], secondary: &[Row], join: &Join, target: &Table) -> Vec<Row> {
    let empty = empty_like(secondary, target);
    let mut rows = Vec::with_capacity(primary.len());
    for a in primary {
        let before = rows.len();
        rows.extend(
            secondary
                .iter()
                .filter(|b| matches(a, b, join))
                .map(|b| combine(a, b)),
        );
        if rows.len() == before {
            rows.push(combine(a, &empty));
        }
    }
    rows
}

fn right(primary: &[Row], secondary: &[Row], join: &Join) -> Vec<Row> {
    let table = join
        .property_a
        .table
        .clone()
        .or_else(|| primary.first().map(|r| r.table.clone()))
        .unwrap_or_else(|| Table::new(""));
    let empty = empty_like(primary, &table);
    let mut rows = Vec::with_capacity(secondary.len());
    for b in secondary {
        let before = rows.len();
        rows.extend(
            primary
                .iter()
                .filter(|a| matches(a, b, join))
                .map(|a| combine(a, b)),
        );
        if rows.len() == before {
            let mut row = combine(&empty, b);
            row.key = b.key.clone();
            rows.push(row);
        }
    }
    rows
}

/// Stand-in for a missing match: every field any row of the set has, nulled.
fn empty_like(rows: &[Row], table: &Table) -> Row {
    let mut empty = match rows.first() {
        Some(first) => first.nulled(),
        None => Row::new(table.clone(), String::new(), Value::Null),
    };
    for row in rows.iter().skip(1) {
        for field in &row.scheme {
            if !empty.content.contains_key(field) {
                empty.scheme.push(field.clone());
                empty.content.insert(field.clone(), Value::Null);
            }
        }
    }
    empty
}

/// Merge `b` into a copy of `a`. Fields `a` already has are stored under
/// `<table>.<field>`.
pub fn combine(a: &Row, b: &Row) -> Row {
    let mut row = a.clone();
    for (field, value) in &b.content {
        let name = if row.content.contains_key(field) {
            format!("{}.{}", b.table.name, field)
        } else {
            field.clone()
        };
        if !row.scheme.contains(&name) {
            row.scheme.push(name.clone());
        }
        row.content.insert(name, value.clone());
    }
    for table in std::iter::once(&b.table.name).chain(&b.joined) {
        if !row.covers_table(table) {
            row.joined.push(table.clone());
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Property;
    use serde_json::json;

    fn users() -> Vec<Row> {
        vec![
            Row::new(Table::new("users"), "u1", json!({"id": 1, "name": "Alice"})),
            Row::new(Table::new("users"), "u2", json!({"id": 2, "name": "Bob"})),
        ]
    }

    fn orders() -> Vec<Row> {
        vec![
            Row::new(Table::new("orders"), "o1", json!({"id": 10, "userId": 1, "total": 5})),
            Row::new(Table::new("orders"), "o2", json!({"id": 11, "userId": "1", "total": 7})),
            Row::new(Table::new("orders"), "o3", json!({"id": 12, "userId": 9, "total": 3})),
        ]
    }

    fn on(join_type: JoinType) -> Join {
        Join {
            join_type,
            property_a: Property::parse("users.id"),
            property_b: Property::parse("orders.userId"),
        }
    }

    #[test]
    fn test_inner_join() {
        let rows = join(users(), &orders(), &on(JoinType::Inner));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.key == "u1"));
        assert_eq!(rows[0].content["orders.id"], json!(10));
        assert_eq!(rows[0].content["id"], json!(1));
        assert_eq!(rows[1].content["total"], json!(7));
        assert!(rows[0].covers_table("orders"));
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        let rows = join(users(), &orders(), &on(JoinType::Left));
        assert_eq!(rows.len(), 3);
        let bob = rows.iter().find(|r| r.key == "u2").unwrap();
        assert_eq!(bob.content["name"], json!("Bob"));
        assert_eq!(bob.content["total"], Value::Null);
        assert_eq!(bob.content["orders.id"], Value::Null);
    }

    #[test]
    fn test_left_join_with_empty_target() {
        let rows = join(users(), &[], &on(JoinType::Left));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content["name"], json!("Alice"));
    }

    #[test]
    fn test_right_join() {
        let rows = join(users(), &orders(), &on(JoinType::Right));
        assert_eq!(rows.len(), 3);
        let orphan = rows.iter().find(|r| r.key == "o3").unwrap();
        assert_eq!(orphan.content["name"], Value::Null);
        assert_eq!(orphan.content["total"], json!(3));
    }

    #[test]
    fn test_full_join() {
        let rows = join(users(), &orders(), &on(JoinType::Full));
        assert_eq!(rows.len(), 6);
    }
}
