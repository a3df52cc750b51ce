//! SELECT: fetch, join, filter and project, union, functions, having, then
//! group, order and limit.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::context::QueryContext;
use crate::error::DocsqlResult;
use crate::functions::apply_functions;
use crate::operators;
use crate::store::DocumentStore;
use crate::templates::project;
use crate::types::{DataMap, Row, Table};

use super::{apply_joins, fetch, primary_table};

pub(super) async fn run(context: &QueryContext, store: &dyn DocumentStore) -> DocsqlResult<Value> {
    let primary = primary_table(context, "SELECT")?;
    let mut data = fetch(context, store, context.fetch_limit()).await?;
    apply_joins(context, store, &mut data).await?;

    let mut data: DataMap = data
        .into_iter()
        .map(|(table, rows)| {
            let rows: Vec<Row> = rows
                .into_iter()
                .filter(|row| context.conditions.test(row))
                .map(|row| project(&row, &context.properties))
                .collect();
            debug!(table = %table, rows = rows.len(), "filtered and projected");
            (table, rows)
        })
        .collect();

    merge_unions(context, &primary, &mut data);

    if !context.functions.is_empty() {
        data = data
            .into_iter()
            .map(|(name, rows)| {
                let table = rows
                    .first()
                    .map(|r| r.table.clone())
                    .unwrap_or_else(|| Table::new(name.clone()));
                let rows: Vec<Row> = operators::partition(rows, &context.group_by)
                    .into_iter()
                    .flat_map(|group| apply_functions(group, &context.functions, &table))
                    .collect();
                debug!(table = %name, rows = rows.len(), "applied functions");
                (name, rows)
            })
            .collect();
    }

    strip_temporary(context, &mut data);

    let mut output = serde_json::Map::new();
    for (name, rows) in data {
        let rows: Vec<Row> = if context.having.is_empty() {
            rows
        } else {
            rows.into_iter().filter(|row| context.having.test(row)).collect()
        };
        let rows = operators::group(rows, &context.group_by);
        let rows = operators::order(rows, &context.order_by);
        let rows = match context.limit {
            Some(limit) => limit.slice(rows),
            None => rows,
        };
        output.insert(
            name,
            Value::Array(rows.into_iter().map(Row::into_value).collect()),
        );
    }
    Ok(Value::Object(output))
}

/// Fold UNION results into the primary table and de-duplicate as requested.
fn merge_unions(context: &QueryContext, primary: &Table, data: &mut DataMap) {
    if !context.unions.is_empty() {
        let mut rows = data.remove(&primary.name).unwrap_or_default();
        let mut dedupe = false;
        for union in &context.unions {
            rows = operators::union(rows, &union.result, primary);
            dedupe |= union.distinct;
        }
        if dedupe && !context.distinct {
            rows = operators::distinct(rows);
        }
        data.insert(primary.name.clone(), rows);
    }
    if context.distinct {
        for rows in data.values_mut() {
            *rows = operators::distinct(std::mem::take(rows));
        }
    }
}

/// Remove columns that were only fetched to feed a function.
fn strip_temporary(context: &QueryContext, data: &mut DataMap) {
    let aliases: HashSet<&str> = context.functions.iter().map(|f| f.alias.as_str()).collect();
    let only_functions =
        !context.functions.is_empty() && context.properties.iter().all(|p| p.temporary);
    let kept: HashSet<&str> = context
        .properties
        .iter()
        .filter(|p| !p.temporary)
        .map(|p| p.label())
        .collect();
    let temporary: Vec<&str> = context
        .properties
        .iter()
        .filter(|p| p.temporary)
        .map(|p| p.label())
        .filter(|label| !kept.contains(label) && !aliases.contains(label))
        .collect();
    if !only_functions && temporary.is_empty() {
        return;
    }

    for row in data.values_mut().flatten() {
        if only_functions {
            row.content.retain(|field, _| aliases.contains(field.as_str()));
        } else {
            for label in &temporary {
                row.content.remove(*label);
            }
        }
        row.scheme = row.content.keys().cloned().collect();
    }
}
