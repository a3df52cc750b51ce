//! Per-command pipelines.
//!
//! Each pipeline is a fixed sequence of steps over a [`DataMap`]: fetch,
//! join, filter, then either shaping (SELECT) or write-back (INSERT, UPDATE,
//! DELETE). The output is stored once into the context's result holder so
//! later queries can read it as a sub-query.

mod delete;
mod insert;
mod select;
mod update;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::QueryContext;
use crate::error::{DocsqlError, DocsqlResult};
use crate::operators;
use crate::store::DocumentStore;
use crate::syntax::QuerySyntax;
use crate::types::{DataMap, FetchLimit, Row, Table};

/// Run the plan against a store and record its output.
pub async fn compile(context: &QueryContext, store: &dyn DocumentStore) -> DocsqlResult<Value> {
    let output = match context.command {
        Some(QuerySyntax::Select) => select::run(context, store).await?,
        Some(QuerySyntax::Insert) => insert::run(context, store).await?,
        Some(QuerySyntax::Update) => update::run(context, store).await?,
        Some(QuerySyntax::Delete) => delete::run(context, store).await?,
        Some(other) => {
            return Err(DocsqlError::UnsupportedCommand(format!("{:?}", other)));
        }
        None => {
            return Err(DocsqlError::UnsupportedCommand(
                "query has no SELECT, INSERT, UPDATE or DELETE".to_string(),
            ));
        }
    };

    if !context.result.set(output.clone()) {
        warn!("query result was already recorded, keeping the first one");
    }
    Ok(output)
}

fn primary_table(context: &QueryContext, command: &str) -> DocsqlResult<Table> {
    context
        .primary_table()
        .cloned()
        .ok_or_else(|| DocsqlError::MalformedPlan(format!("{} has no target table", command)))
}

/// Load every table of the plan.
async fn fetch(
    context: &QueryContext,
    store: &dyn DocumentStore,
    limit: Option<FetchLimit>,
) -> DocsqlResult<DataMap> {
    let mut data = DataMap::new();
    for table in &context.tables {
        if data.contains_key(&table.name) {
            continue;
        }
        let rows = fetch_rows(store, table, limit).await?;
        debug!(table = %table.name, rows = rows.len(), "fetched table");
        data.insert(table.name.clone(), rows);
    }
    Ok(data)
}

async fn fetch_rows(
    store: &dyn DocumentStore,
    table: &Table,
    limit: Option<FetchLimit>,
) -> DocsqlResult<Vec<Row>> {
    let rows = store.fetch_table(&table.name, limit).await?;
    Ok(rows
        .into_iter()
        .map(|(key, content)| Row::new(table.clone(), key, content))
        .collect())
}

/// Merge the rows of every joined table into the primary table's rows.
async fn apply_joins(
    context: &QueryContext,
    store: &dyn DocumentStore,
    data: &mut DataMap,
) -> DocsqlResult<()> {
    let Some(primary) = context.primary_table() else {
        return Ok(());
    };
    for join in &context.joins {
        let Some(target) = join.property_b.table.as_ref() else {
            continue;
        };
        let secondary = fetch_rows(store, target, None).await?;
        let rows = data.remove(&primary.name).unwrap_or_default();
        let joined = operators::join(rows, &secondary, join);
        debug!(
            table = %target.name,
            join = ?join.join_type,
            rows = joined.len(),
            "joined table"
        );
        data.insert(primary.name.clone(), joined);
    }
    Ok(())
}

/// Keep the rows that satisfy the WHERE conditions.
fn filter(context: &QueryContext, data: DataMap) -> DataMap {
    if context.conditions.is_empty() {
        return data;
    }
    data.into_iter()
        .map(|(table, rows)| {
            let kept: Vec<Row> = rows
                .into_iter()
                .filter(|row| context.conditions.test(row))
                .collect();
            debug!(table = %table, rows = kept.len(), "filtered rows");
            (table, kept)
        })
        .collect()
}

/// Fetch, filter and limit the rows a write command targets.
async fn matched_rows(context: &QueryContext, store: &dyn DocumentStore) -> DocsqlResult<DataMap> {
    let data = filter(context, fetch(context, store, context.fetch_limit()).await?);
    Ok(match context.limit {
        Some(limit) => data
            .into_iter()
            .map(|(table, rows)| (table, limit.slice(rows)))
            .collect(),
        None => data,
    })
}

/// Issue one update document per table. Every table is attempted; failures
/// are reported together.
async fn write_back(
    store: &dyn DocumentStore,
    updates: BTreeMap<String, Map<String, Value>>,
) -> DocsqlResult<()> {
    let mut failures = Vec::new();
    for (table, rows) in updates {
        if rows.is_empty() {
            continue;
        }
        let count = rows.len();
        match store.write_rows(&table, rows).await {
            Ok(()) => debug!(table = %table, rows = count, "wrote rows"),
            Err(e) => failures.push(format!("\"{}\" table update failed: {}", table, e)),
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(DocsqlError::WriteFailed(failures.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;
    use crate::store::{MemoryStore, TableRows};
    use crate::types::{Arg, Operation};
    use async_trait::async_trait;
    use serde_json::json;

    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl DocumentStore for ReadOnlyStore {
        async fn fetch_table(&self, table: &str, limit: Option<FetchLimit>) -> DocsqlResult<TableRows> {
            self.0.fetch_table(table, limit).await
        }

        async fn write_rows(&self, _table: &str, _rows: Map<String, Value>) -> DocsqlResult<()> {
            Err(DocsqlError::Store("read-only".to_string()))
        }

        async fn insert_row(&self, _table: &str, _content: Value, _key: Option<String>) -> DocsqlResult<String> {
            Err(DocsqlError::Store("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_write_back_reports_every_table() {
        let store = ReadOnlyStore(MemoryStore::new());
        let mut updates = BTreeMap::new();
        for table in ["a", "b"] {
            let mut rows = Map::new();
            rows.insert("k".to_string(), Value::Null);
            updates.insert(table.to_string(), rows);
        }
        let err = write_back(&store, updates).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"a\" table update failed: Store error: read-only\n\"b\" table update failed: Store error: read-only"
        );
    }

    #[tokio::test]
    async fn test_compile_without_command() {
        let ctx = build_context(&[Operation::new(QuerySyntax::From, vec![Arg::value("users")])]).unwrap();
        let err = compile(&ctx, &MemoryStore::new()).await.unwrap_err();
        assert!(matches!(err, DocsqlError::UnsupportedCommand(_)));
        assert!(!ctx.result.is_ready());
    }

    #[tokio::test]
    async fn test_compile_records_result_once() {
        let store = MemoryStore::from_value(json!({"users": {"u1": {"name": "Alice"}}})).unwrap();
        let ctx = build_context(&[
            Operation::new(QuerySyntax::Select, vec![Arg::value("name")]),
            Operation::new(QuerySyntax::From, vec![Arg::value("users")]),
        ])
        .unwrap();
        let shared = ctx.result.clone();
        let output = compile(&ctx, &store).await.unwrap();
        assert_eq!(output, json!({"users": [{"name": "Alice"}]}));
        assert_eq!(shared.get(), Some(&output));
    }
}
