//! INSERT: add every payload object to every target table.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::context::QueryContext;
use crate::error::{DocsqlError, DocsqlResult};
use crate::store::DocumentStore;
use crate::types::ROW_ID;

use super::primary_table;

pub(super) async fn run(context: &QueryContext, store: &dyn DocumentStore) -> DocsqlResult<Value> {
    primary_table(context, "INSERT")?;

    let mut keys = Vec::new();
    let mut failures: BTreeMap<&str, String> = BTreeMap::new();
    for table in &context.tables {
        for data in &context.data {
            let (content, key) = split_key(data);
            match store.insert_row(&table.name, content, key).await {
                Ok(key) => keys.push(Value::String(key)),
                Err(e) => {
                    failures.entry(table.name.as_str()).or_insert_with(|| e.to_string());
                }
            }
        }
        debug!(table = %table.name, rows = context.data.len(), "inserted rows");
    }

    if !failures.is_empty() {
        let message = failures
            .iter()
            .map(|(table, e)| format!("Adding an entry to the \"{}\" failed: {}", table, e))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(DocsqlError::WriteFailed(message));
    }
    Ok(Value::Array(keys))
}

/// Separate a caller-chosen `_key` from the stored content.
fn split_key(data: &Value) -> (Value, Option<String>) {
    match data {
        Value::Object(map) => {
            let key = match map.get(ROW_ID) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            let mut content = map.clone();
            content.remove(ROW_ID);
            (Value::Object(content), key)
        }
        other => (other.clone(), None),
    }
}
