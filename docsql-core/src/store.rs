//! Store interface consumed by the pipelines.
//!
//! A store is a set of named tables, each mapping row keys to JSON objects.
//! It has no relational engine: every join, filter and aggregate happens in
//! memory after a table is fetched.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{DocsqlError, DocsqlResult};
use crate::types::FetchLimit;

/// Keyed rows of one table, in key order.
pub type TableRows = Vec<(String, Value)>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every row of `table`, optionally bounded to the first or last rows.
    /// A missing table reads as empty.
    async fn fetch_table(&self, table: &str, limit: Option<FetchLimit>) -> DocsqlResult<TableRows>;

    /// Apply one update document to `table`: each key is replaced by its
    /// object, or deleted when mapped to null.
    async fn write_rows(&self, table: &str, rows: Map<String, Value>) -> DocsqlResult<()>;

    /// Add one row, returning its key. A new key is generated when none is given.
    async fn insert_row(&self, table: &str, content: Value, key: Option<String>) -> DocsqlResult<String>;
}

/// Generate a time-ordered row key.
pub fn generate_key() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Bound a fetched table the way [`FetchLimit`] asks.
pub fn bound_rows(rows: TableRows, limit: Option<FetchLimit>) -> TableRows {
    match limit {
        None => rows,
        Some(FetchLimit::First(n)) => rows.into_iter().take(n).collect(),
        Some(FetchLimit::Last(n)) => {
            let skip = rows.len().saturating_sub(n);
            rows.into_iter().skip(skip).collect()
        }
    }
}

/// In-memory tables, safe to share across tasks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `{table: {key: content}}`.
    pub fn from_value(value: Value) -> DocsqlResult<Self> {
        let store = Self::new();
        store.load(value)?;
        Ok(store)
    }

    /// Replace every table with the content of `{table: {key: content}}`.
    pub fn load(&self, value: Value) -> DocsqlResult<()> {
        let tables = match value {
            Value::Object(tables) => tables,
            Value::Null => Map::new(),
            other => {
                return Err(DocsqlError::Store(format!(
                    "expected an object of tables, got {}",
                    other
                )))
            }
        };
        let mut loaded = BTreeMap::new();
        for (name, rows) in tables {
            let rows = match rows {
                Value::Object(rows) => rows.into_iter().collect(),
                Value::Null => BTreeMap::new(),
                _ => {
                    return Err(DocsqlError::Store(format!(
                        "table \"{}\" is not an object of rows",
                        name
                    )))
                }
            };
            loaded.insert(name, rows);
        }
        *self.tables.write() = loaded;
        Ok(())
    }

    /// Snapshot of every table as `{table: {key: content}}`.
    pub fn snapshot(&self) -> Value {
        let tables = self.tables.read();
        Value::Object(
            tables
                .iter()
                .map(|(name, rows)| {
                    let rows: Map<String, Value> =
                        rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    (name.clone(), Value::Object(rows))
                })
                .collect(),
        )
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    pub fn get(&self, table: &str, key: &str) -> Option<Value> {
        self.tables.read().get(table).and_then(|rows| rows.get(key)).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_table(&self, table: &str, limit: Option<FetchLimit>) -> DocsqlResult<TableRows> {
        let rows = self
            .tables
            .read()
            .get(table)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Ok(bound_rows(rows, limit))
    }

    async fn write_rows(&self, table: &str, rows: Map<String, Value>) -> DocsqlResult<()> {
        let mut tables = self.tables.write();
        let target = tables.entry(table.to_string()).or_default();
        for (key, content) in rows {
            match content {
                Value::Null => {
                    target.remove(&key);
                }
                content => {
                    target.insert(key, content);
                }
            }
        }
        if target.is_empty() {
            tables.remove(table);
        }
        Ok(())
    }

    async fn insert_row(&self, table: &str, content: Value, key: Option<String>) -> DocsqlResult<String> {
        let key = key.unwrap_or_else(generate_key);
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(key.clone(), content);
        Ok(key)
    }
}
