//! File-backed document store.
//!
//! The whole file is `{table: {key: content}}`. Reads are served from memory;
//! every write rewrites the file through a temporary file and a rename so a
//! crash never leaves a half-written data file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docsql_core::store::{DocumentStore, MemoryStore, TableRows};
use docsql_core::{DocsqlError, DocsqlResult, FetchLimit};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{DbError, DbResult};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    tables: MemoryStore,
    persist_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a data file. A missing file starts out empty and is created on
    /// the first write.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let value: Value = if content.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&content)?
            };
            MemoryStore::from_value(value).map_err(|e| DbError::InvalidData(e.to_string()))?
        } else {
            MemoryStore::new()
        };
        tracing::debug!(path = %path.display(), "opened data file");
        Ok(Self {
            path,
            tables,
            persist_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current content of every table.
    pub fn snapshot(&self) -> Value {
        self.tables.snapshot()
    }

    fn persist(&self) -> DbResult<()> {
        let _guard = self.persist_lock.lock();
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, &self.tables.snapshot())?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| DbError::IoError(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn fetch_table(&self, table: &str, limit: Option<FetchLimit>) -> DocsqlResult<TableRows> {
        self.tables.fetch_table(table, limit).await
    }

    async fn write_rows(&self, table: &str, rows: Map<String, Value>) -> DocsqlResult<()> {
        self.tables.write_rows(table, rows).await?;
        self.persist().map_err(DocsqlError::from)
    }

    async fn insert_row(&self, table: &str, content: Value, key: Option<String>) -> DocsqlResult<String> {
        let key = self.tables.insert_row(table, content, key).await?;
        self.persist()?;
        Ok(key)
    }
}
