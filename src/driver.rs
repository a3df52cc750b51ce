//! Query driver.
//!
//! Runs batches of schemes against one store, strictly in order, so a later
//! scheme can read an earlier one's output through a `reference` argument.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docsql_core::types::LogicalOperatorScope;
use docsql_core::{build_context, compile, Arg, DocumentStore, Operation, QueryResult, Scheme};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Handle on a store. Clones share the store and the connection state.
#[derive(Clone)]
pub struct Driver {
    store: Arc<dyn DocumentStore>,
    online: Arc<AtomicBool>,
}

impl Driver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            online: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn connect(&self) -> DbResult<()> {
        self.online.store(true, Ordering::SeqCst);
        info!("driver connected");
        Ok(())
    }

    pub async fn disconnect(&self) -> DbResult<()> {
        self.online.store(false, Ordering::SeqCst);
        info!("driver disconnected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Run every scheme in order and return their outputs.
    ///
    /// A failing scheme stops the batch. Writes made by earlier schemes are
    /// kept.
    pub async fn execute(&self, schemes: Vec<Scheme>) -> DbResult<Vec<Value>> {
        if !self.is_connected() {
            return Err(DbError::NotConnected);
        }

        let mut results: Vec<QueryResult> = Vec::with_capacity(schemes.len());
        let mut outputs = Vec::with_capacity(schemes.len());
        for (index, scheme) in schemes.into_iter().enumerate() {
            let scheme = resolve_references(scheme, index, &results)?;
            let context = build_context(&scheme)?;
            let output = compile(&context, self.store.as_ref()).await?;
            debug!(query = index, command = ?context.command, "query done");
            results.push(context.result.clone());
            outputs.push(output);
        }
        Ok(outputs)
    }
}

/// Replace `reference` arguments with the result of the query they name.
fn resolve_references(scheme: Scheme, index: usize, results: &[QueryResult]) -> DbResult<Scheme> {
    scheme
        .into_iter()
        .map(|operation| {
            let args = operation
                .args
                .into_iter()
                .map(|arg| resolve_arg(arg, index, results))
                .collect::<DbResult<Vec<_>>>()?;
            Ok(Operation::new(operation.syntax, args))
        })
        .collect()
}

fn resolve_arg(arg: Arg, index: usize, results: &[QueryResult]) -> DbResult<Arg> {
    match arg {
        Arg::Reference { query } => results
            .get(query)
            .cloned()
            .map(Arg::Subquery)
            .ok_or(DbError::InvalidReference { index, query }),
        Arg::Scope(scope) => {
            let properties = scope
                .properties
                .into_iter()
                .map(|arg| resolve_arg(arg, index, results))
                .collect::<DbResult<Vec<_>>>()?;
            Ok(Arg::Scope(LogicalOperatorScope::with(scope.operator, properties)))
        }
        other => Ok(other),
    }
}
