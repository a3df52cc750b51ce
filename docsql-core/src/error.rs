//! Error types for docsql-core.
//!
//! Build-time problems (malformed schemes, failed validation) are raised
//! synchronously while the query context is assembled. Per-row anomalies never
//! surface here: they degrade to null, 0 or a skipped condition instead.

use thiserror::Error;

use crate::syntax::QuerySyntax;

/// Core error type
#[derive(Error, Debug)]
pub enum DocsqlError {
    #[error("Malformed query: {0}")]
    MalformedPlan(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No template for {0:?}")]
    MissingTemplate(QuerySyntax),

    #[error("Condition nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    #[error("Store error: {0}")]
    Store(String),

    #[error("{0}")]
    WriteFailed(String),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),
}

/// Result type for docsql-core operations
pub type DocsqlResult<T> = Result<T, DocsqlError>;

impl serde::Serialize for DocsqlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
