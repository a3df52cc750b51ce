//! DocSQL Core - SQL-like queries over schemaless document stores.
//!
//! A query is described as a scheme: an ordered list of DSL operations
//! (`SELECT`, `FROM`, `WHERE`, `JOIN`, ...). The builder folds the scheme into
//! a [`QueryContext`], and a pipeline runs that plan against any
//! [`DocumentStore`]. The store only fetches and writes keyed rows; joins,
//! filters, grouping, ordering and functions all run in memory.
//!
//! # Main Components
//!
//! - **Context builder**: turns a scheme into a validated query plan
//! - **Conditions**: compiles WHERE / HAVING trees into per-row evaluators
//! - **Operators**: join, union, distinct, group and order over row sets
//! - **Functions**: scalar and aggregate functions with MySQL semantics
//! - **Pipelines**: SELECT / INSERT / UPDATE / DELETE execution
//!
//! # Example
//!
//! ```rust
//! use docsql_core::{build_context, compile, Arg, MemoryStore, Operation, QuerySyntax};
//! use serde_json::json;
//!
//! let store = MemoryStore::from_value(json!({
//!     "users": {
//!         "1": {"name": "Alice", "age": 30},
//!         "2": {"name": "Bob", "age": 25}
//!     }
//! }))
//! .unwrap();
//!
//! let context = build_context(&[
//!     Operation::new(QuerySyntax::Select, vec![Arg::value("name")]),
//!     Operation::new(QuerySyntax::From, vec![Arg::value("users")]),
//!     Operation::new(QuerySyntax::Where, vec![Arg::value("age")]),
//!     Operation::new(QuerySyntax::Gt, vec![Arg::value(26)]),
//! ])
//! .unwrap();
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let output = runtime.block_on(compile(&context, &store)).unwrap();
//! assert_eq!(output, json!({"users": [{"name": "Alice"}]}));
//! ```

pub mod conditions;
pub mod context;
pub mod error;
pub mod functions;
pub mod helpers;
pub mod operators;
pub mod pipeline;
pub mod store;
pub mod syntax;
pub mod templates;
pub mod types;

// Re-export main types for convenience
pub use conditions::{Conditions, Expression};
pub use context::{build_context, QueryContext, QueryContextBuilder, QueryResult};
pub use error::{DocsqlError, DocsqlResult};
pub use functions::{apply_functions, Functions};
pub use pipeline::compile;
pub use store::{DocumentStore, MemoryStore, TableRows};
pub use syntax::{JoinType, LogicalOperator, QuerySyntax, SortingOrder};
pub use templates::{FilterResult, Template};
pub use types::{
    Arg, DataMap, FetchLimit, FunctionData, Join, Limit, Operation, Param, Property, Row, Scheme,
    SortingData, Table,
};
