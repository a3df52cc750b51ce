//! Store implementations backing the driver.

mod json_file;

pub use docsql_core::store::{DocumentStore, MemoryStore};
pub use json_file::JsonFileStore;
