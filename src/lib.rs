pub mod config;
pub mod driver;
pub mod error;
pub mod storage;

pub use config::Config;
pub use driver::Driver;
pub use error::{DbError, DbResult};
pub use storage::{JsonFileStore, MemoryStore};
