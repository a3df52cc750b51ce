use docsql_core::DocsqlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Query(#[from] DocsqlError),

    #[error("Driver is not connected")]
    NotConnected,

    #[error("Query {index} refers to query {query}, which has not run before it")]
    InvalidReference { index: usize, query: usize },

    #[error("Invalid data file: {0}")]
    InvalidData(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<toml::de::Error> for DbError {
    fn from(e: toml::de::Error) -> Self {
        DbError::Config(e.to_string())
    }
}

impl From<DbError> for DocsqlError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Query(inner) => inner,
            other => DocsqlError::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_errors_are_transparent() {
        let err: DbError = DocsqlError::Validation("Empty WHERE clause".to_string()).into();
        assert_eq!(err.to_string(), "Validation error: Empty WHERE clause");
    }

    #[test]
    fn test_store_side_errors_convert_back() {
        let err: DocsqlError = DbError::InvalidData("not an object".to_string()).into();
        assert_eq!(err.to_string(), "Store error: Invalid data file: not an object");
    }
}
