//! Configuration for the docsql CLI
//!
//! Settings are read from `docsql.toml` in the config directory. A missing
//! file means defaults.
//!
//! ## Environment Variables
//!
//! - `DOCSQL_DATA_FILE` - JSON data file the queries run against
//! - `DOCSQL_LOG` - tracing filter, e.g. `docsql=debug`
//! - `DOCSQL_PRETTY` - pretty-print output (`true` / `false`)
//!
//! These can be set in a `.env` file in the config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DbResult;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "docsql.toml";

/// Environment variable names
pub const ENV_DATA_FILE: &str = "DOCSQL_DATA_FILE";
pub const ENV_LOG: &str = "DOCSQL_LOG";
pub const ENV_PRETTY: &str = "DOCSQL_PRETTY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data file path
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Log filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Pretty-print query output
    #[serde(default)]
    pub pretty: bool,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("docsql.json")
}

fn default_log_filter() -> String {
    "docsql=info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            log_filter: default_log_filter(),
            pretty: false,
        }
    }
}

impl Config {
    /// Load configuration from a directory
    ///
    /// This also loads any `.env` file in the directory and applies
    /// environment variable overrides.
    pub fn load(dir: &Path) -> DbResult<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let mut config = Self::from_file(&dir.join(CONFIG_FILE_NAME))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Read a config file, or defaults if it does not exist.
    pub fn from_file(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(data_file) = std::env::var(ENV_DATA_FILE) {
            if !data_file.is_empty() {
                self.data_file = PathBuf::from(data_file);
            }
        }

        if let Ok(filter) = std::env::var(ENV_LOG) {
            if !filter.is_empty() {
                self.log_filter = filter;
            }
        }

        if let Ok(pretty) = std::env::var(ENV_PRETTY) {
            if let Ok(pretty) = pretty.parse::<bool>() {
                self.pretty = pretty;
            }
        }
    }
}
