//! TOML-backed connection configuration.

use crate::driver::{Driver, DriverError, sqlite::SqliteDriver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

///
/// DatabaseBackend
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Mysql,
    Oracle,
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Oracle => "oracle",
        };
        write!(f, "{name}")
    }
}

///
/// ConnectionConfig
///
/// ```toml
/// backend = "sqlite"
/// database = "app.db"
/// sql_dir = "sql"
/// migrations_dir = "migrations"
/// ```
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub backend: DatabaseBackend,

    /// File path or DSN. For SQLite, `:memory:` opens a private
    /// in-memory database.
    pub database: String,

    #[serde(default = "default_sql_dir")]
    pub sql_dir: PathBuf,

    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

fn default_sql_dir() -> PathBuf {
    PathBuf::from("sql")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

impl ConnectionConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Open a driver for the configured backend. Only SQLite ships
    /// in-tree; other backends error here rather than at first query.
    pub fn open_driver(&self) -> Result<Box<dyn Driver>, DriverError> {
        match self.backend {
            DatabaseBackend::Sqlite => {
                let driver = if self.database == ":memory:" {
                    SqliteDriver::open_in_memory()?
                } else {
                    SqliteDriver::open(&self.database)?
                };
                Ok(Box::new(driver))
            }
            backend => Err(DriverError::UnsupportedBackend {
                backend: backend.to_string(),
            }),
        }
    }
}

///
/// TESTS
///
