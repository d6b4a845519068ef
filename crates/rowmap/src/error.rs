//! Crate-level error facade.
//!
//! Each module keeps its own error enum; this type unifies them at the
//! engine surface so callers handle one error with `?`.

use crate::{
    config::ConfigError, driver::DriverError, migrate::MigrationError, registry::RegistryError,
    sanitize::SanitizeError,
};
use rowmap_core::mapping::MapError;
use thiserror::Error as ThisError;

///
/// Error
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("query '{query}' returned {count} rows where at most one was expected")]
    MultipleRows { query: String, count: usize },
}
