//! SQL-first query execution over the rowmap mapping core.
//!
//! This crate owns everything with an I/O edge: the file-backed SQL
//! registry, placeholder rewriting, the inline-SQL sanitizer, the driver
//! boundary (SQLite in-tree), the execution engine with transactions, and
//! the migration runner. The pure mapping machinery lives in
//! [`rowmap_core`] and is re-exported through the prelude.
#![warn(unreachable_pub)]

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod migrate;
pub mod params;
pub mod registry;
pub mod sanitize;
pub mod transaction;

// re-exports
pub use rowmap_core as core;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        config::{ConnectionConfig, DatabaseBackend},
        driver::{Driver, Params, ResultSet, sqlite::SqliteDriver},
        engine::Engine,
        error::Error,
        migrate::MigrationRunner,
        registry::SqlRegistry,
    };
    pub use rowmap_core::prelude::*;
}
