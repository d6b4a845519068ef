//! Query execution engine.
//!
//! The engine ties a [`Driver`] to a [`SqlRegistry`]: callers name
//! queries, hand over [`Params`], and get back rows, scalars, typed
//! objects, or reconstructed aggregates. Inline SQL goes through the
//! [`SqlSanitizer`] first; registry queries are trusted.

use crate::{
    driver::{Driver, Params, ResultSet},
    error::Error,
    migrate::MigrationRunner,
    registry::SqlRegistry,
    sanitize::SqlSanitizer,
    transaction::Transaction,
};
use rowmap_core::{
    mapping::{AggregateMapper, RowMapper},
    model::Model,
    row::Row,
    value::Value,
};
use serde::de::DeserializeOwned;
use tracing::debug;

///
/// Engine
///

pub struct Engine {
    pub(crate) driver: Box<dyn Driver>,
    registry: SqlRegistry,
    sanitizer: SqlSanitizer,
}

impl Engine {
    #[must_use]
    pub fn new(driver: Box<dyn Driver>, registry: SqlRegistry) -> Self {
        Self {
            driver,
            registry,
            sanitizer: SqlSanitizer::default(),
        }
    }

    /// Replace the default inline-SQL sanitizer.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: SqlSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Build an engine from a connection config: open the configured
    /// driver and load the configured SQL directory.
    pub fn from_config(config: &crate::config::ConnectionConfig) -> Result<Self, Error> {
        let driver = config.open_driver()?;
        let registry = SqlRegistry::load(&config.sql_dir)?;
        Ok(Self::new(driver, registry))
    }

    #[must_use]
    pub const fn registry(&self) -> &SqlRegistry {
        &self.registry
    }

    fn run(&mut self, name: &str, params: &Params) -> Result<ResultSet, Error> {
        let sql = self.registry.get(name)?.to_string();
        debug!(query = name, params = params.len(), "executing registry query");
        Ok(self.driver.execute(&sql, params)?)
    }

    /// All rows of a registry query.
    pub fn fetch_all(&mut self, name: &str, params: &Params) -> Result<Vec<Row>, Error> {
        Ok(self.run(name, params)?.into_rows())
    }

    /// At most one row. Zero rows is `None`; more than one is an error.
    pub fn fetch_one(&mut self, name: &str, params: &Params) -> Result<Option<Row>, Error> {
        let mut rows = self.run(name, params)?.into_rows();
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(Error::MultipleRows {
                query: name.to_string(),
                count,
            }),
        }
    }

    /// First column of the single result row, for `COUNT(*)`-shaped
    /// queries. Zero rows is `None`.
    pub fn fetch_scalar(&mut self, name: &str, params: &Params) -> Result<Option<Value>, Error> {
        Ok(self
            .fetch_one(name, params)?
            .and_then(|row| row.first_value().cloned()))
    }

    /// Run a writing registry query and report affected rows.
    pub fn execute(&mut self, name: &str, params: &Params) -> Result<u64, Error> {
        Ok(self.run(name, params)?.rows_affected)
    }

    /// All rows, each mapped to a flat target type.
    pub fn fetch_all_as<T: DeserializeOwned>(
        &mut self,
        name: &str,
        params: &Params,
    ) -> Result<Vec<T>, Error> {
        let rows = self.fetch_all(name, params)?;
        Ok(RowMapper::<T>::new().map_many(&rows)?)
    }

    /// At most one row, mapped to a flat target type.
    pub fn fetch_one_as<T: DeserializeOwned>(
        &mut self,
        name: &str,
        params: &Params,
    ) -> Result<Option<T>, Error> {
        self.fetch_one(name, params)?
            .map(|row| RowMapper::<T>::new().map_one(&row))
            .transpose()
            .map_err(Into::into)
    }

    /// Run a joined registry query and reconstruct aggregate roots.
    pub fn fetch_aggregate<T: Model>(
        &mut self,
        name: &str,
        params: &Params,
        mapper: &AggregateMapper<T>,
    ) -> Result<Vec<T>, Error> {
        let rows = self.fetch_all(name, params)?;
        Ok(mapper.map_many(&rows)?)
    }

    /// All rows of a sanitized inline query.
    pub fn fetch_all_inline(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, Error> {
        let sql = self.sanitizer.sanitize(sql)?;
        debug!(params = params.len(), "executing inline query");
        Ok(self.driver.execute(&sql, params)?.into_rows())
    }

    /// Run a sanitized inline writing statement.
    pub fn execute_inline(&mut self, sql: &str, params: &Params) -> Result<u64, Error> {
        let sql = self.sanitizer.sanitize(sql)?;
        debug!(params = params.len(), "executing inline statement");
        Ok(self.driver.execute(&sql, params)?.rows_affected)
    }

    /// Apply pending migrations through this engine's connection.
    pub fn migrate(&mut self, runner: &MigrationRunner) -> Result<Vec<u64>, Error> {
        Ok(runner.apply_all(self.driver.as_mut())?)
    }

    /// Start a transaction. The guard rolls back on drop unless
    /// explicitly committed.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, Error> {
        Transaction::begin(self)
    }
}
