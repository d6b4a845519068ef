//! Backend boundary.
//!
//! Everything above this module speaks `:name` placeholder SQL plus
//! [`Params`]; a [`Driver`] owns one connection and converts that to
//! whatever its backend expects. SQLite ships in-tree; other backends
//! surface as [`DriverError::UnsupportedBackend`] at configuration time.

pub mod sqlite;

use crate::params::ParamStyle;
use derive_more::{Deref, DerefMut, IntoIterator};
use rowmap_core::{row::Row, value::Value};
use thiserror::Error as ThisError;

///
/// DriverError
///

#[derive(Debug, ThisError)]
pub enum DriverError {
    #[error("database error: {0}")]
    Database(String),

    #[error("no driver for backend '{backend}' in this build")]
    UnsupportedBackend { backend: String },
}

///
/// Params
///
/// Named query parameters in insertion order. The same set is reusable
/// across queries; names absent from the SQL are a driver-level error.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, IntoIterator)]
#[into_iterator(owned, ref)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Fluent insert, for call-site construction.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value)
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

///
/// ResultSet
///
/// What a statement produced: rows for reading statements, an affected
/// count for writing ones. A statement never populates both.
///

#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl ResultSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

///
/// Driver
///
/// One open connection to one backend. Implementations receive SQL in
/// `:name` placeholder form and rewrite it to their own style via
/// [`crate::params::rewrite`] before binding.
///

pub trait Driver: std::fmt::Debug {
    /// Placeholder style this backend binds with.
    fn param_style(&self) -> ParamStyle;

    /// Run a single statement and collect its result.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<ResultSet, DriverError>;

    /// Run a multi-statement script without parameters, e.g. a migration
    /// file or schema bootstrap.
    fn execute_script(&mut self, sql: &str) -> Result<(), DriverError>;

    fn begin(&mut self) -> Result<(), DriverError>;
    fn commit(&mut self) -> Result<(), DriverError>;
    fn rollback(&mut self) -> Result<(), DriverError>;
}

///
/// TESTS
///
