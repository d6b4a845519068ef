//! SQLite driver over rusqlite.

use crate::{
    driver::{Driver, DriverError, Params, ResultSet},
    params::ParamStyle,
};
use rowmap_core::{row::Row, value::Value};
use rusqlite::{
    Connection, ToSql,
    types::{ToSqlOutput, ValueRef},
};
use std::path::Path;
use tracing::debug;

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

///
/// SqliteDriver
///
/// One rusqlite connection. SQLite binds `:name` placeholders natively,
/// so no rewriting happens on this path.
///

#[derive(Debug)]
pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    /// Open (creating if absent) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening sqlite database");
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DriverError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }
}

impl Driver for SqliteDriver {
    fn param_style(&self) -> ParamStyle {
        ParamStyle::Named
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<ResultSet, DriverError> {
        let mut stmt = self.conn.prepare(sql)?;

        // rusqlite wants the leading colon in the bound name.
        let bindings: Vec<(String, SqliteValue<'_>)> = params
            .iter()
            .map(|(name, value)| (format!(":{name}"), SqliteValue(value)))
            .collect();
        let named: Vec<(&str, &dyn ToSql)> = bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();

        // No result columns means a writing statement.
        if stmt.column_count() == 0 {
            let affected = stmt.execute(named.as_slice())?;
            return Ok(ResultSet {
                columns: Vec::new(),
                rows: Vec::new(),
                rows_affected: affected as u64,
            });
        }

        let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let mut raw = stmt.query(named.as_slice())?;
        let mut rows = Vec::new();
        while let Some(record) = raw.next()? {
            let mut row = Row::new();
            for (slot, column) in columns.iter().enumerate() {
                row.insert(column.clone(), from_sqlite(record.get_ref(slot)?));
            }
            rows.push(row);
        }

        Ok(ResultSet {
            columns,
            rows,
            rows_affected: 0,
        })
    }

    fn execute_script(&mut self, sql: &str) -> Result<(), DriverError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

/// Borrowing adapter so [`Value`] can be bound through rusqlite's
/// [`ToSql`] without owning a conversion per parameter.
struct SqliteValue<'a>(&'a Value);

impl ToSql for SqliteValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(b) => ToSqlOutput::Owned(i64::from(*b).into()),
            Value::Int(i) => ToSqlOutput::Owned((*i).into()),
            Value::Float(f) => ToSqlOutput::Owned((*f).into()),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

///
/// TESTS
///
