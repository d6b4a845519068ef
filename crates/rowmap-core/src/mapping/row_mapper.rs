use crate::{mapping::MapError, row::Row};
use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use std::marker::PhantomData;

///
/// RowMapper
///
/// One row ↔ one flat object. No joins, no identity tracking, no nested
/// construction — the single-row counterpart of
/// [`crate::mapping::AggregateMapper`].
///
/// An optional alias table renames columns to attribute names before the
/// target type sees the field set.
///

pub struct RowMapper<T: DeserializeOwned> {
    aliases: HashMap<String, String>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> Default for RowMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> RowMapper<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// Build a mapper with a column-name → attribute-name alias table.
    #[must_use]
    pub fn with_aliases<I, C, A>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (C, A)>,
        C: Into<String>,
        A: Into<String>,
    {
        Self {
            aliases: aliases
                .into_iter()
                .map(|(column, attribute)| (column.into(), attribute.into()))
                .collect(),
            _marker: PhantomData,
        }
    }

    /// Map a single row to a target instance.
    pub fn map_one(&self, row: &Row) -> Result<T, MapError> {
        let mut fields = JsonMap::with_capacity(row.len());
        for (column, value) in row.iter() {
            let attribute = self
                .aliases
                .get(column)
                .map_or(column, String::as_str)
                .to_string();
            fields.insert(attribute, value.to_json());
        }

        serde_json::from_value(JsonValue::Object(fields)).map_err(|err| {
            MapError::ColumnMismatch {
                model: std::any::type_name::<T>().to_string(),
                detail: err.to_string(),
            }
        })
    }

    /// Map all rows in order. Any single failure aborts the whole call;
    /// there are no partial results.
    pub fn map_many(&self, rows: &[Row]) -> Result<Vec<T>, MapError> {
        rows.iter().map(|row| self.map_one(row)).collect()
    }
}

///
/// TESTS
///
