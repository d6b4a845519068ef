use crate::value::Value;
use std::collections::HashMap;

///
/// Row
///
/// One record from a (possibly joined) query result: an ordered mapping
/// from column name to [`Value`]. Column order is the order of first
/// insertion; a repeated column name overwrites the earlier value in
/// place, keeping its original position.
///
/// The mapping layer treats an absent column and a `Null` value the same
/// way, so `value()` is usually the right accessor.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
    index: HashMap<String, usize>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs in order.
    #[must_use]
    pub fn from_pairs<I, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, Value)>,
        C: Into<String>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.insert(column, value);
        }
        row
    }

    /// Insert or overwrite a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        if let Some(&slot) = self.index.get(&column) {
            self.values[slot] = value;
        } else {
            self.index.insert(column.clone(), self.columns.len());
            self.columns.push(column);
            self.values.push(value);
        }
    }

    /// Look up a column. `None` means the column is absent from the row.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.index.get(column).map(|&slot| &self.values[slot])
    }

    /// Look up a column, collapsing "absent" and SQL NULL into `Null`.
    #[must_use]
    pub fn value(&self, column: &str) -> Value {
        self.get(column).cloned().unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn contains_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Column names in insertion order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate `(column, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// First value in column order, if any. Used for scalar fetches.
    #[must_use]
    pub fn first_value(&self) -> Option<&Value> {
        self.values.first()
    }
}

///
/// TESTS
///
