mod aggregate;
mod builder;
mod row_mapper;

pub mod plan;

use crate::row::Row;
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error as ThisError;

// re-exports
pub use aggregate::AggregateMapper;
pub use builder::{AggregateBuilder, PlanError, aggregate};
pub use row_mapper::RowMapper;

///
/// MapError
///
/// Mapping failures raised while turning rows into typed objects.
/// All variants are synchronous, deterministic, and non-retryable.
///

#[derive(Debug, ThisError)]
pub enum MapError {
    /// The target type rejected the assembled field set.
    #[error("cannot map row into {model}: {detail}")]
    ColumnMismatch { model: String, detail: String },

    #[error(transparent)]
    Strict(#[from] StrictModeViolation),
}

///
/// StrictModeViolation
///
/// Schema mismatch detected from the first row of a batch in strict mode.
/// Raised before any reconstruction, so a failing call returns zero
/// partial results.
///

#[derive(Debug, ThisError)]
pub enum StrictModeViolation {
    #[error("missing mapped column '{column}' for {model} field '{attribute}'")]
    MissingColumn {
        column: String,
        model: String,
        attribute: String,
    },

    #[error(
        "unknown prefix group '{prefix}' in column '{column}'; known prefixes: {}",
        known.join(", ")
    )]
    UnknownPrefix {
        prefix: String,
        column: String,
        known: Vec<String>,
    },
}

/// Extract one entity's fields from a row as a hydration draft.
///
/// A missing or NULL column becomes a JSON null attribute; whether that is
/// acceptable is decided by the target type at finalization.
pub(crate) fn extract_fields(
    row: &Row,
    prefix: &str,
    field_map: &[(String, String)],
) -> JsonMap<String, JsonValue> {
    let mut fields = JsonMap::with_capacity(field_map.len());
    for (attribute, column) in field_map {
        let value = row
            .get(&format!("{prefix}{column}"))
            .map_or(JsonValue::Null, crate::value::Value::to_json);
        fields.insert(attribute.clone(), value);
    }
    fields
}
