//! Pure mapping core for rowmap: scalar values, ordered rows, model
//! descriptors, mapping plans, and the aggregate reconstruction engine.
//!
//! Nothing in this crate performs I/O. Plans are compiled once, are
//! immutable, and may be shared read-only across concurrent mapping calls.
#![warn(unreachable_pub)]

pub mod mapping;
pub mod model;
pub mod row;
pub mod value;

///
/// Prelude
///
/// Domain vocabulary only. Errors and internal helpers are not re-exported.
///

pub mod prelude {
    pub use crate::{
        mapping::{AggregateMapper, RowMapper, aggregate, plan::AggregatePlan},
        model::Model,
        row::Row,
        value::Value,
    };
}
