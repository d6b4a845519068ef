//! Compiled mapping plans.
//!
//! Plans are immutable value types produced by the builder in
//! [`crate::mapping::aggregate`]'s companion module and consumed by the
//! reconstruction engine. They carry no execution state, so one plan may
//! be shared read-only across concurrent mapping calls.

///
/// EntityPlan
///
/// Column mapping for a single entity: the aggregate root, a collection
/// member, or a reference target.
///
/// Invariant (enforced at build time): `key_field` is one of the
/// attribute names in `field_map`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntityPlan {
    /// Target type name, for diagnostics only.
    pub model: String,

    /// Column prefix claiming this entity's columns, ending in `__`.
    pub prefix: String,

    /// Attribute used as the identity/dedup key.
    pub key_field: String,

    /// Ordered attribute name → unprefixed column name.
    pub field_map: Vec<(String, String)>,
}

impl EntityPlan {
    /// Fully prefixed column carrying this entity's identity key.
    #[must_use]
    pub fn key_column(&self) -> String {
        let column = self
            .field_map
            .iter()
            .find(|(attribute, _)| attribute == &self.key_field)
            .map_or(self.key_field.as_str(), |(_, column)| column.as_str());
        format!("{}{column}", self.prefix)
    }
}

///
/// CollectionPlan
///
/// One-to-many relationship: `attribute` on the root holds an ordered
/// collection of child entities.
///
/// Collections nest one level deep only: a collection member cannot
/// declare collections of its own. Deeper graphs are reconstructed by
/// running one plan per aggregate boundary.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectionPlan {
    pub attribute: String,
    pub entity: EntityPlan,
}

///
/// ReferencePlan
///
/// To-one relationship. The reference is constructed at most once per
/// root: the first row supplying a non-null reference key wins and later
/// rows never overwrite it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReferencePlan {
    pub attribute: String,
    pub entity: EntityPlan,
}

///
/// ValueObjectPlan
///
/// Embedded object without identity. Existence is inferred: the value
/// object is constructed (once per root) from the first row where at
/// least one mapped field is non-null.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValueObjectPlan {
    pub attribute: String,
    pub model: String,
    pub prefix: String,
    pub field_map: Vec<(String, String)>,
}

///
/// AggregatePlan
///
/// Compiled, validated aggregate mapping plan. Built once at wiring time
/// via [`crate::mapping::aggregate`] and reused across reconstruction
/// calls.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregatePlan {
    pub root: EntityPlan,
    pub collections: Vec<CollectionPlan>,
    pub references: Vec<ReferencePlan>,
    pub value_objects: Vec<ValueObjectPlan>,
    pub strict: bool,
}

impl AggregatePlan {
    /// All prefixes claimed by this plan, root first, in declaration order.
    #[must_use]
    pub fn known_prefixes(&self) -> Vec<&str> {
        let mut prefixes = Vec::with_capacity(
            1 + self.collections.len() + self.references.len() + self.value_objects.len(),
        );
        prefixes.push(self.root.prefix.as_str());
        prefixes.extend(self.collections.iter().map(|c| c.entity.prefix.as_str()));
        prefixes.extend(self.references.iter().map(|r| r.entity.prefix.as_str()));
        prefixes.extend(self.value_objects.iter().map(|v| v.prefix.as_str()));
        prefixes
    }
}

///
/// TESTS
///
