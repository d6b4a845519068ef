use crate::{
    mapping::plan::{
        AggregatePlan, CollectionPlan, EntityPlan, ReferencePlan, ValueObjectPlan,
    },
    model::Model,
};
use std::marker::PhantomData;
use thiserror::Error as ThisError;

/// Entry point of the aggregate mapping DSL.
///
/// The root prefix defaults to `lowercase(R::NAME) + "__"` and can be
/// overridden with [`AggregateBuilder::prefix`].
#[must_use]
pub fn aggregate<R: Model>() -> AggregateBuilder<R> {
    AggregateBuilder::new()
}

///
/// PlanError
///
/// Plan compilation failures. Raised by `build()`, before any row is
/// processed; never recoverable automatically — the plan declaration
/// itself must be fixed.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PlanError {
    #[error("root entity {model} must have a key field set via key()")]
    MissingKeyField { model: String },

    #[error("key field '{key_field}' of {model} is not present in its field map")]
    KeyFieldNotMapped { model: String, key_field: String },

    #[error("duplicate prefix '{prefix}': each entity must claim a unique column prefix")]
    DuplicatePrefix { prefix: String },
}

///
/// AggregateBuilder
///
/// Fluent plan compiler for aggregate mappings.
///
/// The builder is purely declarative: it accumulates field, collection,
/// reference, and value-object declarations and performs all validation
/// in [`AggregateBuilder::build`]. Child field maps are derived from each
/// child type's [`Model::FIELDS`] by identity.
///

pub struct AggregateBuilder<R: Model> {
    prefix: String,
    key_field: Option<String>,
    field_map: Vec<(String, String)>,
    auto_fields: bool,
    collections: Vec<ChildDecl>,
    references: Vec<ChildDecl>,
    value_objects: Vec<ValueObjectDecl>,
    strict: bool,
    _marker: PhantomData<R>,
}

struct ChildDecl {
    attribute: String,
    model: &'static str,
    fields: &'static [&'static str],
    prefix: String,
    key_field: String,
}

struct ValueObjectDecl {
    attribute: String,
    model: &'static str,
    fields: &'static [&'static str],
    prefix: String,
}

impl<R: Model> Default for AggregateBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Model> AggregateBuilder<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: format!("{}__", R::NAME.to_lowercase()),
            key_field: None,
            field_map: Vec::new(),
            auto_fields: false,
            collections: Vec::new(),
            references: Vec::new(),
            value_objects: Vec::new(),
            strict: false,
            _marker: PhantomData,
        }
    }

    /// Override the root column prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the identity key field of the root entity. Mandatory.
    #[must_use]
    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.key_field = Some(field.into());
        self
    }

    /// Map a root field whose column name equals the attribute name.
    #[must_use]
    pub fn field(self, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        let column = attribute.clone();
        self.field_as(attribute, column)
    }

    /// Map a root field to an explicitly named (unprefixed) column.
    #[must_use]
    pub fn field_as(mut self, attribute: impl Into<String>, column: impl Into<String>) -> Self {
        self.field_map.push((attribute.into(), column.into()));
        self
    }

    /// Auto-map every `R::FIELDS` name not already mapped and not claimed
    /// by a collection, reference, or value-object declaration.
    #[must_use]
    pub const fn auto_fields(mut self) -> Self {
        self.auto_fields = true;
        self
    }

    /// Declare a one-to-many child collection.
    #[must_use]
    pub fn collection<C: Model>(
        mut self,
        attribute: impl Into<String>,
        prefix: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.collections.push(ChildDecl {
            attribute: attribute.into(),
            model: C::NAME,
            fields: C::FIELDS,
            prefix: prefix.into(),
            key_field: key.into(),
        });
        self
    }

    /// Declare a to-one reference keyed by `id`.
    #[must_use]
    pub fn reference<C: Model>(
        self,
        attribute: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        self.reference_with_key::<C>(attribute, prefix, "id")
    }

    /// Declare a to-one reference with an explicit key field.
    #[must_use]
    pub fn reference_with_key<C: Model>(
        mut self,
        attribute: impl Into<String>,
        prefix: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.references.push(ChildDecl {
            attribute: attribute.into(),
            model: C::NAME,
            fields: C::FIELDS,
            prefix: prefix.into(),
            key_field: key.into(),
        });
        self
    }

    /// Declare an embedded value object (no identity).
    #[must_use]
    pub fn value_object<V: Model>(
        mut self,
        attribute: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        self.value_objects.push(ValueObjectDecl {
            attribute: attribute.into(),
            model: V::NAME,
            fields: V::FIELDS,
            prefix: prefix.into(),
        });
        self
    }

    /// Enable or disable strict first-row validation on the plan.
    #[must_use]
    pub const fn strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    /// Compile and validate the accumulated declarations.
    pub fn build(self) -> Result<AggregatePlan, PlanError> {
        let Some(key_field) = self.key_field else {
            return Err(PlanError::MissingKeyField {
                model: R::NAME.to_string(),
            });
        };

        // Attributes populated by composite declarations never auto-map.
        let composite: Vec<&str> = self
            .collections
            .iter()
            .map(|c| c.attribute.as_str())
            .chain(self.references.iter().map(|r| r.attribute.as_str()))
            .chain(self.value_objects.iter().map(|v| v.attribute.as_str()))
            .collect();

        let mut field_map = self.field_map;
        if self.auto_fields {
            for &name in R::FIELDS {
                let mapped = field_map.iter().any(|(attribute, _)| attribute == name);
                if !mapped && !composite.contains(&name) {
                    field_map.push((name.to_string(), name.to_string()));
                }
            }
        }

        if !field_map.iter().any(|(attribute, _)| attribute == &key_field) {
            return Err(PlanError::KeyFieldNotMapped {
                model: R::NAME.to_string(),
                key_field,
            });
        }

        let root = EntityPlan {
            model: R::NAME.to_string(),
            prefix: self.prefix,
            key_field,
            field_map,
        };

        let mut prefixes = vec![root.prefix.clone()];
        let mut claim_prefix = |prefix: &str| -> Result<(), PlanError> {
            if prefixes.iter().any(|known| known == prefix) {
                return Err(PlanError::DuplicatePrefix {
                    prefix: prefix.to_string(),
                });
            }
            prefixes.push(prefix.to_string());
            Ok(())
        };

        let mut collections = Vec::with_capacity(self.collections.len());
        for decl in self.collections {
            claim_prefix(&decl.prefix)?;
            collections.push(CollectionPlan {
                entity: decl.entity_plan()?,
                attribute: decl.attribute,
            });
        }

        let mut references = Vec::with_capacity(self.references.len());
        for decl in self.references {
            claim_prefix(&decl.prefix)?;
            references.push(ReferencePlan {
                entity: decl.entity_plan()?,
                attribute: decl.attribute,
            });
        }

        let mut value_objects = Vec::with_capacity(self.value_objects.len());
        for decl in self.value_objects {
            claim_prefix(&decl.prefix)?;
            value_objects.push(ValueObjectPlan {
                attribute: decl.attribute,
                model: decl.model.to_string(),
                prefix: decl.prefix,
                field_map: identity_field_map(decl.fields),
            });
        }

        Ok(AggregatePlan {
            root,
            collections,
            references,
            value_objects,
            strict: self.strict,
        })
    }
}

impl ChildDecl {
    fn entity_plan(&self) -> Result<EntityPlan, PlanError> {
        if !self.fields.contains(&self.key_field.as_str()) {
            return Err(PlanError::KeyFieldNotMapped {
                model: self.model.to_string(),
                key_field: self.key_field.clone(),
            });
        }

        Ok(EntityPlan {
            model: self.model.to_string(),
            prefix: self.prefix.clone(),
            key_field: self.key_field.clone(),
            field_map: identity_field_map(self.fields),
        })
    }
}

fn identity_field_map(fields: &[&str]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|&name| (name.to_string(), name.to_string()))
        .collect()
}

///
/// TESTS
///
