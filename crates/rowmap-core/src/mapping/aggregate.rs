use crate::{
    mapping::{MapError, StrictModeViolation, extract_fields, plan::AggregatePlan},
    model::Model,
    row::Row,
    value::Value,
};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

/// Column prefix delimiter. A prefix is everything up to and including
/// the first occurrence of this delimiter in a column name.
const PREFIX_DELIMITER: &str = "__";

///
/// AggregateMapper
///
/// Single-pass reconstruction of aggregate object graphs from joined,
/// denormalized result sets.
///
/// The pass maintains an identity map per distinct root key and a
/// per-(root, collection) set of seen child keys; duplicate rows produced
/// by join flattening are absorbed without duplication, output order is
/// first-occurrence order, and no previously processed row or constructed
/// draft is ever re-scanned — O(rows × plan width) overall.
///
/// Single-row mapping is deliberately not offered here; that is
/// [`crate::mapping::RowMapper`]'s job.
///

pub struct AggregateMapper<T: Model> {
    plan: AggregatePlan,
    _marker: PhantomData<T>,
}

/// Mutable per-root accumulation state. Drafts are frozen into typed
/// instances only after the pass completes.
struct RootDraft {
    fields: JsonMap<String, JsonValue>,
    collections: Vec<Vec<JsonValue>>,
    seen_children: Vec<HashSet<Value>>,
    references: Vec<Option<JsonValue>>,
    value_objects: Vec<Option<JsonValue>>,
}

impl<T: Model> AggregateMapper<T> {
    #[must_use]
    pub const fn new(plan: AggregatePlan) -> Self {
        Self {
            plan,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn plan(&self) -> &AggregatePlan {
        &self.plan
    }

    /// Reconstruct root objects from `rows`, in first-seen root order.
    ///
    /// Empty input yields empty output without validation. In strict mode
    /// the first row is validated against the plan before the pass; a
    /// violation aborts the whole call with zero partial results.
    pub fn map_many(&self, rows: &[Row]) -> Result<Vec<T>, MapError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        if self.plan.strict {
            self.validate_strict(&rows[0])?;
        }

        let plan = &self.plan;
        let root_key_column = plan.root.key_column();
        let collection_key_columns: Vec<String> = plan
            .collections
            .iter()
            .map(|c| c.entity.key_column())
            .collect();
        let reference_key_columns: Vec<String> = plan
            .references
            .iter()
            .map(|r| r.entity.key_column())
            .collect();

        let mut order: Vec<Value> = Vec::new();
        let mut drafts: HashMap<Value, RootDraft> = HashMap::new();

        for row in rows {
            let root_key = row.value(&root_key_column);

            // A row without a root identity contributes nothing, not even
            // to children.
            if root_key.is_null() {
                continue;
            }

            let draft = drafts.entry(root_key.clone()).or_insert_with(|| {
                order.push(root_key);
                RootDraft {
                    fields: extract_fields(row, &plan.root.prefix, &plan.root.field_map),
                    collections: vec![Vec::new(); plan.collections.len()],
                    seen_children: vec![HashSet::new(); plan.collections.len()],
                    references: vec![None; plan.references.len()],
                    value_objects: vec![None; plan.value_objects.len()],
                }
            });

            for (slot, collection) in plan.collections.iter().enumerate() {
                let child_key = row.value(&collection_key_columns[slot]);
                if child_key.is_null() {
                    continue;
                }
                if draft.seen_children[slot].insert(child_key) {
                    let child =
                        extract_fields(row, &collection.entity.prefix, &collection.entity.field_map);
                    draft.collections[slot].push(JsonValue::Object(child));
                }
            }

            for (slot, reference) in plan.references.iter().enumerate() {
                if draft.references[slot].is_some() {
                    continue;
                }
                let reference_key = row.value(&reference_key_columns[slot]);
                if !reference_key.is_null() {
                    let fields =
                        extract_fields(row, &reference.entity.prefix, &reference.entity.field_map);
                    draft.references[slot] = Some(JsonValue::Object(fields));
                }
            }

            for (slot, value_object) in plan.value_objects.iter().enumerate() {
                if draft.value_objects[slot].is_some() {
                    continue;
                }
                let fields = extract_fields(row, &value_object.prefix, &value_object.field_map);
                if fields.values().any(|value| !value.is_null()) {
                    draft.value_objects[slot] = Some(JsonValue::Object(fields));
                }
            }
        }

        let mut roots = Vec::with_capacity(order.len());
        for key in order {
            let draft = drafts
                .remove(&key)
                .unwrap_or_else(|| unreachable!("ordered root key without draft"));
            roots.push(self.finalize(draft)?);
        }
        Ok(roots)
    }

    /// Freeze one draft into a typed root instance.
    fn finalize(&self, draft: RootDraft) -> Result<T, MapError> {
        let plan = &self.plan;
        let mut fields = draft.fields;

        for (collection, elements) in plan.collections.iter().zip(draft.collections) {
            fields.insert(collection.attribute.clone(), JsonValue::Array(elements));
        }
        for (reference, value) in plan.references.iter().zip(draft.references) {
            fields.insert(
                reference.attribute.clone(),
                value.unwrap_or(JsonValue::Null),
            );
        }
        for (value_object, value) in plan.value_objects.iter().zip(draft.value_objects) {
            fields.insert(
                value_object.attribute.clone(),
                value.unwrap_or(JsonValue::Null),
            );
        }

        serde_json::from_value(JsonValue::Object(fields)).map_err(|err| MapError::ColumnMismatch {
            model: plan.root.model.clone(),
            detail: err.to_string(),
        })
    }

    /// Validate the plan against the first row's columns.
    fn validate_strict(&self, sample: &Row) -> Result<(), StrictModeViolation> {
        let plan = &self.plan;

        for (attribute, column) in &plan.root.field_map {
            let full = format!("{}{column}", plan.root.prefix);
            if !sample.contains_column(&full) {
                return Err(StrictModeViolation::MissingColumn {
                    column: full,
                    model: plan.root.model.clone(),
                    attribute: attribute.clone(),
                });
            }
        }

        for collection in &plan.collections {
            for (attribute, column) in &collection.entity.field_map {
                let full = format!("{}{column}", collection.entity.prefix);
                if !sample.contains_column(&full) {
                    return Err(StrictModeViolation::MissingColumn {
                        column: full,
                        model: collection.entity.model.clone(),
                        attribute: attribute.clone(),
                    });
                }
            }
        }

        let known = plan.known_prefixes();
        for column in sample.columns() {
            if let Some(at) = column.find(PREFIX_DELIMITER) {
                let prefix = &column[..at + PREFIX_DELIMITER.len()];
                if !known.contains(&prefix) {
                    return Err(StrictModeViolation::UnknownPrefix {
                        prefix: prefix.to_string(),
                        column: column.clone(),
                        known: known.iter().map(ToString::to_string).collect(),
                    });
                }
            }
        }

        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::aggregate;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct OrderLine {
        id: i64,
        total: f64,
    }

    impl Model for OrderLine {
        const NAME: &'static str = "OrderLine";
        const FIELDS: &'static [&'static str] = &["id", "total"];
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Address {
        city: Option<String>,
        zip: Option<String>,
    }

    impl Model for Address {
        const NAME: &'static str = "Address";
        const FIELDS: &'static [&'static str] = &["city", "zip"];
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        id: i64,
        bio: Option<String>,
    }

    impl Model for Profile {
        const NAME: &'static str = "Profile";
        const FIELDS: &'static [&'static str] = &["id", "bio"];
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: Option<String>,
        orders: Vec<OrderLine>,
        profile: Option<Profile>,
        address: Option<Address>,
    }

    impl Model for User {
        const NAME: &'static str = "User";
        const FIELDS: &'static [&'static str] = &["id", "name", "orders", "profile", "address"];
    }

    fn full_plan(strict: bool) -> AggregatePlan {
        aggregate::<User>()
            .key("id")
            .field("id")
            .field("name")
            .collection::<OrderLine>("orders", "orders__", "id")
            .reference::<Profile>("profile", "profile__")
            .value_object::<Address>("address", "address__")
            .strict(strict)
            .build()
            .unwrap()
    }

    fn user_row(entries: &[(&str, Value)]) -> Row {
        Row::from_pairs(entries.iter().map(|(c, v)| ((*c).to_string(), v.clone())))
    }

    fn base_row(user_id: i64, name: &str, order_id: i64, total: f64) -> Row {
        user_row(&[
            ("user__id", Value::Int(user_id)),
            ("user__name", Value::from(name)),
            ("orders__id", Value::Int(order_id)),
            ("orders__total", Value::Float(total)),
            ("profile__id", Value::Null),
            ("profile__bio", Value::Null),
            ("address__city", Value::Null),
            ("address__zip", Value::Null),
        ])
    }

    #[test]
    fn empty_input_is_empty_output() {
        let mapper = AggregateMapper::<User>::new(full_plan(true));
        assert!(mapper.map_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn basic_aggregate_scenario() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let rows = vec![
            base_row(1, "Alice", 10, 99.99),
            base_row(1, "Alice", 11, 49.99),
        ];

        let users = mapper.map_many(&rows).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name.as_deref(), Some("Alice"));
        assert_eq!(
            users[0].orders,
            vec![
                OrderLine {
                    id: 10,
                    total: 99.99
                },
                OrderLine {
                    id: 11,
                    total: 49.99
                },
            ]
        );
    }

    #[test]
    fn renamed_key_column_drives_identity() {
        let plan = aggregate::<User>()
            .key("id")
            .field_as("id", "user_pk")
            .field("name")
            .collection::<OrderLine>("orders", "orders__", "id")
            .reference::<Profile>("profile", "profile__")
            .value_object::<Address>("address", "address__")
            .build()
            .unwrap();
        let mapper = AggregateMapper::<User>::new(plan);

        let order = |id: i64| {
            user_row(&[
                ("user__user_pk", Value::Int(1)),
                ("user__name", Value::from("Alice")),
                ("orders__id", Value::Int(id)),
                ("orders__total", Value::Float(1.0)),
            ])
        };
        let users = mapper.map_many(&[order(10), order(10), order(11)]).unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 1);
        let ids: Vec<i64> = users[0].orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, [10, 11]);
    }

    #[test]
    fn duplicate_join_rows_are_absorbed() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let rows = vec![
            base_row(1, "Alice", 10, 99.99),
            base_row(1, "Alice", 10, 99.99),
            base_row(1, "Alice", 11, 49.99),
            base_row(1, "Alice", 10, 99.99),
        ];

        let users = mapper.map_many(&rows).unwrap();
        assert_eq!(users[0].orders.len(), 2);
    }

    #[test]
    fn root_order_is_first_seen_not_sorted() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let rows = vec![
            base_row(9, "Zed", 1, 1.0),
            base_row(3, "Ann", 2, 2.0),
            base_row(9, "Zed", 3, 3.0),
            base_row(7, "Kim", 4, 4.0),
        ];

        let users = mapper.map_many(&rows).unwrap();
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, [9, 3, 7]);
    }

    #[test]
    fn null_root_key_skips_entire_row() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let rows = vec![
            user_row(&[
                ("user__id", Value::Null),
                ("user__name", Value::from("ghost")),
                ("orders__id", Value::Int(99)),
                ("orders__total", Value::Float(5.0)),
            ]),
            base_row(1, "Alice", 10, 99.99),
        ];

        let users = mapper.map_many(&rows).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 1);
        // The orphaned child from the null-root row must not leak anywhere.
        assert_eq!(users[0].orders.len(), 1);
        assert_eq!(users[0].orders[0].id, 10);
    }

    #[test]
    fn null_child_key_leaves_collection_empty() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let rows = vec![user_row(&[
            ("user__id", Value::Int(1)),
            ("user__name", Value::from("Alice")),
            ("orders__id", Value::Null),
            ("orders__total", Value::Null),
        ])];

        let users = mapper.map_many(&rows).unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].orders.is_empty());
    }

    #[test]
    fn same_child_key_under_different_roots_is_independent() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let rows = vec![base_row(1, "Alice", 10, 99.99), base_row(2, "Bob", 10, 1.0)];

        let users = mapper.map_many(&rows).unwrap();
        assert_eq!(users[0].orders.len(), 1);
        assert_eq!(users[1].orders.len(), 1);
    }

    #[test]
    fn reference_first_row_wins() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let mut first = base_row(1, "Alice", 10, 99.99);
        first.insert("profile__id", Value::Int(5));
        first.insert("profile__bio", Value::from("first"));
        let mut second = base_row(1, "Alice", 11, 49.99);
        second.insert("profile__id", Value::Int(6));
        second.insert("profile__bio", Value::from("second"));

        let users = mapper.map_many(&[first, second]).unwrap();
        assert_eq!(
            users[0].profile,
            Some(Profile {
                id: 5,
                bio: Some("first".to_string())
            })
        );
    }

    #[test]
    fn reference_populates_from_later_row_when_earlier_is_null() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let first = base_row(1, "Alice", 10, 99.99);
        let mut second = base_row(1, "Alice", 11, 49.99);
        second.insert("profile__id", Value::Int(6));
        second.insert("profile__bio", Value::from("late"));

        let users = mapper.map_many(&[first, second]).unwrap();
        assert_eq!(
            users[0].profile,
            Some(Profile {
                id: 6,
                bio: Some("late".to_string())
            })
        );
    }

    #[test]
    fn value_object_requires_one_non_null_field() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let first = base_row(1, "Alice", 10, 99.99);
        let mut second = base_row(1, "Alice", 11, 49.99);
        second.insert("address__city", Value::from("Reykjavik"));

        let users = mapper.map_many(&[first, second]).unwrap();
        assert_eq!(
            users[0].address,
            Some(Address {
                city: Some("Reykjavik".to_string()),
                zip: None
            })
        );
    }

    #[test]
    fn value_object_first_row_wins() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let mut first = base_row(1, "Alice", 10, 99.99);
        first.insert("address__city", Value::from("Oslo"));
        let mut second = base_row(1, "Alice", 11, 49.99);
        second.insert("address__city", Value::from("Bergen"));

        let users = mapper.map_many(&[first, second]).unwrap();
        assert_eq!(users[0].address.as_ref().unwrap().city.as_deref(), Some("Oslo"));
    }

    #[test]
    fn strict_mode_rejects_missing_root_column() {
        let mapper = AggregateMapper::<User>::new(full_plan(true));
        // A full row except user__name.
        let row = user_row(&[
            ("user__id", Value::Int(1)),
            ("orders__id", Value::Int(10)),
            ("orders__total", Value::Float(99.99)),
            ("profile__id", Value::Null),
            ("profile__bio", Value::Null),
            ("address__city", Value::Null),
            ("address__zip", Value::Null),
        ]);

        let err = mapper.map_many(&[row]).unwrap_err();
        let MapError::Strict(StrictModeViolation::MissingColumn { column, model, .. }) = err else {
            panic!("expected missing-column strict violation");
        };
        assert_eq!(column, "user__name");
        assert_eq!(model, "User");
    }

    #[test]
    fn strict_mode_rejects_unknown_prefix() {
        let mapper = AggregateMapper::<User>::new(full_plan(true));
        let mut row = base_row(1, "Alice", 10, 99.99);
        row.insert("payments__id", Value::Int(1));

        let err = mapper.map_many(&[row]).unwrap_err();
        let MapError::Strict(StrictModeViolation::UnknownPrefix { prefix, known, .. }) = err else {
            panic!("expected unknown-prefix strict violation");
        };
        assert_eq!(prefix, "payments__");
        assert!(known.contains(&"user__".to_string()));
        assert!(known.contains(&"orders__".to_string()));
    }

    #[test]
    fn strict_mode_validates_first_row_only() {
        let mapper = AggregateMapper::<User>::new(full_plan(true));
        let first = base_row(1, "Alice", 10, 99.99);
        // Later rows are not validated; their missing columns read as null.
        let second = user_row(&[("user__id", Value::Int(2))]);

        let users = mapper.map_many(&[first, second]).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].name, None);
    }

    #[test]
    fn non_strict_tolerates_missing_columns_as_null() {
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let row = user_row(&[("user__id", Value::Int(1))]);

        let users = mapper.map_many(&[row]).unwrap();
        assert_eq!(users[0].id, 1);
        assert_eq!(users[0].name, None);
        assert!(users[0].orders.is_empty());
        assert!(users[0].profile.is_none());
        assert!(users[0].address.is_none());
    }

    #[test]
    fn construction_failure_is_wrapped_with_model_name() {
        // user__id maps to a non-Option i64; a text value cannot hydrate it.
        let mapper = AggregateMapper::<User>::new(full_plan(false));
        let row = user_row(&[("user__id", Value::from("not-a-number"))]);

        let err = mapper.map_many(&[row]).unwrap_err();
        let MapError::ColumnMismatch { model, .. } = err else {
            panic!("expected column mismatch");
        };
        assert_eq!(model, "User");
    }
}
