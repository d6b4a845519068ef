//! Integration-level reconstruction checks: scale behavior and
//! property-based dedup/ordering guarantees.

use proptest::prelude::*;
use rowmap_core::prelude::*;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct OrderLine {
    id: i64,
    total: Option<f64>,
}

impl Model for OrderLine {
    const NAME: &'static str = "OrderLine";
    const FIELDS: &'static [&'static str] = &["id", "total"];
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    name: Option<String>,
    orders: Vec<OrderLine>,
}

impl Model for User {
    const NAME: &'static str = "User";
    const FIELDS: &'static [&'static str] = &["id", "name", "orders"];
}

fn user_orders_plan() -> AggregatePlan {
    aggregate::<User>()
        .key("id")
        .auto_fields()
        .collection::<OrderLine>("orders", "orders__", "id")
        .build()
        .unwrap()
}

fn joined_row(user_id: Option<i64>, order_id: Option<i64>) -> Row {
    Row::from_pairs([
        ("user__id".to_string(), Value::from(user_id)),
        (
            "user__name".to_string(),
            user_id.map_or(Value::Null, |id| Value::Text(format!("user-{id}"))),
        ),
        ("orders__id".to_string(), Value::from(order_id)),
        (
            "orders__total".to_string(),
            order_id.map_or(Value::Null, |id| Value::Float(id as f64)),
        ),
    ])
}

#[test]
fn reconstructs_one_thousand_roots_with_ten_children_each() {
    let mapper = AggregateMapper::<User>::new(user_orders_plan());

    let mut rows = Vec::with_capacity(10_000);
    for user_id in 0..1_000i64 {
        for child in 0..10i64 {
            rows.push(joined_row(Some(user_id), Some(user_id * 10 + child)));
        }
    }

    let users = mapper.map_many(&rows).unwrap();
    assert_eq!(users.len(), 1_000);
    for (position, user) in users.iter().enumerate() {
        assert_eq!(user.id, position as i64);
        assert_eq!(user.orders.len(), 10);
    }
}

/// Naive reference model: first-seen root order, per-root first-seen
/// distinct child keys.
fn reference_reconstruction(pairs: &[(Option<i64>, Option<i64>)]) -> Vec<(i64, Vec<i64>)> {
    let mut out: Vec<(i64, Vec<i64>)> = Vec::new();
    for &(user_id, order_id) in pairs {
        let Some(user_id) = user_id else { continue };
        let entry = match out.iter_mut().find(|(id, _)| *id == user_id) {
            Some(entry) => entry,
            None => {
                out.push((user_id, Vec::new()));
                out.last_mut().unwrap()
            }
        };
        if let Some(order_id) = order_id {
            if !entry.1.contains(&order_id) {
                entry.1.push(order_id);
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn dedup_and_ordering_match_reference_model(
        pairs in prop::collection::vec(
            (prop::option::of(0i64..8), prop::option::of(0i64..16)),
            0..64,
        )
    ) {
        let mapper = AggregateMapper::<User>::new(user_orders_plan());
        let rows: Vec<Row> = pairs
            .iter()
            .map(|&(user_id, order_id)| joined_row(user_id, order_id))
            .collect();

        let users = mapper.map_many(&rows).unwrap();
        let expected = reference_reconstruction(&pairs);

        let actual: Vec<(i64, Vec<i64>)> = users
            .iter()
            .map(|u| (u.id, u.orders.iter().map(|o| o.id).collect()))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn duplicate_rows_do_not_change_output(
        pairs in prop::collection::vec((0i64..6, 0i64..12), 1..32)
    ) {
        let mapper = AggregateMapper::<User>::new(user_orders_plan());

        let rows: Vec<Row> = pairs
            .iter()
            .map(|&(user_id, order_id)| joined_row(Some(user_id), Some(order_id)))
            .collect();

        // Same input with every row repeated back-to-back.
        let doubled: Vec<Row> = rows
            .iter()
            .flat_map(|row| [row.clone(), row.clone()])
            .collect();

        let plain = mapper.map_many(&rows).unwrap();
        let deduped = mapper.map_many(&doubled).unwrap();
        prop_assert_eq!(plain, deduped);
    }
}
