//! Shipping methods collection (read-only).
//!
//! Quotes rates fresh on every read and returns them in deterministic
//! order: price first, ties broken by carrier sort order, then by method
//! sort order.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::{Quote, ShippingRate};
use crate::projection::registry::{decimal_value, string_or_null};
use crate::projection::{AttributeCodec, CoercionKind, Hook, ProjectionContext};
use crate::state::AppState;

use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &[
    "carrier",
    "carrier_title",
    "code",
    "description",
    "method",
    "method_title",
    "price",
];

static CODEC: AttributeCodec = AttributeCodec::new(
    &[("description", "method_description")],
    &[
        ("carrier", CoercionKind::Text),
        ("carrier_title", CoercionKind::Text),
        ("code", CoercionKind::Text),
        ("description", CoercionKind::Text),
        ("method", CoercionKind::Text),
        ("method_title", CoercionKind::Text),
        ("price", CoercionKind::Currency),
    ],
);

/// Project the currently quotable shipping rates.
pub fn prepare_collection(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
) -> Result<Vec<Value>> {
    if quote.is_virtual {
        return Ok(Vec::new());
    }

    quote.shipping_address.collect_shipping_rates = true;
    state.engine().collect_shipping_rates(quote)?;

    let mut rates: Vec<ShippingRate> = quote
        .shipping_address
        .rates
        .iter()
        .filter(|rate| !rate.deleted && !rate.carrier.is_empty())
        .cloned()
        .collect();
    rates.sort_by(compare_rates);

    let filter = build_filter(state, Resource::ShippingMethod, ctx, READ_ATTRIBUTES, &[]);

    let mut data = Vec::new();
    for rate in &rates {
        let mut entry = Map::new();
        for attribute in filter.attributes_to_include() {
            let internal = CODEC.internal(attribute);
            entry.insert(attribute.clone(), read_rate(rate, internal));
        }

        state
            .interceptors()
            .run(Resource::ShippingMethod, Hook::Prepare, &mut entry, ctx);

        data.push(Value::Object(shape_output(
            state,
            &CODEC,
            &filter,
            entry,
            &quote.currency,
        )));
    }

    Ok(data)
}

fn read_rate(rate: &ShippingRate, field: &str) -> Value {
    match field {
        "carrier" => Value::String(rate.carrier.clone()),
        "carrier_title" => Value::String(rate.carrier_title.clone()),
        "code" => Value::String(rate.code.clone()),
        "method" => Value::String(rate.method.clone()),
        "method_title" => Value::String(rate.method_title.clone()),
        "method_description" => string_or_null(rate.method_description.as_deref()),
        "price" => decimal_value(rate.price),
        _ => Value::Null,
    }
}

/// Deterministic rate ordering: price in minor-unit steps, then carrier
/// sort order, then method sort order.
fn compare_rates(a: &ShippingRate, b: &ShippingRate) -> Ordering {
    price_steps(a.price)
        .cmp(&price_steps(b.price))
        .then_with(|| a.carrier_sort_order.cmp(&b.carrier_sort_order))
        .then_with(|| a.method_sort_order.cmp(&b.method_sort_order))
}

fn price_steps(price: Decimal) -> i64 {
    (price * Decimal::from(10_000))
        .round()
        .to_i64()
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::acl::{AllowAllPolicy, Principal};
    use crate::config::CartApiConfig;
    use crate::engine::MemoryEngine;
    use crate::engine::memory::{Carrier, CarrierMethod};
    use crate::projection::{ActionType, Interceptors, Operation};
    use std::str::FromStr;
    use std::sync::Arc;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rate(price: &str, carrier_order: i32, method_order: i32, code: &str) -> ShippingRate {
        ShippingRate {
            code: code.to_string(),
            carrier: code.split('_').next().unwrap_or_default().to_string(),
            carrier_title: String::new(),
            method: String::new(),
            method_title: String::new(),
            method_description: None,
            price: dec(price),
            carrier_sort_order: carrier_order,
            method_sort_order: method_order,
            deleted: false,
        }
    }

    fn ctx() -> ProjectionContext {
        ProjectionContext::root(
            ActionType::Collection,
            Operation::Retrieve,
            None,
            None,
            Principal::Guest,
        )
    }

    #[test]
    fn test_price_ties_break_on_carrier_then_method_order() {
        let mut rates = vec![
            rate("5.00", 2, 0, "b_x"),
            rate("5.00", 1, 5, "a_y"),
            rate("5.00", 1, 1, "a_x"),
            rate("4.99", 9, 9, "c_x"),
        ];
        rates.sort_by(compare_rates);

        let codes: Vec<&str> = rates.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["c_x", "a_x", "a_y", "b_x"]);
    }

    #[test]
    fn test_prepare_collection_orders_and_shapes() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        // Two same-price carriers with inverted sort orders.
        engine.set_carriers(vec![
            Carrier {
                carrier: "zeta".to_string(),
                carrier_title: "Zeta Shipping".to_string(),
                sort_order: 2,
                methods: vec![CarrierMethod {
                    method: "standard".to_string(),
                    method_title: "Standard".to_string(),
                    method_description: None,
                    price: dec("5.00"),
                    sort_order: 0,
                }],
            },
            Carrier {
                carrier: "alpha".to_string(),
                carrier_title: "Alpha Shipping".to_string(),
                sort_order: 1,
                methods: vec![CarrierMethod {
                    method: "standard".to_string(),
                    method_title: "Standard".to_string(),
                    method_description: None,
                    price: dec("5.00"),
                    sort_order: 0,
                }],
            },
        ]);

        let state = AppState::new(
            CartApiConfig::default(),
            Arc::new(engine),
            Arc::new(AllowAllPolicy),
            Interceptors::new(),
        );
        let mut quote = Quote::new("USD");

        let rates = prepare_collection(&state, &ctx(), &mut quote).unwrap();

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0]["carrier"], "alpha");
        assert_eq!(rates[1]["carrier"], "zeta");
        assert_eq!(rates[0]["price"]["amount"], "5.00");
        assert_eq!(rates[0]["code"], "alpha_standard");
    }

    #[test]
    fn test_virtual_quote_has_no_rates() {
        let state = AppState::new(
            CartApiConfig::default(),
            Arc::new(MemoryEngine::with_demo_catalog("USD")),
            Arc::new(AllowAllPolicy),
            Interceptors::new(),
        );
        let mut quote = Quote::new("USD");
        quote.is_virtual = true;

        assert!(prepare_collection(&state, &ctx(), &mut quote)
            .unwrap()
            .is_empty());
    }
}
