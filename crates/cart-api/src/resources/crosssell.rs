//! Cross-sell collection (read-only).
//!
//! Products linked from the cart's items, excluding anything already in
//! the cart. The engine pre-filters for enabled, visible, in-stock
//! products; the projection keys the result by SKU.

use serde_json::{Map, Value};

use crate::engine::Product;
use crate::error::Result;
use crate::model::Quote;
use crate::projection::registry::{decimal_value, string_or_null};
use crate::projection::{
    AttributeCodec, CoercionKind, Hook, ProjectionContext, ProjectionFilter,
};
use crate::state::AppState;

use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &[
    "description",
    "final_price",
    "images",
    "is_in_stock",
    "is_saleable",
    "max_sale_qty",
    "min_sale_qty",
    "name",
    "price",
    "qty",
    "short_description",
    "sku",
    "url",
];

const MANUAL_ATTRIBUTES: &[&str] = &[
    "images",
    "is_in_stock",
    "is_saleable",
    "max_sale_qty",
    "min_sale_qty",
    "qty",
];

static CODEC: AttributeCodec = AttributeCodec::new(
    &[("url", "url_in_store")],
    &[
        ("description", CoercionKind::Text),
        ("final_price", CoercionKind::Currency),
        ("is_in_stock", CoercionKind::Bool),
        ("is_saleable", CoercionKind::Bool),
        ("max_sale_qty", CoercionKind::Float),
        ("min_sale_qty", CoercionKind::Float),
        ("name", CoercionKind::Text),
        ("price", CoercionKind::Currency),
        ("qty", CoercionKind::Float),
        ("short_description", CoercionKind::Text),
        ("sku", CoercionKind::Text),
        ("url", CoercionKind::Text),
    ],
);

/// Project cross-sell candidates, keyed by SKU.
pub fn prepare_collection(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &Quote,
) -> Result<Map<String, Value>> {
    let mut data = Map::new();
    if quote.is_virtual {
        return Ok(data);
    }

    let filter = build_filter(state, Resource::Crosssell, ctx, READ_ATTRIBUTES, &[]);

    for product in state.engine().crosssell_products(quote)? {
        data.insert(
            product.sku.clone(),
            Value::Object(prepare_product(state, ctx, &filter, &product, &quote.currency)),
        );
    }

    Ok(data)
}

fn prepare_product(
    state: &AppState,
    ctx: &ProjectionContext,
    filter: &ProjectionFilter,
    product: &Product,
    currency: &str,
) -> Map<String, Value> {
    let mut data = Map::new();
    for attribute in filter.attributes_to_include() {
        if MANUAL_ATTRIBUTES.contains(&attribute.as_str()) {
            continue;
        }
        let internal = CODEC.internal(attribute);
        data.insert(attribute.clone(), read_product(product, internal));
    }

    // =========================
    // Manual attributes
    // =========================

    if filter.includes("is_saleable") {
        data.insert("is_saleable".to_string(), Value::Bool(product.is_saleable()));
    }
    if filter.includes("is_in_stock") {
        data.insert("is_in_stock".to_string(), Value::Bool(product.in_stock));
    }
    if filter.includes("qty") {
        data.insert("qty".to_string(), decimal_value(product.stock_qty));
    }
    if filter.includes("min_sale_qty") {
        data.insert(
            "min_sale_qty".to_string(),
            decimal_value(product.min_sale_qty),
        );
    }
    if filter.includes("max_sale_qty") {
        data.insert(
            "max_sale_qty".to_string(),
            decimal_value(product.max_sale_qty),
        );
    }
    if filter.includes("images") {
        let mut set = Map::new();
        set.insert(
            "normal".to_string(),
            Value::String(product.images.normal.clone()),
        );
        set.insert(
            "small".to_string(),
            Value::String(product.images.small.clone()),
        );
        set.insert(
            "thumbnail".to_string(),
            Value::String(product.images.thumbnail.clone()),
        );
        data.insert("images".to_string(), Value::Object(set));
    }

    state
        .interceptors()
        .run(Resource::Crosssell, Hook::Prepare, &mut data, ctx);

    shape_output(state, &CODEC, filter, data, currency)
}

fn read_product(product: &Product, field: &str) -> Value {
    match field {
        "sku" => Value::String(product.sku.clone()),
        "name" => Value::String(product.name.clone()),
        "description" => string_or_null(product.description.as_deref()),
        "short_description" => string_or_null(product.short_description.as_deref()),
        "url_in_store" => Value::String(product.url.clone()),
        "price" => decimal_value(product.price),
        "final_price" => decimal_value(product.final_price),
        _ => Value::Null,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::acl::{AllowAllPolicy, Principal};
    use crate::config::CartApiConfig;
    use crate::engine::{CommerceEngine, MemoryEngine};
    use crate::projection::{ActionType, Interceptors, Operation};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            CartApiConfig::default(),
            Arc::new(MemoryEngine::with_demo_catalog("USD")),
            Arc::new(AllowAllPolicy),
            Interceptors::new(),
        )
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

    fn quote_with_tee(state: &AppState) -> Quote {
        let mut quote = Quote::new("USD");
        let product = state.engine().product_by_sku("ABC123").unwrap().unwrap();
        state
            .engine()
            .add_product(&mut quote, &product, Decimal::ONE)
            .unwrap();
        quote
    }

    #[test]
    fn test_collection_keyed_by_sku() {
        let state = state();
        let quote = quote_with_tee(&state);

        let data = prepare_collection(&state, &ctx(), &quote).unwrap();

        assert!(data.contains_key("DEF456"));
        assert!(data.contains_key("GHI789"));
        assert!(!data.contains_key("ABC123"));
    }

    #[test]
    fn test_product_projection_shape() {
        let state = state();
        let quote = quote_with_tee(&state);

        let data = prepare_collection(&state, &ctx(), &quote).unwrap();
        let hoodie = data.get("DEF456").unwrap();

        assert_eq!(hoodie["name"], "Summit Hoodie");
        assert_eq!(hoodie["price"]["amount"], "49.90");
        assert_eq!(hoodie["is_saleable"], true);
        assert_eq!(hoodie["is_in_stock"], true);
        assert_eq!(hoodie["min_sale_qty"], 1.0);
        assert!(hoodie["url"].as_str().unwrap().contains("summit-hoodie"));
        assert!(hoodie["images"]["small"].as_str().unwrap().contains("small"));
    }

    #[test]
    fn test_empty_cart_has_no_crosssells() {
        let state = state();
        let quote = Quote::new("USD");

        assert!(prepare_collection(&state, &ctx(), &quote).unwrap().is_empty());
    }

    #[test]
    fn test_virtual_quote_has_no_crosssells() {
        let state = state();
        let mut quote = quote_with_tee(&state);
        quote.is_virtual = true;

        assert!(prepare_collection(&state, &ctx(), &quote).unwrap().is_empty());
    }
}
