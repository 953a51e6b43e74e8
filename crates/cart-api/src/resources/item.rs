//! Line item resource.
//!
//! Entity operations address top-level items only; children of composite
//! products are projected inline under their parent and never nest further.
//! Collections are keyed by item id so clients can diff across requests.

use std::sync::LazyLock;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use stonefruit_core::ItemId;

use crate::engine::AddProductOutcome;
use crate::error::{AppError, Result};
use crate::model::{LineItem, Quote};
use crate::projection::registry::{as_decimal, decimal_value, string_or_null};
use crate::projection::{
    AttributeCodec, CoercionKind, FieldRegistry, Hook, ProjectionContext, ProjectionFilter,
};
use crate::state::AppState;

use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &[
    "backorder_qty",
    "children",
    "error_info",
    "images",
    "is_saleable",
    "item_id",
    "messages",
    "name",
    "original_price",
    "price",
    "product_type",
    "qty",
    "row_total",
    "sku",
    "url",
];

pub const WRITE_ATTRIBUTES: &[&str] = &["qty", "sku"];

const MANUAL_ATTRIBUTES: &[&str] = &[
    "children",
    "images",
    "is_saleable",
    "messages",
    "original_price",
    "url",
];

static CODEC: AttributeCodec = AttributeCodec::new(
    &[
        ("backorder_qty", "backorders"),
        ("error_info", "error_infos"),
    ],
    &[
        ("backorder_qty", CoercionKind::Float),
        ("item_id", CoercionKind::Int),
        ("original_price", CoercionKind::Currency),
        ("price", CoercionKind::Currency),
        ("qty", CoercionKind::Float),
        ("row_total", CoercionKind::Currency),
    ],
);

static REGISTRY: LazyLock<FieldRegistry<LineItem>> = LazyLock::new(|| {
    FieldRegistry::new()
        .readable("item_id", |item: &LineItem| Value::from(item.id.as_i32()))
        .readable("sku", |item| Value::String(item.sku.clone()))
        .readable("name", |item| Value::String(item.name.clone()))
        .readable("product_type", |item| {
            Value::String(item.product_type.clone())
        })
        .accessor(
            "qty",
            |item| decimal_value(item.qty),
            |item, value| item.qty = as_decimal(value),
        )
        .readable("price", |item| decimal_value(item.price))
        .readable("row_total", |item| decimal_value(item.row_total))
        .readable("backorders", |item| decimal_value(item.backorders))
        .readable("error_infos", |item| {
            Value::Array(
                item.error_infos
                    .iter()
                    .map(|e| Value::String(e.clone()))
                    .collect(),
            )
        })
});

/// Project every visible item, keyed by item id.
pub fn prepare_collection(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &Quote,
) -> Result<Map<String, Value>> {
    let filter = build_filter(state, Resource::Item, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);

    let mut data = Map::new();
    for item in quote.visible_items() {
        data.insert(
            item.id.to_string(),
            Value::Object(prepare_item(state, ctx, &filter, quote, item, true)?),
        );
    }
    Ok(data)
}

/// Project a single item.
pub fn prepare_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &Quote,
    item: &LineItem,
) -> Result<Map<String, Value>> {
    let filter = build_filter(state, Resource::Item, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);
    prepare_item(state, ctx, &filter, quote, item, true)
}

fn prepare_item(
    state: &AppState,
    ctx: &ProjectionContext,
    filter: &ProjectionFilter,
    quote: &Quote,
    item: &LineItem,
    with_children: bool,
) -> Result<Map<String, Value>> {
    let mut data = Map::new();
    for attribute in filter.attributes_to_include() {
        if MANUAL_ATTRIBUTES.contains(&attribute.as_str()) {
            continue;
        }
        let internal = CODEC.internal(attribute);
        data.insert(
            attribute.clone(),
            REGISTRY.read(internal, item).unwrap_or(Value::Null),
        );
    }

    // =========================
    // Manual attributes
    // =========================

    let product = state.engine().product_by_id(item.product_id)?;

    // Store policy may want the cart to show tax-inclusive row totals.
    if filter.includes("row_total") && state.config().prices_include_tax {
        data.insert(
            "row_total".to_string(),
            decimal_value(item.row_total_incl_tax),
        );
    }

    if filter.includes("original_price") {
        data.insert(
            "original_price".to_string(),
            product
                .as_ref()
                .map_or(Value::Null, |p| decimal_value(p.price)),
        );
    }

    if filter.includes("url") {
        let url = item
            .redirect_url
            .clone()
            .or_else(|| product.as_ref().map(|p| p.url.clone()));
        data.insert("url".to_string(), string_or_null(url.as_deref()));
    }

    if filter.includes("images") {
        let images = product.as_ref().map_or(Value::Null, |p| {
            let mut set = Map::new();
            set.insert(
                "normal".to_string(),
                Value::String(p.images.normal.clone()),
            );
            set.insert("small".to_string(), Value::String(p.images.small.clone()));
            set.insert(
                "thumbnail".to_string(),
                Value::String(p.images.thumbnail.clone()),
            );
            Value::Object(set)
        });
        data.insert("images".to_string(), images);
    }

    if with_children && item.parent_item_id.is_none() && filter.includes("children") {
        let mut children = Vec::new();
        for child in quote.children_of(item.id) {
            // That kind of nesting is not allowed anyway.
            let mut projected = prepare_item(state, ctx, filter, quote, child, false)?;
            projected.remove("children");
            children.push(Value::Object(projected));
        }
        data.insert("children".to_string(), Value::Array(children));
    }

    if filter.includes("messages") {
        data.insert(
            "messages".to_string(),
            Value::Array(
                item.messages
                    .iter()
                    .map(|m| Value::String(m.clone()))
                    .collect(),
            ),
        );
    }

    if filter.includes("is_saleable") {
        data.insert(
            "is_saleable".to_string(),
            product
                .as_ref()
                .map_or(Value::Bool(false), |p| Value::Bool(p.is_saleable())),
        );
    }

    state
        .interceptors()
        .run(Resource::Item, Hook::Prepare, &mut data, ctx);

    Ok(shape_output(state, &CODEC, filter, data, &quote.currency))
}

/// Add a product to the quote from raw input.
///
/// Requires a SKU referencing an enabled, in-stock, visible product. The
/// quantity defaults to one and is floored to the product's minimum sale
/// quantity when the product is not yet in the quote.
pub fn create_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
    raw: Map<String, Value>,
) -> Result<AddProductOutcome> {
    let filter = build_filter(state, Resource::Item, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);
    let data = CODEC.map_in(filter.filter_in(raw));

    let Some(sku) = data.get("sku").and_then(Value::as_str).filter(|s| !s.is_empty()) else {
        return Err(AppError::BadRequest("Missing SKU".to_string()));
    };

    let product = state
        .engine()
        .product_by_sku(sku)?
        .ok_or_else(|| AppError::BadRequest(format!("Invalid SKU {sku}")))?;

    // Disabled, out-of-stock and invisible products all read as the same
    // client error; the distinction is nobody's business.
    if !product.enabled || !product.in_stock || !product.visible {
        return Err(AppError::BadRequest(format!("Invalid SKU {sku}")));
    }

    let mut qty = data.get("qty").map_or(Decimal::ONE, as_decimal);
    if qty <= Decimal::ZERO {
        qty = Decimal::ONE;
    }

    if !quote.has_product(product.id)
        && product.min_sale_qty > Decimal::ZERO
        && qty < product.min_sale_qty
    {
        qty = product.min_sale_qty;
    }

    let outcome = state.engine().add_product(quote, &product, qty)?;
    quote.invalidate_totals();
    Ok(outcome)
}

/// Update a single item. The SKU is never writable on update.
pub fn update_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
    id: ItemId,
    raw: Map<String, Value>,
) -> Result<()> {
    let filter = build_filter(state, Resource::Item, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);

    let mut raw = raw;
    state
        .interceptors()
        .run(Resource::Item, Hook::UpdatePrefilter, &mut raw, ctx);

    let data = CODEC.map_in(filter.filter_in(raw));

    let item = quote
        .visible_item_mut(id)
        .ok_or_else(|| AppError::NotFound("Not Found".to_string()))?;

    for (key, value) in &data {
        if key == "sku" {
            continue;
        }
        REGISTRY.write(key, item, value);
    }
    quote.invalidate_totals();

    let mut data = data;
    state
        .interceptors()
        .run(Resource::Item, Hook::UpdateAfter, &mut data, ctx);

    Ok(())
}

/// Resolve an addressable item id.
///
/// Missing, deleted and child items are all a plain 404.
pub fn load_item(quote: &Quote, id: i32) -> Result<&LineItem> {
    if id == 0 {
        return Err(AppError::NotFound("Not Found".to_string()));
    }
    quote
        .visible_item(ItemId::new(id))
        .ok_or_else(|| AppError::NotFound("Not Found".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::acl::{AllowAllPolicy, Principal};
    use crate::config::CartApiConfig;
    use crate::engine::{CommerceEngine, MemoryEngine};
    use crate::projection::{ActionType, Interceptors, Operation};
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Arc;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn state() -> AppState {
        AppState::new(
            CartApiConfig::default(),
            Arc::new(MemoryEngine::with_demo_catalog("USD")),
            Arc::new(AllowAllPolicy),
            Interceptors::new(),
        )
    }

    fn ctx(action: ActionType, operation: Operation) -> ProjectionContext {
        ProjectionContext::root(action, operation, None, None, Principal::Guest)
    }

    fn obj(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn add_demo_item(state: &AppState, quote: &mut Quote, sku: &str, qty: &str) -> ItemId {
        let outcome = create_resource(
            state,
            &ctx(ActionType::Entity, Operation::Create),
            quote,
            obj(json!({"sku": sku, "qty": qty})),
        )
        .unwrap();
        state.engine().collect_totals(quote).unwrap();
        outcome.item_id
    }

    #[test]
    fn test_create_requires_sku() {
        let state = state();
        let mut quote = Quote::new("USD");

        let result = create_resource(
            &state,
            &ctx(ActionType::Entity, Operation::Create),
            &mut quote,
            obj(json!({"qty": 1})),
        );

        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "Missing SKU"));
    }

    #[test]
    fn test_create_rejects_unknown_sku() {
        let state = state();
        let mut quote = Quote::new("USD");

        let result = create_resource(
            &state,
            &ctx(ActionType::Entity, Operation::Create),
            &mut quote,
            obj(json!({"sku": "DOES-NOT-EXIST"})),
        );

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(quote.items_count(), 0);
    }

    #[test]
    fn test_create_rejects_out_of_stock_sku() {
        let state = state();
        let mut quote = Quote::new("USD");

        let result = create_resource(
            &state,
            &ctx(ActionType::Entity, Operation::Create),
            &mut quote,
            obj(json!({"sku": "OOS001"})),
        );

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_create_floors_to_min_sale_qty() {
        let state = state();
        let mut quote = Quote::new("USD");

        // GHI789 has a minimum sale qty of 2.
        add_demo_item(&state, &mut quote, "GHI789", "1");

        assert_eq!(quote.items_qty(), dec("2"));

        // Once the product is in the quote, increments are taken as-is.
        create_resource(
            &state,
            &ctx(ActionType::Entity, Operation::Create),
            &mut quote,
            obj(json!({"sku": "GHI789", "qty": 1})),
        )
        .unwrap();
        assert_eq!(quote.items_qty(), dec("3"));
    }

    #[test]
    fn test_create_defaults_qty_to_one() {
        let state = state();
        let mut quote = Quote::new("USD");

        add_demo_item(&state, &mut quote, "ABC123", "0");

        assert_eq!(quote.items_qty(), dec("1"));
    }

    #[test]
    fn test_update_ignores_sku_and_writes_qty() {
        let state = state();
        let mut quote = Quote::new("USD");
        let id = add_demo_item(&state, &mut quote, "ABC123", "1");

        update_resource(
            &state,
            &ctx(ActionType::Entity, Operation::Update),
            &mut quote,
            id,
            obj(json!({"qty": 4, "sku": "DEF456"})),
        )
        .unwrap();

        let item = quote.visible_item(id).unwrap();
        assert_eq!(item.qty, dec("4"));
        assert_eq!(item.sku, "ABC123");
    }

    #[test]
    fn test_load_item_hides_children_and_deleted() {
        let state = state();
        let mut quote = Quote::new("USD");
        let id = add_demo_item(&state, &mut quote, "ABC123", "1");

        assert!(load_item(&quote, id.as_i32()).is_ok());
        assert!(matches!(load_item(&quote, 0), Err(AppError::NotFound(_))));
        assert!(matches!(load_item(&quote, 9999), Err(AppError::NotFound(_))));

        quote.delete_item(id);
        assert!(matches!(
            load_item(&quote, id.as_i32()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_prepare_resource_shapes_money_and_manuals() {
        let state = state();
        let mut quote = Quote::new("USD");
        let id = add_demo_item(&state, &mut quote, "ABC123", "2");

        let item = quote.visible_item(id).unwrap();
        let data = prepare_resource(
            &state,
            &ctx(ActionType::Entity, Operation::Retrieve),
            &quote,
            item,
        )
        .unwrap();

        let row_total = data.get("row_total").unwrap();
        assert_eq!(row_total["currency"], "USD");
        assert_eq!(row_total["amount"], "24.00");

        // original_price is the catalog price, not the final price.
        assert_eq!(data.get("original_price").unwrap()["amount"], "15.00");
        assert_eq!(data.get("is_saleable"), Some(&json!(true)));
        assert!(data.get("url").unwrap().as_str().unwrap().contains("alpine-tee"));
        assert!(data.get("images").unwrap()["thumbnail"]
            .as_str()
            .unwrap()
            .contains("thumb"));

        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_children_projected_without_nesting() {
        let state = state();
        let mut quote = Quote::new("USD");
        let parent = add_demo_item(&state, &mut quote, "ABC123", "1");

        // Hand-build a child the way a composite add would.
        quote.items.push(LineItem {
            id: ItemId::new(900),
            product_id: stonefruit_core::ProductId::new(2),
            sku: "DEF456".to_string(),
            name: "Summit Hoodie".to_string(),
            product_type: "simple".to_string(),
            qty: Decimal::ONE,
            price: Decimal::ZERO,
            row_total: Decimal::ZERO,
            row_total_incl_tax: Decimal::ZERO,
            backorders: Decimal::ZERO,
            error_infos: Vec::new(),
            messages: Vec::new(),
            parent_item_id: Some(parent),
            redirect_url: None,
            deleted: false,
        });

        let collection = prepare_collection(
            &state,
            &ctx(ActionType::Collection, Operation::Retrieve),
            &quote,
        )
        .unwrap();

        // The child is not independently addressable.
        assert_eq!(collection.len(), 1);
        let parent_data = collection.get(&parent.to_string()).unwrap();
        let children = parent_data["children"].as_array().unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].get("children").is_none());
    }

    #[test]
    fn test_collection_keyed_by_item_id() {
        let state = state();
        let mut quote = Quote::new("USD");
        let first = add_demo_item(&state, &mut quote, "ABC123", "1");
        let second = add_demo_item(&state, &mut quote, "DEF456", "1");

        let collection = prepare_collection(
            &state,
            &ctx(ActionType::Collection, Operation::Retrieve),
            &quote,
        )
        .unwrap();

        assert!(collection.contains_key(&first.to_string()));
        assert!(collection.contains_key(&second.to_string()));
    }

    #[test]
    fn test_row_total_incl_tax_policy() {
        let engine = Arc::new(MemoryEngine::with_demo_catalog("USD").with_tax_rate(dec("0.10")));
        let config = CartApiConfig {
            prices_include_tax: true,
            ..CartApiConfig::default()
        };
        let state = AppState::new(
            config,
            engine,
            Arc::new(AllowAllPolicy),
            Interceptors::new(),
        );

        let mut quote = Quote::new("USD");
        let id = add_demo_item(&state, &mut quote, "ABC123", "1");

        let item = quote.visible_item(id).unwrap();
        let data = prepare_resource(
            &state,
            &ctx(ActionType::Entity, Operation::Retrieve),
            &quote,
            item,
        )
        .unwrap();

        assert_eq!(data.get("row_total").unwrap()["amount"], "13.20");
    }
}
