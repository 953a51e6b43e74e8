//! Cart (quote head) resource.
//!
//! The cart is the embed root: its projection can pull in items, addresses,
//! payment, shipping methods, cross-sells and a validation run. Embeds are
//! resolved after output filtering on purpose, are individually authorized,
//! and fail in isolation. The quote-mutating `validation` embed runs before
//! the projection so the projected cart reflects the validated state.

use std::sync::LazyLock;

use serde_json::{Map, Value};

use crate::config::QtySummaryPolicy;
use crate::error::{AppError, Result};
use crate::model::Quote;
use crate::projection::codec::coerce_entries;
use crate::projection::registry::{decimal_value, opt_string, string_or_null};
use crate::projection::{
    ActionType, AttributeCodec, CoercionKind, FieldRegistry, Hook, Operation, ProjectionContext,
    parse_embeds,
};
use crate::state::AppState;
use crate::validation::validate_quote;

use super::{
    Resource, billing_address, build_filter, crosssell, is_sub_call_allowed, item, payment,
    shipping_address, shipping_methods,
};

pub const READ_ATTRIBUTES: &[&str] = &[
    "coupon_code",
    "currency",
    "customer_email",
    "customer_is_guest",
    "has_error",
    "is_virtual",
    "messages",
    "qty",
    "shipping_method",
    "total",
    "totals",
];

pub const WRITE_ATTRIBUTES: &[&str] = &["coupon_code", "customer_email"];

const MANUAL_ATTRIBUTES: &[&str] = &["messages", "qty", "shipping_method", "totals"];

const DEFAULT_EMBEDS: &[&str] = &["items", "billing_address", "shipping_address", "payment"];

static CODEC: AttributeCodec = AttributeCodec::new(
    &[("total", "grand_total")],
    &[
        ("coupon_code", CoercionKind::Text),
        ("has_error", CoercionKind::Bool),
        ("qty", CoercionKind::Float),
        ("shipping_method", CoercionKind::Text),
        ("total", CoercionKind::Currency),
    ],
);

static REGISTRY: LazyLock<FieldRegistry<Quote>> = LazyLock::new(|| {
    FieldRegistry::new()
        .accessor(
            "coupon_code",
            |quote: &Quote| string_or_null(quote.coupon_code.as_deref()),
            |quote, value| quote.coupon_code = opt_string(value),
        )
        .accessor(
            "customer_email",
            |quote| string_or_null(quote.customer_email.as_deref()),
            |quote, value| quote.customer_email = opt_string(value),
        )
        .readable("currency", |quote| Value::String(quote.currency.clone()))
        .readable("customer_is_guest", |quote| {
            Value::Bool(quote.customer_is_guest)
        })
        .readable("has_error", |quote| Value::Bool(quote.has_error))
        .readable("is_virtual", |quote| Value::Bool(quote.is_virtual))
        .readable("grand_total", |quote| decimal_value(quote.grand_total()))
});

/// Project the cart, resolving requested embeds.
pub fn prepare_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
) -> Result<Map<String, Value>> {
    let embeds = parse_embeds(ctx.embeds.as_deref(), DEFAULT_EMBEDS);

    // The validation embed mutates the quote (same-as-billing re-copy), so
    // it is scheduled before the projection reads anything.
    let validation = if embeds.iter().any(|name| name == "validation")
        && is_sub_call_allowed(state, Resource::Validate, &ctx.principal)
    {
        let errors = validate_quote(state.engine(), quote);
        let mut result = Map::new();
        result.insert(
            "status".to_string(),
            Value::String(if errors.is_empty() { "success" } else { "error" }.to_string()),
        );
        result.insert(
            "errors".to_string(),
            serde_json::to_value(&errors).unwrap_or(Value::Null),
        );
        Some(Value::Object(result))
    } else {
        None
    };

    let filter = build_filter(state, Resource::Cart, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);

    let mut data = Map::new();
    for attribute in filter.attributes_to_include() {
        if MANUAL_ATTRIBUTES.contains(&attribute.as_str()) {
            continue;
        }
        let internal = CODEC.internal(attribute);
        data.insert(
            attribute.clone(),
            REGISTRY.read(internal, quote).unwrap_or(Value::Null),
        );
    }

    // =========================
    // Manual attributes
    // =========================

    data.insert(
        "shipping_method".to_string(),
        string_or_null(quote.shipping_address.shipping_method.as_deref()),
    );

    let qty = match state.config().qty_summary {
        QtySummaryPolicy::ItemQty => decimal_value(quote.items_qty()),
        QtySummaryPolicy::ItemCount => Value::from(quote.items_count()),
    };
    data.insert("qty".to_string(), qty);

    if filter.includes("totals") {
        data.insert("totals".to_string(), totals_value(state, quote));
    }

    if filter.includes("messages") {
        let mut grouped: Map<String, Value> = Map::new();
        for message in &quote.messages {
            let bucket = grouped
                .entry(message.severity.as_str().to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(texts) = bucket {
                texts.push(Value::String(message.text.clone()));
            }
        }
        data.insert("messages".to_string(), Value::Object(grouped));
    }

    state
        .interceptors()
        .run(Resource::Cart, Hook::Prepare, &mut data, ctx);

    let mut data = filter.filter_out(data);

    // Handle embeds - this happens after output filtering on purpose.
    for embed in &embeds {
        let child = ctx.child(ActionType::Collection, Operation::Retrieve);
        let entity_child = ctx.child(ActionType::Entity, Operation::Retrieve);
        let resolved: Result<Option<(String, Value)>> = match embed.as_str() {
            "items" if is_sub_call_allowed(state, Resource::Item, &ctx.principal) => {
                item::prepare_collection(state, &child, quote)
                    .map(|items| Some(("items".to_string(), Value::Object(items))))
            }
            "billing_address"
                if is_sub_call_allowed(state, Resource::BillingAddress, &ctx.principal) =>
            {
                billing_address::prepare_resource(state, &entity_child, quote)
                    .map(|address| Some(("billing_address".to_string(), Value::Object(address))))
            }
            "shipping_address"
                if is_sub_call_allowed(state, Resource::ShippingAddress, &ctx.principal) =>
            {
                shipping_address::prepare_resource(state, &entity_child, quote)
                    .map(|address| Some(("shipping_address".to_string(), Value::Object(address))))
            }
            "payment" if is_sub_call_allowed(state, Resource::Payment, &ctx.principal) => {
                payment::prepare_resource(state, &entity_child, quote)
                    .map(|entity| Some(("payment".to_string(), Value::Object(entity))))
            }
            "shipping_methods"
                if is_sub_call_allowed(state, Resource::ShippingMethod, &ctx.principal) =>
            {
                shipping_methods::prepare_collection(state, &child, quote)
                    .map(|rates| Some(("shipping_methods".to_string(), Value::Array(rates))))
            }
            "crosssells" if is_sub_call_allowed(state, Resource::Crosssell, &ctx.principal) => {
                crosssell::prepare_collection(state, &child, quote)
                    .map(|products| Some(("crosssells".to_string(), Value::Object(products))))
            }
            "validation" => Ok(validation
                .clone()
                .map(|result| ("validation".to_string(), result))),
            // Unknown or unauthorized embed names are best-effort: skipped.
            _ => Ok(None),
        };

        match resolved {
            Ok(Some((key, value))) => {
                data.insert(key, value);
            }
            Ok(None) => {}
            // One embed's failure must not prevent the others.
            Err(err) => {
                tracing::warn!(embed = embed.as_str(), error = %err, "embed failed, skipping");
            }
        }
    }

    CODEC.coerce(&mut data, &quote.currency, state.engine());
    filter.null_fill(&mut data);

    Ok(data)
}

/// The ordered totals breakdown as `code -> {amount, currency, formatted,
/// title}`.
fn totals_value(state: &AppState, quote: &Quote) -> Value {
    let mut totals = Map::new();
    for total in &quote.totals {
        let mut entry = Map::new();
        entry.insert("value".to_string(), decimal_value(total.value));

        let types = [("value", CoercionKind::Currency)];
        coerce_entries(&types, &mut entry, &quote.currency, state.engine());

        // Inline the structured money under the total code, plus the title.
        let Some(Value::Object(mut money)) = entry.remove("value") else {
            continue;
        };
        money.insert("title".to_string(), Value::String(total.title.clone()));
        totals.insert(total.code.clone(), Value::Object(money));
    }
    Value::Object(totals)
}

/// Apply a cart-level update.
///
/// Writes the writable head attributes, then re-collects totals so a coupon
/// can be checked: a requested code the engine did not accept is a client
/// error, reported before anything is committed.
pub fn update_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
    raw: Map<String, Value>,
) -> Result<()> {
    let filter = build_filter(state, Resource::Cart, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);
    let data = CODEC.map_in(filter.filter_in(raw));

    for (key, value) in &data {
        REGISTRY.write(key, quote, value);
    }
    quote.invalidate_totals();

    state.engine().collect_totals(quote)?;

    if let Some(requested) = data.get("coupon_code").and_then(Value::as_str) {
        if !requested.is_empty() && quote.coupon_code.as_deref() != Some(requested) {
            return Err(AppError::BadRequest(format!(
                "Coupon code \"{requested}\" is not valid."
            )));
        }
    }

    Ok(())
}

/// Soft-deactivate the cart. The quote row survives for the engine's
/// bookkeeping; the session simply gets a fresh quote next time.
pub fn deactivate(quote: &mut Quote) {
    quote.is_active = false;
    quote.invalidate_totals();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::acl::{AccessPolicy, AllowAllPolicy, Principal};
    use crate::config::CartApiConfig;
    use crate::engine::{CommerceEngine, MemoryEngine};
    use crate::projection::Interceptors;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            CartApiConfig::default(),
            Arc::new(MemoryEngine::with_demo_catalog("USD")),
            Arc::new(AllowAllPolicy),
            Interceptors::new(),
        )
    }

    fn ctx_with_embeds(embeds: Option<&str>) -> ProjectionContext {
        ProjectionContext::root(
            ActionType::Entity,
            Operation::Retrieve,
            None,
            embeds.map(ToString::to_string),
            Principal::Guest,
        )
    }

    fn obj(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn quote_with_item(state: &AppState) -> Quote {
        let mut quote = Quote::new("USD");
        let product = state.engine().product_by_sku("ABC123").unwrap().unwrap();
        state
            .engine()
            .add_product(&mut quote, &product, Decimal::from(2))
            .unwrap();
        state.engine().collect_totals(&mut quote).unwrap();
        quote
    }

    #[test]
    fn test_prepare_includes_default_embeds() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let data = prepare_resource(&state, &ctx_with_embeds(None), &mut quote).unwrap();

        assert!(data.get("items").unwrap().is_object());
        assert!(data.get("billing_address").unwrap().is_object());
        assert!(data.get("shipping_address").unwrap().is_object());
        assert!(data.get("payment").unwrap().is_object());
        assert!(!data.contains_key("shipping_methods"));
    }

    #[test]
    fn test_prepare_empty_embed_param_means_none() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let data = prepare_resource(&state, &ctx_with_embeds(Some("")), &mut quote).unwrap();

        assert!(!data.contains_key("items"));
        assert!(!data.contains_key("billing_address"));
    }

    #[test]
    fn test_prepare_unknown_embeds_skipped() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let data =
            prepare_resource(&state, &ctx_with_embeds(Some("items,bogus")), &mut quote).unwrap();

        assert!(data.get("items").is_some());
        assert!(!data.contains_key("bogus"));
    }

    #[test]
    fn test_prepare_totals_and_grand_total() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let data = prepare_resource(&state, &ctx_with_embeds(Some("")), &mut quote).unwrap();

        // 2 x 12.00 final price
        assert_eq!(data["total"]["amount"], "24.00");
        assert_eq!(data["totals"]["subtotal"]["amount"], "24.00");
        assert_eq!(data["totals"]["subtotal"]["title"], "Subtotal");
        assert_eq!(data["totals"]["grand_total"]["currency"], "USD");
    }

    #[test]
    fn test_prepare_qty_policy() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let data = prepare_resource(&state, &ctx_with_embeds(Some("")), &mut quote).unwrap();
        // Default policy counts lines, not units.
        assert_eq!(data["qty"], json!(1.0));

        let qty_state = AppState::new(
            CartApiConfig {
                qty_summary: crate::config::QtySummaryPolicy::ItemQty,
                ..CartApiConfig::default()
            },
            Arc::new(MemoryEngine::with_demo_catalog("USD")),
            Arc::new(AllowAllPolicy),
            Interceptors::new(),
        );
        let data = prepare_resource(&qty_state, &ctx_with_embeds(Some("")), &mut quote).unwrap();
        assert_eq!(data["qty"], json!(2.0));
    }

    #[test]
    fn test_validation_embed_runs_and_reports() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let data =
            prepare_resource(&state, &ctx_with_embeds(Some("validation")), &mut quote).unwrap();

        assert_eq!(data["validation"]["status"], "error");
        assert!(data["validation"]["errors"]["payment"].is_array());
    }

    #[test]
    fn test_embed_authorization_gate() {
        struct NoItemsPolicy;

        impl AccessPolicy for NoItemsPolicy {
            fn readable_attributes(
                &self,
                _resource: Resource,
                _operation: Operation,
                _principal: &Principal,
            ) -> Option<Vec<String>> {
                None
            }

            fn writable_attributes(
                &self,
                _resource: Resource,
                _operation: Operation,
                _principal: &Principal,
            ) -> Option<Vec<String>> {
                None
            }

            fn is_sub_call_allowed(
                &self,
                resource: Resource,
                _principal: &Principal,
            ) -> bool {
                resource != Resource::Item
            }
        }

        let state = AppState::new(
            CartApiConfig::default(),
            Arc::new(MemoryEngine::with_demo_catalog("USD")),
            Arc::new(NoItemsPolicy),
            Interceptors::new(),
        );
        let mut quote = quote_with_item(&state);

        let data = prepare_resource(
            &state,
            &ctx_with_embeds(Some("items,billing_address")),
            &mut quote,
        )
        .unwrap();

        assert!(!data.contains_key("items"));
        assert!(data.get("billing_address").is_some());
    }

    #[test]
    fn test_update_applies_writable_fields_only() {
        let state = state();
        let mut quote = quote_with_item(&state);

        update_resource(
            &state,
            &ctx_with_embeds(None),
            &mut quote,
            obj(json!({"customer_email": "c@example.com", "currency": "EUR"})),
        )
        .unwrap();

        assert_eq!(quote.customer_email.as_deref(), Some("c@example.com"));
        // currency is not writable
        assert_eq!(quote.currency, "USD");
    }

    #[test]
    fn test_update_accepts_known_coupon() {
        let state = state();
        let mut quote = quote_with_item(&state);

        update_resource(
            &state,
            &ctx_with_embeds(None),
            &mut quote,
            obj(json!({"coupon_code": "SAVE10"})),
        )
        .unwrap();

        assert_eq!(quote.coupon_code.as_deref(), Some("SAVE10"));
    }

    #[test]
    fn test_update_rejects_unknown_coupon() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let result = update_resource(
            &state,
            &ctx_with_embeds(None),
            &mut quote,
            obj(json!({"coupon_code": "BOGUS"})),
        );

        assert!(matches!(result, Err(AppError::BadRequest(msg))
            if msg.contains("BOGUS")));
    }

    #[test]
    fn test_output_is_deterministic() {
        let state = state();
        let mut quote = quote_with_item(&state);

        let first = prepare_resource(&state, &ctx_with_embeds(None), &mut quote).unwrap();
        let second = prepare_resource(&state, &ctx_with_embeds(None), &mut quote).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
