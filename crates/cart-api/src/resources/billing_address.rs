//! Billing address resource.

use serde_json::{Map, Value};
use stonefruit_core::AddressId;

use crate::error::Result;
use crate::model::Quote;
use crate::projection::{AttributeCodec, CoercionKind, Hook, ProjectionContext};
use crate::state::AppState;
use crate::validation::validate_address;

use super::address::{
    REGISTRY, fix_address_data, import_stored_address, load_owned_stored_address,
};
use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &[
    "city",
    "company",
    "country_id",
    "customer_address_id",
    "email",
    "fax",
    "firstname",
    "formatted_html",
    "formatted_text",
    "lastname",
    "postcode",
    "prefix",
    "region",
    "region_id",
    "save_in_address_book",
    "street",
    "suffix",
    "telephone",
    "validation_errors",
];

pub const WRITE_ATTRIBUTES: &[&str] = &[
    "city",
    "company",
    "country_id",
    "customer_address_id",
    "email",
    "fax",
    "firstname",
    "lastname",
    "postcode",
    "prefix",
    "region",
    "save_in_address_book",
    "street",
    "suffix",
    "telephone",
];

const MANUAL_ATTRIBUTES: &[&str] = &["formatted_html", "formatted_text", "validation_errors"];

static CODEC: AttributeCodec = AttributeCodec::new(
    &[],
    &[
        ("customer_address_id", CoercionKind::Int),
        ("save_in_address_book", CoercionKind::Bool),
    ],
);

/// Project the billing address.
pub fn prepare_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &Quote,
) -> Result<Map<String, Value>> {
    let address = &quote.billing_address;
    let filter = build_filter(state, Resource::BillingAddress, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);

    let mut data = Map::new();
    for attribute in filter.attributes_to_include() {
        if MANUAL_ATTRIBUTES.contains(&attribute.as_str()) {
            continue;
        }
        let internal = CODEC.internal(attribute);
        data.insert(
            attribute.clone(),
            REGISTRY.read(internal, address).unwrap_or(Value::Null),
        );
    }

    // =========================
    // Manual attributes
    // =========================

    if filter.includes("formatted_html") {
        data.insert(
            "formatted_html".to_string(),
            Value::String(
                state
                    .engine()
                    .format_address(address, crate::engine::AddressFormat::Html),
            ),
        );
    }

    if filter.includes("formatted_text") {
        data.insert(
            "formatted_text".to_string(),
            Value::String(
                state
                    .engine()
                    .format_address(address, crate::engine::AddressFormat::Text),
            ),
        );
    }

    if filter.includes("validation_errors") {
        data.insert(
            "validation_errors".to_string(),
            validation_errors_value(&address.validation_errors),
        );
    }

    state
        .interceptors()
        .run(Resource::BillingAddress, Hook::Prepare, &mut data, ctx);

    Ok(shape_output(state, &CODEC, &filter, data, &quote.currency))
}

/// Apply a billing address update.
pub fn update_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
    raw: Map<String, Value>,
) -> Result<()> {
    let filter = build_filter(state, Resource::BillingAddress, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);
    let data = CODEC.map_in(filter.filter_in(raw));

    let stored_reference = data
        .get("customer_address_id")
        .and_then(crate::projection::registry::opt_i32)
        .filter(|id| *id != 0);

    if let Some(id) = stored_reference {
        // A stored reference short-circuits field assignment entirely.
        let stored = load_owned_stored_address(state.engine(), quote, AddressId::new(id))?
            .ok_or_else(|| {
                crate::error::AppError::BadRequest("Customer Address is not valid.".to_string())
            })?;
        import_stored_address(&mut quote.billing_address, &stored);
    } else {
        let fixed = fix_address_data(
            state.engine(),
            data.clone(),
            quote.billing_address.country_id.as_deref(),
            quote.billing_address.region_id,
        )?;

        for (key, value) in &fixed {
            if key == "region_id" || filter.writable().contains(key) {
                REGISTRY.write(key, &mut quote.billing_address, value);
            }
        }
    }

    // Shipping mirrors billing; re-copy before totals are collected.
    if quote.shipping_address.same_as_billing {
        let billing = quote.billing_address.clone();
        quote.shipping_address.import_fields_from(&billing);
        quote.shipping_address.same_as_billing = true;
    }

    quote.billing_address.validation_errors = validate_address(&quote.billing_address);
    quote.invalidate_totals();

    let mut data = data;
    state
        .interceptors()
        .run(Resource::BillingAddress, Hook::UpdateAfter, &mut data, ctx);

    Ok(())
}

pub(super) fn validation_errors_value(errors: &[String]) -> Value {
    Value::Array(
        errors
            .iter()
            .map(|error| error.trim())
            .filter(|error| !error.is_empty())
            .map(|error| Value::String(error.to_string()))
            .collect(),
    )
}
