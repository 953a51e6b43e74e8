//! Shipping address resource.
//!
//! Differs from billing in three ways: the external `method` attribute maps
//! to the internal shipping method code, the `same_as_billing` flag mirrors
//! the billing address, and deleting the address preserves a previously
//! selected shipping method.

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
use super::billing_address::validation_errors_value;
use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &[
    "city",
    "company",
    "country_id",
    "customer_address_id",
    "email",
    "fax",
    "firstname",
    "lastname",
    "method",
    "postcode",
    "prefix",
    "region",
    "region_id",
    "same_as_billing",
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
    "method",
    "postcode",
    "prefix",
    "region",
    "same_as_billing",
    "save_in_address_book",
    "street",
    "suffix",
    "telephone",
];

const MANUAL_ATTRIBUTES: &[&str] = &["validation_errors"];

static CODEC: AttributeCodec = AttributeCodec::new(
    &[("method", "shipping_method")],
    &[
        ("customer_address_id", CoercionKind::Int),
        ("same_as_billing", CoercionKind::Bool),
        ("save_in_address_book", CoercionKind::Bool),
    ],
);

/// Project the shipping address.
pub fn prepare_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &Quote,
) -> Result<Map<String, Value>> {
    let address = &quote.shipping_address;
    let filter = build_filter(state, Resource::ShippingAddress, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);

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

    if filter.includes("validation_errors") {
        data.insert(
            "validation_errors".to_string(),
            validation_errors_value(&address.validation_errors),
        );
    }

    state
        .interceptors()
        .run(Resource::ShippingAddress, Hook::Prepare, &mut data, ctx);

    Ok(shape_output(state, &CODEC, &filter, data, &quote.currency))
}

/// Apply a shipping address update.
///
/// Branch order: a stored address-book reference wins, then the
/// same-as-billing mirror, then plain field assignment (which clears the
/// mirror flag).
pub fn update_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
    raw: Map<String, Value>,
) -> Result<()> {
    let filter = build_filter(state, Resource::ShippingAddress, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);
    let data = CODEC.map_in(filter.filter_in(raw));

    let stored_reference = data
        .get("customer_address_id")
        .and_then(crate::projection::registry::opt_i32)
        .filter(|id| *id != 0);

    if let Some(id) = stored_reference {
        let stored = load_owned_stored_address(state.engine(), quote, AddressId::new(id))?
            .ok_or_else(|| {
                crate::error::AppError::BadRequest("Customer Address is not valid.".to_string())
            })?;
        import_stored_address(&mut quote.shipping_address, &stored);
        quote.shipping_address.same_as_billing = false;
    } else if data
        .get("same_as_billing")
        .is_some_and(crate::projection::registry::as_bool)
    {
        let billing = quote.billing_address.clone();
        quote.shipping_address.import_fields_from(&billing);
        quote.shipping_address.same_as_billing = true;

        // The method code may still be chosen in the same request.
        if let Some(method) = data.get("shipping_method") {
            REGISTRY.write("shipping_method", &mut quote.shipping_address, method);
        }
    } else {
        quote.shipping_address.same_as_billing = false;

        let fixed = fix_address_data(
            state.engine(),
            data.clone(),
            quote.shipping_address.country_id.as_deref(),
            quote.shipping_address.region_id,
        )?;

        for (key, value) in &fixed {
            if key == "region_id" || key == "shipping_method" || filter.writable().contains(key) {
                REGISTRY.write(key, &mut quote.shipping_address, value);
            }
        }
    }

    quote.shipping_address.validation_errors = validate_address(&quote.shipping_address);
    quote.shipping_address.collect_shipping_rates = true;
    quote.invalidate_totals();

    let mut data = data;
    state
        .interceptors()
        .run(Resource::ShippingAddress, Hook::UpdateAfter, &mut data, ctx);

    Ok(())
}

/// Reset the shipping address, preserving a previously chosen method code.
pub fn delete_resource(quote: &mut Quote) {
    let method = quote.shipping_address.shipping_method.clone();
    quote.shipping_address.reset();
    quote.shipping_address.shipping_method = method;
    quote.invalidate_totals();
}
