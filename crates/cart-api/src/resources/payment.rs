//! Payment resource.
//!
//! The projection is the payment's whole data bag plus the method code; the
//! write path flattens a nested `data` object into the top level, stamps
//! the method code on the relevant address, and marks shipping rates for
//! re-collection since some methods change shipping totals.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::Quote;
use crate::projection::registry::{opt_string, string_or_null};
use crate::projection::{AttributeCodec, Hook, ProjectionContext};
use crate::state::AppState;

use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &[
    "cc_exp_month",
    "cc_exp_year",
    "cc_last4",
    "cc_type",
    "method",
    "po_number",
];

pub const WRITE_ATTRIBUTES: &[&str] = &[
    "cc_exp_month",
    "cc_exp_year",
    "cc_last4",
    "cc_type",
    "data",
    "method",
    "po_number",
];

static CODEC: AttributeCodec = AttributeCodec::new(&[], &[]);

/// Project the payment entity.
pub fn prepare_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &Quote,
) -> Result<Map<String, Value>> {
    let filter = build_filter(state, Resource::Payment, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);

    let mut data = quote.payment.data.clone();
    data.insert(
        "method".to_string(),
        string_or_null(quote.payment.method.as_deref()),
    );

    let data = CODEC.map_out(data);

    let mut data = data;
    state
        .interceptors()
        .run(Resource::Payment, Hook::Prepare, &mut data, ctx);

    Ok(shape_output(state, &CODEC, &filter, data, &quote.currency))
}

/// Apply a payment update.
pub fn update_resource(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
    raw: Map<String, Value>,
) -> Result<()> {
    let filter = build_filter(state, Resource::Payment, ctx, READ_ATTRIBUTES, WRITE_ATTRIBUTES);
    let mut data = CODEC.map_in(filter.filter_in(raw));

    // Clients may nest method-specific fields under `data`; flatten them
    // with the top-level keys winning.
    if let Some(Value::Object(bag)) = data.remove("data") {
        let mut merged = bag;
        for (key, value) in data {
            merged.insert(key, value);
        }
        data = merged;
    }

    let method = data.get("method").and_then(opt_string);

    // The selected method is stamped on the address that carries totals.
    if quote.is_virtual {
        quote.billing_address.payment_method = method.clone();
    } else {
        quote.shipping_address.payment_method = method.clone();
        // Shipping totals may be affected by payment method
        quote.shipping_address.collect_shipping_rates = true;
    }

    quote.payment.method = method;
    data.remove("method");
    quote.payment.data = data.clone();
    quote.invalidate_totals();

    let mut data = data;
    state
        .interceptors()
        .run(Resource::Payment, Hook::UpdateAfter, &mut data, ctx);

    Ok(())
}

/// Reset the payment selection.
pub fn delete_resource(quote: &mut Quote) {
    quote.payment.clear();
    quote.billing_address.payment_method = None;
    quote.shipping_address.payment_method = None;
    quote.invalidate_totals();
}
