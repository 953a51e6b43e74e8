//! Order placement.
//!
//! Drives the quote through preparation (guest or customer path),
//! validation, engine submission, and deactivation. Validation failures
//! and payment-stage submission failures both come back as the structured
//! 422 outcome; only unexpected engine faults escalate.

use serde_json::{Map, Value};
use stonefruit_core::Email;

use crate::engine::{CustomerDefaults, OrderRef, SubmitError};
use crate::error::{AppError, Result};
use crate::model::{CustomerBinding, Quote};
use crate::projection::{AttributeCodec, Hook, ProjectionContext};
use crate::state::AppState;
use crate::validation::validate_quote;

use super::address::export_stored_address;
use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &["order", "status"];

static CODEC: AttributeCodec = AttributeCodec::new(&[], &[]);

/// Place the order for a validated quote.
///
/// On success the quote is deactivated (the caller commits it) and the
/// shaped `{status, order}` response is returned.
pub fn place_order(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
) -> Result<Map<String, Value>> {
    // Re-submission race: a second placement on a quote that is no longer
    // active is a conflict, not a duplicate order.
    if !quote.is_active {
        return Err(AppError::Conflict(
            "The cart has already been placed.".to_string(),
        ));
    }

    match ctx.principal.customer_id() {
        Some(customer_id) => prepare_customer_order(state, quote, customer_id)?,
        None => prepare_guest_order(quote),
    }

    let errors = validate_quote(state.engine(), quote);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let order = match state.engine().submit_order(quote) {
        Ok(order) => order,
        // A payment fault during submission is a structured outcome, not a
        // transport error.
        Err(SubmitError::Payment(message)) => {
            let mut errors = crate::error::ErrorMap::new();
            errors.insert("payment".to_string(), vec![message]);
            return Err(AppError::Validation(errors));
        }
        Err(SubmitError::Engine(err)) => return Err(err.into()),
    };

    quote.is_active = false;
    quote.invalidate_totals();

    notify_order_confirmation(state, quote, &order);

    let filter = build_filter(state, Resource::Place, ctx, READ_ATTRIBUTES, &[]);
    let mut data = Map::new();
    data.insert("status".to_string(), Value::String("success".to_string()));
    data.insert(
        "order".to_string(),
        Value::String(order.increment_id.clone()),
    );

    state
        .interceptors()
        .run(Resource::Place, Hook::PlaceAfter, &mut data, ctx);

    Ok(shape_output(state, &CODEC, &filter, data, &quote.currency))
}

/// Guest checkout: anonymous linkage, email derived from billing.
fn prepare_guest_order(quote: &mut Quote) {
    quote.customer = CustomerBinding::Guest;
    quote.customer_email = quote.billing_address.email.clone();
    quote.customer_is_guest = true;

    if !quote.is_virtual && quote.shipping_address.same_as_billing {
        let billing = quote.billing_address.clone();
        quote.shipping_address.import_fields_from(&billing);
        quote.shipping_address.same_as_billing = true;
    }
}

/// Customer checkout: persist addresses into the address book where
/// requested or not yet linked, and fill empty default slots.
fn prepare_customer_order(
    state: &AppState,
    quote: &mut Quote,
    customer_id: stonefruit_core::CustomerId,
) -> Result<()> {
    quote.customer = CustomerBinding::Customer(customer_id);
    quote.customer_is_guest = false;

    let mut defaults = state.engine().customer_defaults(customer_id)?;
    let mut defaults_changed = false;

    let mut new_billing_entry = None;
    if quote.billing_address.customer_address_id.is_none()
        || quote.billing_address.save_in_address_book
    {
        let stored = export_stored_address(&quote.billing_address, customer_id);
        let id = state.engine().add_customer_address(customer_id, stored)?;
        quote.billing_address.customer_address_id = Some(id);
        quote.billing_address.save_in_address_book = false;
        new_billing_entry = Some(id);
    }

    let mut new_shipping_entry = None;
    if !quote.is_virtual {
        if quote.shipping_address.same_as_billing {
            // A mirrored shipping address is a live copy of billing and is
            // never separately persisted.
            let billing = quote.billing_address.clone();
            quote.shipping_address.import_fields_from(&billing);
            quote.shipping_address.same_as_billing = true;
        } else if quote.shipping_address.customer_address_id.is_none()
            || quote.shipping_address.save_in_address_book
        {
            let stored = export_stored_address(&quote.shipping_address, customer_id);
            let id = state.engine().add_customer_address(customer_id, stored)?;
            quote.shipping_address.customer_address_id = Some(id);
            quote.shipping_address.save_in_address_book = false;
            new_shipping_entry = Some(id);
        }
    }

    if defaults.billing.is_none() {
        if let Some(id) = new_billing_entry {
            defaults.billing = Some(id);
            defaults_changed = true;
        }
    }
    if defaults.shipping.is_none() {
        // Prefer the new shipping entry; fall back to the billing entry.
        if let Some(id) = new_shipping_entry.or(new_billing_entry) {
            defaults.shipping = Some(id);
            defaults_changed = true;
        }
    }

    if defaults_changed {
        state.engine().set_customer_defaults(
            customer_id,
            CustomerDefaults {
                billing: defaults.billing,
                shipping: defaults.shipping,
            },
        )?;
    }

    Ok(())
}

/// Best-effort confirmation: a notification failure is logged and never
/// undoes a placed order.
fn notify_order_confirmation(state: &AppState, quote: &Quote, order: &OrderRef) {
    let Some(email) = quote
        .customer_email
        .as_deref()
        .and_then(|raw| Email::parse(raw).ok())
    else {
        tracing::warn!(order = %order.increment_id, "no valid email for order confirmation");
        return;
    };

    if let Err(err) = state.engine().send_order_confirmation(order, &email) {
        tracing::warn!(
            order = %order.increment_id,
            error = %err,
            "order confirmation failed"
        );
    }
}
