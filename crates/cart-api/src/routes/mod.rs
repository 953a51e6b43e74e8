//! HTTP route handlers for the cart API.
//!
//! # Route Structure
//!
//! ```text
//! GET/POST/PUT/DELETE /cart               - Cart entity
//! GET/POST/DELETE     /cart/items         - Item collection
//! GET/POST/PUT/DELETE /cart/items/{id}    - Item entity
//! GET/POST/PUT/DELETE /cart/billing-address  - Billing address
//! GET/POST/PUT/DELETE /cart/shipping-address - Shipping address
//! GET/POST/PUT/DELETE /cart/payment       - Payment
//! GET  /cart/shipping-methods             - Quoted shipping rates
//! GET  /cart/payment-methods              - Applicable payment methods
//! GET  /cart/crosssells                   - Cross-sell products
//! POST /cart/validate                     - Validate for checkout
//! POST /cart/place                        - Place the order
//! ```
//!
//! Common query parameters: `attrs` (comma-separated include-list) and
//! `embed` (comma-separated sub-resources; absent means the resource's
//! default set, empty string means none).

pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod items;
pub mod methods;
pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::OwnedMutexGuard;
use tower_sessions::Session;

use crate::error::Result;
use crate::session;
use crate::state::AppState;

/// Projection query parameters shared by every resource route.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProjectionParams {
    /// Requested attribute include-list, comma-separated.
    pub attrs: Option<String>,
    /// Requested embeds, comma-separated; empty string disables defaults.
    pub embed: Option<String>,
}

/// Serialize all access to the session's quote.
///
/// Every handler takes this lock before loading the quote; none of the
/// synchronization invariants survive concurrent mutation.
pub(crate) async fn quote_guard(
    state: &AppState,
    session: &Session,
) -> Result<OwnedMutexGuard<()>> {
    let key = session::lock_key(session).await?;
    Ok(state.lock_session(key).await)
}

/// Create the item routes router.
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(items::index).post(items::create).delete(items::clear),
        )
        .route(
            "/{id}",
            get(items::show)
                .post(items::update)
                .put(items::update)
                .delete(items::destroy),
        )
}

/// Create all routes for the cart API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/cart",
            get(cart::retrieve)
                .post(cart::create)
                .put(cart::update)
                .delete(cart::destroy),
        )
        .nest("/cart/items", item_routes())
        .route(
            "/cart/billing-address",
            get(addresses::show_billing)
                .post(addresses::update_billing)
                .put(addresses::update_billing)
                .delete(addresses::destroy_billing),
        )
        .route(
            "/cart/shipping-address",
            get(addresses::show_shipping)
                .post(addresses::update_shipping)
                .put(addresses::update_shipping)
                .delete(addresses::destroy_shipping),
        )
        .route(
            "/cart/payment",
            get(payment::show)
                .post(payment::update)
                .put(payment::update)
                .delete(payment::destroy),
        )
        .route("/cart/shipping-methods", get(methods::shipping_methods))
        .route("/cart/payment-methods", get(methods::payment_methods))
        .route("/cart/crosssells", get(methods::crosssells))
        .route("/cart/validate", post(checkout::validate))
        .route("/cart/place", post(checkout::place))
}
