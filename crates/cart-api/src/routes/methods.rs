//! Read-only collection handlers: shipping methods, payment methods,
//! cross-sells.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tower_sessions::Session;
use tracing::instrument;

use crate::acl::Principal;
use crate::error::Result;
use crate::projection::{ActionType, Operation, ProjectionContext};
use crate::resources::{crosssell, payment_methods as payment_methods_resource, shipping_methods as shipping_methods_resource};
use crate::state::AppState;

use super::{ProjectionParams, quote_guard};

fn ctx(params: &ProjectionParams, principal: Principal) -> ProjectionContext {
    ProjectionContext::root(
        ActionType::Collection,
        Operation::Retrieve,
        params.attrs.as_deref(),
        params.embed.clone(),
        principal,
    )
}

/// Quote and list shipping rates in deterministic order.
#[instrument(skip(state, session))]
pub async fn shipping_methods(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let ctx = ctx(&params, principal);
    let body = shipping_methods_resource::prepare_collection(&state, &ctx, &mut quote)?;

    // Rate collection touched the quote; persist so a following
    // selection validates against the same rates.
    sync.save(&session, &mut quote).await?;

    Ok(Json(Value::Array(body)).into_response())
}

/// List payment methods applicable to the quote.
#[instrument(skip(state, session))]
pub async fn payment_methods(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(&params, principal);
    let body = payment_methods_resource::prepare_collection(&state, &ctx, &quote)?;
    Ok(Json(Value::Array(body)).into_response())
}

/// List cross-sell products for the cart, keyed by SKU.
#[instrument(skip(state, session))]
pub async fn crosssells(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(&params, principal);
    let body = crosssell::prepare_collection(&state, &ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}
