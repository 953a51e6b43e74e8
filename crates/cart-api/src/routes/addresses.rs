//! Billing and shipping address handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tower_sessions::Session;
use tracing::instrument;

use crate::acl::Principal;
use crate::error::Result;
use crate::projection::{ActionType, Operation, ProjectionContext};
use crate::resources::{billing_address, body_object, shipping_address};
use crate::state::AppState;

use super::{ProjectionParams, quote_guard};

fn ctx(operation: Operation, params: &ProjectionParams, principal: Principal) -> ProjectionContext {
    ProjectionContext::root(
        ActionType::Entity,
        operation,
        params.attrs.as_deref(),
        params.embed.clone(),
        principal,
    )
}

/// Retrieve the billing address.
#[instrument(skip(state, session))]
pub async fn show_billing(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(Operation::Retrieve, &params, principal);
    let body = billing_address::prepare_resource(&state, &ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Create or update the billing address.
#[instrument(skip(state, session, body))]
pub async fn update_billing(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let update_ctx = ctx(Operation::Update, &params, principal);
    billing_address::update_resource(&state, &update_ctx, &mut quote, body_object(body)?)?;
    sync.save(&session, &mut quote).await?;

    let read_ctx = ctx(Operation::Retrieve, &params, principal);
    let body = billing_address::prepare_resource(&state, &read_ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Clear the billing address.
#[instrument(skip(state, session))]
pub async fn destroy_billing(
    State(state): State<AppState>,
    session: Session,
    _principal: Principal,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    quote.billing_address.reset();
    quote.invalidate_totals();
    sync.save(&session, &mut quote).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Retrieve the shipping address.
#[instrument(skip(state, session))]
pub async fn show_shipping(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(Operation::Retrieve, &params, principal);
    let body = shipping_address::prepare_resource(&state, &ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Create or update the shipping address.
#[instrument(skip(state, session, body))]
pub async fn update_shipping(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let update_ctx = ctx(Operation::Update, &params, principal);
    shipping_address::update_resource(&state, &update_ctx, &mut quote, body_object(body)?)?;
    sync.save(&session, &mut quote).await?;

    let read_ctx = ctx(Operation::Retrieve, &params, principal);
    let body = shipping_address::prepare_resource(&state, &read_ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Reset the shipping address, preserving the selected method code.
#[instrument(skip(state, session))]
pub async fn destroy_shipping(
    State(state): State<AppState>,
    session: Session,
    _principal: Principal,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    shipping_address::delete_resource(&mut quote);
    sync.save(&session, &mut quote).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
