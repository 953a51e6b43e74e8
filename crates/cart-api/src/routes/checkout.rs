//! Checkout action handlers: validate and place.

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
use crate::resources::{place, validate};
use crate::state::AppState;

use super::{ProjectionParams, quote_guard};

fn ctx(params: &ProjectionParams, principal: Principal) -> ProjectionContext {
    ProjectionContext::root(
        ActionType::Entity,
        Operation::Create,
        params.attrs.as_deref(),
        params.embed.clone(),
        principal,
    )
}

/// Validate the cart for checkout. 200 on success, 422 with the keyed
/// error map otherwise; both carry the shaped `{status, errors}` body.
#[instrument(skip(state, session))]
pub async fn validate(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let ctx = ctx(&params, principal);
    let (ok, body) = validate::run(&state, &ctx, &mut quote)?;

    // The same-as-billing re-copy is a real mutation; commit it.
    sync.save(&session, &mut quote).await?;

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(Value::Object(body))).into_response())
}

/// Place the order. 201 with the order reference on success; a validation
/// or payment failure is a 422 with the keyed error map and the cart stays
/// active and uncommitted.
#[instrument(skip(state, session))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let ctx = ctx(&params, principal);
    let body = place::place_order(&state, &ctx, &mut quote)?;

    // Persist the deactivated quote only after a successful submission;
    // a rejected placement leaves no partial commit behind.
    sync.save(&session, &mut quote).await?;

    Ok((StatusCode::CREATED, Json(Value::Object(body))).into_response())
}
