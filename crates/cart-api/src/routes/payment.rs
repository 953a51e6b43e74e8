//! Payment handlers.

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
use crate::resources::{body_object, payment};
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

/// Retrieve the payment.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(Operation::Retrieve, &params, principal);
    let body = payment::prepare_resource(&state, &ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Create or update the payment.
#[instrument(skip(state, session, body))]
pub async fn update(
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
    payment::update_resource(&state, &update_ctx, &mut quote, body_object(body)?)?;
    sync.save(&session, &mut quote).await?;

    let read_ctx = ctx(Operation::Retrieve, &params, principal);
    let body = payment::prepare_resource(&state, &read_ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Reset the payment selection.
#[instrument(skip(state, session))]
pub async fn destroy(
    State(state): State<AppState>,
    session: Session,
    _principal: Principal,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    payment::delete_resource(&mut quote);
    sync.save(&session, &mut quote).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
