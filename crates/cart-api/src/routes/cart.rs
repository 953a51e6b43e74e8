//! Cart entity handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tower_sessions::Session;
use tracing::instrument;

use crate::acl::Principal;
use crate::error::Result;
use crate::projection::{ActionType, Operation, ProjectionContext};
use crate::resources::{self, body_object};
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

/// Retrieve the cart.
#[instrument(skip(state, session))]
pub async fn retrieve(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let mut quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(Operation::Retrieve, &params, principal);
    let body = resources::cart::prepare_resource(&state, &ctx, &mut quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Create the cart. The quote exists implicitly per session, so create and
/// update share semantics; a 201 with `Location` marks the first commit.
#[instrument(skip(state, session, body))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;
    let created = quote.is_new;

    let update_ctx = ctx(Operation::Create, &params, principal);
    resources::cart::update_resource(&state, &update_ctx, &mut quote, body_object(body)?)?;
    sync.save(&session, &mut quote).await?;

    let read_ctx = ctx(Operation::Retrieve, &params, principal);
    let body = resources::cart::prepare_resource(&state, &read_ctx, &mut quote)?;

    if created {
        Ok((
            StatusCode::CREATED,
            [(header::LOCATION, state.config().url_for("/cart"))],
            Json(Value::Object(body)),
        )
            .into_response())
    } else {
        Ok(Json(Value::Object(body)).into_response())
    }
}

/// Update the cart.
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
    resources::cart::update_resource(&state, &update_ctx, &mut quote, body_object(body)?)?;
    sync.save(&session, &mut quote).await?;

    let read_ctx = ctx(Operation::Retrieve, &params, principal);
    let body = resources::cart::prepare_resource(&state, &read_ctx, &mut quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Deactivate the cart. Soft: the quote survives for bookkeeping, the
/// session gets a fresh one next request.
#[instrument(skip(state, session))]
pub async fn destroy(
    State(state): State<AppState>,
    session: Session,
    _principal: Principal,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    if !quote.is_new {
        resources::cart::deactivate(&mut quote);
        sync.save(&session, &mut quote).await?;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
