//! Line item handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tower_sessions::Session;
use tracing::instrument;

use crate::acl::Principal;
use crate::error::Result;
use crate::projection::{ActionType, Operation, ProjectionContext};
use crate::resources::{body_object, item};
use crate::state::AppState;

use super::{ProjectionParams, quote_guard};

fn ctx(
    action: ActionType,
    operation: Operation,
    params: &ProjectionParams,
    principal: Principal,
) -> ProjectionContext {
    ProjectionContext::root(
        action,
        operation,
        params.attrs.as_deref(),
        params.embed.clone(),
        principal,
    )
}

/// Item ids arrive as raw path segments; anything non-numeric reads as an
/// unknown item.
fn parse_id(raw: &str) -> i32 {
    raw.trim().parse().unwrap_or(0)
}

/// List the cart's items, keyed by item id.
#[instrument(skip(state, session))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(
        ActionType::Collection,
        Operation::Retrieve,
        &params,
        principal,
    );
    let body = item::prepare_collection(&state, &ctx, &quote)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Add an item by SKU.
///
/// 201 with `Location` for a new line; 200 with `Content-Location` when
/// the add merged into an existing line.
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

    let create_ctx = ctx(ActionType::Entity, Operation::Create, &params, principal);
    let outcome = item::create_resource(&state, &create_ctx, &mut quote, body_object(body)?)?;
    sync.save(&session, &mut quote).await?;

    let read_ctx = ctx(ActionType::Entity, Operation::Retrieve, &params, principal);
    let projected = {
        let added = quote
            .visible_item(outcome.item_id)
            .ok_or_else(|| crate::error::AppError::Internal("added item vanished".to_string()))?;
        item::prepare_resource(&state, &read_ctx, &quote, added)?
    };

    let location = state
        .config()
        .url_for(&format!("/cart/items/{}", outcome.item_id));

    if outcome.created {
        Ok((
            StatusCode::CREATED,
            [(header::LOCATION, location)],
            Json(Value::Object(projected)),
        )
            .into_response())
    } else {
        Ok((
            StatusCode::OK,
            [(header::CONTENT_LOCATION, location)],
            Json(Value::Object(projected)),
        )
            .into_response())
    }
}

/// Remove every visible item.
#[instrument(skip(state, session))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    _principal: Principal,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let ids: Vec<_> = quote.visible_items().map(|item| item.id).collect();
    for id in ids {
        quote.delete_item(id);
    }
    sync.save(&session, &mut quote).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Retrieve a single item.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Path(id): Path<String>,
    Query(params): Query<ProjectionParams>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let quote = state.synchronizer().load(&session).await?;

    let ctx = ctx(ActionType::Entity, Operation::Retrieve, &params, principal);
    let found = item::load_item(&quote, parse_id(&id))?;
    let body = item::prepare_resource(&state, &ctx, &quote, found)?;
    Ok(Json(Value::Object(body)).into_response())
}

/// Update a single item.
#[instrument(skip(state, session, body))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Path(id): Path<String>,
    Query(params): Query<ProjectionParams>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let item_id = item::load_item(&quote, parse_id(&id))?.id;

    let update_ctx = ctx(ActionType::Entity, Operation::Update, &params, principal);
    item::update_resource(&state, &update_ctx, &mut quote, item_id, body_object(body)?)?;
    sync.save(&session, &mut quote).await?;

    let read_ctx = ctx(ActionType::Entity, Operation::Retrieve, &params, principal);
    let body = {
        let updated = quote
            .visible_item(item_id)
            .ok_or_else(|| crate::error::AppError::NotFound("Not Found".to_string()))?;
        item::prepare_resource(&state, &read_ctx, &quote, updated)?
    };
    Ok(Json(Value::Object(body)).into_response())
}

/// Delete a single item.
#[instrument(skip(state, session))]
pub async fn destroy(
    State(state): State<AppState>,
    session: Session,
    _principal: Principal,
    Path(id): Path<String>,
) -> Result<Response> {
    let _guard = quote_guard(&state, &session).await?;
    let sync = state.synchronizer();
    let mut quote = sync.load(&session).await?;

    let item_id = item::load_item(&quote, parse_id(&id))?.id;
    quote.delete_item(item_id);
    sync.save(&session, &mut quote).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
