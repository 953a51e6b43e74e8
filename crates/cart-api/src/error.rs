//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-class errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Business-rule validation failures are data, not exceptions: they travel
//! as [`AppError::Validation`] with the full keyed error map so a client
//! sees every problem in one round trip.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;

/// Keyed validation error map: `shipping_address` | `billing_address` |
/// `shipping_method` | `payment` to human-readable messages.
pub type ErrorMap = BTreeMap<String, Vec<String>>;

/// Application-level error type for the cart API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed client input: bad SKU, quantity, coupon or stored-address
    /// reference. Detected before any mutation.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Referenced resource does not exist, is deleted, or is a child item.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unsupported action/operation combination for this resource.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The operation conflicts with current state, e.g. placing an order on
    /// an already-deactivated quote.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Structured validation failure; never thrown mid-pipeline, always the
    /// aggregated map.
    #[error("Validation failed")]
    Validation(ErrorMap),

    /// Commerce Engine call failed.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Engine(EngineError::Failure(_)) | Self::Session(_) | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::BadRequest(_) | Self::Engine(EngineError::Rejected(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Engine(EngineError::Failure(_)) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            Self::Validation(errors) => json!({
                "status": "error",
                "errors": errors,
            }),
            // Don't expose internal error details to clients
            Self::Engine(EngineError::Failure(_)) | Self::Session(_) | Self::Internal(_) => {
                json!({
                    "status": "error",
                    "message": "Internal server error",
                })
            }
            Self::BadRequest(message)
            | Self::Conflict(message)
            | Self::NotFound(message) => json!({
                "status": "error",
                "message": message,
            }),
            Self::Engine(EngineError::Rejected(message)) => json!({
                "status": "error",
                "message": message,
            }),
            Self::MethodNotAllowed => json!({
                "status": "error",
                "message": "Method not allowed",
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
