//! Identity and field-authorization collaborator.
//!
//! Authentication itself is out of scope; the hosting gateway vouches for
//! the caller via the `X-Customer-Id` header and this layer only consumes
//! the result. Field-level permissions come from an [`AccessPolicy`], which
//! also gates embed sub-calls.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use stonefruit_core::CustomerId;

use crate::error::AppError;
use crate::projection::Operation;
use crate::resources::Resource;

/// Header carrying the authenticated customer id, set by the gateway.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// The caller on whose behalf a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Guest,
    Customer(CustomerId),
}

impl Principal {
    /// Customer id for authenticated callers.
    #[must_use]
    pub const fn customer_id(&self) -> Option<CustomerId> {
        match self {
            Self::Guest => None,
            Self::Customer(id) => Some(*id),
        }
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(CUSTOMER_ID_HEADER) else {
            return Ok(Self::Guest);
        };

        raw.to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .map(|id| Self::Customer(CustomerId::new(id)))
            .ok_or_else(|| AppError::BadRequest("Invalid customer id header".to_string()))
    }
}

/// Field-level read/write permissions and sub-call authorization.
///
/// `None` from the attribute methods means "everything the entity
/// declares"; a `Some` set is intersected with the declared set.
pub trait AccessPolicy: Send + Sync {
    /// Readable attribute names for a resource and operation.
    fn readable_attributes(
        &self,
        resource: Resource,
        operation: Operation,
        principal: &Principal,
    ) -> Option<Vec<String>>;

    /// Writable attribute names for a resource and operation.
    fn writable_attributes(
        &self,
        resource: Resource,
        operation: Operation,
        principal: &Principal,
    ) -> Option<Vec<String>>;

    /// Whether an embed sub-call into a resource is allowed.
    fn is_sub_call_allowed(&self, resource: Resource, principal: &Principal) -> bool;
}

/// Policy that grants every declared attribute and every sub-call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

impl AccessPolicy for AllowAllPolicy {
    fn readable_attributes(
        &self,
        _resource: Resource,
        _operation: Operation,
        _principal: &Principal,
    ) -> Option<Vec<String>> {
        None
    }

    fn writable_attributes(
        &self,
        _resource: Resource,
        _operation: Operation,
        _principal: &Principal,
    ) -> Option<Vec<String>> {
        None
    }

    fn is_sub_call_allowed(&self, _resource: Resource, _principal: &Principal) -> bool {
        true
    }
}
