//! Per-entity resource projectors.
//!
//! One module per addressable resource. Each follows the same read
//! contract (registry reads, manual attributes, interceptor hook, outbound
//! filter, coercion, null-fill, sorted keys) and write contract (inbound
//! filter, key mapping, entity-specific branches, registry writes,
//! invariant maintenance, attached validation errors).

pub mod address;
pub mod billing_address;
pub mod cart;
pub mod crosssell;
pub mod item;
pub mod payment;
pub mod payment_methods;
pub mod place;
pub mod shipping_address;
pub mod shipping_methods;
pub mod validate;

use serde_json::{Map, Value};

use crate::acl::Principal;
use crate::projection::{AttributeCodec, ProjectionContext, ProjectionFilter};
use crate::state::AppState;

/// Addressable resources of the cart tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cart,
    Item,
    BillingAddress,
    ShippingAddress,
    Payment,
    ShippingMethod,
    PaymentMethod,
    Crosssell,
    Validate,
    Place,
}

impl Resource {
    /// Wire name of the resource.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Item => "item",
            Self::BillingAddress => "billing_address",
            Self::ShippingAddress => "shipping_address",
            Self::Payment => "payment",
            Self::ShippingMethod => "shipping_method",
            Self::PaymentMethod => "payment_method",
            Self::Crosssell => "crosssell",
            Self::Validate => "validate",
            Self::Place => "place",
        }
    }
}

/// Resolve the projection filter for a resource call: the declared
/// attribute sets intersected with whatever the access policy grants.
#[must_use]
pub fn build_filter(
    state: &AppState,
    resource: Resource,
    ctx: &ProjectionContext,
    declared_read: &[&str],
    declared_write: &[&str],
) -> ProjectionFilter {
    let readable = permitted(
        declared_read,
        state
            .policy()
            .readable_attributes(resource, ctx.operation, &ctx.principal),
    );
    let writable = permitted(
        declared_write,
        state
            .policy()
            .writable_attributes(resource, ctx.operation, &ctx.principal),
    );

    ProjectionFilter::new(ctx.requested.as_deref(), readable, writable)
}

fn permitted(declared: &[&str], granted: Option<Vec<String>>) -> Vec<String> {
    match granted {
        None => declared.iter().map(ToString::to_string).collect(),
        Some(granted) => declared
            .iter()
            .filter(|attr| granted.iter().any(|g| g == *attr))
            .map(ToString::to_string)
            .collect(),
    }
}

/// Whether the policy allows an embed sub-call into a resource.
#[must_use]
pub fn is_sub_call_allowed(state: &AppState, resource: Resource, principal: &Principal) -> bool {
    state.policy().is_sub_call_allowed(resource, principal)
}

/// Shared tail of every outbound projection: filter, coerce, null-fill.
/// Key order is the map's own (lexicographic).
#[must_use]
pub fn shape_output(
    state: &AppState,
    codec: &AttributeCodec,
    filter: &ProjectionFilter,
    data: Map<String, Value>,
    currency: &str,
) -> Map<String, Value> {
    let mut data = filter.filter_out(data);
    codec.coerce(&mut data, currency, state.engine());
    filter.null_fill(&mut data);
    data
}

/// Interpret a request body as the raw attribute map.
pub fn body_object(body: Value) -> crate::error::Result<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(crate::error::AppError::BadRequest(
            "Expected a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Operation as Op;

    struct DenyListPolicy;

    impl crate::acl::AccessPolicy for DenyListPolicy {
        fn readable_attributes(
            &self,
            _resource: Resource,
            _operation: Op,
            _principal: &Principal,
        ) -> Option<Vec<String>> {
            Some(vec!["qty".to_string()])
        }

        fn writable_attributes(
            &self,
            _resource: Resource,
            _operation: Op,
            _principal: &Principal,
        ) -> Option<Vec<String>> {
            Some(Vec::new())
        }

        fn is_sub_call_allowed(&self, _resource: Resource, _principal: &Principal) -> bool {
            false
        }
    }

    #[test]
    fn test_build_filter_intersects_policy() {
        use std::sync::Arc;

        let state = AppState::new(
            crate::config::CartApiConfig::default(),
            Arc::new(crate::engine::MemoryEngine::with_demo_catalog("USD")),
            Arc::new(DenyListPolicy),
            crate::projection::Interceptors::new(),
        );
        let ctx = ProjectionContext::root(
            crate::projection::ActionType::Entity,
            Op::Retrieve,
            None,
            None,
            Principal::Guest,
        );

        let filter = build_filter(&state, Resource::Item, &ctx, &["qty", "sku"], &["qty"]);

        assert_eq!(filter.attributes_to_include(), ["qty".to_string()]);
        assert!(filter.writable().is_empty());
    }
}
