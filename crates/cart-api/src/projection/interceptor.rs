//! Ordered interceptor hooks at fixed pipeline stages.
//!
//! Registered once at startup, invoked with the in-flight payload at
//! well-defined points, each able to amend it. This is the extension seam
//! that replaces ambient event broadcasting: the set of stages is closed
//! and the invocation order is the registration order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::resources::Resource;

use super::ProjectionContext;

/// Pipeline stage an interceptor attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Outbound projection, after manual attributes, before filtering.
    Prepare,
    /// Inbound update, before input filtering.
    UpdatePrefilter,
    /// Inbound update, after the entity was written.
    UpdateAfter,
    /// Validation response, before shaping.
    ValidateAfter,
    /// Placement response, before shaping.
    PlaceAfter,
}

/// An interceptor amends the in-flight payload in place.
pub type InterceptorFn = Arc<dyn Fn(&mut Map<String, Value>, &ProjectionContext) + Send + Sync>;

/// Registered interceptors, keyed by resource and stage.
#[derive(Default)]
pub struct Interceptors {
    hooks: HashMap<(Resource, Hook), Vec<InterceptorFn>>,
}

impl Interceptors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor for a resource and stage.
    pub fn register<F>(&mut self, resource: Resource, hook: Hook, interceptor: F)
    where
        F: Fn(&mut Map<String, Value>, &ProjectionContext) + Send + Sync + 'static,
    {
        self.hooks
            .entry((resource, hook))
            .or_default()
            .push(Arc::new(interceptor));
    }

    /// Run every interceptor registered for a resource and stage, in
    /// registration order.
    pub fn run(
        &self,
        resource: Resource,
        hook: Hook,
        data: &mut Map<String, Value>,
        ctx: &ProjectionContext,
    ) {
        if let Some(interceptors) = self.hooks.get(&(resource, hook)) {
            for interceptor in interceptors {
                interceptor(data, ctx);
            }
        }
    }
}
