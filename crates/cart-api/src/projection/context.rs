//! Immutable per-call projection context.
//!
//! One value per resource call, constructed by the route handler and passed
//! down explicitly. Nested projections build child contexts instead of
//! mutating shared state, so a sub-resource can never leak action type,
//! operation or include-list back into its caller.

use crate::acl::Principal;

/// Whether the call addresses a single entity or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Entity,
    Collection,
}

/// The CRUD operation of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Retrieve,
    Create,
    Update,
    Delete,
}

/// Per-call state threaded through the projection pipeline.
#[derive(Debug, Clone)]
pub struct ProjectionContext {
    pub action: ActionType,
    pub operation: Operation,
    /// Requested attribute include-list; `None` means everything readable.
    pub requested: Option<Vec<String>>,
    /// Raw embed parameter; `None` means the entity default set, an empty
    /// string means none.
    pub embeds: Option<String>,
    pub principal: Principal,
}

impl ProjectionContext {
    /// Context for a top-level call, from request query parameters.
    #[must_use]
    pub fn root(
        action: ActionType,
        operation: Operation,
        attrs: Option<&str>,
        embeds: Option<String>,
        principal: Principal,
    ) -> Self {
        let requested = attrs.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|attr| !attr.is_empty())
                .map(ToString::to_string)
                .collect()
        });

        Self {
            action,
            operation,
            requested,
            embeds,
            principal,
        }
    }

    /// Child context for a nested projection: fresh include-list, no
    /// embeds, same principal.
    #[must_use]
    pub fn child(&self, action: ActionType, operation: Operation) -> Self {
        Self {
            action,
            operation,
            requested: None,
            embeds: Some(String::new()),
            principal: self.principal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_parses_requested_attributes() {
        let ctx = ProjectionContext::root(
            ActionType::Entity,
            Operation::Retrieve,
            Some(" qty, sku ,,"),
            None,
            Principal::Guest,
        );
        assert_eq!(
            ctx.requested,
            Some(vec!["qty".to_string(), "sku".to_string()])
        );
    }

    #[test]
    fn test_child_does_not_inherit_includes_or_embeds() {
        let ctx = ProjectionContext::root(
            ActionType::Entity,
            Operation::Update,
            Some("qty"),
            Some("items".to_string()),
            Principal::Guest,
        );
        let child = ctx.child(ActionType::Collection, Operation::Retrieve);

        assert_eq!(child.action, ActionType::Collection);
        assert_eq!(child.operation, Operation::Retrieve);
        assert!(child.requested.is_none());
        assert_eq!(child.embeds.as_deref(), Some(""));
    }
}
