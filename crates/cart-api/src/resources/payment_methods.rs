//! Payment methods collection (read-only).
//!
//! Lists the methods applicable to the quote's country, currency and total
//! bounds. `cc_types` is computed per method as the intersection of the
//! globally configured card types with the method's own configuration.

use serde_json::{Map, Value};

use crate::engine::{MethodChecks, PaymentMethodInfo};
use crate::error::Result;
use crate::model::Quote;
use crate::projection::{AttributeCodec, CoercionKind, Hook, ProjectionContext};
use crate::state::AppState;

use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &["cc_types", "code", "title"];

static CODEC: AttributeCodec = AttributeCodec::new(
    &[],
    &[("code", CoercionKind::Text), ("title", CoercionKind::Text)],
);

/// Project the payment methods applicable to the quote.
pub fn prepare_collection(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &Quote,
) -> Result<Vec<Value>> {
    let filter = build_filter(state, Resource::PaymentMethod, ctx, READ_ATTRIBUTES, &[]);
    let global_cc_types = state.engine().global_cc_types();

    let mut data = Vec::new();
    for method in state.engine().payment_methods(quote)? {
        if !method.applicable_to(quote, MethodChecks::listing()) {
            continue;
        }

        let mut entry = Map::new();
        if filter.includes("code") {
            entry.insert("code".to_string(), Value::String(method.code.clone()));
        }
        if filter.includes("title") {
            entry.insert("title".to_string(), Value::String(method.title.clone()));
        }
        if filter.includes("cc_types") {
            entry.insert(
                "cc_types".to_string(),
                available_cc_types(&method, &global_cc_types),
            );
        }

        state
            .interceptors()
            .run(Resource::PaymentMethod, Hook::Prepare, &mut entry, ctx);

        data.push(Value::Object(shape_output(
            state,
            &CODEC,
            &filter,
            entry,
            &quote.currency,
        )));
    }

    Ok(data)
}

/// Intersection of globally configured CC types with the method's set,
/// null for methods without card types.
fn available_cc_types(method: &PaymentMethodInfo, global: &[(String, String)]) -> Value {
    let mut types = Map::new();
    for (code, title) in global {
        if method.cc_types.iter().any(|t| t == code) {
            types.insert(code.clone(), Value::String(title.clone()));
        }
    }

    if types.is_empty() {
        Value::Null
    } else {
        Value::Object(types)
    }
}
