//! Validate action resource.
//!
//! POST-only entity returning `{status, errors}`. The response goes through
//! the same shaping pipeline as everything else so clients get sorted keys
//! and null-fill here too.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::Quote;
use crate::projection::{AttributeCodec, Hook, ProjectionContext};
use crate::state::AppState;
use crate::validation::validate_quote;

use super::{Resource, build_filter, shape_output};

pub const READ_ATTRIBUTES: &[&str] = &["errors", "status"];

static CODEC: AttributeCodec = AttributeCodec::new(&[], &[]);

/// Run validation and shape the `{status, errors}` response.
///
/// The boolean in the result is true when the quote validated clean.
pub fn run(
    state: &AppState,
    ctx: &ProjectionContext,
    quote: &mut Quote,
) -> Result<(bool, Map<String, Value>)> {
    let filter = build_filter(state, Resource::Validate, ctx, READ_ATTRIBUTES, &[]);

    let errors = validate_quote(state.engine(), quote);
    let ok = errors.is_empty();

    let mut data = Map::new();
    data.insert(
        "status".to_string(),
        Value::String(if ok { "success" } else { "error" }.to_string()),
    );
    data.insert(
        "errors".to_string(),
        serde_json::to_value(&errors).unwrap_or(Value::Null),
    );

    state
        .interceptors()
        .run(Resource::Validate, Hook::ValidateAfter, &mut data, ctx);

    Ok((ok, shape_output(state, &CODEC, &filter, data, &quote.currency)))
}
