//! Resource projection pipeline.
//!
//! Everything between the wire representation and the quote aggregate lives
//! here: attribute renaming and type coercion, include-list filtering with
//! null-fill and deterministic key order, the immutable per-call context,
//! embed parsing, per-entity field registries, and the interceptor hooks
//! that let externals amend in-flight payloads.

pub mod codec;
pub mod context;
pub mod embed;
pub mod filter;
pub mod interceptor;
pub mod registry;

pub use codec::{AttributeCodec, CoercionKind};
pub use context::{ActionType, Operation, ProjectionContext};
pub use embed::parse_embeds;
pub use filter::ProjectionFilter;
pub use interceptor::{Hook, Interceptors};
pub use registry::FieldRegistry;
