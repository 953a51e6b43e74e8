//! Bidirectional attribute renaming and type coercion.
//!
//! Each resource declares a static rename map (external key to internal
//! key, identity when absent) and a static type map (external key to
//! coercion kind). Both are configuration, never mutated at runtime.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use stonefruit_core::Money;
use stonefruit_core::money::minor_units;

use crate::engine::CurrencyFormatter;

/// How an external attribute value is coerced on the way out.
///
/// The set is closed; an unknown kind is unrepresentable, which makes a
/// bad registration a compile error rather than a request-time fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    Bool,
    Int,
    Float,
    Currency,
    Text,
}

/// Static per-entity attribute rename and coercion tables.
pub struct AttributeCodec {
    /// `(external, internal)` pairs; identity for keys absent here.
    map: &'static [(&'static str, &'static str)],
    types: &'static [(&'static str, CoercionKind)],
}

impl AttributeCodec {
    #[must_use]
    pub const fn new(
        map: &'static [(&'static str, &'static str)],
        types: &'static [(&'static str, CoercionKind)],
    ) -> Self {
        Self { map, types }
    }

    /// Internal name for an external attribute key.
    #[must_use]
    pub fn internal<'a>(&self, external: &'a str) -> &'a str {
        self.map
            .iter()
            .find(|(ext, _)| *ext == external)
            .map_or(external, |(_, int)| int)
    }

    /// External name for an internal attribute key.
    #[must_use]
    pub fn external<'a>(&self, internal: &'a str) -> &'a str {
        self.map
            .iter()
            .find(|(_, int)| *int == internal)
            .map_or(internal, |(ext, _)| ext)
    }

    /// Coercion kind declared for an external key.
    #[must_use]
    pub fn kind(&self, external: &str) -> Option<CoercionKind> {
        self.types
            .iter()
            .find(|(ext, _)| *ext == external)
            .map(|(_, kind)| *kind)
    }

    /// Rename keys from the external to the internal vocabulary.
    #[must_use]
    pub fn map_in(&self, data: Map<String, Value>) -> Map<String, Value> {
        data.into_iter()
            .map(|(key, value)| (self.internal(&key).to_string(), value))
            .collect()
    }

    /// Rename keys from the internal to the external vocabulary.
    ///
    /// Inverse of [`map_in`](Self::map_in) for key sets that do not collide
    /// with mapped internal names.
    #[must_use]
    pub fn map_out(&self, data: Map<String, Value>) -> Map<String, Value> {
        data.into_iter()
            .map(|(key, value)| (self.external(&key).to_string(), value))
            .collect()
    }

    /// Coerce values in place per this codec's type map.
    pub fn coerce<F>(&self, data: &mut Map<String, Value>, currency: &str, formatter: &F)
    where
        F: CurrencyFormatter + ?Sized,
    {
        coerce_entries(self.types, data, currency, formatter);
    }
}

/// Coerce values in place per an explicit type table.
///
/// Only keys present in both the table and the data are touched, and only
/// when the value is scalar or null. Structured values pass through
/// untouched, which makes coercion idempotent.
pub fn coerce_entries<F>(
    types: &[(&str, CoercionKind)],
    data: &mut Map<String, Value>,
    currency: &str,
    formatter: &F,
) where
    F: CurrencyFormatter + ?Sized,
{
    for (key, kind) in types {
        if let Some(value) = data.get_mut(*key) {
            if is_scalar(value) {
                *value = coerce_value(*kind, value, currency, formatter);
            }
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn coerce_value<F>(kind: CoercionKind, value: &Value, currency: &str, formatter: &F) -> Value
where
    F: CurrencyFormatter + ?Sized,
{
    match kind {
        CoercionKind::Bool => Value::Bool(truthy(value)),
        CoercionKind::Int => Value::from(as_decimal(value).trunc().to_i64().unwrap_or(0)),
        CoercionKind::Float => Value::from(as_decimal(value).to_f64().unwrap_or(0.0)),
        CoercionKind::Currency => {
            let precision = minor_units(currency);
            let amount = as_decimal(value).round_dp(precision);
            let formatted = formatter.format_currency(currency, amount);
            serde_json::to_value(Money::new(amount, currency, formatted))
                .unwrap_or(Value::Null)
        }
        CoercionKind::Text => Value::String(as_text(value)),
    }
}

/// Truthiness: false for null, false, zero, the empty string, `"0"` and a
/// case-insensitive `"false"`; true otherwise.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        _ => true,
    }
}

/// Lenient numeric parse, zero on anything non-numeric.
fn as_decimal(value: &Value) -> Decimal {
    match value {
        Value::Bool(true) => Decimal::ONE,
        Value::Number(n) => n.to_string().parse().unwrap_or(Decimal::ZERO),
        Value::String(s) => s.trim().parse().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}
