//! Explicit per-entity field registries.
//!
//! Each entity maps internal field names to a typed reader and an optional
//! writer, built once at startup. Field access is exhaustively enumerable;
//! there is no reflective get-by-name anywhere in the pipeline.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

/// Reader for one field.
pub type FieldReader<T> = fn(&T) -> Value;

/// Writer for one field. Writers parse leniently; malformed scalars fall
/// back to the field's zero value the way outbound coercion does.
pub type FieldWriter<T> = fn(&mut T, &Value);

struct FieldAccessor<T> {
    read: FieldReader<T>,
    write: Option<FieldWriter<T>>,
}

/// Field name to accessor table for one entity type.
pub struct FieldRegistry<T> {
    fields: BTreeMap<&'static str, FieldAccessor<T>>,
}

impl<T> Default for FieldRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FieldRegistry<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Register a read-only field.
    #[must_use]
    pub fn readable(mut self, name: &'static str, read: FieldReader<T>) -> Self {
        self.fields.insert(name, FieldAccessor { read, write: None });
        self
    }

    /// Register a readable and writable field.
    #[must_use]
    pub fn accessor(
        mut self,
        name: &'static str,
        read: FieldReader<T>,
        write: FieldWriter<T>,
    ) -> Self {
        self.fields.insert(
            name,
            FieldAccessor {
                read,
                write: Some(write),
            },
        );
        self
    }

    /// Read a field by internal name; `None` when the field is unknown.
    #[must_use]
    pub fn read(&self, name: &str, entity: &T) -> Option<Value> {
        self.fields.get(name).map(|accessor| (accessor.read)(entity))
    }

    /// Write a field by internal name; false when the field is unknown or
    /// read-only.
    pub fn write(&self, name: &str, entity: &mut T, value: &Value) -> bool {
        match self.fields.get(name).and_then(|accessor| accessor.write) {
            Some(write) => {
                write(entity, value);
                true
            }
            None => false,
        }
    }

    /// All registered internal field names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }
}

// =============================================================================
// Lenient value parsing for writers
// =============================================================================

/// String or null from a JSON value; empty strings become `None`.
#[must_use]
pub fn opt_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lenient decimal parse, zero on anything non-numeric.
#[must_use]
pub fn as_decimal(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => n.to_string().parse().unwrap_or(Decimal::ZERO),
        Value::String(s) => s.trim().parse().unwrap_or(Decimal::ZERO),
        Value::Bool(true) => Decimal::ONE,
        _ => Decimal::ZERO,
    }
}

/// Lenient integer parse, `None` on anything non-numeric.
#[must_use]
pub fn opt_i32(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Truthiness matching outbound bool coercion.
#[must_use]
pub fn as_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        _ => true,
    }
}

/// JSON value from an optional string, null when absent.
#[must_use]
pub fn string_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::String(s.to_string()))
}

/// JSON number from a decimal. Whole values render as integers, everything
/// else as a float.
#[must_use]
pub fn decimal_value(value: Decimal) -> Value {
    if value.scale() == 0 {
        value
            .to_i64()
            .map_or_else(|| Value::from(value.to_f64().unwrap_or(0.0)), Value::from)
    } else {
        Value::from(value.to_f64().unwrap_or(0.0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Widget {
        name: Option<String>,
        qty: Decimal,
    }

    fn registry() -> FieldRegistry<Widget> {
        FieldRegistry::new()
            .accessor(
                "name",
                |w: &Widget| string_or_null(w.name.as_deref()),
                |w, v| w.name = opt_string(v),
            )
            .readable("qty", |w| decimal_value(w.qty))
    }

    #[test]
    fn test_read_known_field() {
        let widget = Widget {
            name: Some("gear".to_string()),
            qty: Decimal::ONE,
        };
        assert_eq!(registry().read("name", &widget), Some(json!("gear")));
        assert_eq!(registry().read("qty", &widget), Some(json!(1)));
    }

    #[test]
    fn test_read_unknown_field() {
        assert!(registry().read("nope", &Widget::default()).is_none());
    }

    #[test]
    fn test_write_respects_mutability() {
        let mut widget = Widget::default();
        assert!(registry().write("name", &mut widget, &json!("gear")));
        assert_eq!(widget.name.as_deref(), Some("gear"));

        // qty is read-only
        assert!(!registry().write("qty", &mut widget, &json!(5)));
        assert_eq!(widget.qty, Decimal::ZERO);
    }

    #[test]
    fn test_decimal_value_is_numeric() {
        assert_eq!(decimal_value("2.5".parse().unwrap()), json!(2.5));
    }
}
