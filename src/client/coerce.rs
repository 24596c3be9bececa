//! Attribute value coercion.
//!
//! `set_attribute` carries its value as text. The text is first read as JSON
//! (so `"5"` becomes a number and `"true"` a boolean) and falls back to a raw
//! string. If the element's reflected property already holds a primitive of
//! another kind, the value is converted to that kind:
//!
//! | Property | New value | Result |
//! |----------|-----------|--------|
//! | boolean | string | `value == "true"` |
//! | boolean | number | `value != 0` |
//! | number | boolean | `1` / `0` |
//! | number | string | parsed number, string kept if unparseable |
//! | string | boolean | `"true"` / `"false"` |
//! | string | number | decimal text |
//!
//! Every other pair keeps the parsed value unchanged.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Number, Value};

// ============================================================================
// Kind
// ============================================================================

/// Primitive kind of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// JSON boolean.
    Boolean,
    /// JSON number.
    Number,
    /// JSON string.
    String,
    /// Null, array or object.
    Other,
}

impl Kind {
    /// Classifies a value.
    #[inline]
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            _ => Self::Other,
        }
    }
}

// ============================================================================
// Coercion
// ============================================================================

/// Reads a wire value: strings holding JSON are parsed, anything else is kept.
#[must_use]
pub fn parse_value(raw: &Value) -> Value {
    match raw {
        Value::String(text) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        other => other.clone(),
    }
}

/// Converts `new` to the kind of the `existing` property value.
#[must_use]
pub fn coerce(existing: Option<&Value>, new: Value) -> Value {
    let Some(existing) = existing else {
        return new;
    };

    match (Kind::of(existing), &new) {
        (Kind::Boolean, Value::String(s)) => Value::Bool(s == "true"),
        (Kind::Boolean, Value::Number(n)) => Value::Bool(n.as_f64().is_some_and(|v| v != 0.0)),
        (Kind::Number, Value::Bool(b)) => Value::from(u8::from(*b)),
        (Kind::Number, Value::String(s)) => string_to_number(s).unwrap_or(new),
        (Kind::String, Value::Bool(b)) => Value::String(b.to_string()),
        (Kind::String, Value::Number(n)) => Value::String(n.to_string()),
        _ => new,
    }
}

/// Text written to the attribute for a coerced value.
#[must_use]
pub fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric cast of a string: blank is zero, otherwise a decimal literal.
fn string_to_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(Value::from(0));
    }
    trimmed.parse::<f64>().ok().and_then(number_value)
}

/// Builds a JSON number, using an integer when the value is whole.
fn number_value(v: f64) -> Option<Value> {
    const SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if v.fract() == 0.0 && v.abs() <= SAFE_INTEGER {
        Some(Value::from(v as i64))
    } else {
        Number::from_f64(v).map(Value::Number)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    fn set(existing: Option<Value>, raw: Value) -> Value {
        coerce(existing.as_ref(), parse_value(&raw))
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(&json!("5")), json!(5));
        assert_eq!(parse_value(&json!("true")), json!(true));
        assert_eq!(parse_value(&json!("hello")), json!("hello"));
        assert_eq!(parse_value(&json!(false)), json!(false));
    }

    #[test]
    fn test_boolean_property() {
        assert_eq!(set(Some(json!(false)), json!(true)), json!(true));
        assert_eq!(set(Some(json!(false)), json!("true")), json!(true));
        assert_eq!(set(Some(json!(true)), json!("checked")), json!(false));
        assert_eq!(set(Some(json!(false)), json!("1")), json!(true));
        assert_eq!(set(Some(json!(true)), json!(0)), json!(false));
    }

    #[test]
    fn test_number_property() {
        assert_eq!(set(Some(json!(0)), json!("5")), json!(5));
        assert_eq!(set(Some(json!(0)), json!(true)), json!(1));
        assert_eq!(set(Some(json!(1)), json!("false")), json!(0));
        assert_eq!(set(Some(json!(1)), json!(" 2.5px")), json!(" 2.5px"));
        assert_eq!(coerce(Some(&json!(3)), json!("")), json!(0));
        assert_eq!(coerce(Some(&json!(3)), json!(" 7.0 ")), json!(7));
    }

    #[test]
    fn test_string_property() {
        assert_eq!(set(Some(json!("")), json!("true")), json!("true"));
        assert_eq!(set(Some(json!("")), json!("42")), json!("42"));
        assert_eq!(set(Some(json!("")), json!("1.5")), json!("1.5"));
        assert_eq!(set(Some(json!("x")), json!("y")), json!("y"));
    }

    #[test]
    fn test_undefined_property_keeps_parsed_value() {
        assert_eq!(set(None, json!("5")), json!(5));
        assert_eq!(set(None, json!("abc")), json!("abc"));
    }

    #[test]
    fn test_attribute_text() {
        assert_eq!(attribute_text(&json!(true)), "true");
        assert_eq!(attribute_text(&json!(5)), "5");
        assert_eq!(attribute_text(&json!("a b")), "a b");
        assert_eq!(attribute_text(&json!(null)), "");
    }

    fn primitive() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(Value::from),
            "[a-z0-9 .]{0,8}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn prop_boolean_and_string_properties_keep_their_kind(existing in primitive(), new in primitive()) {
            let kind = Kind::of(&existing);
            let result = coerce(Some(&existing), new);
            if kind == Kind::Boolean || kind == Kind::String {
                prop_assert_eq!(Kind::of(&result), kind);
            }
        }
    }
}
