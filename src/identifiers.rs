//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing element ids, message ids and
//! correlation ids at compile time.
//!
//! | Type | Wire form | Meaning |
//! |------|-----------|---------|
//! | [`ElementRef`] | string | Element id, empty = document root |
//! | [`MessageId`] | number or numeric string | Monotonic command id |
//! | [`QueryId`] | any JSON | Query correlation id, echoed verbatim |
//! | [`PullId`] | number or string | Out-of-band payload id |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ElementRef
// ============================================================================

/// String id naming a node in the external document.
///
/// The empty string addresses the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(String);

impl ElementRef {
    /// Creates a reference from an element id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Reference to the document root.
    #[inline]
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Returns `true` if this addresses the document root.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for ElementRef {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

// ============================================================================
// MessageId
// ============================================================================

/// Monotonic control message id used for stale/duplicate suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    /// Sentinel below any id a host can send.
    pub const SENTINEL: Self = Self(-1);

    /// Creates a message id.
    #[inline]
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Hosts send msgid either as a JSON number or as a decimal string.
impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MessageIdVisitor;

        impl Visitor<'_> for MessageIdVisitor {
            type Value = MessageId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a decimal string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MessageId, E> {
                Ok(MessageId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MessageId, E> {
                i64::try_from(v)
                    .map(MessageId)
                    .map_err(|_| E::custom(format!("msgid {v} out of range")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MessageId, E> {
                if v.is_finite() {
                    Ok(MessageId(v.trunc() as i64))
                } else {
                    Err(E::custom("msgid is not finite"))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MessageId, E> {
                v.trim()
                    .parse::<i64>()
                    .map(MessageId)
                    .map_err(|_| E::custom(format!("msgid {v:?} is not an integer")))
            }
        }

        deserializer.deserialize_any(MessageIdVisitor)
    }
}

// ============================================================================
// QueryId
// ============================================================================

/// Query correlation id.
///
/// Opaque to the client; echoed back exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(Value);

impl QueryId {
    /// Wraps a raw JSON correlation id.
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// Returns the raw JSON value.
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

// ============================================================================
// PullId
// ============================================================================

/// Id of an out-of-band payload served by the byte-fetch channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PullId(String);

impl PullId {
    /// Creates a pull id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PullId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(de::Error::custom(format!("invalid pull id {other}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_element_ref_root() {
        assert!(ElementRef::root().is_root());
        assert!(ElementRef::new("").is_root());
        assert!(!ElementRef::new("canvas").is_root());
    }

    #[test]
    fn test_message_id_from_number_and_string() {
        let a: MessageId = serde_json::from_value(json!(42)).expect("number");
        let b: MessageId = serde_json::from_value(json!("42")).expect("string");
        assert_eq!(a, b);
        assert_eq!(a.as_i64(), 42);
    }

    #[test]
    fn test_message_id_rejects_garbage() {
        assert!(serde_json::from_value::<MessageId>(json!("abc")).is_err());
        assert!(serde_json::from_value::<MessageId>(json!(null)).is_err());
    }

    #[test]
    fn test_sentinel_below_valid_ids() {
        assert!(MessageId::SENTINEL < MessageId::new(0));
    }

    #[test]
    fn test_query_id_echo() {
        let id: QueryId = serde_json::from_value(json!("q-17")).expect("parse");
        assert_eq!(serde_json::to_value(&id).expect("serialize"), json!("q-17"));
        assert_eq!(id.to_string(), "q-17");
    }

    #[test]
    fn test_pull_id_accepts_number() {
        let id: PullId = serde_json::from_value(json!(7)).expect("parse");
        assert_eq!(id.as_str(), "7");
    }
}
