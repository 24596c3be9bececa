//! Outbound messages from client to host.
//!
//! # Format
//!
//! ```json
//! {"type": "event", "element": "button", "event": "click", "properties": {"clientX": 4}}
//! {"type": "query", "query_id": 3, "query_value": "exists", "exists": true}
//! {"type": "error", "element": "canvas", "error": "canvas has no graphics context"}
//! {"type": "log", "level": "warn", "msg": "..."}
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identifiers::QueryId;

// ============================================================================
// Outbound
// ============================================================================

/// A message sent from the client to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// First message after the transport opens.
    UiReady,

    /// Periodic liveness signal.
    Keepalive,

    /// Echo of the host's exit request.
    ExitRequest,

    /// UI event or acknowledgement notification.
    Event {
        /// Source element id.
        element: String,
        /// Event name.
        event: String,
        /// Captured properties.
        properties: Map<String, Value>,
    },

    /// Mirrored log record.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text.
        msg: String,
    },

    /// Error report.
    Error {
        /// Element id or token the error is about.
        element: String,
        /// Error description.
        error: String,
        /// Optional trace.
        #[serde(skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },

    /// Answer to a query.
    Query(QueryResponse),
}

impl Outbound {
    /// Creates an event message.
    #[inline]
    #[must_use]
    pub fn event(
        element: impl Into<String>,
        event: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        Self::Event {
            element: element.into(),
            event: event.into(),
            properties,
        }
    }

    /// Creates an `event_notify` acknowledgement for a notifier name.
    #[must_use]
    pub fn notify(element: impl Into<String>, name: impl Into<String>, msgid: Value) -> Self {
        let mut properties = Map::new();
        properties.insert("name".into(), Value::String(name.into()));
        properties.insert("msgid".into(), msgid);
        Self::event(element, "event_notify", properties)
    }

    /// Creates an error report.
    #[inline]
    #[must_use]
    pub fn error(element: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            element: element.into(),
            error: error.into(),
            trace: None,
        }
    }

    /// Creates a log record.
    #[inline]
    #[must_use]
    pub fn log(level: LogLevel, msg: impl Into<String>) -> Self {
        Self::Log {
            level,
            msg: msg.into(),
        }
    }

    /// Encodes the message as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// LogLevel
// ============================================================================

/// Severity of a mirrored log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Plain log output.
    Log,
    /// Informational.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

// ============================================================================
// QueryResponse
// ============================================================================

/// Answer to one query.
///
/// Serializes as `{"query_id": .., "query_value": kind, kind: value}`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    /// Echoed correlation id.
    pub query_id: QueryId,
    /// Kind tag, also the key of the value.
    pub kind: String,
    /// Answer payload.
    pub value: Value,
}

impl QueryResponse {
    /// Creates a query answer.
    #[inline]
    #[must_use]
    pub fn new(query_id: QueryId, kind: impl Into<String>, value: Value) -> Self {
        Self {
            query_id,
            kind: kind.into(),
            value,
        }
    }

    /// Creates the reply sent when a query cannot be answered.
    #[inline]
    #[must_use]
    pub fn failed(query_id: QueryId) -> Self {
        Self::new(query_id, "query_error", Value::String("query_error".into()))
    }
}

impl Serialize for QueryResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("query_id", &self.query_id)?;
        map.serialize_entry("query_value", &self.kind)?;
        map.serialize_entry(&self.kind, &self.value)?;
        map.end()
    }
}

// ============================================================================
// Tests
// ============================================================================
