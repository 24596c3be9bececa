//! Inbound control commands.
//!
//! Every control message is a JSON object with a `type` field. Fields shared
//! by all commands (`msgid`, `element`) are read into an [`Envelope`] before
//! the body is decoded, so stale messages are dropped without decoding.
//!
//! # Command Types
//!
//! | Group | Types |
//! |-------|-------|
//! | Lifecycle | `batch`, `keepalive`, `nil`, `extension`, `exit_request`, `close_request` |
//! | Diagnostics | `logging`, `debug`, `alert`, `eval`, `open`, `event_notify` |
//! | Transfer | `pull_binary`, `pull_json` |
//! | Query | `query`, `tag_name` |
//! | DOM | `html`, `set_attribute`, `remove_attribute`, `set_style`, `remove_style`, `create`, `remove`, `event`, `paint_image`, `canvas_draw` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{ElementRef, MessageId, PullId, QueryId};

// ============================================================================
// Envelope
// ============================================================================

/// Header fields of a control message plus its undecoded body.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Monotonic id, if the host attached one.
    pub msgid: Option<MessageId>,

    /// Value of the `type` field.
    pub message_type: String,

    /// Target element, root when absent.
    pub element: ElementRef,

    /// Full message object.
    pub body: Value,
}

impl Envelope {
    /// Reads the header fields of a control message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the message is not an object, has no
    /// string `type`, or carries a malformed `msgid` or `element`.
    pub fn parse(body: Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::protocol(format!("message is not an object: {body}")))?;

        let message_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("message has no type"))?
            .to_string();

        let msgid = match object.get("msgid") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                MessageId::deserialize(raw)
                    .map_err(|e| Error::protocol(format!("invalid msgid: {e}")))?,
            ),
        };

        let element = match object.get("element") {
            None | Some(Value::Null) => ElementRef::root(),
            Some(Value::String(id)) => ElementRef::new(id.as_str()),
            Some(other) => return Err(Error::protocol(format!("invalid element: {other}"))),
        };

        Ok(Self {
            msgid,
            message_type,
            element,
            body,
        })
    }

    /// Decodes the body into a typed command.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownMessage`] if `type` is not a known command
    /// - [`Error::Json`] if the command's fields are malformed
    pub fn command(&self) -> Result<Command> {
        match Command::deserialize(&self.body)? {
            Command::Unknown => Err(Error::unknown_message(&self.message_type)),
            command => Ok(command),
        }
    }
}

// ============================================================================
// Flag
// ============================================================================

/// Boolean that hosts send either as JSON `true` or as the string `"true"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flag(pub bool);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => Self(b),
            Value::String(s) => Self(s == "true"),
            Value::Number(n) => Self(n.as_f64().is_some_and(|v| v != 0.0)),
            _ => Self(false),
        })
    }
}

// ============================================================================
// Command
// ============================================================================

/// Typed inbound control command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Sub-messages dispatched in order.
    Batch {
        /// Contained messages.
        batches: Vec<Value>,
    },

    /// Host keepalive.
    Keepalive,

    /// No-op.
    Nil,

    /// Host extension message, ignored by the client.
    Extension,

    /// Host asks the client to exit; echoed back before closing.
    ExitRequest,

    /// Host asks the client to close the connection.
    CloseRequest,

    /// Toggle mirroring of client log records to the host.
    Logging {
        /// New logging state.
        logging: Flag,
    },

    /// Diagnostic text to print locally.
    Debug {
        /// Anything printable.
        debug: Value,
    },

    /// Show an alert in the environment.
    Alert {
        /// Alert text.
        alert: String,
    },

    /// Scripting escape hatch.
    Eval {
        /// Script source.
        eval: String,
    },

    /// Open a resource in a named or new viewing context.
    Open {
        /// Resource URL.
        url: String,
        /// Target context name, `_blank` when absent or empty.
        #[serde(default)]
        view: Option<String>,
    },

    /// Add or remove a notifier name.
    EventNotify {
        /// `true` to add, `false` to remove.
        #[serde(default)]
        add: bool,
        /// Notifier name, usually a message type.
        name: String,
    },

    /// Fetch a binary payload and handle it as a binary frame.
    PullBinary {
        /// Payload id.
        id: PullId,
    },

    /// Fetch a JSON payload and handle it as a control message.
    PullJson {
        /// Payload id.
        id: PullId,
    },

    /// Introspection request.
    Query {
        /// Query kind name.
        query: String,
        /// Correlation id.
        query_id: QueryId,
        /// Kind-specific parameters.
        #[serde(default)]
        query_params: Value,
    },

    /// Enumerate descendants by tag name.
    TagName {
        /// Tag name to match.
        query: String,
        /// Correlation id.
        query_id: QueryId,
    },

    /// Replace the target's content with markup.
    Html {
        /// New markup.
        html: String,
    },

    /// Set an attribute and its reflected property.
    SetAttribute {
        /// Attribute name.
        attribute: String,
        /// New value; strings are parsed as JSON when possible.
        #[serde(default)]
        value: Value,
    },

    /// Remove an attribute.
    RemoveAttribute {
        /// Attribute name.
        attribute: String,
    },

    /// Set one inline style property.
    SetStyle {
        /// Style property name.
        style: String,
        /// Style value.
        #[serde(default)]
        value: Value,
    },

    /// Remove one inline style property.
    RemoveStyle {
        /// Style property name.
        style: String,
    },

    /// Create a child element.
    Create {
        /// Tag name of the new element.
        html_element: String,
        /// Id to assign.
        new_id: String,
    },

    /// Remove a child element, or the target itself.
    Remove {
        /// Id of the element to remove.
        remove: String,
    },

    /// Subscribe to a UI event on the target.
    Event {
        /// Event name.
        event: String,
        /// Properties to capture from the event.
        #[serde(default)]
        properties: Vec<String>,
        /// Throttle window in milliseconds.
        #[serde(default)]
        throttle: Option<f64>,
    },

    /// Draw an image element onto the target canvas.
    PaintImage {
        /// Image element id.
        image: String,
        /// Destination point.
        #[serde(default)]
        pos: Option<[f64; 2]>,
        /// Destination rectangle.
        #[serde(default)]
        rect: Option<[f64; 4]>,
        /// Source clip rectangle.
        #[serde(default)]
        clip: Option<[f64; 4]>,
    },

    /// Apply a canvas op-list to the target canvas.
    CanvasDraw {
        /// Flat token/argument list.
        commands: Vec<Value>,
    },

    /// Any unrecognized `type`.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_envelope_reads_header() {
        let envelope = Envelope::parse(json!({
            "type": "html",
            "msgid": "12",
            "element": "title",
            "html": "<b>hi</b>"
        }))
        .expect("parse");

        assert_eq!(envelope.msgid, Some(MessageId::new(12)));
        assert_eq!(envelope.message_type, "html");
        assert_eq!(envelope.element.as_str(), "title");
        assert_eq!(
            envelope.command().expect("command"),
            Command::Html {
                html: "<b>hi</b>".into()
            }
        );
    }

    #[test]
    fn test_envelope_defaults_to_root() {
        let envelope = Envelope::parse(json!({"type": "nil"})).expect("parse");
        assert!(envelope.element.is_root());
        assert!(envelope.msgid.is_none());
    }

    #[test]
    fn test_envelope_rejects_missing_type() {
        let err = Envelope::parse(json!({"html": "x"})).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_unknown_type() {
        let envelope = Envelope::parse(json!({"type": "teleport", "x": 1})).expect("parse");
        let err = envelope.command().unwrap_err();
        assert!(matches!(err, Error::UnknownMessage { ref message_type } if message_type == "teleport"));
    }

    #[test]
    fn test_unit_command_ignores_extra_fields() {
        let envelope =
            Envelope::parse(json!({"type": "extension", "payload": [1, 2]})).expect("parse");
        assert_eq!(envelope.command().expect("command"), Command::Extension);
    }

    #[test]
    fn test_logging_flag_string_and_bool() {
        let a: Command = serde_json::from_value(json!({"type": "logging", "logging": "true"}))
            .expect("string flag");
        let b: Command = serde_json::from_value(json!({"type": "logging", "logging": false}))
            .expect("bool flag");
        assert_eq!(a, Command::Logging { logging: Flag(true) });
        assert_eq!(b, Command::Logging { logging: Flag(false) });
    }

    #[test]
    fn test_event_command_defaults() {
        let command: Command =
            serde_json::from_value(json!({"type": "event", "element": "b", "event": "click"}))
                .expect("parse");
        assert_eq!(
            command,
            Command::Event {
                event: "click".into(),
                properties: vec![],
                throttle: None,
            }
        );
    }

    #[test]
    fn test_missing_field_is_json_error() {
        let envelope = Envelope::parse(json!({"type": "create", "new_id": "x"})).expect("parse");
        assert!(matches!(envelope.command(), Err(Error::Json(_))));
    }
}
