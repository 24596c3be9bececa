//! Error types for the Gempyre client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use gempyre_client::{Client, Result};
//!
//! async fn example() -> Result<()> {
//!     let client = Client::builder().address("127.0.0.1:8080").build()?;
//!     let _document = client.run(gempyre_client::MemoryDocument::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Fetch`] |
//! | Protocol | [`Error::UnknownMessage`], [`Error::UnknownQuery`], [`Error::Protocol`], [`Error::InvalidFrame`] |
//! | Resolution | [`Error::ElementNotFound`], [`Error::ImageNotFound`], [`Error::ElementExists`], [`Error::NotAChild`] |
//! | Canvas | [`Error::NoGraphicsContext`], [`Error::UnknownCanvasOp`], [`Error::TruncatedCanvasOp`], [`Error::InvalidCanvasArgument`] |
//! | Scripting | [`Error::Script`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |
//!
//! Everything except the configuration, connection and external categories is
//! reported back to the host as an `error` message and never ends the session.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{ElementRef, PullId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed, by the host or by a close directive.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Byte-fetch request for an out-of-band payload failed.
    #[error("Fetch of payload {pull_id} failed: {message}")]
    Fetch {
        /// Payload id that was requested.
        pull_id: PullId,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Unknown control message type.
    #[error("Unknown type: {message_type}")]
    UnknownMessage {
        /// The unrecognized `type` value.
        message_type: String,
    },

    /// Unknown query kind.
    #[error("Unknown query {query}")]
    UnknownQuery {
        /// The unrecognized query name.
        query: String,
    },

    /// Malformed control message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Binary frame rejected by the decoder.
    #[error("Invalid binary frame: {message}")]
    InvalidFrame {
        /// Why the frame was rejected.
        message: String,
    },

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// Target element id does not resolve to a node.
    #[error("element not found:\"{element}\"")]
    ElementNotFound {
        /// The missing element id.
        element: ElementRef,
    },

    /// Image element referenced by a paint or draw op does not exist.
    #[error("{image} image not found")]
    ImageNotFound {
        /// The missing image id.
        image: String,
    },

    /// `create` with an id that already exists.
    #[error("Element exists {element}")]
    ElementExists {
        /// The colliding id.
        element: String,
    },

    /// `remove` of a node that is not a child of the target.
    #[error("{parent} is not a parent of {child}")]
    NotAChild {
        /// Target element id.
        parent: String,
        /// Element requested for removal.
        child: String,
    },

    // ========================================================================
    // Canvas Errors
    // ========================================================================
    /// Target element has no 2D drawing surface.
    #[error("{element} has no graphics context")]
    NoGraphicsContext {
        /// The element that was expected to be a canvas.
        element: String,
    },

    /// Canvas op-list contains a token with no entry in the arity table.
    #[error("{token} is not supported command: {position}")]
    UnknownCanvasOp {
        /// The unrecognized token.
        token: String,
        /// Position of the token in the list.
        position: usize,
    },

    /// Canvas op-list ends before the op's arguments are complete.
    #[error("{token} needs {arity} arguments, {available} left at {position}")]
    TruncatedCanvasOp {
        /// The op token.
        token: String,
        /// Arguments required by the op.
        arity: usize,
        /// Arguments remaining in the list.
        available: usize,
        /// Position of the token in the list.
        position: usize,
    },

    /// Canvas op argument has the wrong JSON type.
    #[error("{token} argument {index} is invalid: {value}")]
    InvalidCanvasArgument {
        /// The op token.
        token: String,
        /// Zero-based argument index.
        index: usize,
        /// The offending value, JSON-encoded.
        value: String,
    },

    // ========================================================================
    // Scripting Errors
    // ========================================================================
    /// Failure raised by the `eval` escape hatch.
    #[error("Script error: {message}")]
    Script {
        /// Error message from the scripting environment.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a fetch error.
    #[inline]
    pub fn fetch(pull_id: PullId, message: impl Into<String>) -> Self {
        Self::Fetch {
            pull_id,
            message: message.into(),
        }
    }

    /// Creates an unknown message type error.
    #[inline]
    pub fn unknown_message(message_type: impl Into<String>) -> Self {
        Self::UnknownMessage {
            message_type: message_type.into(),
        }
    }

    /// Creates an unknown query error.
    #[inline]
    pub fn unknown_query(query: impl Into<String>) -> Self {
        Self::UnknownQuery {
            query: query.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid frame error.
    #[inline]
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(element: impl Into<ElementRef>) -> Self {
        Self::ElementNotFound {
            element: element.into(),
        }
    }

    /// Creates an image not found error.
    #[inline]
    pub fn image_not_found(image: impl Into<String>) -> Self {
        Self::ImageNotFound {
            image: image.into(),
        }
    }

    /// Creates an element exists error.
    #[inline]
    pub fn element_exists(element: impl Into<String>) -> Self {
        Self::ElementExists {
            element: element.into(),
        }
    }

    /// Creates a not-a-child error.
    #[inline]
    pub fn not_a_child(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self::NotAChild {
            parent: parent.into(),
            child: child.into(),
        }
    }

    /// Creates a missing graphics context error.
    #[inline]
    pub fn no_graphics_context(element: impl Into<String>) -> Self {
        Self::NoGraphicsContext {
            element: element.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error ends the connection.
    ///
    /// Everything else is reported to the host and the session continues.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is an element or image resolution error.
    #[inline]
    #[must_use]
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::ImageNotFound { .. }
                | Self::ElementExists { .. }
                | Self::NotAChild { .. }
        )
    }

    /// Returns `true` if this error came from a canvas op-list or frame.
    #[inline]
    #[must_use]
    pub fn is_canvas_error(&self) -> bool {
        matches!(
            self,
            Self::NoGraphicsContext { .. }
                | Self::UnknownCanvasOp { .. }
                | Self::TruncatedCanvasOp { .. }
                | Self::InvalidCanvasArgument { .. }
                | Self::InvalidFrame { .. }
        )
    }

    /// Returns the `element` label used when reporting this error to the host.
    ///
    /// The host keys error messages by the element or token that caused them.
    #[must_use]
    pub fn source_label(&self) -> String {
        match self {
            Self::ElementNotFound { element } => element.to_string(),
            Self::ImageNotFound { image } => image.clone(),
            Self::NoGraphicsContext { element } => element.clone(),
            Self::UnknownCanvasOp { token, .. }
            | Self::TruncatedCanvasOp { token, .. }
            | Self::InvalidCanvasArgument { token, .. } => token.clone(),
            Self::UnknownMessage { message_type } => message_type.clone(),
            Self::UnknownQuery { .. } => "query".to_string(),
            Self::ElementExists { .. } => "createElement".to_string(),
            Self::NotAChild { .. } => "removeElement".to_string(),
            Self::InvalidFrame { .. } => "Binary".to_string(),
            Self::Fetch { pull_id, .. } => format!("pull {pull_id}"),
            Self::Script { .. } => "eval".to_string(),
            Self::Json(_) => "SyntaxError".to_string(),
            _ => "Unknown".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_element_not_found_display() {
        let err = Error::element_not_found("canvas");
        assert_eq!(err.to_string(), "element not found:\"canvas\"");
        assert_eq!(err.source_label(), "canvas");
    }

    #[test]
    fn test_is_terminal() {
        assert!(Error::ConnectionClosed.is_terminal());
        assert!(Error::connection("reset").is_terminal());
        assert!(!Error::element_not_found("x").is_terminal());
        assert!(!Error::script("boom").is_terminal());
    }

    #[test]
    fn test_is_resolution_error() {
        assert!(Error::image_not_found("img").is_resolution_error());
        assert!(Error::not_a_child("a", "b").is_resolution_error());
        assert!(!Error::protocol("bad").is_resolution_error());
    }

    #[test]
    fn test_canvas_source_label_is_token() {
        let err = Error::UnknownCanvasOp {
            token: "wobble".into(),
            position: 3,
        };
        assert!(err.is_canvas_error());
        assert_eq!(err.source_label(), "wobble");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(err.source_label(), "SyntaxError");
    }
}
