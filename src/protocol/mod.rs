//! Wire protocol message types.
//!
//! This module defines the message format exchanged between the host
//! process and the client.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Encoding |
//! |---------|-----------|----------|
//! | [`Command`] | Host → Client | JSON text, `type`-tagged |
//! | [`CanvasFrame`] | Host → Client | Binary, magic `0xAAA` |
//! | [`Outbound`] | Client → Host | JSON text, `type`-tagged |
//!
//! Large payloads are announced by `pull_json` / `pull_binary` commands that
//! carry only an id; the client fetches them over HTTP and handles the result
//! as if it had arrived inline.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `canvas` | Canvas op-list reader and arity table |
//! | `command` | Inbound control commands |
//! | `frame` | Binary canvas frame codec |
//! | `outbound` | Outbound messages |
//! | `query` | Query kinds |

// ============================================================================
// Submodules
// ============================================================================

/// Canvas op-list reader.
pub mod canvas;

/// Inbound control commands.
pub mod command;

/// Binary canvas frame codec.
pub mod frame;

/// Outbound messages.
pub mod outbound;

/// Query kinds.
pub mod query;

// ============================================================================
// Re-exports
// ============================================================================

pub use canvas::{DrawOp, OpReader, arity};
pub use command::{Command, Envelope, Flag};
pub use frame::{CanvasFrame, FRAME_MAGIC};
pub use outbound::{LogLevel, Outbound, QueryResponse};
pub use query::QueryKind;

// ============================================================================
// Incoming
// ============================================================================

/// One inbound unit, as received from the stream or the byte-fetch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// UTF-8 JSON control message.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Already-parsed JSON, e.g. a pulled payload.
    Json(serde_json::Value),
}
