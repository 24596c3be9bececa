//! Gempyre client - command interpreter for the Gempyre host protocol.
//!
//! A native Gempyre host drives its user interface by sending commands to a
//! client over a WebSocket. This library is that client: it applies the
//! commands to a document, answers the host's queries, and reports UI events
//! back.
//!
//! # Architecture
//!
//! The client follows a host-driven model:
//!
//! - **Host (native process)**: Sends DOM commands, queries, canvas frames
//! - **Client (Rust)**: Applies them to a [`Document`], sends events back
//!
//! Key design principles:
//!
//! - Each [`Session`] owns: dedup counter + notifier set + event subscriptions
//! - Messages with a stale `msgid` are dropped without effect
//! - One bad message is reported to the host and never stops the loop
//! - The document is only touched from one task
//!
//! # Quick Start
//!
//! ```no_run
//! use gempyre_client::{Client, MemoryDocument, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .address("127.0.0.1:30000")
//!         .build()?;
//!
//!     // Serve the host until it closes the session
//!     let document = client.run(MemoryDocument::new()).await?;
//!     println!("{document:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Session, dispatcher, executor, queries, events, run loop |
//! | [`dom`] | [`Document`] and [`Canvas2d`] traits, in-memory document |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | WebSocket and HTTP transport |

// ============================================================================
// Modules
// ============================================================================

/// Session, dispatcher and run loop.
///
/// - [`Session`] - Per-connection state, feeds the document
/// - [`Client`] - Connects and runs a session to completion
pub mod client;

/// Document environment.
///
/// Implement [`Document`] to drive a real element tree.
pub mod dom;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// WebSocket and HTTP transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    Client, ClientBuilder, ClientOptions, CloseReason, DomEvent, EventBridge, EventInjector,
    ListenScope, PullKind, PullRequest, Session,
};

// Document types
pub use dom::{Canvas2d, Document, ImageData, MemoryCanvas, MemoryDocument, NodeId, Rect};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ElementRef, MessageId, PullId, QueryId};

// Protocol types
pub use protocol::{Incoming, Outbound};

// Transport types
pub use transport::{OutboundFrame, Outbox, OutboxReceiver};
