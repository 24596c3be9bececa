//! Transport layer.
//!
//! The client talks to the host over two channels: one WebSocket carrying
//! JSON control messages and binary canvas frames in both directions, and
//! plain HTTP GETs for payloads too large to push inline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)   │         WebSocket            │  Host process   │
//! │                  │◄────────────────────────────►│                 │
//! │  Session         │   ws://addr/gempyre          │  /gempyre       │
//! │  → Outbox        │                              │                 │
//! │  → Connection    │         HTTP GET             │                 │
//! │  → Fetcher       │─────────────────────────────►│  /data/<id>     │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Outbox::channel` - Create the outbound queue
//! 2. `Connection::connect` - Handshake, spawn the writer on the queue
//! 3. `Connection::next_incoming` - Feed inbound units to the session
//! 4. `Outbox::close` - Queue a close frame behind pending messages
//! 5. `Connection::shutdown` - Let the writer flush and stop
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and writer task |
//! | `fetch` | HTTP byte-fetch channel |
//! | `outbox` | Outbound queue with buffered-byte accounting |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and writer task.
pub mod connection;

/// HTTP byte-fetch channel.
pub mod fetch;

/// Outbound message queue.
pub mod outbox;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Connection;
pub use fetch::Fetcher;
pub use outbox::{OutboundFrame, Outbox, OutboxReceiver};
