//! Protocol client.
//!
//! A [`Session`] holds the state of one connection and interprets everything
//! the host sends. Its behavior is split across modules the same way the
//! protocol splits it:
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | Connection state, message dispatcher |
//! | `executor` | DOM commands, canvas op-lists, binary blits |
//! | `query` | Query responder |
//! | `events` | Event bridge, throttling, load polling |
//! | `coerce` | Attribute value coercion table |
//! | `options` | Connection tunables |
//! | `builder` | Client builder |
//! | `core` | Client and async run loop |
//!
//! # Example
//!
//! ```ignore
//! let (outbox, mut rx) = Outbox::channel();
//! let mut session = Session::new(outbox);
//! let mut doc = MemoryDocument::new();
//!
//! session.open();
//! session.dispatch(&mut doc, Incoming::Text(r#"{"type":"create","html_element":"div","new_id":"a"}"#.into()));
//! ```

// ============================================================================
// Submodules
// ============================================================================

pub mod builder;
pub mod coerce;
mod core;
pub mod events;
mod executor;
pub mod options;
mod query;
mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::{Client, EventInjector};
pub use events::{DomEvent, EventBridge, ListenScope};
pub use options::ClientOptions;
pub use session::{CloseReason, PullKind, PullRequest, Session};
