//! Outbound message queue.
//!
//! The session never writes to the socket directly. It pushes encoded
//! messages into an [`Outbox`]; the connection's writer task drains the
//! matching [`OutboxReceiver`] and reports each flushed frame back so the
//! outbox can track how many bytes are still buffered. The event bridge
//! reads that figure to drop high-frequency pointer events while the
//! socket is backed up.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::Outbound;

// ============================================================================
// OutboundFrame
// ============================================================================

/// Unit handed to the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Encoded JSON message.
    Text(String),
    /// Close the socket after everything queued before it.
    Close,
}

// ============================================================================
// Shared State
// ============================================================================

#[derive(Debug)]
struct Shared {
    buffered: AtomicUsize,
    open: AtomicBool,
}

// ============================================================================
// Outbox
// ============================================================================

/// Sending half of the outbound queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    shared: Arc<Shared>,
}

impl Outbox {
    /// Creates a connected outbox/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            buffered: AtomicUsize::new(0),
            open: AtomicBool::new(true),
        });
        (
            Self {
                tx,
                shared: Arc::clone(&shared),
            },
            OutboxReceiver { rx, shared },
        )
    }

    /// Encodes and queues a message.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the outbox was closed
    /// - [`Error::Json`] if encoding fails
    pub fn send(&self, message: &Outbound) -> Result<()> {
        self.send_text(message.encode()?)
    }

    /// Queues already-encoded JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the outbox was closed.
    pub fn send_text(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        let len = text.len();
        self.shared.buffered.fetch_add(len, Ordering::AcqRel);
        if self.tx.send(OutboundFrame::Text(text)).is_err() {
            self.shared.buffered.fetch_sub(len, Ordering::AcqRel);
            self.shared.open.store(false, Ordering::Release);
            return Err(Error::ConnectionClosed);
        }
        trace!(bytes = len, "Queued outbound message");
        Ok(())
    }

    /// Queues a close after any pending messages and rejects further sends.
    pub fn close(&self) {
        if self.shared.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(OutboundFrame::Close);
        }
    }

    /// Returns `true` until the outbox is closed or the writer goes away.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Bytes queued but not yet flushed to the socket.
    #[inline]
    #[must_use]
    pub fn buffered_amount(&self) -> usize {
        self.shared.buffered.load(Ordering::Acquire)
    }
}

// ============================================================================
// OutboxReceiver
// ============================================================================

/// Receiving half of the outbound queue, owned by the writer task.
#[derive(Debug)]
pub struct OutboxReceiver {
    rx: mpsc::UnboundedReceiver<OutboundFrame>,
    shared: Arc<Shared>,
}

impl OutboxReceiver {
    /// Waits for the next frame. Call [`Self::mark_flushed`] once written.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.rx.recv().await
    }

    /// Records that `bytes` of queued text reached the socket.
    pub fn mark_flushed(&self, bytes: usize) {
        let _ = self
            .shared
            .buffered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
                Some(b.saturating_sub(bytes))
            });
    }

    /// Marks the outbox closed from the writer side, e.g. after a socket error.
    pub fn shut(&mut self) {
        self.shared.open.store(false, Ordering::Release);
        self.rx.close();
    }

    /// Takes every queued frame without waiting, marking text as flushed.
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            if let OutboundFrame::Text(ref text) = frame {
                self.mark_flushed(text.len());
            }
            frames.push(frame);
        }
        frames
    }
}

// ============================================================================
// Tests
// ============================================================================
