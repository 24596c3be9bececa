//! WebSocket connection to the host.
//!
//! The connection is split in two. The read half stays with the client's
//! run loop, which pulls inbound units with [`Connection::next_incoming`].
//! The write half moves into a spawned writer task that drains the
//! [`OutboxReceiver`] in order and reports each flushed frame back, which
//! keeps the outbox's buffered-byte figure current.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Incoming;

use super::outbox::{OutboundFrame, OutboxReceiver};

// ============================================================================
// Constants
// ============================================================================

/// Time the writer gets to flush queued frames on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

// ============================================================================
// Connection
// ============================================================================

/// An open WebSocket to the host.
pub struct Connection {
    reader: WsReader,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Connects to `url` and starts the writer task on `outbox`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails.
    pub async fn connect(url: &Url, outbox: OutboxReceiver) -> Result<Self> {
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("{url}: {e}")))?;
        info!(%url, status = %response.status(), "Connected");

        let (write, reader) = stream.split();
        let writer = tokio::spawn(Self::run_writer(write, outbox));

        Ok(Self { reader, writer })
    }

    /// Waits for the next inbound unit.
    ///
    /// Returns `None` once the host closes the stream. Control frames are
    /// handled internally and never returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] on a protocol or I/O failure.
    pub async fn next_incoming(&mut self) -> Option<Result<Incoming>> {
        loop {
            let message = match self.reader.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => return Some(Ok(Incoming::Text(text.to_string()))),
                Message::Binary(bytes) => return Some(Ok(Incoming::Binary(bytes.to_vec()))),
                Message::Close(frame) => {
                    debug!(?frame, "WebSocket closed by host");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("Control frame");
                }
            }
        }
    }

    /// Stops reading and gives the writer a moment to flush.
    pub async fn shutdown(self) {
        drop(self.reader);
        let mut writer = self.writer;
        if timeout(SHUTDOWN_GRACE, &mut writer).await.is_err() {
            debug!("Writer did not finish in time, aborting");
            writer.abort();
        }
    }

    /// Writes queued frames until the outbox closes or the socket fails.
    async fn run_writer(mut write: WsWriter, mut outbox: OutboxReceiver) {
        while let Some(frame) = outbox.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    let len = text.len();
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!(error = %e, "Failed to send message");
                        break;
                    }
                    outbox.mark_flushed(len);
                }
                OutboundFrame::Close => {
                    debug!("Closing WebSocket");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Close frame not sent");
                    }
                    break;
                }
            }
        }
        outbox.shut();
        let _ = write.close().await;
        trace!("Writer finished");
    }
}
