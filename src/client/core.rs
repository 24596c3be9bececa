//! Client coordinator and run loop.
//!
//! A [`Client`] owns one connection to the host for its whole life.
//! [`Client::run`] drives a [`Document`] until the host closes the session
//! or the connection drops, and hands the document back.
//!
//! # Example
//!
//! ```no_run
//! use gempyre_client::{Client, DomEvent, MemoryDocument};
//!
//! # async fn example() -> gempyre_client::Result<()> {
//! let client = Client::builder().address("127.0.0.1:30000").build()?;
//!
//! let events = client.event_injector();
//! tokio::spawn(async move {
//!     let _ = events.inject(DomEvent::element("button", "click"));
//! });
//!
//! let document = client.run(MemoryDocument::new()).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use crate::dom::Document;
use crate::error::{Error, Result};
use crate::protocol::Incoming;
use crate::transport::{Connection, Fetcher, Outbox};

use super::builder::ClientBuilder;
use super::events::DomEvent;
use super::options::ClientOptions;
use super::session::{CloseReason, PullRequest, Session};

// ============================================================================
// EventInjector
// ============================================================================

/// Handle the environment uses to report fired UI events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventInjector {
    tx: mpsc::UnboundedSender<DomEvent>,
}

impl EventInjector {
    /// Hands a fired event to the running client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the client has stopped.
    pub fn inject(&self, event: DomEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::ConnectionClosed)
    }

    /// Returns `true` once the client has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for one host session.
pub struct Client {
    options: ClientOptions,
    ws_url: Url,
    data_url: Url,
    events_tx: mpsc::UnboundedSender<DomEvent>,
    events_rx: mpsc::UnboundedReceiver<DomEvent>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("ws_url", &self.ws_url.as_str())
            .field("data_url", &self.data_url.as_str())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(options: ClientOptions, ws_url: Url, data_url: Url) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            options,
            ws_url,
            data_url,
            events_tx,
            events_rx,
        }
    }

    /// WebSocket endpoint.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    /// Payload endpoint prefix.
    #[inline]
    #[must_use]
    pub fn data_url(&self) -> &Url {
        &self.data_url
    }

    /// Connection tunables.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns a handle for reporting fired UI events.
    #[inline]
    #[must_use]
    pub fn event_injector(&self) -> EventInjector {
        EventInjector {
            tx: self.events_tx.clone(),
        }
    }

    /// Connects and serves the host until the session ends.
    ///
    /// Inbound frames, keepalive and load-poll ticks, fetched payloads and
    /// injected events are all handled on this one task, so the document is
    /// never touched concurrently. When the session ends every subscription,
    /// timer and pending fetch is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the connection cannot be established
    /// - [`Error::Http`] if the fetch client cannot be built
    pub async fn run<D: Document>(self, mut document: D) -> Result<D> {
        let Self {
            options,
            ws_url,
            data_url,
            events_tx,
            mut events_rx,
        } = self;
        drop(events_tx);

        let fetcher = Fetcher::new(data_url, options.fetch_timeout)?;
        let (outbox, outbox_rx) = Outbox::channel();
        let mut connection = Connection::connect(&ws_url, outbox_rx).await?;

        let mut session = Session::new(outbox).with_logging(options.logging);
        session.open();

        let mut keepalive = time::interval_at(
            time::Instant::now() + options.keepalive_interval,
            options.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut load_poll = time::interval(options.load_poll_interval);
        load_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut pulls: JoinSet<(PullRequest, Result<Incoming>)> = JoinSet::new();

        while !session.is_closed() {
            tokio::select! {
                incoming = connection.next_incoming() => match incoming {
                    Some(Ok(incoming)) => session.dispatch(&mut document, incoming),
                    Some(Err(e)) => {
                        warn!(error = %e, "Connection failed");
                        session.close(CloseReason::Transport);
                    }
                    None => {
                        info!("Host closed the connection");
                        session.close(CloseReason::Transport);
                    }
                },

                _ = keepalive.tick() => session.keepalive(),

                _ = load_poll.tick() => session.poll_loads(&document),

                Some(joined) = pulls.join_next() => match joined {
                    Ok((_, Ok(incoming))) => session.dispatch(&mut document, incoming),
                    Ok((request, Err(e))) => {
                        debug!(id = %request.id, "Pull failed");
                        session.report(&e);
                    }
                    Err(e) => warn!(error = %e, "Pull task failed"),
                },

                Some(event) = events_rx.recv() => {
                    session.deliver_event(&document, &event, Instant::now());
                }
            }

            for request in session.take_pulls() {
                let fetcher = fetcher.clone();
                pulls.spawn(async move {
                    let result = fetcher.fetch(&request).await;
                    (request, result)
                });
            }
        }

        info!(reason = ?session.close_reason(), "Session ended");
        pulls.abort_all();
        connection.shutdown().await;
        Ok(document)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injector_reports_closed_client() {
        let client = Client::builder()
            .address("127.0.0.1:9")
            .build()
            .expect("client");
        let injector = client.event_injector();
        assert!(!injector.is_closed());
        assert!(injector.inject(DomEvent::window("resize")).is_ok());

        drop(client);
        assert!(injector.is_closed());
        assert!(matches!(
            injector.inject(DomEvent::window("resize")),
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_run_fails_without_host() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = Client::builder()
            .address(addr.to_string())
            .build()
            .expect("client");
        let result = client.run(crate::dom::MemoryDocument::new()).await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }
}
