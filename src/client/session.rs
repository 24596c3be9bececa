//! Per-connection state and the message dispatcher.

use std::fmt;

use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::dom::Document;
use crate::error::{Error, Result};
use crate::identifiers::{ElementRef, MessageId, PullId};
use crate::protocol::{Command, Envelope, Incoming, LogLevel, Outbound};
use crate::transport::Outbox;

use super::events::EventBridge;

// ============================================================================
// Constants
// ============================================================================

/// Notifier name acknowledging binary blits flagged `as_draw`.
pub(crate) const CANVAS_DRAW_NOTIFIER: &str = "canvas_draw";

// ============================================================================
// PullRequest
// ============================================================================

/// Payload encoding of an out-of-band transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullKind {
    /// Handled as a JSON control message.
    Json,
    /// Handled as a binary frame.
    Binary,
}

/// A payload the host asked the client to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Payload id.
    pub id: PullId,
    /// How the fetched bytes are handled.
    pub kind: PullKind,
}

// ============================================================================
// CloseReason
// ============================================================================

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Host sent `exit_request`.
    ExitRequest,
    /// Host sent `close_request`.
    CloseRequest,
    /// The connection closed or failed.
    Transport,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitRequest => f.write_str("exit requested"),
            Self::CloseRequest => f.write_str("close requested"),
            Self::Transport => f.write_str("transport closed"),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// State of one client connection.
///
/// All protocol handling goes through a session: inbound units are passed to
/// [`Session::dispatch`], fired UI events to [`Session::deliver_event`], and
/// everything the session wants to tell the host is queued on its [`Outbox`].
/// A session never blocks; payloads it needs fetched are collected with
/// [`Session::take_pulls`].
pub struct Session {
    pub(crate) outbox: Outbox,
    last_message_id: MessageId,
    logging: bool,
    notifiers: FxHashSet<String>,
    pub(crate) events: EventBridge,
    pulls: Vec<PullRequest>,
    closed: Option<CloseReason>,
    pub(crate) generated_ids: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("last_message_id", &self.last_message_id)
            .field("logging", &self.logging)
            .field("notifiers", &self.notifiers)
            .field("subscriptions", &self.events.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session sending on `outbox`.
    #[must_use]
    pub fn new(outbox: Outbox) -> Self {
        Self {
            outbox,
            last_message_id: MessageId::SENTINEL,
            logging: false,
            notifiers: FxHashSet::default(),
            events: EventBridge::new(),
            pulls: Vec::new(),
            closed: None,
            generated_ids: 0,
        }
    }

    /// Sets the initial log-mirroring state.
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Announces the client to the host with `ui_ready`.
    pub fn open(&self) {
        info!("Connection open");
        self.emit(&Outbound::UiReady);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Highest applied message id.
    #[inline]
    #[must_use]
    pub fn last_message_id(&self) -> MessageId {
        self.last_message_id
    }

    /// Returns `true` if log records are mirrored to the host.
    #[inline]
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.logging
    }

    /// Returns `true` if `name` is in the notifier set.
    #[inline]
    #[must_use]
    pub fn has_notifier(&self, name: &str) -> bool {
        self.notifiers.contains(name)
    }

    /// The event bridge.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventBridge {
        &self.events
    }

    /// The outbound queue.
    #[inline]
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Returns `true` once the session has ended.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Why the session ended, if it has.
    #[inline]
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.closed
    }

    /// Takes the payloads requested since the last call.
    pub fn take_pulls(&mut self) -> Vec<PullRequest> {
        std::mem::take(&mut self.pulls)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Handles one inbound unit.
    ///
    /// Failures are reported to the host as error messages; this never
    /// fails. Units arriving after the session closed are ignored.
    pub fn dispatch<D: Document>(&mut self, doc: &mut D, incoming: Incoming) {
        if self.is_closed() {
            trace!("Session closed, dropping inbound message");
            return;
        }

        let result = match incoming {
            Incoming::Binary(bytes) => self.blit(doc, &bytes),
            Incoming::Text(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => self.dispatch_value(doc, value),
                Err(e) => Err(Error::from(e)),
            },
            Incoming::Json(value) => self.dispatch_value(doc, value),
        };

        if let Err(e) = result {
            self.report(&e);
        }
    }

    /// Applies one control message, honoring `msgid` suppression.
    fn dispatch_value<D: Document>(&mut self, doc: &mut D, value: Value) -> Result<()> {
        let envelope = Envelope::parse(value)?;

        if let Some(msgid) = envelope.msgid {
            if msgid <= self.last_message_id {
                trace!(%msgid, last = %self.last_message_id, "Dropping stale message");
                return Ok(());
            }
            self.last_message_id = msgid;
        }

        let result = self.apply(doc, &envelope);

        if self.notifiers.contains(&envelope.message_type) {
            let msgid = envelope
                .msgid
                .map_or_else(|| Value::from(0), |id| Value::from(id.as_i64()));
            self.emit(&Outbound::notify(
                envelope.element.to_string(),
                envelope.message_type.as_str(),
                msgid,
            ));
        }

        result
    }

    /// Routes a decoded message to its handler.
    fn apply<D: Document>(&mut self, doc: &mut D, envelope: &Envelope) -> Result<()> {
        let command = match envelope.command() {
            Ok(command) => command,
            Err(e) => {
                if self.answer_malformed(envelope, &e) {
                    return Ok(());
                }
                return Err(e);
            }
        };
        trace!(r#type = %envelope.message_type, element = %envelope.element, "Applying");

        match command {
            Command::Batch { batches } => {
                for item in batches {
                    if self.is_closed() {
                        break;
                    }
                    if let Err(e) = self.dispatch_value(doc, item) {
                        self.report(&e);
                    }
                }
            }

            Command::Keepalive | Command::Nil | Command::Extension => {}

            Command::ExitRequest => {
                self.emit(&Outbound::ExitRequest);
                self.log(LogLevel::Log, "Bye bye");
                self.close(CloseReason::ExitRequest);
            }

            Command::CloseRequest => {
                self.log(LogLevel::Log, "Good bye");
                self.close(CloseReason::CloseRequest);
            }

            Command::Logging { logging } => {
                self.logging = logging.0;
                info!(enabled = self.logging, "Log mirroring toggled");
            }

            Command::Debug { debug } => {
                let text = match debug {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                self.log(LogLevel::Log, &text);
            }

            Command::Alert { alert } => doc.alert(&alert),

            Command::Eval { eval } => {
                if let Err(e) = doc.eval(&eval) {
                    warn!(error = %e, "Script failed");
                    self.emit(&Outbound::error(eval, e.to_string()));
                }
            }

            Command::Open { url, view } => {
                let target = view.filter(|v| !v.is_empty());
                doc.open(&url, target.as_deref().unwrap_or("_blank"))?;
            }

            Command::EventNotify { add, name } => {
                debug!(%name, add, "Event notifier");
                if add {
                    self.notifiers.insert(name);
                } else {
                    self.notifiers.remove(&name);
                }
            }

            Command::PullBinary { id } => self.pulls.push(PullRequest {
                id,
                kind: PullKind::Binary,
            }),

            Command::PullJson { id } => self.pulls.push(PullRequest {
                id,
                kind: PullKind::Json,
            }),

            Command::Query {
                query,
                query_id,
                query_params,
            } => self.answer(doc, &envelope.element, &query, query_id, &query_params),

            Command::TagName { query, query_id } => {
                self.answer_tag_name(doc, &envelope.element, &query, query_id);
            }

            Command::Unknown => return Err(Error::unknown_message(&envelope.message_type)),

            command => {
                let node = self.resolve(doc, &envelope.element)?;
                self.execute(doc, node, &envelope.element, command)?;
            }
        }

        Ok(())
    }

    /// Resolves an element reference, the empty id naming the root.
    pub(crate) fn resolve<D: Document>(&self, doc: &D, element: &ElementRef) -> Result<D::Node> {
        if element.is_root() {
            return Ok(doc.root());
        }
        doc.element_by_id(element.as_str())
            .ok_or_else(|| Error::element_not_found(element.clone()))
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Queues a message, logging if the outbox is gone.
    pub(crate) fn emit(&self, message: &Outbound) {
        if let Err(e) = self.outbox.send(message) {
            debug!(error = %e, "Outbound message dropped");
        }
    }

    /// Reports an error to the host.
    pub fn report(&self, err: &Error) {
        let source = err.source_label();
        warn!(%source, error = %err, "Reporting error");
        self.emit(&Outbound::error(source, err.to_string()));
    }

    /// Writes a log record, mirroring it to the host when logging is on.
    pub fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Log | LogLevel::Info => info!(target: "gempyre_client::console", "{msg}"),
            LogLevel::Warn => warn!(target: "gempyre_client::console", "{msg}"),
            LogLevel::Error => error!(target: "gempyre_client::console", "{msg}"),
        }
        if self.logging {
            self.emit(&Outbound::log(level, msg));
        }
    }

    /// Sends a keepalive while the connection is open.
    pub fn keepalive(&self) {
        if self.outbox.is_open() {
            trace!("Keepalive");
            self.emit(&Outbound::Keepalive);
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Ends the session: drops subscriptions and pending pulls, closes the outbox.
    pub fn close(&mut self, reason: CloseReason) {
        if self.closed.is_some() {
            return;
        }
        info!(%reason, "Closing session");
        self.closed = Some(reason);
        self.events.clear();
        self.pulls.clear();
        self.outbox.close();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::dom::MemoryDocument;
    use crate::transport::{OutboundFrame, OutboxReceiver};

    fn setup() -> (Session, OutboxReceiver, MemoryDocument) {
        let (outbox, rx) = Outbox::channel();
        (Session::new(outbox), rx, MemoryDocument::new())
    }

    fn sent(rx: &mut OutboxReceiver) -> Vec<Value> {
        rx.drain()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => serde_json::from_str(&text).ok(),
                OutboundFrame::Close => None,
            })
            .collect()
    }

    fn send(session: &mut Session, doc: &mut MemoryDocument, message: Value) {
        session.dispatch(doc, Incoming::Text(message.to_string()));
    }

    #[test]
    fn test_open_sends_ui_ready() {
        let (session, mut rx, _) = setup();
        session.open();
        assert_eq!(sent(&mut rx), vec![json!({"type": "ui_ready"})]);
    }

    #[test]
    fn test_stale_msgid_is_dropped() {
        let (mut session, mut rx, mut doc) = setup();
        let div = doc.insert(doc.root(), "div", "d");

        send(&mut session, &mut doc, json!({"type": "html", "element": "d", "html": "one", "msgid": 2}));
        send(&mut session, &mut doc, json!({"type": "html", "element": "d", "html": "two", "msgid": 2}));
        send(&mut session, &mut doc, json!({"type": "html", "element": "d", "html": "three", "msgid": "1"}));

        assert_eq!(doc.inner_html(div), "one");
        assert_eq!(session.last_message_id(), MessageId::new(2));
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_message_without_msgid_always_applies() {
        let (mut session, _rx, mut doc) = setup();
        let div = doc.insert(doc.root(), "div", "d");

        send(&mut session, &mut doc, json!({"type": "html", "element": "d", "html": "a", "msgid": 5}));
        send(&mut session, &mut doc, json!({"type": "html", "element": "d", "html": "b"}));

        assert_eq!(doc.inner_html(div), "b");
        assert_eq!(session.last_message_id(), MessageId::new(5));
    }

    #[test]
    fn test_batch_preserves_order() {
        let (mut session, mut rx, mut doc) = setup();
        send(
            &mut session,
            &mut doc,
            json!({"type": "batch", "batches": [
                {"type": "create", "element": "", "html_element": "div", "new_id": "a"},
                {"type": "create", "element": "a", "html_element": "span", "new_id": "b"},
                {"type": "html", "element": "b", "html": "hi"}
            ]}),
        );

        let b = doc.element_by_id("b").expect("b created");
        assert_eq!(doc.inner_html(b), "hi");
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_batch_continues_after_failed_item() {
        let (mut session, mut rx, mut doc) = setup();
        send(
            &mut session,
            &mut doc,
            json!({"type": "batch", "batches": [
                {"type": "html", "element": "missing", "html": "x"},
                {"type": "create", "element": "", "html_element": "div", "new_id": "ok"}
            ]}),
        );

        assert!(doc.element_by_id("ok").is_some());
        let messages = sent(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "error");
        assert_eq!(messages[0]["element"], "missing");
    }

    #[test]
    fn test_missing_element_reports_error() {
        let (mut session, mut rx, mut doc) = setup();
        send(&mut session, &mut doc, json!({"type": "set_style", "element": "nope", "style": "color", "value": "red"}));
        assert_eq!(
            sent(&mut rx),
            vec![json!({"type": "error", "element": "nope", "error": "element not found:\"nope\""})]
        );
    }

    #[test]
    fn test_malformed_messages_are_reported_and_swallowed() {
        let (mut session, mut rx, mut doc) = setup();
        session.dispatch(&mut doc, Incoming::Text("{not json".into()));
        send(&mut session, &mut doc, json!({"type": "frobnicate"}));
        send(&mut session, &mut doc, json!({"no_type": true}));
        send(&mut session, &mut doc, json!({"type": "create", "element": "", "html_element": "p", "new_id": "p"}));

        let messages = sent(&mut rx);
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m["type"] == "error"));
        assert_eq!(messages[1]["element"], "frobnicate");
        assert!(doc.element_by_id("p").is_some());
    }

    #[test]
    fn test_event_notify_acknowledges_type() {
        let (mut session, mut rx, mut doc) = setup();
        doc.insert(doc.root(), "div", "d");
        send(&mut session, &mut doc, json!({"type": "event_notify", "add": true, "name": "html"}));
        assert!(session.has_notifier("html"));

        send(&mut session, &mut doc, json!({"type": "html", "element": "d", "html": "x", "msgid": 7}));
        assert_eq!(
            sent(&mut rx),
            vec![json!({"type": "event", "element": "d", "event": "event_notify",
                        "properties": {"name": "html", "msgid": 7}})]
        );

        send(&mut session, &mut doc, json!({"type": "event_notify", "add": false, "name": "html"}));
        send(&mut session, &mut doc, json!({"type": "html", "element": "d", "html": "y"}));
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_logging_mirrors_debug() {
        let (mut session, mut rx, mut doc) = setup();
        send(&mut session, &mut doc, json!({"type": "debug", "debug": "quiet"}));
        assert!(sent(&mut rx).is_empty());

        send(&mut session, &mut doc, json!({"type": "logging", "logging": "true"}));
        send(&mut session, &mut doc, json!({"type": "debug", "debug": "loud"}));
        assert_eq!(
            sent(&mut rx),
            vec![json!({"type": "log", "level": "log", "msg": "loud"})]
        );
    }

    #[test]
    fn test_eval_failure_is_reported() {
        let (mut session, mut rx, mut doc) = setup();
        send(&mut session, &mut doc, json!({"type": "eval", "eval": "throw boom"}));
        send(&mut session, &mut doc, json!({"type": "eval", "eval": "fine()"}));

        let messages = sent(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["element"], "throw boom");
        assert_eq!(doc.scripts().len(), 2);
    }

    #[test]
    fn test_open_defaults_to_blank() {
        let (mut session, _rx, mut doc) = setup();
        send(&mut session, &mut doc, json!({"type": "open", "url": "http://a", "view": ""}));
        send(&mut session, &mut doc, json!({"type": "open", "url": "http://b", "view": "side"}));
        assert_eq!(
            doc.opened(),
            &[
                ("http://a".to_string(), "_blank".to_string()),
                ("http://b".to_string(), "side".to_string())
            ]
        );
    }

    #[test]
    fn test_pulls_are_collected() {
        let (mut session, _rx, mut doc) = setup();
        send(&mut session, &mut doc, json!({"type": "pull_json", "id": 3}));
        send(&mut session, &mut doc, json!({"type": "pull_binary", "id": "4"}));

        let pulls = session.take_pulls();
        assert_eq!(
            pulls,
            vec![
                PullRequest { id: PullId::new("3"), kind: PullKind::Json },
                PullRequest { id: PullId::new("4"), kind: PullKind::Binary },
            ]
        );
        assert!(session.take_pulls().is_empty());
    }

    #[test]
    fn test_exit_request_echoes_and_closes() {
        let (mut session, mut rx, mut doc) = setup();
        send(&mut session, &mut doc, json!({"type": "exit_request"}));
        send(&mut session, &mut doc, json!({"type": "create", "element": "", "html_element": "p", "new_id": "late"}));

        assert_eq!(session.close_reason(), Some(CloseReason::ExitRequest));
        assert!(doc.element_by_id("late").is_none());
        let frames = rx.drain();
        assert_eq!(
            frames,
            vec![
                OutboundFrame::Text(r#"{"type":"exit_request"}"#.into()),
                OutboundFrame::Close
            ]
        );
    }

    #[test]
    fn test_close_request_closes_silently() {
        let (mut session, mut rx, mut doc) = setup();
        send(&mut session, &mut doc, json!({"type": "close_request"}));
        assert_eq!(session.close_reason(), Some(CloseReason::CloseRequest));
        assert_eq!(rx.drain(), vec![OutboundFrame::Close]);
    }

    #[test]
    fn test_keepalive_stops_after_close() {
        let (mut session, mut rx, _) = setup();
        session.keepalive();
        session.close(CloseReason::Transport);
        session.keepalive();
        assert_eq!(sent(&mut rx), vec![json!({"type": "keepalive"})]);
    }

    proptest! {
        #[test]
        fn prop_each_increasing_msgid_applies_once(ids in proptest::collection::vec(0i64..50, 1..40)) {
            let (mut session, _rx, mut doc) = setup();
            let mut applied = Vec::new();
            let mut highest = -1;

            for id in &ids {
                let new_id = format!("n{id}");
                let exists = doc.element_by_id(&new_id).is_some();
                send(&mut session, &mut doc, json!({
                    "type": "create", "element": "", "html_element": "i",
                    "new_id": new_id, "msgid": id
                }));
                if *id > highest {
                    highest = *id;
                    prop_assert!(!exists);
                    applied.push(*id);
                }
            }

            prop_assert_eq!(doc.children(doc.root()).len(), applied.len());
            prop_assert_eq!(session.last_message_id(), MessageId::new(highest));
        }
    }
}
