//! Event bridge: UI events back to the host.
//!
//! The host subscribes with an `event` command. The environment delivers
//! fired events through [`crate::EventInjector`]; the bridge looks up the
//! subscriptions for the event's scope and name, captures the requested
//! properties and forwards one `event` message per admitted subscription.
//!
//! # Scopes
//!
//! | Event | Subscribed on | Scope |
//! |-------|---------------|-------|
//! | `resize` | any element | [`ListenScope::Window`] |
//! | `scroll` | the root | [`ListenScope::Document`] |
//! | anything else | element `id` | [`ListenScope::Element`] |
//!
//! `load` is special: it is answered from the element's `complete`,
//! `width` and `height` properties, either at once or once the element is
//! ready (see [`EventBridge::poll_loads`]).
//!
//! # Throttling
//!
//! Leading edge: the first occurrence in a window is forwarded, later ones
//! in the same window are dropped, not queued.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::dom::Document;
use crate::identifiers::ElementRef;
use crate::protocol::Outbound;
use crate::transport::Outbox;

use super::Session;

// ============================================================================
// Constants
// ============================================================================

/// Events dropped outright while the outbox has unflushed data.
const POINTER_MOVE_EVENTS: &[&str] = &["mousemove", "pointermove", "touchmove"];

// ============================================================================
// ListenScope
// ============================================================================

/// Where a listener is attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenScope {
    /// The top-level window.
    Window,
    /// The document itself.
    Document,
    /// A single element.
    Element(ElementRef),
}

impl ListenScope {
    /// Scope a subscription for `event` on `element` is bound to.
    #[must_use]
    pub fn for_event(element: &ElementRef, event: &str) -> Self {
        match event {
            "resize" => Self::Window,
            "scroll" if element.is_root() => Self::Document,
            _ => Self::Element(element.clone()),
        }
    }
}

// ============================================================================
// DomEvent
// ============================================================================

/// A fired UI event, as reported by the environment.
///
/// Property lookup falls back from the event to its current target and then
/// to its target.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    /// Where the event fired.
    pub scope: ListenScope,
    /// Event name.
    pub name: String,
    /// Properties of the event object.
    pub properties: Map<String, Value>,
    /// Properties of `event.currentTarget`.
    pub current_target: Map<String, Value>,
    /// Properties of `event.target`.
    pub target: Map<String, Value>,
}

impl DomEvent {
    /// Creates an event with no properties.
    #[must_use]
    pub fn new(scope: ListenScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            properties: Map::new(),
            current_target: Map::new(),
            target: Map::new(),
        }
    }

    /// Event fired on the element with `id`.
    #[inline]
    #[must_use]
    pub fn element(id: impl Into<ElementRef>, name: impl Into<String>) -> Self {
        Self::new(ListenScope::Element(id.into()), name)
    }

    /// Event fired on the window.
    #[inline]
    #[must_use]
    pub fn window(name: impl Into<String>) -> Self {
        Self::new(ListenScope::Window, name)
    }

    /// Event fired on the document.
    #[inline]
    #[must_use]
    pub fn document(name: impl Into<String>) -> Self {
        Self::new(ListenScope::Document, name)
    }

    /// Adds an event-object property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Adds a current-target property.
    #[must_use]
    pub fn with_current_target(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.current_target.insert(key.into(), value.into());
        self
    }

    /// Adds a target property.
    #[must_use]
    pub fn with_target(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.target.insert(key.into(), value.into());
        self
    }

    /// Reads `key` from the event, then the current target, then the target.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.properties
            .get(key)
            .or_else(|| self.current_target.get(key))
            .or_else(|| self.target.get(key))
    }

    fn is_pointer_move(&self) -> bool {
        POINTER_MOVE_EVENTS.contains(&self.name.as_str())
    }
}

// ============================================================================
// Subscription
// ============================================================================

#[derive(Debug, Clone)]
struct Subscription {
    source: String,
    properties: Vec<String>,
    throttle: Option<Duration>,
    last_forwarded: Option<Instant>,
}

impl Subscription {
    /// Leading-edge throttle gate; records `now` when admitting.
    fn admit(&mut self, now: Instant) -> bool {
        if let (Some(window), Some(last)) = (self.throttle, self.last_forwarded)
            && now.saturating_duration_since(last) < window
        {
            return false;
        }
        self.last_forwarded = Some(now);
        true
    }

    fn capture(&self, event: &DomEvent) -> Map<String, Value> {
        self.properties
            .iter()
            .filter_map(|key| event.lookup(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }
}

// ============================================================================
// PendingLoad
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingLoad {
    element: ElementRef,
    wants_complete: bool,
}

/// `complete`, `width` and `height` of an element, as the load event reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LoadState {
    complete: bool,
    width: f64,
    height: f64,
}

impl LoadState {
    fn read<D: Document>(doc: &D, node: D::Node) -> Self {
        let number = |name: &str| {
            doc.property(node, name)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
        };
        Self {
            complete: doc
                .property(node, "complete")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            width: number("width"),
            height: number("height"),
        }
    }

    fn is_ready(self, wants_complete: bool) -> bool {
        !wants_complete || (self.complete && !(self.width == 0.0 && self.height == 0.0))
    }

    fn to_properties(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("complete".into(), Value::Bool(self.complete));
        map.insert("width".into(), Value::from(self.width));
        map.insert("height".into(), Value::from(self.height));
        map
    }
}

// ============================================================================
// EventBridge
// ============================================================================

/// Subscription table keyed by (scope, event name).
#[derive(Debug, Default)]
pub struct EventBridge {
    subscriptions: FxHashMap<(ListenScope, String), Vec<Subscription>>,
    pending_loads: Vec<PendingLoad>,
}

impl EventBridge {
    /// Creates an empty bridge.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of installed subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is subscribed and no load is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.pending_loads.is_empty()
    }

    /// Number of `load` subscriptions still waiting for their element.
    #[inline]
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.pending_loads.len()
    }

    /// Installs a listener.
    pub fn subscribe(
        &mut self,
        scope: ListenScope,
        event: &str,
        source: impl Into<String>,
        properties: Vec<String>,
        throttle: Option<Duration>,
    ) {
        let source = source.into();
        debug!(?scope, event, %source, ?throttle, "Subscribing");
        self.subscriptions
            .entry((scope, event.to_string()))
            .or_default()
            .push(Subscription {
                source,
                properties,
                throttle,
                last_forwarded: None,
            });
    }

    /// Forwards a fired event to every admitting subscription.
    ///
    /// Returns the number of event messages sent. Nothing is sent while the
    /// outbox is closed, and pointer-move events are dropped while it holds
    /// unflushed data.
    pub fn deliver(&mut self, event: &DomEvent, now: Instant, outbox: &Outbox) -> usize {
        if !outbox.is_open() {
            return 0;
        }
        if event.is_pointer_move() && outbox.buffered_amount() > 0 {
            trace!(event = %event.name, buffered = outbox.buffered_amount(), "Dropped under back-pressure");
            return 0;
        }

        let key = (event.scope.clone(), event.name.clone());
        let Some(subscriptions) = self.subscriptions.get_mut(&key) else {
            return 0;
        };

        let mut forwarded = 0;
        for subscription in subscriptions.iter_mut() {
            if !subscription.admit(now) {
                trace!(event = %event.name, source = %subscription.source, "Throttled");
                continue;
            }
            let message = Outbound::event(
                subscription.source.clone(),
                event.name.clone(),
                subscription.capture(event),
            );
            match outbox.send(&message) {
                Ok(()) => forwarded += 1,
                Err(e) => debug!(error = %e, "Event not forwarded"),
            }
        }
        forwarded
    }

    /// Installs a `load` subscription, answering at once if the element is ready.
    pub fn subscribe_load<D: Document>(
        &mut self,
        doc: &D,
        node: D::Node,
        element: ElementRef,
        properties: &[String],
        outbox: &Outbox,
    ) {
        let wants_complete = properties.iter().any(|p| p == "complete");
        let state = LoadState::read(doc, node);

        if state.complete && state.is_ready(wants_complete) {
            send_load(outbox, &element, state);
            return;
        }

        debug!(%element, wants_complete, "Element is not ready, waiting");
        self.pending_loads.push(PendingLoad {
            element,
            wants_complete,
        });
    }

    /// Handles a delivered `load` event for `element`.
    pub fn complete_loads<D: Document>(&mut self, doc: &D, element: &ElementRef, outbox: &Outbox) {
        self.pending_loads.retain(|pending| {
            if &pending.element != element {
                return true;
            }
            !try_send_load(doc, pending, outbox)
        });
    }

    /// Re-checks parked `load` subscriptions that wait for `complete`.
    pub fn poll_loads<D: Document>(&mut self, doc: &D, outbox: &Outbox) {
        self.pending_loads.retain(|pending| {
            if !pending.wants_complete {
                return true;
            }
            !try_send_load(doc, pending, outbox)
        });
    }

    /// Drops every subscription and pending load.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.pending_loads.clear();
    }
}

/// Sends the load event if the element is ready. Returns `true` when the
/// pending entry is finished, including when its element is gone.
fn try_send_load<D: Document>(doc: &D, pending: &PendingLoad, outbox: &Outbox) -> bool {
    let node = if pending.element.is_root() {
        Some(doc.root())
    } else {
        doc.element_by_id(pending.element.as_str())
    };
    let Some(node) = node else {
        debug!(element = %pending.element, "Pending load element disappeared");
        return true;
    };

    let state = LoadState::read(doc, node);
    if !state.is_ready(pending.wants_complete) {
        return false;
    }
    send_load(outbox, &pending.element, state);
    true
}

fn send_load(outbox: &Outbox, element: &ElementRef, state: LoadState) {
    debug!(%element, ?state, "Element is ready, sending load");
    let message = Outbound::event(element.to_string(), "load", state.to_properties());
    if let Err(e) = outbox.send(&message) {
        debug!(error = %e, "Load event not forwarded");
    }
}

// ============================================================================
// Session - Event Bridge
// ============================================================================

impl Session {
    /// Installs the subscription requested by an `event` command.
    pub(crate) fn subscribe<D: Document>(
        &mut self,
        doc: &D,
        node: D::Node,
        element: &ElementRef,
        event: &str,
        properties: Vec<String>,
        throttle_ms: Option<f64>,
    ) {
        if event == "load" {
            self.events
                .subscribe_load(doc, node, element.clone(), &properties, &self.outbox);
            return;
        }

        let throttle = throttle_ms
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX));
        let scope = ListenScope::for_event(element, event);
        self.events
            .subscribe(scope, event, element.to_string(), properties, throttle);
    }

    /// Forwards an event fired by the environment.
    ///
    /// Returns the number of event messages sent.
    pub fn deliver_event<D: Document>(&mut self, doc: &D, event: &DomEvent, now: Instant) -> usize {
        if self.is_closed() {
            return 0;
        }
        if event.name == "load"
            && let ListenScope::Element(element) = &event.scope
        {
            self.events.complete_loads(doc, element, &self.outbox);
        }
        self.events.deliver(event, now, &self.outbox)
    }

    /// Re-checks parked `load` subscriptions.
    pub fn poll_loads<D: Document>(&mut self, doc: &D) {
        if !self.is_closed() {
            self.events.poll_loads(doc, &self.outbox);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
