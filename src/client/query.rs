//! Query responder.
//!
//! Every `query` and `tag_name` message gets exactly one response carrying
//! its `query_id`. Failures answer `query_error` after reporting the cause.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value, json};
use tracing::trace;
use uuid::Uuid;

use crate::dom::Document;
use crate::error::{Error, Result};
use crate::identifiers::{ElementRef, QueryId};
use crate::protocol::{Envelope, Outbound, QueryKind, QueryResponse};

use super::Session;

// ============================================================================
// Constants
// ============================================================================

/// Parent answer when the parent is the document root.
const ROOT_PARENT: &str = ": :";

/// Response key for element collections.
const CHILDREN_KEY: &str = "children";

// ============================================================================
// Session - Queries
// ============================================================================

impl Session {
    /// Answers a `query` message.
    pub(crate) fn answer<D: Document>(
        &mut self,
        doc: &mut D,
        element: &ElementRef,
        query: &str,
        query_id: QueryId,
        params: &Value,
    ) {
        let outcome = query
            .parse::<QueryKind>()
            .and_then(|kind| Ok((kind, self.query_value(doc, element, kind, params)?)));

        let response = match outcome {
            Ok((kind, value)) => {
                trace!(%query_id, %kind, %element, "Query answered");
                QueryResponse::new(query_id, kind.response_key(), value)
            }
            Err(e) => {
                self.report(&e);
                QueryResponse::failed(query_id)
            }
        };
        self.emit(&Outbound::Query(response));
    }

    /// Answers a `tag_name` message with the ids of matching descendants.
    pub(crate) fn answer_tag_name<D: Document>(
        &mut self,
        doc: &mut D,
        element: &ElementRef,
        tag: &str,
        query_id: QueryId,
    ) {
        let response = match self.resolve(doc, element) {
            Ok(node) => {
                let nodes = doc.elements_by_tag(node, tag);
                QueryResponse::new(query_id, CHILDREN_KEY, self.collection(doc, nodes))
            }
            Err(e) => {
                self.report(&e);
                QueryResponse::failed(query_id)
            }
        };
        self.emit(&Outbound::Query(response));
    }

    /// Answers `query_error` for a query whose body did not decode.
    ///
    /// Returns `false`, doing nothing, unless the message is a `query` or
    /// `tag_name` carrying a `query_id`.
    pub(crate) fn answer_malformed(&self, envelope: &Envelope, err: &Error) -> bool {
        if !matches!(envelope.message_type.as_str(), "query" | "tag_name") {
            return false;
        }
        let Some(query_id) = envelope.body.get("query_id") else {
            return false;
        };
        self.report(err);
        let query_id = QueryId::new(query_id.clone());
        self.emit(&Outbound::Query(QueryResponse::failed(query_id)));
        true
    }

    fn query_value<D: Document>(
        &mut self,
        doc: &mut D,
        element: &ElementRef,
        kind: QueryKind,
        params: &Value,
    ) -> Result<Value> {
        let value = match kind {
            QueryKind::Exists => {
                Value::Bool(element.is_root() || doc.element_by_id(element.as_str()).is_some())
            }

            QueryKind::Classes => {
                let nodes = doc.elements_by_class(element.as_str());
                self.collection(doc, nodes)
            }

            QueryKind::Names => {
                let nodes = doc.elements_by_name(element.as_str());
                self.collection(doc, nodes)
            }

            QueryKind::Ping => ping_value(params),

            QueryKind::DevicePixelRatio => Value::from(doc.device_pixel_ratio()),

            QueryKind::Attributes => {
                let node = self.resolve(doc, element)?;
                doc.attributes(node)
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect::<Map<_, _>>()
                    .into()
            }

            QueryKind::Children => {
                let node = self.resolve(doc, element)?;
                let nodes = doc.children(node);
                self.collection(doc, nodes)
            }

            QueryKind::Parent => {
                let node = self.resolve(doc, element)?;
                match doc.parent(node) {
                    Some(parent) if parent == doc.root() => Value::from(ROOT_PARENT),
                    Some(parent) => Value::String(self.ensure_id(doc, parent)),
                    None => Value::Null,
                }
            }

            QueryKind::Value => {
                let node = self.resolve(doc, element)?;
                let property = |name: &str| doc.property(node, name).unwrap_or(Value::Null);
                let name = property("name");
                let named = name
                    .as_str()
                    .filter(|n| !n.is_empty())
                    .map_or(Value::Null, |n| property(n));
                json!({
                    "value": property("value"),
                    "checked": property("checked"),
                    "name": name,
                    "named": named,
                })
            }

            QueryKind::Styles => {
                let node = self.resolve(doc, element)?;
                style_names(params)
                    .map(|name| {
                        let value = doc
                            .computed_style(node, name)
                            .map_or(Value::Null, Value::String);
                        (name.to_string(), value)
                    })
                    .collect::<Map<_, _>>()
                    .into()
            }

            QueryKind::InnerHtml => {
                let node = self.resolve(doc, element)?;
                Value::String(doc.inner_html(node))
            }

            QueryKind::ElementType => {
                let node = self.resolve(doc, element)?;
                Value::String(doc.tag_name(node).to_lowercase())
            }

            QueryKind::BoundingRect => {
                let node = self.resolve(doc, element)?;
                serde_json::to_value(doc.bounding_rect(node))?
            }
        };
        Ok(value)
    }

    /// Ids of `nodes`, assigning generated ids to nodes without one.
    fn collection<D: Document>(&mut self, doc: &mut D, nodes: Vec<D::Node>) -> Value {
        nodes
            .into_iter()
            .map(|node| Value::String(self.ensure_id(doc, node)))
            .collect()
    }

    /// Returns the node's id, generating one if it has none.
    fn ensure_id<D: Document>(&mut self, doc: &mut D, node: D::Node) -> String {
        if let Some(id) = doc.id_of(node).filter(|id| !id.is_empty()) {
            return id;
        }
        self.generated_ids += 1;
        let id = format!("gempyre_{}_{}", Uuid::new_v4().simple(), self.generated_ids);
        doc.set_id(node, &id);
        trace!(?node, %id, "Assigned generated id");
        id
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Style names requested by a `styles` query: a list, or a single name.
fn style_names(params: &Value) -> Box<dyn Iterator<Item = &str> + '_> {
    match params {
        Value::Array(items) => Box::new(items.iter().filter_map(Value::as_str)),
        Value::String(name) => Box::new(std::iter::once(name.as_str())),
        _ => Box::new(std::iter::empty()),
    }
}

/// Echoes a host timestamp, or the current epoch milliseconds.
fn ping_value(params: &Value) -> Value {
    match params {
        Value::String(s) if !s.is_empty() => Value::String(s.clone()),
        Value::Number(n) => Value::String(n.to_string()),
        _ => {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_millis());
            Value::String(millis.to_string())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
