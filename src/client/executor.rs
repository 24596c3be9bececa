//! DOM command execution.
//!
//! Each command runs against an already resolved target node and is
//! independent of every other command.

use serde_json::Value;
use tracing::{debug, trace};

use crate::dom::{Document, Rect};
use crate::error::{Error, Result};
use crate::identifiers::ElementRef;
use crate::protocol::{CanvasFrame, Command, DrawOp, OpReader, Outbound};

use super::Session;
use super::coerce::{attribute_text, coerce, parse_value};
use super::session::CANVAS_DRAW_NOTIFIER;

// ============================================================================
// Session - DOM Commands
// ============================================================================

impl Session {
    /// Applies a DOM command to `node`.
    pub(crate) fn execute<D: Document>(
        &mut self,
        doc: &mut D,
        node: D::Node,
        element: &ElementRef,
        command: Command,
    ) -> Result<()> {
        match command {
            Command::Html { html } => doc.set_inner_html(node, &html),

            Command::SetAttribute { attribute, value } => {
                set_attribute(doc, node, &attribute, &value)?;
            }

            Command::RemoveAttribute { attribute } => doc.remove_attribute(node, &attribute),

            Command::SetStyle { style, value } => {
                doc.set_style(node, &style, &attribute_text(&value));
            }

            Command::RemoveStyle { style } => doc.remove_style(node, &style),

            Command::Create {
                html_element,
                new_id,
            } => create(doc, node, &html_element, &new_id)?,

            Command::Remove { remove } => remove_child(doc, node, element, &remove)?,

            Command::Event {
                event,
                properties,
                throttle,
            } => self.subscribe(doc, node, element, &event, properties, throttle),

            Command::PaintImage {
                image,
                pos,
                rect,
                clip,
            } => paint_image(doc, node, element, &image, pos, rect, clip)?,

            Command::CanvasDraw { commands } => canvas_draw(doc, node, element, &commands)?,

            other => {
                return Err(Error::protocol(format!("{other:?} is not a DOM command")));
            }
        }
        Ok(())
    }

    /// Composites a binary canvas frame and acknowledges it when asked to.
    pub(crate) fn blit<D: Document>(&mut self, doc: &mut D, bytes: &[u8]) -> Result<()> {
        let frame = CanvasFrame::decode(bytes)?;
        let node = doc
            .element_by_id(&frame.target)
            .ok_or_else(|| Error::element_not_found(frame.target.as_str()))?;

        if let Some(pixels) = frame.pixels()? {
            let ctx = doc
                .context_2d(node)
                .ok_or_else(|| Error::no_graphics_context(frame.target.as_str()))?;
            ctx.put_image_data(&pixels, i64::from(frame.x), i64::from(frame.y))?;
            trace!(canvas = %frame.target, x = frame.x, y = frame.y, width = frame.width, height = frame.height, "Blit");
        }

        if frame.as_draw && self.has_notifier(CANVAS_DRAW_NOTIFIER) {
            self.emit(&Outbound::notify(
                frame.target.as_str(),
                CANVAS_DRAW_NOTIFIER,
                Value::from(0),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Sets the attribute and its reflected property, coercing to the property's kind.
///
/// An `id` already held by another element is rejected.
fn set_attribute<D: Document>(doc: &mut D, node: D::Node, name: &str, raw: &Value) -> Result<()> {
    let parsed = parse_value(raw);
    let value = coerce(doc.property(node, name).as_ref(), parsed);
    let text = attribute_text(&value);
    if name == "id" && doc.element_by_id(&text).is_some_and(|holder| holder != node) {
        return Err(Error::element_exists(text));
    }
    doc.set_attribute(node, name, &text);
    doc.set_property(node, name, value);
    Ok(())
}

fn create<D: Document>(doc: &mut D, parent: D::Node, tag: &str, new_id: &str) -> Result<()> {
    if doc.element_by_id(new_id).is_some() {
        return Err(Error::element_exists(new_id));
    }
    let child = doc.create_element(parent, tag)?;
    doc.set_id(child, new_id);
    debug!(tag, id = new_id, "Created element");
    Ok(())
}

/// Detaches `remove` from `parent`, or `parent` itself when it names itself.
fn remove_child<D: Document>(
    doc: &mut D,
    parent: D::Node,
    element: &ElementRef,
    remove: &str,
) -> Result<()> {
    if !element.is_root() && element.as_str() == remove {
        doc.detach(parent);
        debug!(id = remove, "Removed element");
        return Ok(());
    }

    let child = doc
        .element_by_id(remove)
        .ok_or_else(|| Error::element_not_found(remove))?;
    if doc.parent(child) != Some(parent) {
        let parent_label = if element.is_root() {
            "root"
        } else {
            element.as_str()
        };
        return Err(Error::not_a_child(parent_label, remove));
    }

    doc.detach(child);
    debug!(id = remove, "Removed element");
    Ok(())
}

fn paint_image<D: Document>(
    doc: &mut D,
    node: D::Node,
    element: &ElementRef,
    image: &str,
    pos: Option<[f64; 2]>,
    rect: Option<[f64; 4]>,
    clip: Option<[f64; 4]>,
) -> Result<()> {
    let source = doc
        .element_by_id(image)
        .ok_or_else(|| Error::image_not_found(image))?;

    let clip = clip.map(|[x, y, w, h]| Rect::new(x, y, w, h));
    let op = match (pos, rect) {
        (Some([x, y]), _) => match clip {
            Some(clip) => {
                let size = |name: &str| {
                    doc.property(source, name)
                        .and_then(|v| v.as_f64())
                        .unwrap_or(0.0)
                };
                DrawOp::DrawImageClip {
                    image: image.to_string(),
                    clip,
                    dest: Rect::new(x, y, size("width"), size("height")),
                }
            }
            None => DrawOp::DrawImage {
                image: image.to_string(),
                x,
                y,
            },
        },
        (None, Some([x, y, w, h])) => {
            let dest = Rect::new(x, y, w, h);
            match clip {
                Some(clip) => DrawOp::DrawImageClip {
                    image: image.to_string(),
                    clip,
                    dest,
                },
                None => DrawOp::DrawImageRect {
                    image: image.to_string(),
                    dest,
                },
            }
        }
        (None, None) => {
            return Err(Error::protocol(format!("{image} has no position")));
        }
    };

    let ctx = doc
        .context_2d(node)
        .ok_or_else(|| Error::no_graphics_context(element.as_str()))?;
    ctx.apply(&op)
}

/// Applies an op-list in order, stopping at the first failure.
fn canvas_draw<D: Document>(
    doc: &mut D,
    node: D::Node,
    element: &ElementRef,
    commands: &[Value],
) -> Result<()> {
    if doc.context_2d(node).is_none() {
        return Err(Error::no_graphics_context(element.as_str()));
    }

    let mut applied = 0usize;
    for op in OpReader::new(commands) {
        let op = op?;
        if let Some(image) = op.image()
            && doc.element_by_id(image).is_none()
        {
            return Err(Error::image_not_found(image));
        }
        let ctx = doc
            .context_2d(node)
            .ok_or_else(|| Error::no_graphics_context(element.as_str()))?;
        ctx.apply(&op)?;
        applied += 1;
    }

    trace!(%element, applied, "Canvas op-list applied");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::dom::{MemoryDocument, NodeId};
    use crate::protocol::Incoming;
    use crate::transport::{Outbox, OutboundFrame, OutboxReceiver};

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
        session.dispatch(doc, Incoming::Json(message));
    }

    fn canvas(doc: &mut MemoryDocument) -> NodeId {
        doc.insert(doc.root(), "canvas", "c")
    }

    #[test]
    fn test_set_attribute_coerces_boolean_property() {
        let (mut session, _rx, mut doc) = setup();
        let input = doc.insert(doc.root(), "input", "box");
        doc.set_property(input, "checked", json!(false));

        send(&mut session, &mut doc, json!({"type": "set_attribute", "element": "box", "attribute": "checked", "value": "true"}));

        assert_eq!(doc.property(input, "checked"), Some(json!(true)));
        assert_eq!(doc.attribute(input, "checked"), Some("true"));
    }

    #[test]
    fn test_set_attribute_coerces_number_property() {
        let (mut session, _rx, mut doc) = setup();
        let input = doc.insert(doc.root(), "input", "n");
        doc.set_property(input, "value", json!(0));

        send(&mut session, &mut doc, json!({"type": "set_attribute", "element": "n", "attribute": "value", "value": "5"}));

        assert_eq!(doc.property(input, "value"), Some(json!(5)));
        assert_eq!(doc.attribute(input, "value"), Some("5"));
    }

    #[test]
    fn test_set_attribute_rejects_taken_id() {
        let (mut session, mut rx, mut doc) = setup();
        let first = doc.insert(doc.root(), "div", "first");
        let second = doc.insert(doc.root(), "div", "second");

        send(&mut session, &mut doc, json!({"type": "set_attribute", "element": "second", "attribute": "id", "value": "first"}));

        assert_eq!(doc.element_by_id("first"), Some(first));
        assert_eq!(doc.element_by_id("second"), Some(second));
        let messages = sent(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "error");

        send(&mut session, &mut doc, json!({"type": "set_attribute", "element": "second", "attribute": "id", "value": "second"}));
        send(&mut session, &mut doc, json!({"type": "set_attribute", "element": "second", "attribute": "id", "value": "renamed"}));
        assert!(sent(&mut rx).is_empty());
        assert_eq!(doc.element_by_id("renamed"), Some(second));
    }

    #[test]
    fn test_remove_attribute_and_styles() {
        let (mut session, _rx, mut doc) = setup();
        let div = doc.insert(doc.root(), "div", "d");

        send(&mut session, &mut doc, json!({"type": "set_attribute", "element": "d", "attribute": "title", "value": "hi"}));
        send(&mut session, &mut doc, json!({"type": "remove_attribute", "element": "d", "attribute": "title"}));
        send(&mut session, &mut doc, json!({"type": "set_style", "element": "d", "style": "color", "value": "red"}));
        send(&mut session, &mut doc, json!({"type": "set_style", "element": "d", "style": "width", "value": "10px"}));
        send(&mut session, &mut doc, json!({"type": "remove_style", "element": "d", "style": "width"}));

        assert_eq!(doc.attribute(div, "title"), None);
        assert_eq!(doc.style(div, "color"), Some("red"));
        assert_eq!(doc.style(div, "width"), None);
    }

    #[test]
    fn test_create_rejects_id_collision() {
        let (mut session, mut rx, mut doc) = setup();
        doc.insert(doc.root(), "div", "taken");

        send(&mut session, &mut doc, json!({"type": "create", "element": "", "html_element": "p", "new_id": "taken"}));

        assert_eq!(doc.children(doc.root()).len(), 1);
        let messages = sent(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["element"], "createElement");
    }

    #[test]
    fn test_remove_requires_direct_child() {
        let (mut session, mut rx, mut doc) = setup();
        let outer = doc.insert(doc.root(), "div", "outer");
        let inner = doc.insert(outer, "div", "inner");
        let other = doc.insert(doc.root(), "div", "other");

        send(&mut session, &mut doc, json!({"type": "remove", "element": "other", "remove": "inner"}));
        assert!(doc.is_attached(inner));
        assert_eq!(sent(&mut rx)[0]["error"], "other is not a parent of inner");

        send(&mut session, &mut doc, json!({"type": "remove", "element": "outer", "remove": "inner"}));
        assert!(!doc.is_attached(inner));
        assert!(doc.element_by_id("inner").is_none());

        send(&mut session, &mut doc, json!({"type": "remove", "element": "other", "remove": "other"}));
        assert!(!doc.is_attached(other));
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_canvas_draw_applies_ops_in_order() {
        let (mut session, mut rx, mut doc) = setup();
        let c = canvas(&mut doc);

        send(&mut session, &mut doc, json!({"type": "canvas_draw", "element": "c", "commands":
            ["fillRect", 0, 0, 10, 10, "fillStyle", "#fff", "fillRect", 0, 0, 5, 5]}));

        let ops = doc.canvas(c).expect("canvas").ops();
        assert_eq!(
            ops,
            &[
                DrawOp::FillRect(Rect::new(0.0, 0.0, 10.0, 10.0)),
                DrawOp::FillStyle("#fff".into()),
                DrawOp::FillRect(Rect::new(0.0, 0.0, 5.0, 5.0)),
            ]
        );
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_canvas_draw_stops_at_unknown_token() {
        let (mut session, mut rx, mut doc) = setup();
        let c = canvas(&mut doc);

        send(&mut session, &mut doc, json!({"type": "canvas_draw", "element": "c", "commands":
            ["fillRect", 0, 0, 1, 1, "sparkle", 3, "fillRect", 0, 0, 2, 2]}));

        assert_eq!(doc.canvas(c).expect("canvas").ops().len(), 1);
        let messages = sent(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["element"], "sparkle");
    }

    #[test]
    fn test_canvas_draw_rejects_truncated_list() {
        let (mut session, mut rx, mut doc) = setup();
        let c = canvas(&mut doc);

        send(&mut session, &mut doc, json!({"type": "canvas_draw", "element": "c", "commands":
            ["moveTo", 1, 1, "lineTo", 4]}));

        assert_eq!(doc.canvas(c).expect("canvas").ops(), &[DrawOp::MoveTo { x: 1.0, y: 1.0 }]);
        assert_eq!(sent(&mut rx)[0]["element"], "lineTo");
    }

    #[test]
    fn test_canvas_draw_missing_image_aborts() {
        let (mut session, mut rx, mut doc) = setup();
        let c = canvas(&mut doc);
        doc.insert(doc.root(), "img", "pic");

        send(&mut session, &mut doc, json!({"type": "canvas_draw", "element": "c", "commands":
            ["drawImage", "pic", 0, 0, "drawImage", "ghost", 1, 1, "stroke"]}));

        assert_eq!(doc.canvas(c).expect("canvas").ops().len(), 1);
        assert_eq!(sent(&mut rx)[0]["error"], "ghost image not found");
    }

    #[test]
    fn test_canvas_draw_needs_surface() {
        let (mut session, mut rx, mut doc) = setup();
        doc.insert(doc.root(), "div", "d");
        send(&mut session, &mut doc, json!({"type": "canvas_draw", "element": "d", "commands": ["stroke"]}));
        assert_eq!(sent(&mut rx)[0]["error"], "d has no graphics context");
    }

    #[test]
    fn test_paint_image_variants() {
        let (mut session, mut rx, mut doc) = setup();
        let c = canvas(&mut doc);
        let img = doc.insert(doc.root(), "img", "pic");
        doc.set_property(img, "width", json!(8));
        doc.set_property(img, "height", json!(6));

        send(&mut session, &mut doc, json!({"type": "paint_image", "element": "c", "image": "pic", "pos": [1, 2]}));
        send(&mut session, &mut doc, json!({"type": "paint_image", "element": "c", "image": "pic", "rect": [0, 0, 4, 4]}));
        send(&mut session, &mut doc, json!({"type": "paint_image", "element": "c", "image": "pic",
            "pos": [3, 3], "clip": [0, 0, 2, 2]}));
        send(&mut session, &mut doc, json!({"type": "paint_image", "element": "c", "image": "nope", "pos": [0, 0]}));

        let ops = doc.canvas(c).expect("canvas").ops();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0], DrawOp::DrawImage { image: "pic".into(), x: 1.0, y: 2.0 });
        assert_eq!(
            ops[2],
            DrawOp::DrawImageClip {
                image: "pic".into(),
                clip: Rect::new(0.0, 0.0, 2.0, 2.0),
                dest: Rect::new(3.0, 3.0, 8.0, 6.0),
            }
        );
        assert_eq!(sent(&mut rx)[0]["error"], "nope image not found");
    }

    fn frame(target: &str, width: u32, height: u32, as_draw: bool, payload: &[u8]) -> Vec<u8> {
        CanvasFrame {
            x: 0,
            y: 0,
            width,
            height,
            as_draw,
            target: target.to_string(),
            payload,
        }
        .encode()
    }

    #[test]
    fn test_blit_short_payload_is_padded() {
        let (mut session, mut rx, mut doc) = setup();
        let c = canvas(&mut doc);

        let bytes = frame("c", 2, 2, false, &[1, 2, 3, 4, 5, 6, 7, 8]);
        session.dispatch(&mut doc, Incoming::Binary(bytes));

        let surface = doc.canvas(c).expect("canvas");
        assert_eq!(surface.blits(), 1);
        assert_eq!(surface.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(surface.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(surface.pixel(0, 1), Some([0, 0, 0, 0]));
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_blit_acknowledges_when_subscribed() {
        let (mut session, mut rx, mut doc) = setup();
        canvas(&mut doc);

        session.dispatch(&mut doc, Incoming::Binary(frame("c", 1, 1, true, &[9; 4])));
        assert!(sent(&mut rx).is_empty());

        send(&mut session, &mut doc, json!({"type": "event_notify", "add": true, "name": "canvas_draw"}));
        session.dispatch(&mut doc, Incoming::Binary(frame("c", 1, 1, true, &[9; 4])));
        session.dispatch(&mut doc, Incoming::Binary(frame("c", 1, 1, false, &[9; 4])));

        assert_eq!(
            sent(&mut rx),
            vec![json!({"type": "event", "element": "c", "event": "event_notify",
                        "properties": {"name": "canvas_draw", "msgid": 0}})]
        );
    }

    #[test]
    fn test_blit_tail_frame_only_acknowledges() {
        let (mut session, mut rx, mut doc) = setup();
        let c = canvas(&mut doc);
        send(&mut session, &mut doc, json!({"type": "event_notify", "add": true, "name": "canvas_draw"}));

        session.dispatch(&mut doc, Incoming::Binary(frame("c", 0, 0, true, &[])));

        assert_eq!(doc.canvas(c).expect("canvas").blits(), 0);
        assert_eq!(sent(&mut rx).len(), 1);
    }

    #[test]
    fn test_blit_unknown_target_is_reported() {
        let (mut session, mut rx, mut doc) = setup();
        session.dispatch(&mut doc, Incoming::Binary(frame("ghost", 1, 1, false, &[0; 4])));
        session.dispatch(&mut doc, Incoming::Binary(vec![1, 2, 3]));

        let messages = sent(&mut rx);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["element"], "ghost");
        assert_eq!(messages[1]["element"], "Binary");
    }
}
