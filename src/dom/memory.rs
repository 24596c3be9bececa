//! Arena-backed in-memory document.
//!
//! Nodes live in a `Vec` and are addressed by [`NodeId`]. Removing a node
//! only detaches it; the slot stays allocated so stale handles never alias
//! a newer node. An id index covers attached elements only.
//!
//! Markup is stored, not parsed: `set_inner_html` drops the element children
//! and keeps the string verbatim.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::protocol::DrawOp;

use super::{Canvas2d, Document, ImageData, Rect};

// ============================================================================
// Constants
// ============================================================================

/// Default canvas surface width, as in browsers.
const DEFAULT_CANVAS_WIDTH: u32 = 300;

/// Default canvas surface height, as in browsers.
const DEFAULT_CANVAS_HEIGHT: u32 = 150;

/// Largest pixel buffer a canvas surface may allocate.
const MAX_SURFACE_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// NodeId
// ============================================================================

/// Handle to a node in a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

// ============================================================================
// MemoryCanvas
// ============================================================================

/// Pixel surface plus a log of the drawing ops applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    ops: Vec<DrawOp>,
    blits: usize,
}

impl MemoryCanvas {
    /// Creates a transparent surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the pixel buffer would exceed 256 MiB.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4))
            .filter(|&len| len <= MAX_SURFACE_BYTES)
            .ok_or_else(|| Error::protocol(format!("canvas {width}x{height} is too large")))?;
        Ok(Self {
            width,
            height,
            pixels: vec![0; bytes],
            ops: Vec::new(),
            blits: 0,
        })
    }

    /// Surface width.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Surface height.
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA value at `(x, y)`, `None` outside the surface.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[at],
            self.pixels[at + 1],
            self.pixels[at + 2],
            self.pixels[at + 3],
        ])
    }

    /// Drawing ops applied so far, in order.
    #[inline]
    #[must_use]
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Number of pixel blocks composited.
    #[inline]
    #[must_use]
    pub fn blits(&self) -> usize {
        self.blits
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        *self = Self::new(width, height)?;
        Ok(())
    }
}

impl Canvas2d for MemoryCanvas {
    fn apply(&mut self, op: &DrawOp) -> Result<()> {
        if *op == DrawOp::Reset {
            self.ops.clear();
            self.pixels.fill(0);
        }
        self.ops.push(op.clone());
        Ok(())
    }

    fn put_image_data(&mut self, image: &ImageData, x: i64, y: i64) -> Result<()> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.data.len() != expected {
            return Err(Error::invalid_frame(format!(
                "image data has {} bytes, expected {expected}",
                image.data.len()
            )));
        }

        let stride = image.width as usize * 4;
        for row in 0..i64::from(image.height) {
            let dy = y + row;
            if dy < 0 || dy >= i64::from(self.height) {
                continue;
            }
            for col in 0..i64::from(image.width) {
                let dx = x + col;
                if dx < 0 || dx >= i64::from(self.width) {
                    continue;
                }
                let src = row as usize * stride + col as usize * 4;
                let dst = (dy as usize * self.width as usize + dx as usize) * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&image.data[src..src + 4]);
            }
        }
        self.blits += 1;
        Ok(())
    }
}

// ============================================================================
// Node
// ============================================================================

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: String,
    id: Option<String>,
    attributes: Vec<(String, String)>,
    properties: FxHashMap<String, Value>,
    styles: Vec<(String, String)>,
    markup: String,
    rect: Rect,
    canvas: Option<MemoryCanvas>,
}

impl Node {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        let tag = tag.to_ascii_lowercase();
        let canvas = (tag == "canvas")
            .then(|| MemoryCanvas::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT))
            .and_then(Result::ok);
        Self {
            parent,
            children: Vec::new(),
            tag,
            id: None,
            attributes: Vec::new(),
            properties: FxHashMap::default(),
            styles: Vec::new(),
            markup: String::new(),
            rect: Rect::default(),
            canvas,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// MemoryDocument
// ============================================================================

/// In-memory [`Document`].
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Node>,
    ids: FxHashMap<String, NodeId>,
    device_pixel_ratio: f64,
    opened: Vec<(String, String)>,
    alerts: Vec<String>,
    scripts: Vec<String>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Creates a document holding only an empty `body` root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new("body", None)],
            ids: FxHashMap::default(),
            device_pixel_ratio: 1.0,
            opened: Vec::new(),
            alerts: Vec::new(),
            scripts: Vec::new(),
        }
    }

    /// Creates an element with an id under `parent`.
    ///
    /// Convenience for building fixtures; skips the collision check.
    pub fn insert(&mut self, parent: NodeId, tag: &str, id: &str) -> NodeId {
        let node = self.append(parent, tag);
        self.set_id(node, id);
        node
    }

    /// Value of an attribute.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node).attribute(name)
    }

    /// Value of an inline style property.
    #[must_use]
    pub fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)
            .styles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The node's canvas surface, if it is a canvas.
    #[must_use]
    pub fn canvas(&self, node: NodeId) -> Option<&MemoryCanvas> {
        self.node(node).canvas.as_ref()
    }

    /// Sets the rectangle reported by `bounding_rect`.
    pub fn set_bounding_rect(&mut self, node: NodeId, rect: Rect) {
        self.node_mut(node).rect = rect;
    }

    /// Sets the ratio reported by `device_pixel_ratio`.
    pub fn set_device_pixel_ratio(&mut self, ratio: f64) {
        self.device_pixel_ratio = ratio;
    }

    /// `(url, target)` pairs passed to `open`.
    #[must_use]
    pub fn opened(&self) -> &[(String, String)] {
        &self.opened
    }

    /// Alert texts, in order.
    #[must_use]
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// Scripts passed to `eval`, including failed ones.
    #[must_use]
    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Returns `true` if the node is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.root() {
                return true;
            }
            current = self.node(n).parent;
        }
        false
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(tag, Some(parent)));
        self.node_mut(parent).children.push(id);
        id
    }

    /// Document-order walk of the descendants of `scope`.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(scope).children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.node(n).children.iter().rev().copied());
        }
        out
    }

    fn unindex_subtree(&mut self, node: NodeId) {
        let mut subtree = self.descendants(node);
        subtree.push(node);
        for n in subtree {
            if let Some(id) = self.node(n).id.clone()
                && self.ids.get(&id) == Some(&n)
            {
                self.ids.remove(&id);
            }
        }
    }

    fn serialize(&self, node: NodeId, out: &mut String) {
        let n = self.node(node);
        out.push('<');
        out.push_str(&n.tag);
        for (name, value) in &n.attributes {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
        out.push('>');
        out.push_str(&self.inner_html(node));
        out.push_str(&format!("</{}>", n.tag));
    }
}

// ============================================================================
// MemoryDocument - Document
// ============================================================================

impl Document for MemoryDocument {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    fn id_of(&self, node: NodeId) -> Option<String> {
        self.node(node).id.clone()
    }

    fn set_id(&mut self, node: NodeId, id: &str) {
        if let Some(old) = self.node(node).id.clone()
            && self.ids.get(&old) == Some(&node)
        {
            self.ids.remove(&old);
        }

        let n = self.node_mut(node);
        n.id = Some(id.to_string());
        match n.attributes.iter_mut().find(|(name, _)| name == "id") {
            Some(slot) => slot.1 = id.to_string(),
            None => n.attributes.push(("id".into(), id.to_string())),
        }

        if self.is_attached(node) {
            self.ids.insert(id.to_string(), node);
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).children.clone()
    }

    fn create_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::protocol(format!("Cannot create element <{tag}>")));
        }
        Ok(self.append(parent, tag))
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).parent else {
            return;
        };
        self.unindex_subtree(node);
        self.node_mut(parent).children.retain(|&c| c != node);
        self.node_mut(node).parent = None;
        trace!(?node, ?parent, "Detached node");
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.node(node).tag.clone()
    }

    fn inner_html(&self, node: NodeId) -> String {
        let n = self.node(node);
        let mut out = n.markup.clone();
        for &child in &n.children {
            self.serialize(child, &mut out);
        }
        out
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        for child in self.node(node).children.clone() {
            self.detach(child);
        }
        self.node_mut(node).markup = html.to_string();
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.node(node).attributes.clone()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if name == "id" {
            self.set_id(node, value);
            return;
        }

        let n = self.node_mut(node);
        match n.attributes.iter_mut().find(|(a, _)| a == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => n.attributes.push((name.to_string(), value.to_string())),
        }

        if let Some(canvas) = n.canvas.as_mut()
            && (name == "width" || name == "height")
            && let Ok(size) = value.trim().parse::<u32>()
        {
            let (width, height) = if name == "width" {
                (size, canvas.height())
            } else {
                (canvas.width(), size)
            };
            if let Err(e) = canvas.resize(width, height) {
                warn!(error = %e, "Canvas size ignored");
            }
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.node_mut(node).attributes.retain(|(a, _)| a != name);
    }

    fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        let n = self.node(node);
        match n.properties.get(name) {
            Some(value) => Some(value.clone()),
            None if name == "id" => Some(Value::String(n.id.clone().unwrap_or_default())),
            None => None,
        }
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: Value) {
        self.node_mut(node).properties.insert(name.to_string(), value);
    }

    fn set_style(&mut self, node: NodeId, name: &str, value: &str) {
        let styles = &mut self.node_mut(node).styles;
        match styles.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => styles.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_style(&mut self, node: NodeId, name: &str) {
        self.node_mut(node).styles.retain(|(n, _)| n != name);
    }

    fn computed_style(&self, node: NodeId, name: &str) -> Option<String> {
        self.style(node, name).map(str::to_string)
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.node(node).rect
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&n| {
                self.node(n)
                    .attribute("class")
                    .is_some_and(|list| list.split_whitespace().any(|c| c == class))
            })
            .collect()
    }

    fn elements_by_name(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|&n| self.node(n).attribute("name") == Some(name))
            .collect()
    }

    fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.descendants(scope)
            .into_iter()
            .filter(|&n| tag == "*" || self.node(n).tag == tag)
            .collect()
    }

    fn context_2d(&mut self, node: NodeId) -> Option<&mut dyn Canvas2d> {
        self.node_mut(node)
            .canvas
            .as_mut()
            .map(|canvas| canvas as &mut dyn Canvas2d)
    }

    fn open(&mut self, url: &str, target: &str) -> Result<()> {
        self.opened.push((url.to_string(), target.to_string()));
        Ok(())
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    /// Records the script. A script of the form `throw <message>` fails
    /// with `<message>`.
    fn eval(&mut self, script: &str) -> Result<()> {
        self.scripts.push(script.to_string());
        match script.trim().strip_prefix("throw ") {
            Some(message) => Err(Error::script(message)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
