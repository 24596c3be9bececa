//! Document environment the client drives.
//!
//! The client never owns a real DOM. It talks to one through the
//! [`Document`] and [`Canvas2d`] traits, which cover exactly what the
//! protocol needs: element lookup, creation and removal, attributes and
//! reflected properties, inline and computed styles, geometry, 2D drawing
//! surfaces, and a few environment hooks (`open`, `alert`, `eval`).
//!
//! [`MemoryDocument`] implements both traits in memory and is what the
//! tests and benches run against.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | Arena-backed in-memory document |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory document.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryCanvas, MemoryDocument, NodeId};

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::DrawOp;

// ============================================================================
// Rect
// ============================================================================

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

// ============================================================================
// ImageData
// ============================================================================

/// Block of RGBA pixels, row-major, four bytes per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl ImageData {
    /// Creates an image from raw RGBA bytes.
    #[inline]
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ============================================================================
// Canvas2d
// ============================================================================

/// A 2D drawing surface.
pub trait Canvas2d {
    /// Applies one drawing primitive.
    ///
    /// Image ops name their source by element id; the caller has already
    /// checked that the element exists.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the error is reported to the host and the
    /// rest of the op-list is abandoned.
    fn apply(&mut self, op: &DrawOp) -> Result<()>;

    /// Composites a pixel block with its top-left corner at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn put_image_data(&mut self, image: &ImageData, x: i64, y: i64) -> Result<()>;
}

// ============================================================================
// Document
// ============================================================================

/// An addressable element tree.
///
/// Nodes are plain handles; the document owns the nodes themselves. All
/// calls come from the client's single event loop.
pub trait Document {
    /// Handle to a node.
    type Node: Copy + Eq + fmt::Debug;

    /// The root element (the body), addressed by the empty id.
    fn root(&self) -> Self::Node;

    /// Looks up an attached element by id.
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Returns the element's id, `None` if it has none.
    fn id_of(&self, node: Self::Node) -> Option<String>;

    /// Assigns an id to the element.
    fn set_id(&mut self, node: Self::Node, id: &str);

    /// Parent element, `None` for the root and detached nodes.
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// Element children in document order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Creates an element with `tag` and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot create the tag.
    fn create_element(&mut self, parent: Self::Node, tag: &str) -> Result<Self::Node>;

    /// Detaches the node from its parent.
    fn detach(&mut self, node: Self::Node);

    /// Lowercase tag name.
    fn tag_name(&self, node: Self::Node) -> String;

    /// Inner markup.
    fn inner_html(&self, node: Self::Node) -> String;

    /// Replaces the node's content with markup.
    fn set_inner_html(&mut self, node: Self::Node, html: &str);

    /// All attributes in document order.
    fn attributes(&self, node: Self::Node) -> Vec<(String, String)>;

    /// Sets an attribute.
    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);

    /// Removes an attribute.
    fn remove_attribute(&mut self, node: Self::Node, name: &str);

    /// Current value of the reflected property `name`, `None` if undefined.
    fn property(&self, node: Self::Node, name: &str) -> Option<Value>;

    /// Sets the reflected property `name`.
    fn set_property(&mut self, node: Self::Node, name: &str, value: Value);

    /// Sets one inline style property.
    fn set_style(&mut self, node: Self::Node, name: &str, value: &str);

    /// Removes one inline style property.
    fn remove_style(&mut self, node: Self::Node, name: &str);

    /// Computed value of one style property.
    fn computed_style(&self, node: Self::Node, name: &str) -> Option<String>;

    /// Bounding client rectangle.
    fn bounding_rect(&self, node: Self::Node) -> Rect;

    /// Ratio of device pixels to CSS pixels.
    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }

    /// Attached elements with `class` in their class list.
    fn elements_by_class(&self, class: &str) -> Vec<Self::Node>;

    /// Attached elements whose `name` attribute equals `name`.
    fn elements_by_name(&self, name: &str) -> Vec<Self::Node>;

    /// Descendants of `scope` with tag `tag`, `*` matching all.
    fn elements_by_tag(&self, scope: Self::Node, tag: &str) -> Vec<Self::Node>;

    /// The node's 2D drawing surface, `None` if it is not a canvas.
    fn context_2d(&mut self, node: Self::Node) -> Option<&mut dyn Canvas2d>;

    /// Opens `url` in the viewing context named `target`.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn open(&mut self, url: &str, target: &str) -> Result<()> {
        let _ = (url, target);
        Ok(())
    }

    /// Shows an alert.
    fn alert(&mut self, message: &str) {
        let _ = message;
    }

    /// Runs a script in the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] when the script fails; the default
    /// environment has no script engine.
    fn eval(&mut self, script: &str) -> Result<()> {
        let _ = script;
        Err(Error::script("no script engine"))
    }
}
