//! Query kinds.
//!
//! | Kind | Target | Answer |
//! |------|--------|--------|
//! | `attributes` | element | name → value map |
//! | `children` | element | child element ids |
//! | `parent` | element | parent id, `": :"` for the root |
//! | `value` | element | `{value, checked, name, named}` |
//! | `styles` | element | computed styles named in params |
//! | `innerHTML` | element | markup |
//! | `element_type` | element | lowercase tag name |
//! | `bounding_rect` | element | `{x, y, width, height}` |
//! | `devicePixelRatio` | any | number |
//! | `exists` | id, empty = root | bool |
//! | `classes` | class name | matching element ids |
//! | `names` | name attribute | matching element ids |
//! | `ping` | none | timestamp, as `pong` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// QueryKind
// ============================================================================

/// Named introspection kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// All attributes.
    Attributes,
    /// Child element ids.
    Children,
    /// Parent element id.
    Parent,
    /// Form value properties.
    Value,
    /// Subset of computed styles.
    Styles,
    /// Inner markup.
    InnerHtml,
    /// Tag name.
    ElementType,
    /// Bounding client rect.
    BoundingRect,
    /// Device pixel ratio.
    DevicePixelRatio,
    /// Element existence.
    Exists,
    /// Elements by class name.
    Classes,
    /// Elements by name attribute.
    Names,
    /// Round-trip timestamp.
    Ping,
}

impl QueryKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attributes => "attributes",
            Self::Children => "children",
            Self::Parent => "parent",
            Self::Value => "value",
            Self::Styles => "styles",
            Self::InnerHtml => "innerHTML",
            Self::ElementType => "element_type",
            Self::BoundingRect => "bounding_rect",
            Self::DevicePixelRatio => "devicePixelRatio",
            Self::Exists => "exists",
            Self::Classes => "classes",
            Self::Names => "names",
            Self::Ping => "ping",
        }
    }

    /// Key under which collection answers are reported.
    ///
    /// Collections share the `children` response shape.
    #[inline]
    #[must_use]
    pub const fn response_key(self) -> &'static str {
        match self {
            Self::Children | Self::Classes | Self::Names => "children",
            Self::Ping => "pong",
            other => other.as_str(),
        }
    }
}

impl FromStr for QueryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "attributes" => Self::Attributes,
            "children" => Self::Children,
            "parent" => Self::Parent,
            "value" => Self::Value,
            "styles" => Self::Styles,
            "innerHTML" => Self::InnerHtml,
            "element_type" => Self::ElementType,
            "bounding_rect" => Self::BoundingRect,
            "devicePixelRatio" => Self::DevicePixelRatio,
            "exists" => Self::Exists,
            "classes" => Self::Classes,
            "names" => Self::Names,
            "ping" => Self::Ping,
            other => return Err(Error::unknown_query(other)),
        })
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
