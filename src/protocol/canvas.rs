//! Canvas op-list reader.
//!
//! A `canvas_draw` command carries a flat list mixing op tokens and their
//! positional arguments:
//!
//! ```json
//! ["fillStyle", "#fff", "fillRect", 0, 0, 10, 10, "beginPath", "arc", 5, 5, 2, 0, 6.28]
//! ```
//!
//! There is no length prefix; the number of arguments each token consumes is
//! fixed by [`arity`]. An unknown token, a list that ends mid-op, or an
//! argument of the wrong type stops the reader.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::dom::Rect;
use crate::error::{Error, Result};

// ============================================================================
// Arity Table
// ============================================================================

/// Returns the number of arguments `token` consumes, or `None` if unknown.
#[must_use]
pub fn arity(token: &str) -> Option<usize> {
    let n = match token {
        "beginPath" | "closePath" | "stroke" | "fill" | "save" | "restore" | "reset" => 0,
        "rotate" | "lineWidth" | "fillStyle" | "strokeStyle" | "font" | "textAlign"
        | "textBaseline" => 1,
        "lineTo" | "moveTo" | "translate" | "scale" => 2,
        "fillText" | "strokeText" | "drawImage" => 3,
        "strokeRect" | "clearRect" | "fillRect" | "rect" | "quadraticCurveTo" => 4,
        "arc" | "arcTo" | "drawImageRect" => 5,
        "bezierCurveTo" => 6,
        "ellipse" => 7,
        "drawImageClip" => 9,
        _ => return None,
    };
    Some(n)
}

// ============================================================================
// DrawOp
// ============================================================================

/// One 2D drawing primitive, named after the canvas API call it maps to.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// `strokeRect(x, y, w, h)`
    StrokeRect(Rect),
    /// `clearRect(x, y, w, h)`
    ClearRect(Rect),
    /// `fillRect(x, y, w, h)`
    FillRect(Rect),
    /// `rect(x, y, w, h)`
    Rect(Rect),
    /// `fillText(text, x, y)`
    FillText { text: String, x: f64, y: f64 },
    /// `strokeText(text, x, y)`
    StrokeText { text: String, x: f64, y: f64 },
    /// `arc(x, y, radius, startAngle, endAngle)`
    Arc {
        x: f64,
        y: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
    /// `ellipse(x, y, radiusX, radiusY, rotation, startAngle, endAngle)`
    Ellipse {
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        rotation: f64,
        start_angle: f64,
        end_angle: f64,
    },
    /// `beginPath()`
    BeginPath,
    /// `closePath()`
    ClosePath,
    /// `lineTo(x, y)`
    LineTo { x: f64, y: f64 },
    /// `moveTo(x, y)`
    MoveTo { x: f64, y: f64 },
    /// `bezierCurveTo(cp1x, cp1y, cp2x, cp2y, x, y)`
    BezierCurveTo {
        cp1x: f64,
        cp1y: f64,
        cp2x: f64,
        cp2y: f64,
        x: f64,
        y: f64,
    },
    /// `quadraticCurveTo(cpx, cpy, x, y)`
    QuadraticCurveTo { cpx: f64, cpy: f64, x: f64, y: f64 },
    /// `arcTo(x1, y1, x2, y2, radius)`
    ArcTo {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        radius: f64,
    },
    /// `stroke()`
    Stroke,
    /// `fill()`
    Fill,
    /// `fillStyle = ...`
    FillStyle(String),
    /// `strokeStyle = ...`
    StrokeStyle(String),
    /// `lineWidth = ...`
    LineWidth(f64),
    /// `font = ...`
    Font(String),
    /// `textAlign = ...`
    TextAlign(String),
    /// `textBaseline = ...`
    TextBaseline(String),
    /// `save()`
    Save,
    /// `restore()`
    Restore,
    /// `rotate(angle)`
    Rotate(f64),
    /// `translate(x, y)`
    Translate { x: f64, y: f64 },
    /// `scale(x, y)`
    Scale { x: f64, y: f64 },
    /// `drawImage(image, x, y)`
    DrawImage { image: String, x: f64, y: f64 },
    /// `drawImage(image, dx, dy, dw, dh)`
    DrawImageRect { image: String, dest: Rect },
    /// `drawImage(image, sx, sy, sw, sh, dx, dy, dw, dh)`
    DrawImageClip {
        image: String,
        clip: Rect,
        dest: Rect,
    },
    /// `reset()`
    Reset,
}

impl DrawOp {
    /// Returns the image element id this op draws, if any.
    #[inline]
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        match self {
            Self::DrawImage { image, .. }
            | Self::DrawImageRect { image, .. }
            | Self::DrawImageClip { image, .. } => Some(image),
            _ => None,
        }
    }
}

// ============================================================================
// OpReader
// ============================================================================

/// Iterator decoding [`DrawOp`]s from a flat op-list.
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug)]
pub struct OpReader<'a> {
    list: &'a [Value],
    pos: usize,
    failed: bool,
}

impl<'a> OpReader<'a> {
    /// Creates a reader over an op-list.
    #[inline]
    #[must_use]
    pub fn new(list: &'a [Value]) -> Self {
        Self {
            list,
            pos: 0,
            failed: false,
        }
    }

    fn read_op(&mut self) -> Result<DrawOp> {
        let position = self.pos;
        let raw = &self.list[position];
        let token = match raw.as_str() {
            Some(token) => token,
            None => {
                return Err(Error::UnknownCanvasOp {
                    token: raw.to_string(),
                    position,
                });
            }
        };

        let n = arity(token).ok_or_else(|| Error::UnknownCanvasOp {
            token: token.to_string(),
            position,
        })?;

        let available = self.list.len() - position - 1;
        if available < n {
            return Err(Error::TruncatedCanvasOp {
                token: token.to_string(),
                arity: n,
                available,
                position,
            });
        }

        let args = Args {
            token,
            values: &self.list[position + 1..position + 1 + n],
        };
        let op = args.decode()?;
        self.pos = position + 1 + n;
        Ok(op)
    }
}

impl Iterator for OpReader<'_> {
    type Item = Result<DrawOp>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.list.len() {
            return None;
        }
        let op = self.read_op();
        if op.is_err() {
            self.failed = true;
        }
        Some(op)
    }
}

// ============================================================================
// Args
// ============================================================================

/// Arguments of one op, already length-checked against the arity table.
struct Args<'a> {
    token: &'a str,
    values: &'a [Value],
}

impl Args<'_> {
    fn num(&self, index: usize) -> Result<f64> {
        let value = &self.values[index];
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(index))
    }

    fn text(&self, index: usize) -> Result<String> {
        match &self.values[index] {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.invalid(index)),
        }
    }

    fn rect(&self, start: usize) -> Result<Rect> {
        Ok(Rect::new(
            self.num(start)?,
            self.num(start + 1)?,
            self.num(start + 2)?,
            self.num(start + 3)?,
        ))
    }

    fn invalid(&self, index: usize) -> Error {
        Error::InvalidCanvasArgument {
            token: self.token.to_string(),
            index,
            value: self.values[index].to_string(),
        }
    }

    fn decode(&self) -> Result<DrawOp> {
        let op = match self.token {
            "strokeRect" => DrawOp::StrokeRect(self.rect(0)?),
            "clearRect" => DrawOp::ClearRect(self.rect(0)?),
            "fillRect" => DrawOp::FillRect(self.rect(0)?),
            "rect" => DrawOp::Rect(self.rect(0)?),
            "fillText" => DrawOp::FillText {
                text: self.text(0)?,
                x: self.num(1)?,
                y: self.num(2)?,
            },
            "strokeText" => DrawOp::StrokeText {
                text: self.text(0)?,
                x: self.num(1)?,
                y: self.num(2)?,
            },
            "arc" => DrawOp::Arc {
                x: self.num(0)?,
                y: self.num(1)?,
                radius: self.num(2)?,
                start_angle: self.num(3)?,
                end_angle: self.num(4)?,
            },
            "ellipse" => DrawOp::Ellipse {
                x: self.num(0)?,
                y: self.num(1)?,
                radius_x: self.num(2)?,
                radius_y: self.num(3)?,
                rotation: self.num(4)?,
                start_angle: self.num(5)?,
                end_angle: self.num(6)?,
            },
            "beginPath" => DrawOp::BeginPath,
            "closePath" => DrawOp::ClosePath,
            "lineTo" => DrawOp::LineTo {
                x: self.num(0)?,
                y: self.num(1)?,
            },
            "moveTo" => DrawOp::MoveTo {
                x: self.num(0)?,
                y: self.num(1)?,
            },
            "bezierCurveTo" => DrawOp::BezierCurveTo {
                cp1x: self.num(0)?,
                cp1y: self.num(1)?,
                cp2x: self.num(2)?,
                cp2y: self.num(3)?,
                x: self.num(4)?,
                y: self.num(5)?,
            },
            "quadraticCurveTo" => DrawOp::QuadraticCurveTo {
                cpx: self.num(0)?,
                cpy: self.num(1)?,
                x: self.num(2)?,
                y: self.num(3)?,
            },
            "arcTo" => DrawOp::ArcTo {
                x1: self.num(0)?,
                y1: self.num(1)?,
                x2: self.num(2)?,
                y2: self.num(3)?,
                radius: self.num(4)?,
            },
            "stroke" => DrawOp::Stroke,
            "fill" => DrawOp::Fill,
            "fillStyle" => DrawOp::FillStyle(self.text(0)?),
            "strokeStyle" => DrawOp::StrokeStyle(self.text(0)?),
            "lineWidth" => DrawOp::LineWidth(self.num(0)?),
            "font" => DrawOp::Font(self.text(0)?),
            "textAlign" => DrawOp::TextAlign(self.text(0)?),
            "textBaseline" => DrawOp::TextBaseline(self.text(0)?),
            "save" => DrawOp::Save,
            "restore" => DrawOp::Restore,
            "rotate" => DrawOp::Rotate(self.num(0)?),
            "translate" => DrawOp::Translate {
                x: self.num(0)?,
                y: self.num(1)?,
            },
            "scale" => DrawOp::Scale {
                x: self.num(0)?,
                y: self.num(1)?,
            },
            "drawImage" => DrawOp::DrawImage {
                image: self.text(0)?,
                x: self.num(1)?,
                y: self.num(2)?,
            },
            "drawImageRect" => DrawOp::DrawImageRect {
                image: self.text(0)?,
                dest: self.rect(1)?,
            },
            "drawImageClip" => DrawOp::DrawImageClip {
                image: self.text(0)?,
                clip: self.rect(1)?,
                dest: self.rect(5)?,
            },
            "reset" => DrawOp::Reset,
            other => {
                return Err(Error::UnknownCanvasOp {
                    token: other.to_string(),
                    position: 0,
                });
            }
        };
        Ok(op)
    }
}

// ============================================================================
// Tests
// ============================================================================
