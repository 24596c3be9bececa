//! Binary canvas frame codec.
//!
//! A canvas frame blits a block of RGBA pixels onto a canvas element.
//!
//! # Layout
//!
//! All words are little-endian `u32`:
//!
//! ```text
//! offset  size        field
//! 0       4           magic (0xAAA)
//! 4       4           N, payload length in words
//! 8       4           id length in UTF-16 code units
//! 12      4           header length in words (>= 5)
//! 16      4N          RGBA payload
//! 16+4N   4*header    x, y, w, h, as_draw, [reserved...]
//! ...     2*id_len    target element id, UTF-16LE, 0 terminates early
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::dom::ImageData;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Magic word that starts every canvas frame.
pub const FRAME_MAGIC: u32 = 0xAAA;

/// Fixed prefix: magic, payload words, id length, header words.
pub const PREFIX_BYTES: usize = 16;

/// Words of geometry header the decoder reads.
pub const GEOMETRY_WORDS: usize = 5;

/// Largest pixel region a single frame may expand to.
const MAX_REGION_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// CanvasFrame
// ============================================================================

/// Decoded canvas frame, borrowing its payload from the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasFrame<'a> {
    /// Destination x on the canvas.
    pub x: u32,
    /// Destination y on the canvas.
    pub y: u32,
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
    /// Frame completes a draw; triggers the `canvas_draw` acknowledgement.
    pub as_draw: bool,
    /// Target canvas element id.
    pub target: String,
    /// Raw RGBA payload.
    pub payload: &'a [u8],
}

impl<'a> CanvasFrame<'a> {
    /// Decodes a frame from a binary message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] if the buffer is shorter than the
    /// fixed prefix, the magic is wrong, the header is shorter than five
    /// words, or a declared section runs past the end of the buffer.
    pub fn decode(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < PREFIX_BYTES {
            return Err(Error::invalid_frame(format!(
                "Invalid buffer, {} bytes",
                buffer.len()
            )));
        }

        let magic = word(buffer, 0)?;
        if magic != FRAME_MAGIC {
            return Err(Error::invalid_frame(format!(
                "Unknown binary message type: {magic:x}"
            )));
        }

        let payload_words = word(buffer, 1)? as usize;
        let id_units = word(buffer, 2)? as usize;
        let header_words = word(buffer, 3)? as usize;

        if header_words < GEOMETRY_WORDS {
            return Err(Error::invalid_frame(format!(
                "header has {header_words} words, need {GEOMETRY_WORDS}"
            )));
        }

        let payload_end = payload_words
            .checked_mul(4)
            .and_then(|len| len.checked_add(PREFIX_BYTES))
            .ok_or_else(|| Error::invalid_frame("payload length overflows"))?;
        let header_end = header_words
            .checked_mul(4)
            .and_then(|len| len.checked_add(payload_end))
            .ok_or_else(|| Error::invalid_frame("header length overflows"))?;
        let id_end = id_units
            .checked_mul(2)
            .and_then(|len| len.checked_add(header_end))
            .ok_or_else(|| Error::invalid_frame("id length overflows"))?;

        if id_end > buffer.len() {
            return Err(Error::invalid_frame(format!(
                "frame declares {id_end} bytes, buffer has {}",
                buffer.len()
            )));
        }

        let geometry = payload_end / 4;
        let units = buffer[header_end..id_end]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0);
        let target = char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();

        Ok(Self {
            x: word(buffer, geometry)?,
            y: word(buffer, geometry + 1)?,
            width: word(buffer, geometry + 2)?,
            height: word(buffer, geometry + 3)?,
            as_draw: word(buffer, geometry + 4)? != 0,
            target,
            payload: &buffer[PREFIX_BYTES..payload_end],
        })
    }

    /// Builds the pixel block to composite, clamped to `width * height * 4`.
    ///
    /// A longer payload is truncated and a shorter one is zero-padded.
    /// Returns `None` for a tail frame (no payload) or an empty region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] if the region is unreasonably large.
    pub fn pixels(&self) -> Result<Option<ImageData>> {
        if self.payload.is_empty() || self.width == 0 || self.height == 0 {
            return Ok(None);
        }

        let region = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(4))
            .filter(|&len| len <= MAX_REGION_BYTES)
            .ok_or_else(|| {
                Error::invalid_frame(format!(
                    "region {}x{} is too large",
                    self.width, self.height
                ))
            })?;

        let mut data = vec![0u8; region];
        let copied = region.min(self.payload.len());
        data[..copied].copy_from_slice(&self.payload[..copied]);

        Ok(Some(ImageData::new(self.width, self.height, data)))
    }

    /// Encodes the frame with a five-word header.
    ///
    /// The payload is zero-padded to a whole number of words.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let payload_words = self.payload.len().div_ceil(4);
        let id: Vec<u16> = self.target.encode_utf16().collect();

        let mut out = Vec::with_capacity(
            PREFIX_BYTES + payload_words * 4 + GEOMETRY_WORDS * 4 + id.len() * 2,
        );
        for value in [
            FRAME_MAGIC,
            payload_words as u32,
            id.len() as u32,
            GEOMETRY_WORDS as u32,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(self.payload);
        out.resize(PREFIX_BYTES + payload_words * 4, 0);
        for value in [
            self.x,
            self.y,
            self.width,
            self.height,
            u32::from(self.as_draw),
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for unit in id {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }
}

/// Reads the little-endian word at `index`.
fn word(buffer: &[u8], index: usize) -> Result<u32> {
    let start = index * 4;
    buffer
        .get(start..start + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::invalid_frame(format!("word {index} out of bounds")))
}

// ============================================================================
// Tests
// ============================================================================
