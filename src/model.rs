// Plain-data recognition tree, copied out of native handles.
//
// Point and BoundingBox are #[repr(C)] because the native engine hands out
// pointers to exactly this layout; they are copied bit-for-bit.

use serde::{Deserialize, Serialize};

/// A 2D coordinate in image pixel space.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Quadrilateral around a detected text region.
///
/// Corners are stored in top-left, top-right, bottom-right, bottom-left order.
/// The box is not necessarily axis-aligned: rotated text yields a rotated box.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

/// A single recognized word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub bounding_rect: BoundingBox,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
}

/// A recognized line and its words, in engine reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub bounding_rect: BoundingBox,
    pub words: Vec<OcrWord>,
}

/// Complete recognition result for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Detected rotation in degrees, using the engine's sign convention.
    pub image_angle: f32,
    pub lines: Vec<OcrLine>,
}

impl OcrResult {
    /// Line texts joined by `\n`, without a trailing separator.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&line.text);
        }
        out
    }

    /// Serializes the whole tree as JSON.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|l| l.words.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
