//! # Geometry Types
//!
//! Pixel-space value types shared by every stage of the layout recovery engine:
//! recognized words with their bounding boxes, normalized rectangles and bands.

use serde::{Deserialize, Serialize};

/// A single recognized word with its absolute pixel bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    /// Recognized text of the word
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Word {
    pub fn new(text: impl Into<String>, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn center_x(&self) -> f64 {
        (f64::from(self.left) + f64::from(self.right)) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (f64::from(self.top) + f64::from(self.bottom)) / 2.0
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Bounding box of the word as a normalized rectangle
    pub fn rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.right, self.bottom)
    }
}

/// Axis-aligned rectangle in image pixel coordinates.
///
/// Construction always normalizes the corners so that `left <= right` and
/// `top <= bottom`. Coordinates are not clamped until [`Rect::clamp_to`] is called,
/// which every pixel-reading stage does before touching the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clamp the rectangle into `[0, image_width] x [0, image_height]`
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Rect {
        let max_x = i32::try_from(image_width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(image_height).unwrap_or(i32::MAX);
        Rect::new(
            self.left.clamp(0, max_x),
            self.top.clamp(0, max_y),
            self.right.clamp(0, max_x),
            self.bottom.clamp(0, max_y),
        )
    }

    /// Smallest rectangle containing both rectangles
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Union of the bounding boxes of all words, `None` for an empty slice
    pub fn bounding<'a, I>(words: I) -> Option<Rect>
    where
        I: IntoIterator<Item = &'a Word>,
    {
        words
            .into_iter()
            .map(Word::rect)
            .reduce(|acc, rect| acc.union(&rect))
    }
}

/// Which part of the table a band covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandKind {
    /// The date header row
    Header,
    /// The duty text below the header
    Body,
}

/// A full-width horizontal strip of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub kind: BandKind,
    pub rect: Rect,
}

impl Band {
    pub fn new(kind: BandKind, rect: Rect) -> Self {
        Self { kind, rect }
    }

    pub fn width(&self) -> i32 {
        self.rect.width()
    }

    pub fn height(&self) -> i32 {
        self.rect.height()
    }
}
