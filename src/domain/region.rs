//! Detected regions and recognized text blocks.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width, at least 1.
    pub width: u32,
    /// Height, at least 1.
    pub height: u32,
}

impl BoundingBox {
    /// Creates a bounding box. Zero extents are raised to 1.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Creates a bounding box from corner coordinates, clamped to an image of
    /// `image_width` × `image_height`.
    ///
    /// The left and top edges are floored, the right and bottom edges ceiled.
    /// Returns `None` when the clamped box is empty.
    pub fn from_corners_clamped(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            return None;
        }
        let left = x1.min(x2).floor().clamp(0.0, image_width as f32) as u32;
        let top = y1.min(y2).floor().clamp(0.0, image_height as f32) as u32;
        let right = x1.max(x2).ceil().clamp(0.0, image_width as f32) as u32;
        let bottom = y1.max(y2).ceil().clamp(0.0, image_height as f32) as u32;
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Area in pixels.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        self.y as f32 + self.height as f32 / 2.0
    }

    /// Returns true if the box is taller than it is wide.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    /// Returns true if the box lies entirely inside a `width` × `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }

    /// Intersection area with another box.
    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) as u64 * (bottom - top) as u64
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union == 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// Detector hint estimating how many characters a text line holds.
///
/// `Long` selects the widest recognizer and is the default when the detector
/// emits no hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CharCountCategory {
    /// Category 1: up to 100 characters.
    #[default]
    Long,
    /// Category 2: up to 50 characters.
    Medium,
    /// Category 3: up to 30 characters.
    Short,
}

impl CharCountCategory {
    /// Maps a raw detector value. Anything other than 2 or 3 is `Long`.
    pub fn from_raw(value: i64) -> Self {
        match value {
            3 => CharCountCategory::Short,
            2 => CharCountCategory::Medium,
            _ => CharCountCategory::Long,
        }
    }

    /// Numeric category (1, 2 or 3).
    pub fn as_raw(self) -> u8 {
        match self {
            CharCountCategory::Long => 1,
            CharCountCategory::Medium => 2,
            CharCountCategory::Short => 3,
        }
    }
}

/// A candidate text line produced by the layout detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    /// Location in the original image.
    pub bbox: BoundingBox,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
    /// Detector class, 0-indexed.
    pub class_id: usize,
    /// Character-count hint used for recognizer selection.
    pub char_count_category: CharCountCategory,
}

impl TextRegion {
    /// Creates a region.
    pub fn new(
        bbox: BoundingBox,
        confidence: f32,
        class_id: usize,
        char_count_category: CharCountCategory,
    ) -> Self {
        Self {
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            class_id,
            char_count_category,
        }
    }
}

/// A recognized text line with its position in the reading sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// The region the text was read from.
    pub region: TextRegion,
    /// Recognized text. May be empty.
    pub text: String,
    /// Recognition confidence.
    pub text_confidence: f32,
    /// 1-indexed position in reading order; 0 until assigned.
    pub reading_order: usize,
}

impl TextBlock {
    /// Creates a block whose reading order is not yet assigned.
    pub fn new(region: TextRegion, text: impl Into<String>, text_confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            text_confidence,
            reading_order: 0,
        }
    }

    /// Shorthand for the region's bounding box.
    pub fn bbox(&self) -> &BoundingBox {
        &self.region.bbox
    }
}
