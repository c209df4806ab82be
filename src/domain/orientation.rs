//! Writing direction of a page.
//!
//! Reading order depends on how the script is laid out. Vertical Japanese
//! text runs in columns from right to left; horizontal text runs in rows
//! from top to bottom.

use super::region::BoundingBox;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reading-order policy for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingDirection {
    /// Decide per page from the shape of the detected lines.
    #[default]
    Auto,
    /// Columns read top to bottom, ordered right to left.
    VerticalRtl,
    /// Rows read left to right, ordered top to bottom.
    HorizontalLtr,
}

impl WritingDirection {
    /// Resolves `Auto` against the boxes of a page.
    ///
    /// A page is vertical when at least half of its boxes are taller than
    /// wide. An empty page resolves to `VerticalRtl`.
    pub fn resolve(self, boxes: &[BoundingBox]) -> WritingDirection {
        match self {
            WritingDirection::Auto => {
                if boxes.is_empty() {
                    return WritingDirection::VerticalRtl;
                }
                let portrait = boxes.iter().filter(|b| b.is_portrait()).count();
                if portrait * 2 >= boxes.len() {
                    WritingDirection::VerticalRtl
                } else {
                    WritingDirection::HorizontalLtr
                }
            }
            other => other,
        }
    }
}

impl FromStr for WritingDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(WritingDirection::Auto),
            "vertical" | "vertical_rtl" => Ok(WritingDirection::VerticalRtl),
            "horizontal" | "horizontal_ltr" => Ok(WritingDirection::HorizontalLtr),
            other => Err(format!("unknown writing direction '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(w: u32, h: u32) -> BoundingBox {
        BoundingBox::new(0, 0, w, h)
    }

    #[test]
    fn test_auto_resolves_by_shape() {
        let tall = vec![block(10, 80), block(12, 90), block(100, 10)];
        assert_eq!(
            WritingDirection::Auto.resolve(&tall),
            WritingDirection::VerticalRtl
        );
        let wide = vec![block(100, 10), block(120, 12), block(10, 80)];
        assert_eq!(
            WritingDirection::Auto.resolve(&wide),
            WritingDirection::HorizontalLtr
        );
    }

    #[test]
    fn test_explicit_direction_is_kept() {
        let wide = vec![block(100, 10)];
        assert_eq!(
            WritingDirection::VerticalRtl.resolve(&wide),
            WritingDirection::VerticalRtl
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "horizontal".parse::<WritingDirection>().unwrap(),
            WritingDirection::HorizontalLtr
        );
        assert_eq!(
            "vertical-rtl".parse::<WritingDirection>().unwrap(),
            WritingDirection::VerticalRtl
        );
        assert!("diagonal".parse::<WritingDirection>().is_err());
    }
}
