//! Reading-order assembly using recursive XY-cut.
//!
//! Boxes are split into groups wherever their projection onto an axis leaves
//! an empty gap, alternating axes until a group cannot be split any further.
//!
//! * Vertical right-to-left pages are cut into horizontal bands first (top to
//!   bottom), each band into columns ordered right to left.
//! * Horizontal left-to-right pages are cut into columns first (left to
//!   right), each column into rows ordered top to bottom.
//!
//! A group that cannot be split is ordered by a fallback key: for vertical
//! pages, right edge descending then top edge; for horizontal pages, top edge
//! then left edge.

use crate::domain::{BoundingBox, TextBlock, WritingDirection};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    fn span(self, b: &BoundingBox) -> (u32, u32) {
        match self {
            Axis::X => (b.x, b.right()),
            Axis::Y => (b.y, b.bottom()),
        }
    }
}

/// Counts, for every coordinate along `axis`, how many boxes cover it.
fn projection_by_bboxes(boxes: &[BoundingBox], indices: &[usize], axis: Axis) -> Vec<u32> {
    let max_end = indices
        .iter()
        .map(|&i| axis.span(&boxes[i]).1 as usize)
        .max()
        .unwrap_or(0);

    let mut projection = vec![0u32; max_end];
    for &i in indices {
        let (start, end) = axis.span(&boxes[i]);
        for slot in &mut projection[start as usize..end as usize] {
            *slot += 1;
        }
    }
    projection
}

/// Splits a projection profile into `[start, end)` runs of covered coordinates.
fn split_projection_profile(profile: &[u32]) -> Vec<(u32, u32)> {
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &count) in profile.iter().enumerate() {
        match (count > 0, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                segments.push((s as u32, i as u32));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        segments.push((s as u32, profile.len() as u32));
    }
    segments
}

struct XyCut<'a> {
    boxes: &'a [BoundingBox],
    direction: WritingDirection,
}

impl XyCut<'_> {
    fn first_axis(&self) -> Axis {
        match self.direction {
            WritingDirection::HorizontalLtr => Axis::X,
            _ => Axis::Y,
        }
    }

    /// Orders segments along an axis in reading order.
    fn order_segments(&self, axis: Axis, segments: &mut [(u32, u32)]) {
        if axis == Axis::X && self.direction != WritingDirection::HorizontalLtr {
            segments.reverse();
        }
    }

    fn fallback_order(&self, indices: &mut [usize]) {
        let boxes = self.boxes;
        match self.direction {
            WritingDirection::HorizontalLtr => {
                indices.sort_by_key(|&i| (boxes[i].y, boxes[i].x, i));
            }
            _ => {
                indices.sort_by_key(|&i| (Reverse(boxes[i].right()), boxes[i].y, i));
            }
        }
    }

    fn cut(&self, indices: Vec<usize>, axis: Axis, split_other: bool, out: &mut Vec<usize>) {
        if indices.len() <= 1 {
            out.extend(indices);
            return;
        }

        let projection = projection_by_bboxes(self.boxes, &indices, axis);
        let mut segments = split_projection_profile(&projection);

        if segments.len() <= 1 {
            if split_other {
                self.cut(indices, axis.other(), false, out);
            } else {
                let mut indices = indices;
                self.fallback_order(&mut indices);
                out.extend(indices);
            }
            return;
        }

        self.order_segments(axis, &mut segments);
        for (start, end) in segments {
            let group: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| {
                    let s = axis.span(&self.boxes[i]).0;
                    s >= start && s < end
                })
                .collect();
            self.cut(group, axis.other(), true, out);
        }
    }
}

/// Returns the indices of `boxes` in reading order.
///
/// The result is a permutation of `0..boxes.len()` and depends only on the
/// boxes and the direction.
pub fn sort_by_xycut(boxes: &[BoundingBox], direction: WritingDirection) -> Vec<usize> {
    if boxes.is_empty() {
        return Vec::new();
    }

    let cutter = XyCut {
        boxes,
        direction: direction.resolve(boxes),
    };
    let mut order = Vec::with_capacity(boxes.len());
    cutter.cut(
        (0..boxes.len()).collect(),
        cutter.first_axis(),
        true,
        &mut order,
    );

    // Every box starts inside exactly one segment, so this only guards the permutation.
    let mut seen = vec![false; boxes.len()];
    order.retain(|&i| !std::mem::replace(&mut seen[i], true));
    order.extend((0..boxes.len()).filter(|&i| !seen[i]));
    order
}

/// Assigns reading order to recognized blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingOrderAssembler {
    direction: WritingDirection,
}

impl ReadingOrderAssembler {
    pub fn new(direction: WritingDirection) -> Self {
        Self { direction }
    }

    /// Reorders `blocks` into reading order and sets each `reading_order` to
    /// its 1-based position. Geometry and text are untouched and blocks with
    /// empty text are kept.
    pub fn process(&self, blocks: Vec<TextBlock>) -> Vec<TextBlock> {
        let boxes: Vec<BoundingBox> = blocks.iter().map(|b| *b.bbox()).collect();
        let order = sort_by_xycut(&boxes, self.direction);

        let mut slots: Vec<Option<TextBlock>> = blocks.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .enumerate()
            .map(|(pos, mut block)| {
                block.reading_order = pos + 1;
                block
            })
            .collect()
    }
}
