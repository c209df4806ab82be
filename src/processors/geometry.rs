//! Greedy non-maximum suppression over detected regions.

use crate::domain::TextRegion;
use std::cmp::Ordering;

/// Orders regions by descending confidence, breaking ties by top edge and then left edge.
fn confidence_order(a: &TextRegion, b: &TextRegion) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.bbox.y.cmp(&b.bbox.y))
        .then_with(|| a.bbox.x.cmp(&b.bbox.x))
}

/// Computes the indices kept by greedy NMS.
///
/// Candidates are visited in descending confidence; a candidate is kept only
/// if its IoU with every region kept so far is below `iou_threshold`.
/// The returned indices are in keep order.
pub fn compute_nms_keep_indices(regions: &[TextRegion], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..regions.len()).collect();
    order.sort_by(|&a, &b| confidence_order(&regions[a], &regions[b]));

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        let overlaps = keep
            .iter()
            .any(|&k| regions[k].bbox.iou(&regions[i].bbox) >= iou_threshold);
        if !overlaps {
            keep.push(i);
        }
    }
    keep
}

/// Applies greedy NMS, returning the surviving regions in keep order.
pub fn non_max_suppression(regions: Vec<TextRegion>, iou_threshold: f32) -> Vec<TextRegion> {
    if regions.is_empty() {
        return regions;
    }
    let keep = compute_nms_keep_indices(&regions, iou_threshold);
    let mut slots: Vec<Option<TextRegion>> = regions.into_iter().map(Some).collect();
    keep.into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundingBox, CharCountCategory};
    use proptest::prelude::*;

    fn region(x: u32, y: u32, w: u32, h: u32, confidence: f32) -> TextRegion {
        TextRegion::new(
            BoundingBox::new(x, y, w, h),
            confidence,
            1,
            CharCountCategory::Long,
        )
    }

    #[test]
    fn test_suppresses_overlapping_lower_confidence() {
        let regions = vec![
            region(0, 0, 100, 20, 0.6),
            region(2, 0, 100, 20, 0.9),
            region(0, 50, 100, 20, 0.5),
        ];
        let kept = non_max_suppression(regions, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.5);
    }

    #[test]
    fn test_ties_break_by_position() {
        let regions = vec![region(0, 50, 10, 10, 0.8), region(0, 10, 10, 10, 0.8)];
        let keep = compute_nms_keep_indices(&regions, 0.5);
        assert_eq!(keep, vec![1, 0]);
    }

    #[test]
    fn test_empty_input() {
        assert!(non_max_suppression(Vec::new(), 0.5).is_empty());
    }

    fn arb_region() -> impl Strategy<Value = TextRegion> {
        (0u32..200, 0u32..200, 1u32..80, 1u32..80, 0.0f32..1.0)
            .prop_map(|(x, y, w, h, c)| region(x, y, w, h, c))
    }

    proptest! {
        #[test]
        fn nms_is_idempotent(regions in prop::collection::vec(arb_region(), 0..40)) {
            let once = non_max_suppression(regions, 0.5);
            let twice = non_max_suppression(once.clone(), 0.5);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn kept_regions_do_not_overlap(regions in prop::collection::vec(arb_region(), 0..40)) {
            let kept = non_max_suppression(regions, 0.5);
            for (i, a) in kept.iter().enumerate() {
                for b in kept.iter().skip(i + 1) {
                    prop_assert!(a.bbox.iou(&b.bbox) < 0.5);
                }
            }
        }
    }
}
