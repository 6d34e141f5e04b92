use crate::detection::RawDetection;
use common::span_debug;

/// Greedy class-agnostic non-maximum suppression.
#[derive(Debug, Clone, Copy)]
pub struct SuppressionFilter {
    iou_threshold: f32,
}

impl SuppressionFilter {
    pub fn new(iou_threshold: f32) -> Self {
        Self { iou_threshold }
    }

    /// Keep the highest-confidence box of every overlapping group.
    ///
    /// Boxes of different classes compete with each other. Equal confidences
    /// keep their input order.
    pub fn apply(&self, mut candidates: Vec<RawDetection>) -> Vec<RawDetection> {
        let _s = span_debug!("suppress");

        if candidates.len() < 2 {
            return candidates;
        }

        // sort_by is stable, which gives the input-order tie-break.
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept = Vec::with_capacity(candidates.len());
        let mut suppressed = vec![false; candidates.len()];

        for i in 0..candidates.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..candidates.len() {
                if !suppressed[j]
                    && candidates[i].bbox.iou(&candidates[j].bbox) > self.iou_threshold
                {
                    suppressed[j] = true;
                }
            }
            kept.push(candidates[i].clone());
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn det(class_id: usize, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox::new(x1, y1, x2, y2),
        }
    }

    #[test]
    fn test_keeps_highest_of_overlapping_pair() {
        let filter = SuppressionFilter::new(0.5);
        let out = filter.apply(vec![
            det(0, 0.7, 0.0, 0.0, 10.0, 10.0),
            det(0, 0.9, 1.0, 1.0, 11.0, 11.0),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn test_suppression_ignores_class() {
        let filter = SuppressionFilter::new(0.5);
        let out = filter.apply(vec![
            det(4, 0.8, 0.0, 0.0, 10.0, 10.0),
            det(0, 0.6, 0.0, 0.0, 10.0, 10.0),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 4);
    }

    #[test]
    fn test_disjoint_boxes_survive() {
        let filter = SuppressionFilter::new(0.5);
        let out = filter.apply(vec![
            det(0, 0.8, 0.0, 0.0, 10.0, 10.0),
            det(1, 0.6, 50.0, 50.0, 60.0, 60.0),
        ]);

        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_overlap_equal_to_threshold_is_kept() {
        let a = det(0, 0.9, 0.0, 0.0, 10.0, 10.0);
        let b = det(1, 0.8, 5.0, 0.0, 15.0, 10.0);
        let iou = a.bbox.iou(&b.bbox);

        assert_eq!(SuppressionFilter::new(iou).apply(vec![a.clone(), b.clone()]).len(), 2);
        assert_eq!(SuppressionFilter::new(iou - 0.01).apply(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_equal_confidence_keeps_input_order() {
        let filter = SuppressionFilter::new(0.5);
        let out = filter.apply(vec![
            det(5, 0.8, 0.0, 0.0, 10.0, 10.0),
            det(6, 0.8, 0.0, 0.0, 10.0, 10.0),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 5);
    }

    #[test]
    fn test_idempotent() {
        let filter = SuppressionFilter::new(0.45);
        let input = vec![
            det(0, 0.95, 0.0, 0.0, 20.0, 20.0),
            det(1, 0.90, 2.0, 2.0, 22.0, 22.0),
            det(2, 0.85, 15.0, 15.0, 35.0, 35.0),
            det(3, 0.80, 30.0, 30.0, 50.0, 50.0),
            det(4, 0.75, 100.0, 100.0, 120.0, 120.0),
            det(5, 0.70, 101.0, 99.0, 121.0, 119.0),
        ];

        let once = filter.apply(input);
        let twice = filter.apply(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert!(SuppressionFilter::new(0.5).apply(Vec::new()).is_empty());
    }
}
