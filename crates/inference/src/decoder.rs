use crate::detection::{BoundingBox, RawDetection};
use crate::error::DecodeError;
use common::span_debug;
use ndarray::{ArrayD, ArrayView2, Axis, Ix2};
use serde::Deserialize;

/// How raw class scores are turned into probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreActivation {
    /// Apply the logistic function only when some score falls outside [0, 1].
    #[default]
    Auto,
    Sigmoid,
    Identity,
}

#[derive(Debug, Clone, Copy)]
pub struct DecoderSettings {
    pub confidence_threshold: f32,
    pub min_box_px: f32,
    pub max_candidates: Option<usize>,
    pub activation: ScoreActivation,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            min_box_px: 2.0,
            max_candidates: None,
            activation: ScoreActivation::Auto,
        }
    }
}

/// Turns an anchor-per-row output tensor into candidate detections.
///
/// Each row is `cx, cy, w, h, score_0 .. score_{n-1}`. The tensor may arrive
/// as `[rows, width]` or transposed as `[width, rows]`, with any number of
/// leading batch dimensions of size 1.
#[derive(Debug, Clone)]
pub struct OutputDecoder {
    num_classes: usize,
    settings: DecoderSettings,
}

impl OutputDecoder {
    pub fn new(num_classes: usize, settings: DecoderSettings) -> Self {
        Self {
            num_classes,
            settings,
        }
    }

    /// Decode one tensor.
    ///
    /// `input_size` is the image size the model saw, `original_size` the
    /// frame the boxes must be mapped back onto.
    pub fn decode(
        &self,
        tensor: &ArrayD<f32>,
        input_size: (u32, u32),
        original_size: (u32, u32),
    ) -> Result<Vec<RawDetection>, DecodeError> {
        let _s = span_debug!("decode");

        let rows = anchor_rows(tensor)?;
        let width = rows.ncols();
        if width != 4 + self.num_classes {
            return Err(DecodeError::WidthMismatch {
                actual: width,
                classes: self.num_classes,
            });
        }

        let limit = self
            .settings
            .max_candidates
            .unwrap_or(rows.nrows())
            .min(rows.nrows());
        let rows = rows.slice_axis(Axis(0), (0..limit).into());
        if rows.nrows() == 0 {
            return Ok(Vec::new());
        }

        let boxes = rows.slice_axis(Axis(1), (0..4).into());
        let scores = rows.slice_axis(Axis(1), (4..width).into());

        let apply_sigmoid = match self.settings.activation {
            ScoreActivation::Sigmoid => true,
            ScoreActivation::Identity => false,
            ScoreActivation::Auto => scores.iter().any(|s| !(0.0..=1.0).contains(s)),
        };

        let (orig_w, orig_h) = (original_size.0 as f32, original_size.1 as f32);
        let normalized = boxes.iter().all(|v| v.abs() <= 1.0);
        let (sx, sy) = if normalized {
            (orig_w, orig_h)
        } else {
            (
                orig_w / input_size.0.max(1) as f32,
                orig_h / input_size.1.max(1) as f32,
            )
        };

        let min_extent = self.settings.min_box_px.max(f32::MIN_POSITIVE);
        let mut detections = Vec::new();

        for (geometry, class_scores) in boxes.outer_iter().zip(scores.outer_iter()) {
            let Some((class_id, raw)) = argmax(class_scores.iter().copied()) else {
                continue;
            };
            let confidence = if apply_sigmoid { sigmoid(raw) } else { raw };
            if !(confidence >= self.settings.confidence_threshold) {
                continue;
            }

            let w = geometry[2] * sx;
            let h = geometry[3] * sy;
            if !(w > 0.0 && h > 0.0) {
                continue;
            }
            let cx = geometry[0] * sx;
            let cy = geometry[1] * sy;

            let x1 = (cx - w / 2.0).clamp(0.0, orig_w);
            let y1 = (cy - h / 2.0).clamp(0.0, orig_h);
            let x2 = (cx + w / 2.0).clamp(0.0, orig_w);
            let y2 = (cy + h / 2.0).clamp(0.0, orig_h);

            if !(x2 - x1 >= min_extent && y2 - y1 >= min_extent) {
                continue;
            }

            detections.push(RawDetection {
                class_id,
                confidence,
                bbox: BoundingBox::new(x1, y1, x2, y2),
            });
        }

        tracing::trace!(
            candidates = limit,
            kept = detections.len(),
            sigmoid = apply_sigmoid,
            normalized,
            "Decoded output tensor"
        );

        Ok(detections)
    }
}

/// Row width of a model output after squeezing and orienting it.
pub fn row_width(tensor: &ArrayD<f32>) -> Result<usize, DecodeError> {
    Ok(anchor_rows(tensor)?.ncols())
}

/// Squeeze leading unit dimensions, then orient so candidates are rows.
fn anchor_rows(tensor: &ArrayD<f32>) -> Result<ArrayView2<'_, f32>, DecodeError> {
    let mut view = tensor.view();
    while view.ndim() > 2 && view.shape()[0] == 1 {
        view = view.index_axis_move(Axis(0), 0);
    }

    let view = view
        .into_dimensionality::<Ix2>()
        .map_err(|_| DecodeError::Rank(tensor.shape().to_vec()))?;

    if view.nrows() < view.ncols() {
        Ok(view.reversed_axes())
    } else {
        Ok(view)
    }
}

/// Index and value of the largest score; the first one wins on ties.
fn argmax(scores: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
    scores
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if s <= b => best,
            _ if s.is_nan() => best,
            _ => Some((i, s)),
        })
}

/// Sigmoid activation function
#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    const CLASSES: usize = 3;

    fn tensor(rows: &[[f32; 4 + CLASSES]]) -> ArrayD<f32> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Array::from_shape_vec(IxDyn(&[1, rows.len(), 4 + CLASSES]), flat).unwrap()
    }

    fn decoder() -> OutputDecoder {
        OutputDecoder::new(CLASSES, DecoderSettings::default())
    }

    #[test]
    fn test_decodes_pixel_space_rows() {
        let t = tensor(&[[160.0, 160.0, 32.0, 64.0, 0.1, 0.9, 0.2]]);
        let dets = decoder().decode(&t, (320, 320), (320, 320)).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(dets[0].bbox, BoundingBox::new(144.0, 128.0, 176.0, 192.0));
    }

    #[test]
    fn test_scales_axes_independently_for_non_square_frames() {
        let t = tensor(&[[160.0, 160.0, 32.0, 32.0, 0.9, 0.0, 0.0]]);
        let dets = decoder().decode(&t, (320, 320), (640, 480)).unwrap();

        let b = dets[0].bbox;
        assert!((b.x1 - 288.0).abs() < 1e-4);
        assert!((b.x2 - 352.0).abs() < 1e-4);
        assert!((b.y1 - 216.0).abs() < 1e-4);
        assert!((b.y2 - 264.0).abs() < 1e-4);
    }

    #[test]
    fn test_normalized_boxes_scale_by_original_size() {
        let t = tensor(&[[0.5, 0.5, 0.25, 0.5, 0.9, 0.0, 0.0]]);
        let dets = decoder().decode(&t, (320, 320), (640, 480)).unwrap();

        assert_eq!(dets[0].bbox, BoundingBox::new(240.0, 120.0, 400.0, 360.0));
    }

    #[test]
    fn test_transposed_layout_is_detected() {
        // Same candidates exported features-first as [1, 7, 8].
        let rows = [
            [100.0, 100.0, 20.0, 20.0, 0.9, 0.1, 0.1],
            [200.0, 200.0, 20.0, 20.0, 0.1, 0.8, 0.1],
            [50.0, 50.0, 20.0, 20.0, 0.1, 0.1, 0.7],
            [250.0, 50.0, 20.0, 20.0, 0.1, 0.1, 0.1],
            [10.0, 10.0, 4.0, 4.0, 0.1, 0.1, 0.1],
            [20.0, 20.0, 4.0, 4.0, 0.1, 0.1, 0.1],
            [30.0, 30.0, 4.0, 4.0, 0.1, 0.1, 0.1],
            [40.0, 40.0, 4.0, 4.0, 0.1, 0.1, 0.1],
        ];
        let anchors_first = tensor(&rows);
        let features_first = anchors_first
            .clone()
            .permuted_axes(IxDyn(&[0, 2, 1]))
            .as_standard_layout()
            .to_owned();
        assert_eq!(features_first.shape(), &[1, 7, 8]);

        let a = decoder().decode(&anchors_first, (320, 320), (320, 320)).unwrap();
        let b = decoder().decode(&features_first, (320, 320), (320, 320)).unwrap();

        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_logits_trigger_sigmoid() {
        // 2.0 is outside [0, 1] so every score is treated as a logit.
        let t = tensor(&[[100.0, 100.0, 20.0, 20.0, 2.0, -3.0, 0.0]]);
        let dets = decoder().decode(&t, (320, 320), (320, 320)).unwrap();

        assert_eq!(dets.len(), 1);
        assert!((dets[0].confidence - sigmoid(2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_probabilities_are_left_alone() {
        let t = tensor(&[[100.0, 100.0, 20.0, 20.0, 0.6, 0.3, 0.0]]);
        let dets = decoder().decode(&t, (320, 320), (320, 320)).unwrap();

        assert!((dets[0].confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_identity_override_skips_heuristic() {
        let settings = DecoderSettings {
            activation: ScoreActivation::Identity,
            ..Default::default()
        };
        let t = tensor(&[[100.0, 100.0, 20.0, 20.0, 2.0, 0.0, 0.0]]);
        let dets = OutputDecoder::new(CLASSES, settings)
            .decode(&t, (320, 320), (320, 320))
            .unwrap();

        assert_eq!(dets[0].confidence, 2.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let t = tensor(&[
            [100.0, 100.0, 20.0, 20.0, 0.5, 0.0, 0.0],
            [200.0, 200.0, 20.0, 20.0, 0.49, 0.0, 0.0],
        ]);
        let dets = decoder().decode(&t, (320, 320), (320, 320)).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].confidence, 0.5);
    }

    #[test]
    fn test_degenerate_boxes_rejected() {
        let t = tensor(&[
            [100.0, 100.0, 0.0, 20.0, 0.9, 0.0, 0.0],
            [100.0, 100.0, -5.0, 20.0, 0.9, 0.0, 0.0],
            [100.0, 100.0, 1.0, 20.0, 0.9, 0.0, 0.0],
            // Entirely outside the frame: clamps to zero width.
            [400.0, 100.0, 20.0, 20.0, 0.9, 0.0, 0.0],
        ]);
        let dets = decoder().decode(&t, (320, 320), (320, 320)).unwrap();

        assert!(dets.is_empty());
    }

    #[test]
    fn test_boxes_clamped_to_frame() {
        let t = tensor(&[
            [5.0, 5.0, 40.0, 40.0, 0.9, 0.0, 0.0],
            [315.0, 310.0, 40.0, 40.0, 0.0, 0.9, 0.0],
        ]);
        let dets = decoder().decode(&t, (320, 320), (320, 240)).unwrap();

        assert_eq!(dets.len(), 2);
        for d in dets {
            let b = d.bbox;
            assert!(0.0 <= b.x1 && b.x1 < b.x2 && b.x2 <= 320.0);
            assert!(0.0 <= b.y1 && b.y1 < b.y2 && b.y2 <= 240.0);
        }
    }

    #[test]
    fn test_width_mismatch_is_an_error() {
        let t = Array::from_shape_vec(IxDyn(&[1, 10, 9]), vec![0.0; 90]).unwrap();
        let err = decoder().decode(&t, (320, 320), (320, 320)).unwrap_err();

        assert!(matches!(
            err,
            DecodeError::WidthMismatch {
                actual: 9,
                classes: 3
            }
        ));
    }

    #[test]
    fn test_rank_error_for_batched_output() {
        let t = Array::from_shape_vec(IxDyn(&[2, 10, 7]), vec![0.0; 140]).unwrap();
        assert!(matches!(
            decoder().decode(&t, (320, 320), (320, 320)),
            Err(DecodeError::Rank(_))
        ));
    }

    #[test]
    fn test_candidate_cap_limits_scan() {
        let settings = DecoderSettings {
            max_candidates: Some(1),
            ..Default::default()
        };
        let t = tensor(&[
            [100.0, 100.0, 20.0, 20.0, 0.9, 0.0, 0.0],
            [200.0, 200.0, 20.0, 20.0, 0.9, 0.0, 0.0],
        ]);
        let dets = OutputDecoder::new(CLASSES, settings)
            .decode(&t, (320, 320), (320, 320))
            .unwrap();

        assert_eq!(dets.len(), 1);
    }

    #[test]
    fn test_row_width_handles_both_orientations() {
        let t = Array::from_shape_vec(IxDyn(&[1, 11, 2100]), vec![0.0; 11 * 2100]).unwrap();
        assert_eq!(row_width(&t).unwrap(), 11);
    }

    #[test]
    fn test_argmax_first_wins_on_ties() {
        assert_eq!(argmax([0.3, 0.7, 0.7].into_iter()), Some((1, 0.7)));
        assert_eq!(argmax(std::iter::empty()), None);
    }
}
