use image::RgbImage;

use crate::error::TrafficResult;

use super::backend::InferenceModel;
use super::nms::{corners_from_center, non_max_suppression, CornerBox, NmsParams};
use super::preprocess::prepare_input;
use super::result::{BoundingBox, DetectedObject};
use super::tensor::RawDetectionTensor;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.09;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
/// Upper bound on detections returned from a single pass.
pub const MAX_DETECTIONS: usize = 100;

/// Detection postprocessing with tunable thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detector {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl Detector {
    pub fn new(confidence_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
        }
    }

    /// Run the model on `image` and return suppressed detections in model
    /// input coordinates.
    pub fn detect(
        &self,
        image: &RgbImage,
        model: &mut dyn InferenceModel,
    ) -> TrafficResult<Vec<DetectedObject>> {
        let spec = model.input_spec()?;
        let input = prepare_input(image, spec);
        let raw = model.predict(&input)?;
        let detections = self.postprocess(&raw);
        log::debug!(
            "{}: {} candidates, {} kept",
            model.name(),
            raw.num_candidates(),
            detections.len()
        );
        Ok(detections)
    }

    /// Decode a raw output tensor into non-overlapping detections.
    pub fn postprocess(&self, raw: &RawDetectionTensor) -> Vec<DetectedObject> {
        let rows = raw.rows();
        let mut corners: Vec<CornerBox> = Vec::with_capacity(rows.len());
        let mut scores = Vec::with_capacity(rows.len());
        let mut class_ids = Vec::with_capacity(rows.len());

        for row in &rows {
            let (class_id, score) = argmax(&row[4..]);
            corners.push(corners_from_center(row[0], row[1], row[2], row[3]));
            scores.push(score);
            class_ids.push(class_id);
        }

        let kept = non_max_suppression(
            &corners,
            &scores,
            NmsParams {
                max_output: MAX_DETECTIONS,
                iou_threshold: self.iou_threshold,
                score_threshold: self.confidence_threshold,
            },
        );

        kept.into_iter()
            .map(|i| {
                let row = &rows[i];
                DetectedObject {
                    class_id: class_ids[i],
                    confidence: scores[i],
                    bounding_box: BoundingBox::from_center(row[0], row[1], row[2], row[3]),
                }
            })
            .collect()
    }
}

/// Index and value of the maximum score; the first index wins ties.
fn argmax(scores: &[f32]) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for (i, &score) in scores.iter().enumerate() {
        if score > best.1 {
            best = (i, score);
        }
    }
    best
}
