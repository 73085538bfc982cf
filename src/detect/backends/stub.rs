use crate::detect::backend::InferenceModel;
use crate::detect::tensor::{InputSpec, ModelInput, RawDetectionTensor, TensorLayout};
use crate::error::{TrafficError, TrafficResult};

/// Deterministic backend for tests and demos.
///
/// Returns the same configured candidates for every input, regardless of
/// pixel content.
pub struct StubModel {
    spec: InputSpec,
    rows: Vec<Vec<f32>>,
    fail_predict: bool,
    predictions: u64,
}

impl StubModel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            spec: InputSpec {
                width,
                height,
                layout: TensorLayout::Nhwc,
            },
            rows: Vec::new(),
            fail_predict: false,
            predictions: 0,
        }
    }

    /// Add a center-form candidate with per-class scores.
    pub fn with_candidate(mut self, cx: f32, cy: f32, w: f32, h: f32, scores: &[f32]) -> Self {
        let mut row = vec![cx, cy, w, h];
        row.extend_from_slice(scores);
        self.rows.push(row);
        self
    }

    /// Make every `predict` call fail.
    pub fn failing(mut self) -> Self {
        self.fail_predict = true;
        self
    }

    /// Number of `predict` calls served.
    pub fn predictions(&self) -> u64 {
        self.predictions
    }
}

impl InferenceModel for StubModel {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_spec(&self) -> TrafficResult<InputSpec> {
        if self.spec.width == 0 || self.spec.height == 0 {
            return Err(TrafficError::Inference(
                "model input shape unavailable: stub model has zero-sized input".to_string(),
            ));
        }
        Ok(self.spec)
    }

    fn predict(&mut self, input: &ModelInput) -> TrafficResult<RawDetectionTensor> {
        if self.fail_predict {
            return Err(TrafficError::Inference("stub configured to fail".to_string()));
        }
        if input.spec != self.spec {
            return Err(TrafficError::Inference(format!(
                "input {}x{} does not match model {}x{}",
                input.spec.width, input.spec.height, self.spec.width, self.spec.height
            )));
        }
        self.predictions += 1;
        RawDetectionTensor::from_rows(&self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::preprocess::prepare_input;
    use crate::detect::Detector;
    use image::RgbImage;

    #[test]
    fn stub_counts_predictions() {
        let mut model = StubModel::new(4, 4).with_candidate(1.0, 1.0, 2.0, 2.0, &[0.5]);
        let input = prepare_input(&RgbImage::new(9, 9), model.input_spec().unwrap());
        let raw = model.predict(&input).unwrap();
        assert_eq!(raw.num_candidates(), 1);
        assert_eq!(model.predictions(), 1);
    }

    #[test]
    fn zero_sized_input_fails_detection_as_inference_error() {
        let mut model = StubModel::new(0, 640).with_candidate(1.0, 1.0, 2.0, 2.0, &[0.9]);
        let err = match Detector::default().detect(&RgbImage::new(4, 4), &mut model) {
            Err(err) => err,
            Ok(_) => panic!("zero-sized model input should fail"),
        };
        assert!(matches!(err, TrafficError::Inference(_)));
        assert_eq!(model.predictions(), 0);
    }
}
