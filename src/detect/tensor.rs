//! Plain numeric buffers exchanged with the inference backend.
//!
//! Buffers are owned `Vec<f32>` values scoped to a single detection pass;
//! they are dropped when `Detector::detect` returns.

use crate::error::{TrafficError, TrafficResult};

/// Channel ordering expected by a model input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, height, width, 3]`
    Nhwc,
    /// `[1, 3, height, width]`
    Nchw,
}

/// Spatial input requirements reported by a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
}

/// Normalized image batch of size 1, ready for `predict`.
#[derive(Clone, Debug)]
pub struct ModelInput {
    pub spec: InputSpec,
    pub data: Vec<f32>,
}

impl ModelInput {
    pub fn shape(&self) -> [usize; 4] {
        let w = self.spec.width as usize;
        let h = self.spec.height as usize;
        match self.spec.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }
}

/// Raw model output: `[1, 4 + C, N]` or `[4 + C, N]`.
///
/// Column-major with respect to candidates, as YOLOv8 exports it. `rows`
/// transposes so each item is `[cx, cy, w, h, score_0 .. score_C]`.
#[derive(Clone, Debug)]
pub struct RawDetectionTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl RawDetectionTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> TrafficResult<Self> {
        let features = match shape.as_slice() {
            [1, f, _] | [f, _] => *f,
            other => {
                return Err(TrafficError::Inference(format!(
                    "unexpected output shape {:?}",
                    other
                )))
            }
        };
        if features < 5 {
            return Err(TrafficError::Inference(format!(
                "output needs 4 box values and at least one class score, got {} rows",
                features
            )));
        }
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(TrafficError::Inference(format!(
                "output length {} does not match shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    /// Build from candidate-major rows. Used by stub backends.
    pub fn from_rows(rows: &[Vec<f32>]) -> TrafficResult<Self> {
        let features = rows.first().map(Vec::len).unwrap_or(5);
        if rows.iter().any(|r| r.len() != features) {
            return Err(TrafficError::Inference(
                "candidate rows have differing lengths".to_string(),
            ));
        }
        let n = rows.len();
        let mut data = vec![0.0; features * n];
        for (i, row) in rows.iter().enumerate() {
            for (f, value) in row.iter().enumerate() {
                data[f * n + i] = *value;
            }
        }
        Self::new(vec![1, features, n], data)
    }

    fn features(&self) -> usize {
        self.shape[self.shape.len() - 2]
    }

    pub fn num_candidates(&self) -> usize {
        self.shape[self.shape.len() - 1]
    }

    pub fn num_classes(&self) -> usize {
        self.features() - 4
    }

    /// Candidate-major view of the output.
    pub fn rows(&self) -> Vec<Vec<f32>> {
        let n = self.num_candidates();
        let features = self.features();
        (0..n)
            .map(|i| (0..features).map(|f| self.data[f * n + i]).collect())
            .collect()
    }
}
