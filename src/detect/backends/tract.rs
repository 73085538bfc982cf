#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceModel;
use crate::detect::tensor::{InputSpec, ModelInput, RawDetectionTensor, TensorLayout};
use crate::error::{TrafficError, TrafficResult};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Tract-based backend for YOLOv8-style ONNX exports.
///
/// Expects a single `[1, 3, H, W]` input and a single `[1, 4 + C, N]`
/// output. Performs no I/O beyond loading the model file.
pub struct TractModel {
    plan: Plan,
    spec: InputSpec,
}

/// Load an ONNX model and fix its input to `input_size` x `input_size`.
pub fn load_model<P: AsRef<Path>>(path: P, input_size: u32) -> TrafficResult<TractModel> {
    let path = path.as_ref();
    TractModel::build(path, input_size).map_err(|e| TrafficError::ModelLoad {
        path: path.display().to_string(),
        reason: format!("{:#}", e),
    })
}

impl TractModel {
    fn build(path: &Path, input_size: u32) -> Result<Self> {
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to read ONNX model {}", path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?;

        let spec = {
            let fact = model.input_fact(0).context("model has no input")?;
            let dims = fact
                .shape
                .as_concrete()
                .ok_or_else(|| anyhow!("model input shape is symbolic"))?;
            match dims {
                [1, 3, h, w] => InputSpec {
                    width: *w as u32,
                    height: *h as u32,
                    layout: TensorLayout::Nchw,
                },
                other => return Err(anyhow!("unsupported input shape {:?}", other)),
            }
        };

        let plan = model
            .into_runnable()
            .context("failed to build runnable ONNX model")?;
        Ok(Self { plan, spec })
    }

    fn run(&self, input: &ModelInput) -> Result<RawDetectionTensor> {
        let tensor = Tensor::from_shape(&input.shape(), &input.data)?;
        let outputs = self.plan.run(tvec!(tensor.into()))?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();
        Ok(RawDetectionTensor::new(shape, data)?)
    }
}

impl InferenceModel for TractModel {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_spec(&self) -> TrafficResult<InputSpec> {
        Ok(self.spec)
    }

    fn predict(&mut self, input: &ModelInput) -> TrafficResult<RawDetectionTensor> {
        if input.spec != self.spec {
            return Err(TrafficError::Inference(format!(
                "input {}x{} does not match model {}x{}",
                input.spec.width, input.spec.height, self.spec.width, self.spec.height
            )));
        }
        self.run(input)
            .map_err(|e| TrafficError::Inference(format!("{:#}", e)))
    }

    fn warm_up(&mut self) -> TrafficResult<()> {
        let zeros = ModelInput {
            spec: self.spec,
            data: vec![0.0; (self.spec.width * self.spec.height * 3) as usize],
        };
        self.predict(&zeros).map(|_| ())
    }
}
