use std::sync::{Arc, Mutex};

use crate::error::{TrafficError, TrafficResult};

use super::tensor::{InputSpec, ModelInput, RawDetectionTensor};

/// Inference backend contract.
///
/// Backends receive a normalized input batch and return the raw output
/// tensor. They must not retain the input beyond the `predict` call.
/// `predict` takes `&mut self`; backends that hold scratch state are not
/// assumed to be reentrant.
pub trait InferenceModel: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Expected spatial input and channel layout.
    fn input_spec(&self) -> TrafficResult<InputSpec>;

    /// Run the model on a single batch.
    fn predict(&mut self, input: &ModelInput) -> TrafficResult<RawDetectionTensor>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> TrafficResult<()> {
        Ok(())
    }
}

/// Caller-owned model handle shared across detection tasks.
///
/// The mutex keeps a single prediction in flight at a time.
#[derive(Clone)]
pub struct SharedModel {
    inner: Arc<Mutex<dyn InferenceModel>>,
    name: &'static str,
}

impl SharedModel {
    pub fn new<M: InferenceModel + 'static>(model: M) -> Self {
        let name = model.name();
        Self {
            inner: Arc::new(Mutex::new(model)),
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `f` with exclusive access to the model.
    pub fn with_model<T>(
        &self,
        f: impl FnOnce(&mut dyn InferenceModel) -> TrafficResult<T>,
    ) -> TrafficResult<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| TrafficError::Inference("model lock poisoned".to_string()))?;
        f(&mut *guard)
    }
}
