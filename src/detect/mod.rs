//! Vehicle detection: preprocessing, inference and suppression.

mod backend;
pub mod backends;
mod detector;
pub mod nms;
mod preprocess;
mod result;
mod tensor;

pub use backend::{InferenceModel, SharedModel};
pub use backends::StubModel;
pub use detector::{
    Detector, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, MAX_DETECTIONS,
};
pub use preprocess::prepare_input;
pub use result::{BoundingBox, DetectedObject};
pub use tensor::{InputSpec, ModelInput, RawDetectionTensor, TensorLayout};
