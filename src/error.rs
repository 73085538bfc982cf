use thiserror::Error;

/// Failures surfaced by detection and batch processing.
///
/// Only `ModelLoad` is fatal to a session. The per-image variants are
/// recorded against the offending image and the rest of the batch continues.
/// A model that cannot report its input shape fails with `Inference`.
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("failed to decode image {source_name}: {reason}")]
    ImageDecode { source_name: String, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
}

pub type TrafficResult<T> = Result<T, TrafficError>;
