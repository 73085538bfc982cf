//! Traffic PCU
//!
//! Turns still images of traffic lanes into a proportional split of
//! green-light time.
//!
//! # Pipeline
//!
//! 1. `detect`: resize and normalize an image, run the vehicle model, then
//!    decode the raw output with per-candidate argmax and greedy
//!    non-max suppression.
//! 2. `counts`: tally detections per lane by vehicle class.
//! 3. `allocate`: weight counts by passenger-car units and normalize to a
//!    percentage of the signal cycle.
//!
//! `batch` runs steps 1 and 2 for many images concurrently. The model is
//! an explicit `SharedModel` handle owned by the caller; there is no
//! global model cache.

pub mod allocate;
pub mod batch;
pub mod config;
pub mod counts;
pub mod detect;
pub mod error;

pub use allocate::{
    allocate, allocate_with, lane_volumes, lane_volumes_with, to_seconds, LaneCounts,
    LaneDurations, PcuWeights,
};
pub use batch::{analyze_batch, BatchReport, ImageFailure, ImageJob, ImageSource};
pub use config::TrafficConfig;
pub use counts::{lane_from_path, tally, ClassLabels};
pub use detect::{
    BoundingBox, DetectedObject, Detector, InferenceModel, SharedModel, StubModel,
};
pub use error::{TrafficError, TrafficResult};

#[cfg(feature = "backend-tract")]
pub use detect::backends::{load_model, TractModel};
