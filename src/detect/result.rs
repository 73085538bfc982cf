use serde::{Deserialize, Serialize};

/// Axis-aligned box in model input coordinates.
///
/// Coordinates are not clamped; boxes near the frame edge may start at a
/// negative offset or extend past the input size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Build a box from center-form geometry as emitted by the model.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            width: w,
            height: h,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// A single surviving detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub class_id: usize,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}
