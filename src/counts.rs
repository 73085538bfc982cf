//! Tallying detections into per-lane vehicle counts.

use std::path::Path;

use crate::allocate::LaneCounts;
use crate::detect::DetectedObject;

/// Labels emitted by the bundled two-class vehicle model, by class id.
pub const DEFAULT_CLASS_LABELS: [&str; 2] = ["motorcycle", "car"];

/// Class id -> vehicle class name lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

impl ClassLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Name for `class_id`; ids outside the table become `class_<id>`.
    pub fn label(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// Add `objects` to the counts for `lane`.
///
/// The lane entry is created even when `objects` is empty so the lane still
/// takes part in allocation.
pub fn tally(
    counts: &mut LaneCounts,
    lane: &str,
    objects: &[DetectedObject],
    labels: &ClassLabels,
) {
    let per_class = counts.entry(lane.to_string()).or_default();
    for object in objects {
        *per_class.entry(labels.label(object.class_id)).or_insert(0) += 1;
    }
}

/// Lane id derived from an image path: the file stem.
pub fn lane_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn object(class_id: usize) -> DetectedObject {
        DetectedObject {
            class_id,
            confidence: 0.8,
            bounding_box: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
        }
    }

    #[test]
    fn tallies_by_label() {
        let mut counts = LaneCounts::new();
        let labels = ClassLabels::default();
        tally(&mut counts, "north", &[object(1), object(1), object(0)], &labels);
        tally(&mut counts, "north", &[object(1)], &labels);
        tally(&mut counts, "east", &[], &labels);

        assert_eq!(counts["north"]["car"], 3);
        assert_eq!(counts["north"]["motorcycle"], 1);
        assert!(counts["east"].is_empty());
    }

    #[test]
    fn unknown_class_ids_get_placeholder_names() {
        assert_eq!(ClassLabels::default().label(7), "class_7");
    }

    #[test]
    fn lane_is_file_stem() {
        assert_eq!(lane_from_path(Path::new("/demo/lane_north.jpg")), "lane_north");
        assert_eq!(lane_from_path(Path::new("south.png")), "south");
    }
}
