//! Passenger-car-unit weighted green-time allocation.
//!
//! Each lane's vehicle counts are converted into a PCU volume, and the
//! cycle is split in proportion to volume. Output is a percentage of the
//! cycle so callers can scale it to any real cycle length.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lane id -> vehicle class name -> count.
pub type LaneCounts = BTreeMap<String, BTreeMap<String, u32>>;

/// Lane id -> percentage of the cycle in [0, 100].
pub type LaneDurations = BTreeMap<String, f64>;

/// Weight applied to vehicle classes missing from the table.
pub const DEFAULT_PCU_WEIGHT: f64 = 1.0;

/// PCU factor per vehicle class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PcuWeights {
    weights: BTreeMap<String, f64>,
}

impl Default for PcuWeights {
    fn default() -> Self {
        let weights = [("car", 1.0), ("motorcycle", 0.25), ("bus", 2.5), ("truck", 3.0)]
            .into_iter()
            .map(|(class, weight)| (class.to_string(), weight))
            .collect();
        Self { weights }
    }
}

impl PcuWeights {
    /// Default table with `overrides` merged on top.
    pub fn with_overrides(overrides: &BTreeMap<String, f64>) -> Self {
        let mut table = Self::default();
        for (class, weight) in overrides {
            table.weights.insert(class.clone(), *weight);
        }
        table
    }

    pub fn weight(&self, class: &str) -> f64 {
        self.weights
            .get(class)
            .copied()
            .unwrap_or(DEFAULT_PCU_WEIGHT)
    }

    /// Weighted volume of a single lane.
    pub fn volume(&self, counts: &BTreeMap<String, u32>) -> f64 {
        counts
            .iter()
            .map(|(class, count)| f64::from(*count) * self.weight(class))
            .sum()
    }
}

/// PCU volume per lane using the default weights.
pub fn lane_volumes(counts: &LaneCounts) -> BTreeMap<String, f64> {
    lane_volumes_with(&PcuWeights::default(), counts)
}

pub fn lane_volumes_with(weights: &PcuWeights, counts: &LaneCounts) -> BTreeMap<String, f64> {
    counts
        .iter()
        .map(|(lane, classes)| (lane.clone(), weights.volume(classes)))
        .collect()
}

/// Split the cycle across lanes using the default weights.
pub fn allocate(counts: &LaneCounts) -> LaneDurations {
    allocate_with(&PcuWeights::default(), counts)
}

/// Split the cycle across lanes in proportion to PCU volume.
///
/// Every lane in the input appears in the output. When no lane carries any
/// volume all durations are zero.
pub fn allocate_with(weights: &PcuWeights, counts: &LaneCounts) -> LaneDurations {
    let volumes = lane_volumes_with(weights, counts);
    let total: f64 = volumes.values().sum();

    volumes
        .into_iter()
        .map(|(lane, volume)| {
            let share = if total > 0.0 {
                round2(volume / total * 100.0)
            } else {
                0.0
            };
            (lane, share)
        })
        .collect()
}

/// Convert cycle percentages to seconds of a `cycle_secs` cycle.
pub fn to_seconds(durations: &LaneDurations, cycle_secs: f64) -> BTreeMap<String, f64> {
    durations
        .iter()
        .map(|(lane, pct)| (lane.clone(), round2(pct / 100.0 * cycle_secs)))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
