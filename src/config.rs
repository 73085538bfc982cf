use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::allocate::PcuWeights;
use crate::counts::{ClassLabels, DEFAULT_CLASS_LABELS};
use crate::detect::{Detector, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};

const DEFAULT_MODEL_PATH: &str = "model/vehicles.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CYCLE_SECS: f64 = 120.0;

#[derive(Debug, Deserialize, Default)]
struct TrafficConfigFile {
    model: Option<ModelConfigFile>,
    detection: Option<DetectionConfigFile>,
    allocation: Option<AllocationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    input_size: Option<u32>,
    class_labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct AllocationConfigFile {
    cycle_secs: Option<f64>,
    pcu_weights: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub model_path: PathBuf,
    pub input_size: u32,
    pub class_labels: Vec<String>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub cycle_secs: f64,
    pub pcu_overrides: BTreeMap<String, f64>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self::from_file(TrafficConfigFile::default())
    }
}

impl TrafficConfig {
    /// Defaults, then the file named by `TRAFFIC_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRAFFIC_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, but reads `path` instead of consulting `TRAFFIC_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::read(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// File and env layers without validation. Callers layering further
    /// overrides on top must call `validate` themselves.
    pub fn read(path: Option<&Path>) -> Result<Self> {
        let file_cfg = path.map(read_config_file).transpose()?;
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: TrafficConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let allocation = file.allocation.unwrap_or_default();
        Self {
            model_path: model
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_size: model.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            class_labels: model.class_labels.unwrap_or_else(|| {
                DEFAULT_CLASS_LABELS.iter().map(|l| l.to_string()).collect()
            }),
            confidence_threshold: detection
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detection.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            cycle_secs: allocation.cycle_secs.unwrap_or(DEFAULT_CYCLE_SECS),
            pcu_overrides: allocation.pcu_weights.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("TRAFFIC_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }
        if let Ok(value) = std::env::var("TRAFFIC_CONFIDENCE") {
            self.confidence_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("TRAFFIC_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Ok(value) = std::env::var("TRAFFIC_IOU") {
            self.iou_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("TRAFFIC_IOU must be a number in [0, 1]"))?;
        }
        if let Ok(value) = std::env::var("TRAFFIC_CYCLE_SECS") {
            self.cycle_secs = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("TRAFFIC_CYCLE_SECS must be a number of seconds"))?;
        }
        if let Ok(labels) = std::env::var("TRAFFIC_CLASS_LABELS") {
            let parsed = parse_labels(&labels);
            if !parsed.is_empty() {
                self.class_labels = parsed;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("iou_threshold", self.iou_threshold)?;
        if self.input_size == 0 {
            return Err(anyhow!("input_size must be greater than zero"));
        }
        if !(self.cycle_secs.is_finite() && self.cycle_secs > 0.0) {
            return Err(anyhow!("cycle_secs must be greater than zero"));
        }
        if self.class_labels.is_empty() {
            return Err(anyhow!("class_labels must not be empty"));
        }
        for (class, weight) in &self.pcu_overrides {
            if !(weight.is_finite() && *weight >= 0.0) {
                return Err(anyhow!(
                    "pcu weight for {} must be a non-negative number",
                    class
                ));
            }
        }
        Ok(())
    }

    pub fn detector(&self) -> Detector {
        Detector::new(self.confidence_threshold, self.iou_threshold)
    }

    pub fn labels(&self) -> ClassLabels {
        ClassLabels::new(self.class_labels.clone())
    }

    pub fn pcu_weights(&self) -> PcuWeights {
        PcuWeights::with_overrides(&self.pcu_overrides)
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(anyhow!("{} must be within [0, 1], got {}", name, value))
    }
}

/// JSON unless the file extension is `.toml`.
fn read_config_file(path: &Path) -> Result<TrafficConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read traffic config {}", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&raw)
            .with_context(|| format!("malformed TOML in {}", path.display())),
        _ => serde_json::from_str(&raw)
            .with_context(|| format!("malformed JSON in {}", path.display())),
    }
}

/// Comma-separated class labels, lowercased, blanks dropped.
fn parse_labels(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|label| {
            let label = label.trim();
            (!label.is_empty()).then(|| label.to_lowercase())
        })
        .collect()
}
