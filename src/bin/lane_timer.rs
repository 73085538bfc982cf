//! lane_timer - split a signal cycle across lanes from lane photos

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use traffic_pcu::{
    allocate_with, analyze_batch, lane_volumes_with, to_seconds, ImageFailure, ImageJob,
    ImageSource, LaneCounts, LaneDurations, SharedModel, StubModel, TrafficConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Images to analyze, as `lane=path` or `path` (lane = file stem).
    #[arg(required = true)]
    images: Vec<String>,
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "TRAFFIC_CONFIG")]
    config: Option<PathBuf>,
    /// ONNX model path, overrides the config.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Use a deterministic stub model instead of loading one.
    #[arg(long)]
    stub: bool,
    /// Signal cycle length in seconds.
    #[arg(long)]
    cycle: Option<f64>,
    /// Minimum detection confidence.
    #[arg(long)]
    confidence: Option<f32>,
    /// IoU at which overlapping detections are suppressed.
    #[arg(long)]
    iou: Option<f32>,
}

#[derive(Serialize)]
struct Report {
    counts: LaneCounts,
    volumes: BTreeMap<String, f64>,
    percentages: LaneDurations,
    seconds: BTreeMap<String, f64>,
    cycle_secs: f64,
    failures: Vec<ImageFailure>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = TrafficConfig::read(args.config.as_deref())?;
    if let Some(model) = args.model.clone() {
        cfg.model_path = model;
    }
    if let Some(cycle) = args.cycle {
        cfg.cycle_secs = cycle;
    }
    if let Some(confidence) = args.confidence {
        cfg.confidence_threshold = confidence;
    }
    if let Some(iou) = args.iou {
        cfg.iou_threshold = iou;
    }
    cfg.validate()?;

    let jobs = args
        .images
        .iter()
        .map(|spec| parse_job(spec))
        .collect::<Result<Vec<_>>>()?;

    let model = open_model(&cfg, args.stub)?;
    log::info!(
        "analyzing {} images with {} model (confidence {}, iou {})",
        jobs.len(),
        model.name(),
        cfg.confidence_threshold,
        cfg.iou_threshold
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("failed to start runtime")?;
    let labels = cfg.labels();
    let batch = runtime.block_on(analyze_batch(model, cfg.detector(), &labels, jobs));

    let weights = cfg.pcu_weights();
    let percentages = allocate_with(&weights, &batch.counts);
    let report = Report {
        volumes: lane_volumes_with(&weights, &batch.counts),
        seconds: to_seconds(&percentages, cfg.cycle_secs),
        percentages,
        counts: batch.counts,
        cycle_secs: cfg.cycle_secs,
        failures: batch.failures,
    };
    if !report.failures.is_empty() {
        log::warn!("{} images produced no result", report.failures.len());
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_job(spec: &str) -> Result<ImageJob> {
    match spec.split_once('=') {
        Some((lane, path)) => {
            let lane = lane.trim();
            if lane.is_empty() || path.trim().is_empty() {
                return Err(anyhow!("invalid image argument '{}'", spec));
            }
            Ok(ImageJob::new(lane, ImageSource::Path(PathBuf::from(path))))
        }
        None => Ok(ImageJob::from_path(spec)),
    }
}

fn open_model(cfg: &TrafficConfig, stub: bool) -> Result<SharedModel> {
    if stub {
        let side = cfg.input_size as f32;
        let mut scores = vec![0.0; cfg.class_labels.len()];
        scores[cfg.class_labels.len() - 1] = 0.9;
        let model = StubModel::new(cfg.input_size, cfg.input_size).with_candidate(
            side / 2.0,
            side / 2.0,
            side / 6.0,
            side / 12.0,
            &scores,
        );
        return Ok(SharedModel::new(model));
    }
    load_onnx(cfg)
}

#[cfg(feature = "backend-tract")]
fn load_onnx(cfg: &TrafficConfig) -> Result<SharedModel> {
    use traffic_pcu::InferenceModel;

    let mut model = traffic_pcu::load_model(&cfg.model_path, cfg.input_size)?;
    model.warm_up()?;
    Ok(SharedModel::new(model))
}

#[cfg(not(feature = "backend-tract"))]
fn load_onnx(cfg: &TrafficConfig) -> Result<SharedModel> {
    Err(traffic_pcu::TrafficError::ModelLoad {
        path: cfg.model_path.display().to_string(),
        reason: "built without the backend-tract feature; use --stub".to_string(),
    }
    .into())
}
