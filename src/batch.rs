//! Concurrent analysis of a batch of lane images.
//!
//! Each image is decoded and run through the detector on its own blocking
//! task, so the caller's runtime workers are never stalled by inference.
//! Tasks share one `SharedModel`, so only one prediction runs at a time.
//! A decode or inference failure drops that image from the aggregate and
//! is recorded in the report; sibling tasks carry on.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use image::RgbImage;
use serde::Serialize;
use tokio::task::{self, JoinSet};

use crate::allocate::LaneCounts;
use crate::counts::{lane_from_path, tally, ClassLabels};
use crate::detect::{DetectedObject, Detector, SharedModel};
use crate::error::{TrafficError, TrafficResult};

/// Where an image's encoded bytes come from.
#[derive(Clone, Debug)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl ImageSource {
    pub fn name(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// Decode to 8-bit RGB.
    pub fn decode(&self) -> TrafficResult<RgbImage> {
        let decoded = match self {
            ImageSource::Path(path) => image::open(path),
            ImageSource::Bytes { data, .. } => image::load_from_memory(data),
        };
        decoded
            .map(|img| img.to_rgb8())
            .map_err(|e| TrafficError::ImageDecode {
                source_name: self.name(),
                reason: e.to_string(),
            })
    }
}

/// One image assigned to a lane.
#[derive(Clone, Debug)]
pub struct ImageJob {
    pub lane: String,
    pub source: ImageSource,
}

impl ImageJob {
    pub fn new(lane: impl Into<String>, source: ImageSource) -> Self {
        Self {
            lane: lane.into(),
            source,
        }
    }

    /// Job whose lane is the file stem of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            lane: lane_from_path(&path),
            source: ImageSource::Path(path),
        }
    }
}

/// An image that produced no result.
#[derive(Clone, Debug, Serialize)]
pub struct ImageFailure {
    pub lane: String,
    pub source: String,
    pub error: String,
}

/// Aggregate of a batch run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub counts: LaneCounts,
    pub detections: BTreeMap<String, Vec<DetectedObject>>,
    pub failures: Vec<ImageFailure>,
}

struct JobOutcome {
    lane: String,
    source: String,
    result: TrafficResult<Vec<DetectedObject>>,
}

/// Analyze every job concurrently and tally the results per lane.
///
/// Completions are folded in whatever order they finish.
pub async fn analyze_batch(
    model: SharedModel,
    detector: Detector,
    labels: &ClassLabels,
    jobs: Vec<ImageJob>,
) -> BatchReport {
    let mut tasks = JoinSet::new();
    let mut pending: HashMap<task::Id, (String, String)> = HashMap::new();
    for job in jobs {
        let model = model.clone();
        let names = (job.lane.clone(), job.source.name());
        let handle = tasks.spawn_blocking(move || run_job(&model, detector, job));
        pending.insert(handle.id(), names);
    }

    let mut report = BatchReport::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        let outcome = match joined {
            Ok((id, outcome)) => {
                pending.remove(&id);
                outcome
            }
            Err(e) => {
                let (lane, source) = pending.remove(&e.id()).unwrap_or_default();
                log::error!("image task for {} in lane {} aborted: {}", source, lane, e);
                report.failures.push(ImageFailure {
                    lane,
                    source,
                    error: e.to_string(),
                });
                continue;
            }
        };
        match outcome.result {
            Ok(objects) => {
                log::info!(
                    "{}: {} vehicles in {}",
                    outcome.lane,
                    objects.len(),
                    outcome.source
                );
                tally(&mut report.counts, &outcome.lane, &objects, labels);
                report
                    .detections
                    .entry(outcome.lane)
                    .or_default()
                    .extend(objects);
            }
            Err(e) => {
                log::warn!(
                    "dropping {} from lane {}: {}",
                    outcome.source,
                    outcome.lane,
                    e
                );
                report.failures.push(ImageFailure {
                    lane: outcome.lane,
                    source: outcome.source,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

fn run_job(model: &SharedModel, detector: Detector, job: ImageJob) -> JobOutcome {
    let source = job.source.name();
    let result = job
        .source
        .decode()
        .and_then(|image| model.with_model(|m| detector.detect(&image, m)));
    JobOutcome {
        lane: job.lane,
        source,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{
        InferenceModel, InputSpec, ModelInput, RawDetectionTensor, StubModel, TensorLayout,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Records whether `predict` is ever entered while another call is running.
    struct OverlapModel {
        busy: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl InferenceModel for OverlapModel {
        fn name(&self) -> &'static str {
            "overlap"
        }

        fn input_spec(&self) -> TrafficResult<InputSpec> {
            Ok(InputSpec {
                width: 8,
                height: 8,
                layout: TensorLayout::Nhwc,
            })
        }

        fn predict(&mut self, _input: &ModelInput) -> TrafficResult<RawDetectionTensor> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(5));
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.busy.store(false, Ordering::SeqCst);
            RawDetectionTensor::from_rows(&[vec![4.0, 4.0, 2.0, 2.0, 0.1, 0.9]])
        }
    }

    struct PanickingModel;

    impl InferenceModel for PanickingModel {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn input_spec(&self) -> TrafficResult<InputSpec> {
            Ok(InputSpec {
                width: 8,
                height: 8,
                layout: TensorLayout::Nhwc,
            })
        }

        fn predict(&mut self, _input: &ModelInput) -> TrafficResult<RawDetectionTensor> {
            panic!("backend crashed");
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::new(10, 10))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        png
    }

    fn bytes_job(lane: &str, data: Vec<u8>) -> ImageJob {
        ImageJob::new(
            lane,
            ImageSource::Bytes {
                name: format!("{}.png", lane),
                data,
            },
        )
    }

    #[tokio::test]
    async fn undecodable_bytes_do_not_abort_batch() {
        let model = SharedModel::new(StubModel::new(32, 32).with_candidate(
            16.0,
            16.0,
            8.0,
            8.0,
            &[0.1, 0.8],
        ));
        let jobs = vec![
            bytes_job("north", png_bytes()),
            bytes_job("south", b"not an image".to_vec()),
        ];

        let report =
            analyze_batch(model, Detector::default(), &ClassLabels::default(), jobs).await;
        assert_eq!(report.counts["north"]["car"], 1);
        assert_eq!(report.detections["north"].len(), 1);
        assert!(!report.counts.contains_key("south"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].lane, "south");
    }

    #[tokio::test]
    async fn inference_failure_is_per_image() {
        let model = SharedModel::new(StubModel::new(8, 8).failing());
        let jobs = vec![bytes_job("west", png_bytes()), bytes_job("east", png_bytes())];
        let report =
            analyze_batch(model, Detector::default(), &ClassLabels::default(), jobs).await;
        assert!(report.counts.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.error.contains("inference failed")));
    }

    #[test]
    fn job_lane_defaults_to_file_stem() {
        let job = ImageJob::from_path("/demo/lane_east.jpg");
        assert_eq!(job.lane, "lane_east");
        assert!(matches!(
            job.source.decode(),
            Err(TrafficError::ImageDecode { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shared_model_serializes_predictions() {
        let busy = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let model = SharedModel::new(OverlapModel {
            busy: busy.clone(),
            overlaps: overlaps.clone(),
            calls: calls.clone(),
        });
        let jobs = (0..12)
            .map(|i| bytes_job(&format!("lane{}", i % 4), png_bytes()))
            .collect();

        let report =
            analyze_batch(model, Detector::default(), &ClassLabels::default(), jobs).await;

        assert_eq!(calls.load(Ordering::SeqCst), 12);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert!(report.failures.is_empty());
        assert_eq!(report.counts["lane0"]["car"], 3);
    }

    #[tokio::test]
    async fn crashed_task_failure_names_its_image() {
        let model = SharedModel::new(PanickingModel);
        let jobs = vec![bytes_job("north", png_bytes())];
        let report =
            analyze_batch(model, Detector::default(), &ClassLabels::default(), jobs).await;

        assert!(report.counts.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].lane, "north");
        assert_eq!(report.failures[0].source, "north.png");
    }
}
