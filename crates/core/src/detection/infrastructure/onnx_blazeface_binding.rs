//! BlazeFace short-range face detector running on ONNX Runtime via `ort`.
//!
//! Produces boxes in the pixel space of the frame it was given, each with
//! its sigmoid confidence. No tracking and no landmarks.
use std::path::Path;
use std::time::Duration;

use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::detection::domain::model_binding::{BindingConfig, BindingError, ModelBinding};
use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::detection::infrastructure::model_resolver;
use crate::shared::constants::BLAZEFACE_MODEL_NAME;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: 4 box deltas + 6 keypoints.
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceBinding {
    session: Option<ort::session::Session>,
    min_confidence: f64,
    anchors: Vec<[f32; 2]>,
    last_timestamp: Option<Duration>,
}

impl OnnxBlazefaceBinding {
    pub fn new() -> Self {
        Self {
            session: None,
            min_confidence: 0.0,
            anchors: generate_anchors(),
            last_timestamp: None,
        }
    }

    fn run(
        session: &mut ort::session::Session,
        anchors: &[[f32; 2]],
        min_confidence: f64,
        frame: &Frame,
    ) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;

        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut candidates = Vec::new();
        for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
            let score = sigmoid(raw_score) as f64;
            if score < min_confidence {
                continue;
            }
            let offset = i * REGRESSOR_STRIDE;
            if offset + 4 > reg_data.len() {
                break;
            }
            let anchor = anchors[i];
            let cx = anchor[0] + reg_data[offset] / INPUT_SIZE as f32;
            let cy = anchor[1] + reg_data[offset + 1] / INPUT_SIZE as f32;
            let w = reg_data[offset + 2] / INPUT_SIZE as f32;
            let h = reg_data[offset + 3] / INPUT_SIZE as f32;

            let x1 = ((cx - w / 2.0) * fw).max(0.0);
            let y1 = ((cy - h / 2.0) * fh).max(0.0);
            let x2 = ((cx + w / 2.0) * fw).min(fw);
            let y2 = ((cy + h / 2.0) * fh).min(fh);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            candidates.push(Detection::new(
                BoundingBox::new(x1 as f64, y1 as f64, (x2 - x1) as f64, (y2 - y1) as f64),
                score,
            ));
        }

        Ok(nms(candidates, NMS_IOU_THRESH))
    }
}

impl Default for OnnxBlazefaceBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBinding for OnnxBlazefaceBinding {
    fn initialize(&mut self, config: &BindingConfig) -> Result<(), BindingError> {
        let model_path = model_resolver::resolve(
            BLAZEFACE_MODEL_NAME,
            config.model_path.as_deref(),
            config.model_url.as_deref(),
            Some(Box::new(|downloaded, total| {
                log::debug!("Model download: {downloaded}/{total} bytes");
            })),
        )
        .map_err(|e| BindingError::Initialization(e.to_string()))?;

        let session = load_session(&model_path, config.prefer_gpu)
            .map_err(|e| BindingError::Initialization(e.to_string()))?;

        log::info!("Loaded face detector from {}", model_path.display());
        self.session = Some(session);
        self.min_confidence = config.min_confidence;
        self.last_timestamp = None;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }

    fn detect(
        &mut self,
        frame: &Frame,
        timestamp: Duration,
    ) -> Result<Vec<Detection>, BindingError> {
        let session = self.session.as_mut().ok_or(BindingError::NotInitialized)?;
        if let Some(previous) = self.last_timestamp {
            if timestamp < previous {
                return Err(BindingError::NonMonotonicTimestamp {
                    previous,
                    current: timestamp,
                });
            }
        }
        self.last_timestamp = Some(timestamp);
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        Self::run(session, &self.anchors, self.min_confidence, frame)
            .map_err(|e| BindingError::Inference(e.to_string()))
    }
}

fn load_session(
    model_path: &Path,
    prefer_gpu: bool,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_execution_providers(preferred_execution_providers(prefer_gpu))?
        .commit_from_file(model_path)?;
    Ok(session)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Nearest-neighbour resize to `size × size`, normalized to [0,1] NCHW float32.
/// Any alpha channel is ignored.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Anchors for the short-range model: a 16×16 grid with 2 anchors per cell
/// followed by an 8×8 grid with 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

/// Greedy non-maximum suppression; output is ordered by descending confidence.
fn nms(mut candidates: Vec<Detection>, iou_thresh: f64) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = keep
            .iter()
            .any(|k| iou(&k.bounding_box, &candidate.bounding_box) > iou_thresh);
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let x1 = a.origin_x.max(b.origin_x);
    let y1 = a.origin_y.max(b.origin_y);
    let x2 = (a.origin_x + a.width).min(b.origin_x + b.width);
    let y2 = (a.origin_y + a.height).min(b.origin_y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.area() + b.area() - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
