use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::shared::constants::DEFAULT_DETECTOR_CONFIDENCE;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("model binding is not initialized")]
    NotInitialized,
    #[error("model initialization failed: {0}")]
    Initialization(String),
    #[error("timestamp {current:?} is earlier than previous frame at {previous:?}")]
    NonMonotonicTimestamp {
        previous: Duration,
        current: Duration,
    },
    #[error("inference failed: {0}")]
    Inference(String),
}

/// How a binding locates and configures its model.
///
/// `model_path` wins when set; otherwise the model is looked up in the user
/// cache and, failing that, downloaded from `model_url`.
#[derive(Clone, Debug, PartialEq)]
pub struct BindingConfig {
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub min_confidence: f64,
    pub prefer_gpu: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_url: None,
            min_confidence: DEFAULT_DETECTOR_CONFIDENCE,
            prefer_gpu: true,
        }
    }
}

/// Domain interface for an external vision model running in video mode.
///
/// Implementations may keep state across calls (e.g. for temporal
/// smoothing), hence `&mut self`. Timestamps passed to `detect` must be
/// non-decreasing.
pub trait ModelBinding: Send {
    fn initialize(&mut self, config: &BindingConfig) -> Result<(), BindingError>;

    fn is_ready(&self) -> bool;

    fn detect(
        &mut self,
        frame: &Frame,
        timestamp: Duration,
    ) -> Result<Vec<Detection>, BindingError>;
}
