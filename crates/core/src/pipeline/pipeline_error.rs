use std::fmt;

use crate::capture::domain::frame_encoder::EncodeError;
use crate::capture::domain::prediction_client::UploadError;
use crate::detection::domain::quality_gate::RejectReason;
use crate::video::domain::video_source::SourceError;

/// What was not ready when an operation was attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotReadyCause {
    Model,
    Camera,
    Frame,
}

impl fmt::Display for NotReadyCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotReadyCause::Model => "face detector is not loaded",
            NotReadyCause::Camera => "camera is not available",
            NotReadyCause::Frame => "no video frame is available yet",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("not ready: {0}")]
    NotReady(NotReadyCause),

    #[error("a label is required for training")]
    MissingLabel,

    #[error("capture rejected: {reason}")]
    GateRejected { reason: RejectReason },

    #[error("upload failed: {cause}")]
    UploadFailed { cause: String },

    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("a capture is already in flight")]
    CaptureInFlight,

    #[error("failed to encode frame: {0}")]
    EncodeFailed(String),
}

impl From<UploadError> for PipelineError {
    fn from(e: UploadError) -> Self {
        PipelineError::UploadFailed {
            cause: e.to_string(),
        }
    }
}

impl From<EncodeError> for PipelineError {
    fn from(e: EncodeError) -> Self {
        PipelineError::EncodeFailed(e.to_string())
    }
}

impl From<SourceError> for PipelineError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::PermissionDenied(msg) => PipelineError::PermissionDenied(msg),
            _ => PipelineError::NotReady(NotReadyCause::Camera),
        }
    }
}
