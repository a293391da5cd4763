use thiserror::Error;

use crate::capture::domain::capture_request::{CaptureRequest, CaptureResult};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("server returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("unreadable response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

/// Remote prediction/training API.
pub trait PredictionClient: Send + Sync {
    fn submit(&self, request: &CaptureRequest) -> Result<CaptureResult, UploadError>;
}
