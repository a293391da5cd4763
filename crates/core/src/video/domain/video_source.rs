use std::time::Duration;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("access to the video source was denied: {0}")]
    PermissionDenied(String),
    #[error("video source unavailable: {0}")]
    Unavailable(String),
    #[error("video source is not open")]
    NotOpen,
    #[error("failed to read frame: {0}")]
    Read(String),
}

/// A live stream of frames (webcam, replayed footage, ...).
///
/// `read_frame` returns the frame that is current at the time of the call;
/// the caller supplies the monotonic timestamp to stamp it with.
pub trait VideoSource: Send {
    /// Opens the source and returns its native `(width, height)`.
    fn open(&mut self) -> Result<(u32, u32), SourceError>;

    fn read_frame(&mut self, timestamp: Duration) -> Result<Frame, SourceError>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
