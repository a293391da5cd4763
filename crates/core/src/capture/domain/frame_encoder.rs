use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode an empty frame")]
    EmptyFrame,
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Freezes a frame into a compressed still image.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError>;

    fn mime_type(&self) -> &'static str;

    fn extension(&self) -> &'static str;
}
