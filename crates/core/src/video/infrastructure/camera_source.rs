use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::shared::frame::Frame;
use crate::video::domain::video_source::{SourceError, VideoSource};

/// Live webcam stream via `nokhwa`.
///
/// The camera is not touched until `open`, so constructing a source never
/// triggers a platform permission prompt.
pub struct CameraSource {
    index: u32,
    camera: Option<Camera>,
}

// Safety: the session opens the camera on the calling thread and then moves
// the source into the poll thread, which owns it until `close`. The handle is
// never reachable from two threads at once.
unsafe impl Send for CameraSource {}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
        }
    }
}

/// Platform backends report refused access only through their error text.
fn classify_open_error(message: String) -> SourceError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        SourceError::PermissionDenied(message)
    } else {
        SourceError::Unavailable(message)
    }
}

impl VideoSource for CameraSource {
    fn open(&mut self) -> Result<(u32, u32), SourceError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(self.index), requested)
            .map_err(|e| classify_open_error(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| classify_open_error(e.to_string()))?;

        let resolution = camera.resolution();
        log::info!(
            "Opened camera {} ({}x{})",
            camera.info().human_name(),
            resolution.width(),
            resolution.height()
        );
        self.camera = Some(camera);
        Ok((resolution.width(), resolution.height()))
    }

    fn read_frame(&mut self, timestamp: Duration) -> Result<Frame, SourceError> {
        let camera = self.camera.as_mut().ok_or(SourceError::NotOpen)?;
        let buffer = camera
            .frame()
            .map_err(|e| SourceError::Read(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| SourceError::Read(e.to_string()))?;
        let (width, height) = decoded.dimensions();
        Ok(Frame::new(decoded.into_raw(), width, height, 3, timestamp))
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {e}");
            }
        }
    }
}
