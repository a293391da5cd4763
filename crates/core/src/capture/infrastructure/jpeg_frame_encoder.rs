use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::capture::domain::frame_encoder::{EncodeError, FrameEncoder};
use crate::shared::constants::{CAPTURE_HEIGHT, CAPTURE_WIDTH, DEFAULT_JPEG_QUALITY};
use crate::shared::frame::Frame;

/// Snapshots a frame into a fixed-size raster and encodes it as JPEG.
///
/// The frame is stretched to the raster size without preserving aspect
/// ratio, the same way drawing a video onto a fixed canvas does.
pub struct JpegFrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn raster_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(CAPTURE_WIDTH, CAPTURE_HEIGHT, DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame);
        }
        if !matches!(frame.channels(), 3 | 4) {
            return Err(EncodeError::UnsupportedChannels(frame.channels()));
        }

        let rgb = frame.to_rgb();
        let img = RgbImage::from_raw(rgb.width(), rgb.height(), rgb.data().to_vec())
            .ok_or(EncodeError::EmptyFrame)?;
        let raster = if img.dimensions() == (self.width, self.height) {
            img
        } else {
            imageops::resize(&img, self.width, self.height, FilterType::Triangle)
        };

        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, self.quality).encode_image(&raster)?;
        Ok(out.into_inner())
    }

    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn solid_frame(width: u32, height: u32, channels: u8, value: u8) -> Frame {
        let len = (width * height) as usize * channels as usize;
        Frame::new(vec![value; len], width, height, channels, Duration::ZERO)
    }

    #[test]
    fn test_encodes_jpeg_at_raster_size() {
        let encoder = JpegFrameEncoder::default();
        let bytes = encoder.encode(&solid_frame(1280, 720, 3, 90)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), CAPTURE_WIDTH);
        assert_eq!(decoded.height(), CAPTURE_HEIGHT);
    }

    #[test]
    fn test_rgba_frames_are_accepted() {
        let encoder = JpegFrameEncoder::new(32, 24, 80);
        let bytes = encoder.encode(&solid_frame(64, 48, 4, 200)).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let encoder = JpegFrameEncoder::default();
        let frame = Frame::new(Vec::new(), 0, 0, 3, Duration::ZERO);
        assert!(matches!(
            encoder.encode(&frame),
            Err(EncodeError::EmptyFrame)
        ));
    }

    #[test]
    fn test_grayscale_frame_is_rejected() {
        let encoder = JpegFrameEncoder::default();
        assert!(matches!(
            encoder.encode(&solid_frame(4, 4, 1, 0)),
            Err(EncodeError::UnsupportedChannels(1))
        ));
    }

    #[test]
    fn test_quality_is_clamped() {
        let encoder = JpegFrameEncoder::new(0, 0, 0);
        assert_eq!(encoder.raster_size(), (1, 1));
        assert_eq!(encoder.quality, 1);
    }
}
