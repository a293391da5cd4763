use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{SourceError, VideoSource};

/// Replays still images as a looping live stream.
///
/// Accepts either a single image (every read returns it) or a directory,
/// whose images are played in file-name order and wrap around at the end.
/// Decoded frames are cached so replay does not hit the disk again.
pub struct ImageFileSource {
    path: PathBuf,
    frames: Vec<Frame>,
    cursor: usize,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frames: Vec::new(),
            cursor: 0,
        }
    }

    fn list_images(&self) -> Result<Vec<PathBuf>, SourceError> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        if !self.path.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        let entries =
            fs::read_dir(&self.path).map_err(|e| SourceError::Unavailable(e.to_string()))?;
        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        images.sort();
        if images.is_empty() {
            return Err(SourceError::Unavailable(format!(
                "no images found in {}",
                self.path.display()
            )));
        }
        Ok(images)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn decode(path: &Path) -> Result<Frame, SourceError> {
    let img = image::open(path)
        .map_err(|e| SourceError::Read(format!("{}: {e}", path.display())))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, Duration::ZERO))
}

impl VideoSource for ImageFileSource {
    fn open(&mut self) -> Result<(u32, u32), SourceError> {
        let frames = self
            .list_images()?
            .iter()
            .map(|p| decode(p))
            .collect::<Result<Vec<_>, _>>()?;
        let first = &frames[0];
        let size = (first.width(), first.height());
        log::info!(
            "Replaying {} image(s) from {} at {}x{}",
            frames.len(),
            self.path.display(),
            size.0,
            size.1
        );
        self.frames = frames;
        self.cursor = 0;
        Ok(size)
    }

    fn read_frame(&mut self, timestamp: Duration) -> Result<Frame, SourceError> {
        if self.frames.is_empty() {
            return Err(SourceError::NotOpen);
        }
        let src = &self.frames[self.cursor];
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(Frame::new(
            src.data().to_vec(),
            src.width(),
            src.height(),
            src.channels(),
            timestamp,
        ))
    }

    fn close(&mut self) {
        self.frames.clear();
        self.cursor = 0;
    }
}
