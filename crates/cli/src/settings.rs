use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use liveness_capture_core::shared::constants::{
    API_BASE_URL_ENV, CAPTURE_HEIGHT, CAPTURE_WIDTH, DEFAULT_API_BASE_URL,
    DEFAULT_DETECTOR_CONFIDENCE, DEFAULT_GATE_THRESHOLD, DEFAULT_JPEG_QUALITY,
};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no config directory on this platform")]
    NoConfigDir,
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub gate_threshold: f64,
    pub detector_confidence: f64,
    pub capture_width: u32,
    pub capture_height: u32,
    pub jpeg_quality: u8,
    /// 0 polls back-to-back.
    pub poll_interval_ms: u64,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    /// Unset waits for the server indefinitely.
    pub upload_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            gate_threshold: DEFAULT_GATE_THRESHOLD,
            detector_confidence: DEFAULT_DETECTOR_CONFIDENCE,
            capture_width: CAPTURE_WIDTH,
            capture_height: CAPTURE_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            poll_interval_ms: 0,
            model_path: None,
            model_url: None,
            upload_timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("LivenessCapture").join("settings.json"))
    }

    /// Loads the settings file (defaults if it does not exist) and applies
    /// the environment override.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source: io::Error| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    /// Overrides the base URL from `LIVENESS_API_BASE_URL` when set and non-empty.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&self.gate_threshold) {
            return Err(SettingsError::Invalid(format!(
                "Gate threshold must be between 0.0 and 1.0, got {}",
                self.gate_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.detector_confidence) {
            return Err(SettingsError::Invalid(format!(
                "Detector confidence must be between 0.0 and 1.0, got {}",
                self.detector_confidence
            )));
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(SettingsError::Invalid(format!(
                "Capture size must be non-zero, got {}x{}",
                self.capture_width, self.capture_height
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SettingsError::Invalid(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::Invalid(format!(
                "API base URL must start with http:// or https://, got '{url}'"
            )));
        }
        Ok(())
    }
}
