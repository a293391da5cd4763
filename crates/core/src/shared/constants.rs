pub const BLAZEFACE_MODEL_NAME: &str = "blaze_face_short_range.onnx";

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";

/// Environment variable that overrides the configured API base URL.
pub const API_BASE_URL_ENV: &str = "LIVENESS_API_BASE_URL";

/// Minimum confidence for a face to count toward a capture.
pub const DEFAULT_GATE_THRESHOLD: f64 = 0.6;

/// Minimum confidence for the detector to report a face at all.
pub const DEFAULT_DETECTOR_CONFIDENCE: f64 = 0.5;

/// Fixed raster size a captured frame is snapshotted into before encoding.
pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;

pub const DEFAULT_JPEG_QUALITY: u8 = 92;

pub const CAPTURE_FILENAME_PREFIX: &str = "captured_face_";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
