use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::constants::CAPTURE_FILENAME_PREFIX;

/// Which remote endpoint a capture targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Predict,
    Train,
    Retrain,
}

impl OperationMode {
    pub const ALL: &[OperationMode] = &[
        OperationMode::Predict,
        OperationMode::Train,
        OperationMode::Retrain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Predict => "predict",
            OperationMode::Train => "train",
            OperationMode::Retrain => "retrain",
        }
    }

    pub fn endpoint_path(&self) -> &'static str {
        match self {
            OperationMode::Predict => "/predict",
            OperationMode::Train => "/train",
            OperationMode::Retrain => "/retrain",
        }
    }

    pub fn requires_label(&self) -> bool {
        matches!(self, OperationMode::Train)
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let expected: Vec<_> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!(
                    "unknown operation mode '{s}' (expected one of: {})",
                    expected.join(", ")
                )
            })
    }
}

/// Ground-truth label attached to training captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Live,
    Spoof,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Live => "live",
            Label::Spoof => "spoof",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Label::Live),
            "spoof" => Ok(Label::Spoof),
            other => Err(format!("unknown label '{other}' (expected live or spoof)")),
        }
    }
}

/// An encoded still image ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
}

/// A validated upload: train requests always carry a label, other modes never do.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureRequest {
    mode: OperationMode,
    label: Option<Label>,
    image: EncodedImage,
}

impl CaptureRequest {
    /// Returns `None` when `mode` is train and no label is given.
    pub fn new(mode: OperationMode, label: Option<Label>, image: EncodedImage) -> Option<Self> {
        let label = if mode.requires_label() {
            Some(label?)
        } else {
            None
        };
        Some(Self { mode, label, image })
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn label(&self) -> Option<Label> {
        self.label
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }
}

/// Latest response from the remote API.
///
/// The payload is opaque; `prediction` is exposed because the predict
/// endpoint always returns one.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureResult {
    pub mode: OperationMode,
    pub status: u16,
    pub body: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl CaptureResult {
    pub fn prediction(&self) -> Option<&serde_json::Value> {
        self.body.get("prediction")
    }
}

/// `captured_face_<ISO-8601 time>.<ext>` with `-`, `:` and `.` replaced by `_`,
/// e.g. `captured_face_2024_05_01T12_30_45_123Z.jpg`.
pub fn capture_filename(at: DateTime<Utc>, extension: &str) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(['-', ':', '.'], "_");
    format!("{CAPTURE_FILENAME_PREFIX}{stamp}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn image() -> EncodedImage {
        EncodedImage {
            bytes: vec![0xFF, 0xD8],
            filename: "captured_face_x.jpg".into(),
            mime_type: "image/jpeg",
        }
    }

    #[rstest]
    #[case(OperationMode::Predict, "/predict")]
    #[case(OperationMode::Train, "/train")]
    #[case(OperationMode::Retrain, "/retrain")]
    fn test_endpoint_paths(#[case] mode: OperationMode, #[case] path: &str) {
        assert_eq!(mode.endpoint_path(), path);
        assert_eq!(mode.as_str().parse::<OperationMode>().unwrap(), mode);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("TRAIN".parse::<OperationMode>().unwrap(), OperationMode::Train);
        assert_eq!("Spoof".parse::<Label>().unwrap(), Label::Spoof);
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        let err = "classify".parse::<OperationMode>().unwrap_err();
        assert!(err.contains("predict, train, retrain"), "{err}");
        assert!("fake".parse::<Label>().is_err());
    }

    #[test]
    fn test_train_without_label_is_invalid() {
        assert!(CaptureRequest::new(OperationMode::Train, None, image()).is_none());
    }

    #[test]
    fn test_train_keeps_label() {
        let req = CaptureRequest::new(OperationMode::Train, Some(Label::Spoof), image()).unwrap();
        assert_eq!(req.label(), Some(Label::Spoof));
    }

    #[rstest]
    #[case(OperationMode::Predict)]
    #[case(OperationMode::Retrain)]
    fn test_label_is_dropped_outside_training(#[case] mode: OperationMode) {
        let req = CaptureRequest::new(mode, Some(Label::Live), image()).unwrap();
        assert_eq!(req.label(), None);
        assert_eq!(req.mode(), mode);
    }

    #[test]
    fn test_capture_filename_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(
            capture_filename(at, "jpg"),
            "captured_face_2024_05_01T12_30_45_123Z.jpg"
        );
    }

    #[test]
    fn test_prediction_field() {
        let result = CaptureResult {
            mode: OperationMode::Predict,
            status: 200,
            body: serde_json::json!({"prediction": "live", "score": 0.97}),
            received_at: Utc::now(),
        };
        assert_eq!(result.prediction(), Some(&serde_json::json!("live")));
    }
}
