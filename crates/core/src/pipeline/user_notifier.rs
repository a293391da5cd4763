use std::fmt;

/// A message that must reach the user rather than only the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    ModelLoading,
    MissingLabel,
    PermissionDenied(String),
    CameraUnavailable(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ModelLoading => {
                f.write_str("Face detector is still loading. Please try again.")
            }
            Notice::MissingLabel => f.write_str("Please select a label (live or spoof) for training."),
            Notice::PermissionDenied(detail) => {
                write!(f, "Camera access was denied: {detail}")
            }
            Notice::CameraUnavailable(detail) => write!(f, "Camera is not available: {detail}"),
        }
    }
}

pub trait UserNotifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}
