use std::fmt;

use thiserror::Error;

use crate::detection::domain::detection::{Detection, DetectionSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    TooManyFaces,
    NoQualifyingFace,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TooManyFaces => "too_many_faces",
            RejectReason::NoQualifyingFace => "no_qualifying_face",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GateDecision {
    Accepted(Detection),
    Rejected(RejectReason),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted(_))
    }
}

/// Decides whether a detection set is good enough to capture.
///
/// Exactly one detection must score strictly above `threshold`. Detections
/// at or below the threshold are ignored, so a strong face next to a weak
/// one still qualifies.
pub fn qualifies(set: &DetectionSet, threshold: f64) -> GateDecision {
    let mut qualifying = set.iter().filter(|d| d.confidence > threshold);
    match (qualifying.next(), qualifying.next()) {
        (None, _) => GateDecision::Rejected(RejectReason::NoQualifyingFace),
        (Some(only), None) => GateDecision::Accepted(*only),
        (Some(_), Some(_)) => GateDecision::Rejected(RejectReason::TooManyFaces),
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GateError {
    #[error("gate threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// Capture gate with a fixed, validated threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityGate {
    threshold: f64,
}

impl QualityGate {
    pub fn new(threshold: f64) -> Result<Self, GateError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(GateError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(&self, set: &DetectionSet) -> GateDecision {
        qualifies(set, self.threshold)
    }
}
