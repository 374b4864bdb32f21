use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Boxes are reported in upright frame coordinates, in the detector's own
/// order. An empty list means no face, not a failure.
///
/// Implementations may hold inference state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError>;
}

/// The detection capability could not produce a result for a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("face detection failed: {cause}")]
pub struct DetectionError {
    pub cause: String,
}

impl DetectionError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

impl From<Box<dyn std::error::Error>> for DetectionError {
    fn from(e: Box<dyn std::error::Error>) -> Self {
        Self::new(e.to_string())
    }
}

/// Speed/recall trade-off chosen when a detector is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PerformanceMode {
    /// Higher confidence cut-off; only the strongest candidate is reported.
    #[default]
    Fast,
    /// Lower cut-off with full overlap suppression; every face is reported.
    Accurate,
}

impl PerformanceMode {
    pub fn confidence_threshold(self) -> f64 {
        match self {
            PerformanceMode::Fast => 0.5,
            PerformanceMode::Accurate => 0.25,
        }
    }

    pub fn reports_all_faces(self) -> bool {
        matches!(self, PerformanceMode::Accurate)
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PerformanceMode::Fast => "fast",
            PerformanceMode::Accurate => "accurate",
        })
    }
}

impl FromStr for PerformanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(PerformanceMode::Fast),
            "accurate" => Ok(PerformanceMode::Accurate),
            other => Err(format!(
                "unknown performance mode '{other}' (expected 'fast' or 'accurate')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("fast", PerformanceMode::Fast)]
    #[case("Accurate", PerformanceMode::Accurate)]
    #[case("FAST", PerformanceMode::Fast)]
    fn test_mode_parses_case_insensitively(#[case] input: &str, #[case] expected: PerformanceMode) {
        assert_eq!(input.parse::<PerformanceMode>().unwrap(), expected);
    }

    #[test]
    fn test_mode_rejects_unknown() {
        let err = "turbo".parse::<PerformanceMode>().unwrap_err();
        assert!(err.contains("turbo"));
    }

    #[test]
    fn test_mode_display_round_trips() {
        for mode in [PerformanceMode::Fast, PerformanceMode::Accurate] {
            assert_eq!(mode.to_string().parse::<PerformanceMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_fast_is_stricter_than_accurate() {
        assert!(
            PerformanceMode::Fast.confidence_threshold()
                > PerformanceMode::Accurate.confidence_threshold()
        );
        assert!(!PerformanceMode::Fast.reports_all_faces());
        assert!(PerformanceMode::Accurate.reports_all_faces());
    }

    #[test]
    fn test_detection_error_message_carries_cause() {
        let err = DetectionError::new("model not loaded");
        assert_eq!(err.to_string(), "face detection failed: model not loaded");
    }
}
