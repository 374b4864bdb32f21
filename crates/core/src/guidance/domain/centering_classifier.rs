use crate::guidance::domain::center_target::CenterTarget;
use crate::guidance::domain::guidance_decision::{
    GuidanceDecision, HorizontalDirection, VerticalDirection,
};
use crate::shared::bounding_box::BoundingBox;

/// Decides whether a detected face sits inside the target region and, if
/// not, which way the user should move.
///
/// Stateless: the same faces and target always give the same decision.
#[derive(Clone, Copy, Debug, Default)]
pub struct CenteringClassifier;

impl CenteringClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies the first face in `faces` against `target`.
    ///
    /// Only the first box is considered; detectors report faces in their own
    /// preferred order and no re-ranking happens here.
    pub fn classify(&self, faces: &[BoundingBox], target: &CenterTarget) -> GuidanceDecision {
        let Some(face) = faces.first() else {
            return GuidanceDecision::NoFaceDetected;
        };

        let (cx, cy) = face.center();
        let (cx, cy) = (cx as i64, cy as i64);
        let (adjusted_x, adjusted_y) = target.adjusted_center();
        let (tx, ty) = target.tolerance_extent();

        if ((cx - adjusted_x).abs() as f64) < tx && ((cy - adjusted_y).abs() as f64) < ty {
            return GuidanceDecision::Centered;
        }

        // Directions are judged against the plain frame center, not the
        // offset target.
        let (mid_x, mid_y) = target.frame_center();
        let horizontal = if cx < mid_x {
            HorizontalDirection::Left
        } else {
            HorizontalDirection::Right
        };
        // Inverted on purpose: a face in the upper half is told to move down.
        let vertical = if cy >= mid_y {
            VerticalDirection::Up
        } else {
            VerticalDirection::Down
        };

        GuidanceDecision::Directional {
            horizontal,
            vertical,
        }
    }
}
