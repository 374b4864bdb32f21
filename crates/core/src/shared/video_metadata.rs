use std::path::PathBuf;

use crate::shared::rotation::Rotation;

/// Properties of an opened frame source, as delivered to the analysis stream.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate; 0 when the source does not report one.
    pub fps: f64,
    pub rotation: Rotation,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Interval between frames at the nominal rate, if one is known.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        if self.fps > 0.0 && self.fps.is_finite() {
            Some(std::time::Duration::from_secs_f64(1.0 / self.fps))
        } else {
            None
        }
    }
}
