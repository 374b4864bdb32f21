use thiserror::Error;

/// Configuration or input contract violations. Raised when a
/// [`CenterTarget`](super::center_target::CenterTarget) is built, never while
/// classifying.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuidanceError {
    #[error("frame dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("tolerance must be strictly between 0.0 and 1.0, got {0}")]
    InvalidTolerance(f64),
}
