use crate::guidance::domain::guidance_error::GuidanceError;
use crate::shared::constants::{
    DEFAULT_OFFSET_X, DEFAULT_OFFSET_Y, DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH,
    DEFAULT_TOLERANCE,
};

/// Where a face should sit in the frame, and how far off it may be.
///
/// The target center is the frame center shifted by `(offset_x, offset_y)`.
/// A face counts as centered while it stays inside the axis-aligned
/// rectangle of half-widths `width * tolerance` and `height * tolerance`
/// around that point.
///
/// Fields are private so every instance is valid: positive dimensions and a
/// tolerance in the open interval (0, 1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CenterTarget {
    width: u32,
    height: u32,
    offset_x: i32,
    offset_y: i32,
    tolerance: f64,
}

impl CenterTarget {
    pub fn new(
        width: u32,
        height: u32,
        offset_x: i32,
        offset_y: i32,
        tolerance: f64,
    ) -> Result<Self, GuidanceError> {
        if width == 0 || height == 0 {
            return Err(GuidanceError::InvalidDimensions { width, height });
        }
        // NaN fails both comparisons and is rejected here too.
        if !(tolerance > 0.0 && tolerance < 1.0) {
            return Err(GuidanceError::InvalidTolerance(tolerance));
        }
        Ok(Self {
            width,
            height,
            offset_x,
            offset_y,
            tolerance,
        })
    }

    /// Same offsets and tolerance, applied to a frame of different size.
    pub fn for_frame(&self, width: u32, height: u32) -> Result<Self, GuidanceError> {
        if width == self.width && height == self.height {
            return Ok(*self);
        }
        Self::new(width, height, self.offset_x, self.offset_y, self.tolerance)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn offset_x(&self) -> i32 {
        self.offset_x
    }

    pub fn offset_y(&self) -> i32 {
        self.offset_y
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Frame center as integer pixels, using integer division.
    pub fn frame_center(&self) -> (i64, i64) {
        (self.width as i64 / 2, self.height as i64 / 2)
    }

    /// Frame center shifted by the configured offsets.
    pub fn adjusted_center(&self) -> (i64, i64) {
        let (cx, cy) = self.frame_center();
        (cx + self.offset_x as i64, cy + self.offset_y as i64)
    }

    /// Half-widths of the tolerance rectangle along x and y.
    pub fn tolerance_extent(&self) -> (f64, f64) {
        (
            self.width as f64 * self.tolerance,
            self.height as f64 * self.tolerance,
        )
    }
}

impl Default for CenterTarget {
    fn default() -> Self {
        Self {
            width: DEFAULT_TARGET_WIDTH,
            height: DEFAULT_TARGET_HEIGHT,
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}
