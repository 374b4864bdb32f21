use std::fmt;

/// Clockwise rotation that must be applied to a stored frame to display it
/// upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Snaps an arbitrary angle (any sign, any number of turns) to the
    /// nearest quarter turn.
    pub fn from_degrees(angle: i32) -> Self {
        match angle.rem_euclid(360) {
            0..=44 | 316..=359 => Rotation::Deg0,
            45..=134 => Rotation::Deg90,
            135..=224 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True for quarter turns, where upright width and height are swapped.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Dimensions of a `raw_w` × `raw_h` buffer once displayed upright.
    pub fn upright_dimensions(self, raw_w: u32, raw_h: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (raw_h, raw_w)
        } else {
            (raw_w, raw_h)
        }
    }

    /// Maps an upright pixel `(ux, uy)` back to its `(x, y)` position in the
    /// stored `raw_w` × `raw_h` buffer.
    pub fn to_raw(self, ux: usize, uy: usize, raw_w: usize, raw_h: usize) -> (usize, usize) {
        match self {
            Rotation::Deg0 => (ux, uy),
            Rotation::Deg90 => (uy, raw_h - 1 - ux),
            Rotation::Deg180 => (raw_w - 1 - ux, raw_h - 1 - uy),
            Rotation::Deg270 => (raw_w - 1 - uy, ux),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
