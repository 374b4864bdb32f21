/// Axis-aligned face rectangle in upright frame pixel coordinates.
///
/// Edges are inclusive-exclusive in the usual image convention; `right >= left`
/// and `bottom >= top` always hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        debug_assert!(right >= left, "right must not be left of left");
        debug_assert!(bottom >= top, "bottom must not be above top");
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Builds a box from floating-point detector corners, rounding to whole
    /// pixels, ordering the edges and clamping to a `frame_w` × `frame_h`
    /// frame.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, frame_w: u32, frame_h: u32) -> Self {
        let clamp_x = |v: f64| v.round().clamp(0.0, frame_w as f64) as i32;
        let clamp_y = |v: f64| v.round().clamp(0.0, frame_h as f64) as i32;
        let (l, r) = (clamp_x(x1.min(x2)), clamp_x(x1.max(x2)));
        let (t, b) = (clamp_y(y1.min(y2)), clamp_y(y1.max(y2)));
        Self::new(l, t, r, b)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Midpoint with integer truncation toward zero.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.left + self.right) / 2,
            (self.top + self.bottom) / 2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::even(BoundingBox::new(100, 200, 300, 400), (200, 300))]
    #[case::odd_truncates(BoundingBox::new(0, 0, 5, 7), (2, 3))]
    #[case::degenerate(BoundingBox::new(10, 10, 10, 10), (10, 10))]
    fn test_center(#[case] bbox: BoundingBox, #[case] expected: (i32, i32)) {
        assert_eq!(bbox.center(), expected);
    }

    #[test]
    fn test_width_and_height() {
        let bbox = BoundingBox::new(10, 20, 110, 70);
        assert_eq!(bbox.width(), 100);
        assert_eq!(bbox.height(), 50);
    }

    #[test]
    fn test_from_corners_rounds() {
        let bbox = BoundingBox::from_corners(10.4, 20.6, 99.5, 200.2, 1280, 720);
        assert_eq!(bbox, BoundingBox::new(10, 21, 100, 200));
    }

    #[test]
    fn test_from_corners_orders_swapped_edges() {
        let bbox = BoundingBox::from_corners(50.0, 60.0, 10.0, 20.0, 100, 100);
        assert_eq!(bbox, BoundingBox::new(10, 20, 50, 60));
    }

    #[test]
    fn test_from_corners_clamps_to_frame() {
        let bbox = BoundingBox::from_corners(-30.0, -5.0, 150.0, 90.0, 100, 80);
        assert_eq!(bbox, BoundingBox::new(0, 0, 100, 80));
    }

    #[test]
    #[should_panic(expected = "right must not be left of left")]
    fn test_inverted_edges_panic_in_debug() {
        BoundingBox::new(10, 0, 5, 10);
    }
}
