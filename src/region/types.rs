//! Region geometry in the normalised 0–1000 coordinate space.
//!
//! A [`Region`] is one detected text span plus its [`BoundingBox`].  Boxes use
//! the `[ymin, xmin, ymax, xmax]` ordering returned by the detection service,
//! so a box can be built straight from the wire array with
//! [`BoundingBox::from_array`].

use serde::{Deserialize, Serialize};

/// Upper bound of the normalised coordinate space (inclusive).
pub const NORMALIZED_MAX: u16 = 1000;

// ---------------------------------------------------------------------------
// BoundingBox
// ---------------------------------------------------------------------------

/// Axis-aligned box in normalised coordinates.
///
/// Well-formed boxes satisfy `ymin <= ymax` and `xmin <= xmax`.  Boxes that
/// violate this are still representable; see [`is_degenerate`].
///
/// [`is_degenerate`]: BoundingBox::is_degenerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u16; 4]", into = "[u16; 4]")]
pub struct BoundingBox {
    pub ymin: u16,
    pub xmin: u16,
    pub ymax: u16,
    pub xmax: u16,
}

impl BoundingBox {
    pub fn new(ymin: u16, xmin: u16, ymax: u16, xmax: u16) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }

    /// Build from the `[ymin, xmin, ymax, xmax]` wire order.
    pub fn from_array([ymin, xmin, ymax, xmax]: [u16; 4]) -> Self {
        Self::new(ymin, xmin, ymax, xmax)
    }

    /// `[ymin, xmin, ymax, xmax]`
    pub fn to_array(self) -> [u16; 4] {
        [self.ymin, self.xmin, self.ymax, self.xmax]
    }

    /// `true` when the box is inverted on either axis or has no extent.
    ///
    /// Degenerate boxes still match points inside their (re-ordered) bounds
    /// but never beat a proper box during hit-test tie-breaking.
    ///
    /// ```
    /// use point_reader::region::BoundingBox;
    ///
    /// assert!(!BoundingBox::new(0, 0, 10, 10).is_degenerate());
    /// assert!(BoundingBox::new(10, 0, 10, 10).is_degenerate()); // zero height
    /// assert!(BoundingBox::new(20, 0, 10, 10).is_degenerate()); // inverted
    /// ```
    pub fn is_degenerate(&self) -> bool {
        self.ymin >= self.ymax || self.xmin >= self.xmax
    }

    /// Area in normalised units squared; `0` for degenerate boxes.
    pub fn area(&self) -> u32 {
        if self.is_degenerate() {
            return 0;
        }
        u32::from(self.ymax - self.ymin) * u32::from(self.xmax - self.xmin)
    }

    /// Inclusive containment test.
    ///
    /// Inverted axes are re-ordered first so a box with `ymin > ymax` still
    /// covers the span between its two edges.
    pub fn contains(&self, point: NormalizedPoint) -> bool {
        let (y0, y1) = ordered(self.ymin, self.ymax);
        let (x0, x1) = ordered(self.xmin, self.xmax);
        point.y >= f64::from(y0)
            && point.y <= f64::from(y1)
            && point.x >= f64::from(x0)
            && point.x <= f64::from(x1)
    }
}

impl From<[u16; 4]> for BoundingBox {
    fn from(array: [u16; 4]) -> Self {
        Self::from_array(array)
    }
}

impl From<BoundingBox> for [u16; 4] {
    fn from(bounds: BoundingBox) -> Self {
        bounds.to_array()
    }
}

fn ordered(a: u16, b: u16) -> (u16, u16) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A detected text span and where it sits in the image.
///
/// Regions are produced in one batch per image and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub text: String,
    #[serde(rename = "box_2d")]
    pub bounds: BoundingBox,
}

impl Region {
    pub fn new(text: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

// ---------------------------------------------------------------------------
// NormalizedPoint
// ---------------------------------------------------------------------------

/// A tap position mapped into the 0–1000 space.
///
/// Kept as `f64` so sub-unit precision from the pixel mapping is not lost
/// before the containment test.  Values outside `[0, 1000]` are legal and
/// simply match nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_of_proper_box() {
        let b = BoundingBox::new(100, 100, 200, 300);
        assert_eq!(b.area(), 100 * 200);
    }

    #[test]
    fn area_of_degenerate_box_is_zero() {
        assert_eq!(BoundingBox::new(200, 100, 100, 300).area(), 0);
        assert_eq!(BoundingBox::new(100, 300, 200, 300).area(), 0);
    }

    #[test]
    fn contains_is_inclusive_on_all_edges() {
        let b = BoundingBox::new(100, 100, 200, 300);
        assert!(b.contains(NormalizedPoint::new(100.0, 100.0)));
        assert!(b.contains(NormalizedPoint::new(300.0, 200.0)));
        assert!(!b.contains(NormalizedPoint::new(300.01, 200.0)));
        assert!(!b.contains(NormalizedPoint::new(99.99, 150.0)));
    }

    #[test]
    fn inverted_box_still_contains_points_between_edges() {
        let b = BoundingBox::new(200, 300, 100, 100);
        assert!(b.contains(NormalizedPoint::new(150.0, 150.0)));
    }

    #[test]
    fn array_order_is_ymin_xmin_ymax_xmax() {
        let b = BoundingBox::from_array([1, 2, 3, 4]);
        assert_eq!(b.ymin, 1);
        assert_eq!(b.xmin, 2);
        assert_eq!(b.ymax, 3);
        assert_eq!(b.xmax, 4);
        assert_eq!(b.to_array(), [1, 2, 3, 4]);
    }

    #[test]
    fn region_serialises_box_as_wire_array() {
        let region = Region::new("Hello", BoundingBox::new(100, 100, 200, 300));
        let json = serde_json::to_value(&region).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "text": "Hello", "box_2d": [100, 100, 200, 300] })
        );
    }
}
