//! Geometry kernel.
//!
//! Pure functions over pixel-space points and boxes. Nothing here holds
//! state; zone membership, tracking and speed rules all route through these.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Minimum vertex count for a structurally valid polygon.
pub const MIN_POLYGON_VERTICES: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in pixel units, origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Structural check: finite, non-negative origin, positive extent, and a
    /// far corner that is still finite.
    pub fn validate(&self) -> Result<()> {
        let fields = [self.x, self.y, self.width, self.height];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::malformed(
                "bounding box contains a non-finite value",
            ));
        }
        if self.x < 0.0 || self.y < 0.0 {
            return Err(PipelineError::malformed(format!(
                "bounding box origin ({}, {}) is negative",
                self.x, self.y
            )));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(PipelineError::malformed(format!(
                "bounding box extent {}x{} must be positive",
                self.width, self.height
            )));
        }
        if !(self.x + self.width).is_finite() || !(self.y + self.height).is_finite() {
            return Err(PipelineError::malformed(
                "bounding box extends beyond the representable range",
            ));
        }
        Ok(())
    }

    pub fn center(&self) -> Point {
        box_center(self)
    }
}

/// Ray-casting membership test with a half-open edge rule.
///
/// A horizontal ray is cast from `point` towards +x. An edge counts as a
/// crossing only when `min(y1, y2) <= point.y < max(y1, y2)` and the edge
/// intersects the ray strictly to the right of the point. Horizontal edges
/// therefore never count, and a shared vertex is counted once. Points on a
/// left or bottom (low-y) edge are inside; points on a right or top edge are
/// outside.
///
/// Polygons with fewer than three vertices are rejected rather than being
/// reported as containing nothing.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> Result<bool> {
    if polygon.len() < MIN_POLYGON_VERTICES {
        return Err(PipelineError::configuration(format!(
            "polygon needs at least {} vertices, got {}",
            MIN_POLYGON_VERTICES,
            polygon.len()
        )));
    }

    let mut inside = false;
    let mut prev = polygon[polygon.len() - 1];
    for &curr in polygon {
        let (lo, hi) = if prev.y <= curr.y {
            (prev.y, curr.y)
        } else {
            (curr.y, prev.y)
        };
        if point.y >= lo && point.y < hi {
            // hi > lo here, so the edge is not horizontal.
            let x_cross = prev.x + (point.y - prev.y) * (curr.x - prev.x) / (curr.y - prev.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        prev = curr;
    }
    Ok(inside)
}

pub fn box_center(bbox: &BoundingBox) -> Point {
    Point {
        x: bbox.x + bbox.width / 2.0,
        y: bbox.y + bbox.height / 2.0,
    }
}

/// Euclidean distance.
pub fn distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Distance between box centers.
pub fn box_distance(a: &BoundingBox, b: &BoundingBox) -> f64 {
    distance(box_center(a), box_center(b))
}

/// Sum of consecutive segment lengths. Zero for fewer than two points.
pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Pixels per second along `points`; zero when no time has elapsed.
pub fn speed(points: &[Point], elapsed_seconds: f64) -> f64 {
    if elapsed_seconds <= 0.0 {
        return 0.0;
    }
    path_length(points) / elapsed_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    #[test]
    fn point_in_polygon_inside_and_outside() {
        let sq = square();
        assert!(point_in_polygon(Point::new(5.0, 5.0), &sq).unwrap());
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &sq).unwrap());
        assert!(!point_in_polygon(Point::new(-1.0, 5.0), &sq).unwrap());
        assert!(!point_in_polygon(Point::new(5.0, 11.0), &sq).unwrap());
    }

    #[test]
    fn boundary_follows_half_open_rule_consistently() {
        let sq = square();
        for _ in 0..3 {
            // left and bottom edges are inside
            assert!(point_in_polygon(Point::new(0.0, 5.0), &sq).unwrap());
            assert!(point_in_polygon(Point::new(5.0, 0.0), &sq).unwrap());
            // right and top edges are outside
            assert!(!point_in_polygon(Point::new(10.0, 5.0), &sq).unwrap());
            assert!(!point_in_polygon(Point::new(5.0, 10.0), &sq).unwrap());
        }
    }

    #[test]
    fn ray_through_vertex_counts_once() {
        let diamond = vec![
            Point::new(5.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 5.0),
        ];
        // ray at y=5 passes through vertices (10,5) and (0,5)
        assert!(point_in_polygon(Point::new(5.0, 5.0), &diamond).unwrap());
        assert!(!point_in_polygon(Point::new(-3.0, 5.0), &diamond).unwrap());
        assert!(!point_in_polygon(Point::new(12.0, 5.0), &diamond).unwrap());
    }

    #[test]
    fn concave_polygon_notch_is_outside() {
        // U shape open at the top between x=3..7
        let u = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(7.0, 10.0),
            Point::new(7.0, 3.0),
            Point::new(3.0, 3.0),
            Point::new(3.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(!point_in_polygon(Point::new(5.0, 6.0), &u).unwrap());
        assert!(point_in_polygon(Point::new(1.5, 6.0), &u).unwrap());
        assert!(point_in_polygon(Point::new(5.0, 1.0), &u).unwrap());
    }

    #[test]
    fn short_polygon_is_rejected() {
        let two = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        let err = point_in_polygon(Point::new(0.5, 0.5), &two).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(point_in_polygon(Point::new(0.0, 0.0), &[]).is_err());
    }

    #[test]
    fn collinear_polygon_is_deterministic() {
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 10.0),
        ];
        let first = point_in_polygon(Point::new(5.0, 5.0), &line).unwrap();
        let second = point_in_polygon(Point::new(5.0, 5.0), &line).unwrap();
        assert_eq!(first, second);
        assert!(!point_in_polygon(Point::new(2.0, 8.0), &line).unwrap());
    }

    #[test]
    fn box_helpers() {
        let a = BoundingBox::new(50.0, 450.0, 40.0, 80.0);
        assert_eq!(a.center(), Point::new(70.0, 490.0));

        let b = BoundingBox::new(53.0, 454.0, 40.0, 80.0);
        assert!((box_distance(&a, &b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn path_length_and_speed() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ];
        assert!((path_length(&pts) - 11.0).abs() < 1e-9);
        assert!((speed(&pts, 2.0) - 5.5).abs() < 1e-9);
        assert_eq!(speed(&pts, 0.0), 0.0);
        assert_eq!(speed(&pts, -1.0), 0.0);
        assert_eq!(path_length(&pts[..1]), 0.0);
    }

    #[test]
    fn bounding_box_validation() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).validate().is_ok());
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 1.0).validate().is_err());
        assert!(BoundingBox::new(-1.0, 0.0, 1.0, 1.0).validate().is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn overflowing_extent_is_malformed() {
        let huge = BoundingBox::new(1e308, 1e308, 1.7e308, 1.7e308);
        assert!(matches!(
            huge.validate(),
            Err(PipelineError::MalformedInput(_))
        ));
        assert!(BoundingBox::new(1e308, 0.0, 1e300, 1.0).validate().is_ok());
    }
}
