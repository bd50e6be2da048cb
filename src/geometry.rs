// src/geometry.rs
//
// 2D primitives in the ground plane. Boundary points count as inside.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Ground-plane projection of a 3D position
    pub fn from_xyz(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1])
    }

    pub fn add(self, other: Point2) -> Point2 {
        Point2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, k: f64) -> Point2 {
        Point2::new(self.x * k, self.y * k)
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector, or None for a zero-length vector
    pub fn unit(self) -> Option<Point2> {
        let n = self.norm();
        (n > EPS).then(|| self.scale(1.0 / n))
    }

    /// Counter-clockwise perpendicular
    pub fn perp(self) -> Point2 {
        Point2::new(-self.y, self.x)
    }
}

pub fn distance(a: Point2, b: Point2) -> f64 {
    b.sub(a).norm()
}

pub fn distance3(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// Heading of the vector a -> b in radians, (-pi, pi]
pub fn heading(a: Point2, b: Point2) -> f64 {
    let d = b.sub(a);
    d.y.atan2(d.x)
}

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Inclusive containment test for a convex polygon given in either winding
/// order. Degenerate polygons (zero area) contain nothing.
pub fn point_in_convex_polygon(p: Point2, poly: &[Point2]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut has_pos = false;
    let mut has_neg = false;
    let mut degenerate = true;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        if distance(a, b) > EPS {
            degenerate = false;
        }
        let c = cross(a, b, p);
        if c > EPS {
            has_pos = true;
        } else if c < -EPS {
            has_neg = true;
        }
        if has_pos && has_neg {
            return false;
        }
    }
    !degenerate && polygon_area(poly).abs() > EPS
}

/// Signed area (positive for counter-clockwise winding)
pub fn polygon_area(poly: &[Point2]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Point2; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_point_in_square_inclusive() {
        let sq = square();
        assert!(point_in_convex_polygon(Point2::new(5.0, 5.0), &sq));
        assert!(point_in_convex_polygon(Point2::new(0.0, 5.0), &sq));
        assert!(point_in_convex_polygon(Point2::new(10.0, 10.0), &sq));
        assert!(!point_in_convex_polygon(Point2::new(10.01, 5.0), &sq));
        assert!(!point_in_convex_polygon(Point2::new(-1.0, -1.0), &sq));
    }

    #[test]
    fn test_winding_order_does_not_matter() {
        let mut sq = square();
        sq.reverse();
        assert!(point_in_convex_polygon(Point2::new(2.0, 8.0), &sq));
        assert!(polygon_area(&sq) < 0.0);
        assert_eq!(polygon_area(&square()), 100.0);
    }

    #[test]
    fn test_point_in_triangle() {
        let tri = [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(0.0, 4.0),
        ];
        assert!(point_in_convex_polygon(Point2::new(1.0, 1.0), &tri));
        assert!(point_in_convex_polygon(Point2::new(2.0, 2.0), &tri));
        assert!(!point_in_convex_polygon(Point2::new(2.5, 2.5), &tri));
    }

    #[test]
    fn test_degenerate_polygon_is_empty() {
        let line = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ];
        assert!(!point_in_convex_polygon(Point2::new(1.0, 1.0), &line));
    }

    #[test]
    fn test_angles_and_distances() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert_eq!(distance(a, b), 5.0);
        assert!((heading(a, Point2::new(0.0, 1.0)) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(distance3([0.0, 0.0, 0.0], [1.0, 2.0, 2.0]), 3.0);
        assert!(Point2::new(0.0, 0.0).unit().is_none());
    }
}
