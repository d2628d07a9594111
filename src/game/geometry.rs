//! Line-segment intersection and small vector helpers

use serde::Serialize;

/// A line segment between two points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Segment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Intersection point of this segment with another, if they cross
    pub fn intersect(&self, other: &Segment) -> Option<(f32, f32)> {
        segment_intersection(
            self.x1, self.y1, self.x2, self.y2, other.x1, other.y1, other.x2, other.y2,
        )
    }
}

/// Intersection of segment (x1,y1)-(x2,y2) with segment (x3,y3)-(x4,y4).
///
/// Endpoints count as touching. Parallel and collinear segments never intersect.
#[allow(clippy::too_many_arguments)]
pub fn segment_intersection(
    x1: f32, y1: f32, x2: f32, y2: f32,
    x3: f32, y3: f32, x4: f32, y4: f32,
) -> Option<(f32, f32)> {
    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denom.abs() <= f32::EPSILON {
        return None;
    }

    let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
    let u = -((x1 - x2) * (y1 - y3) - (y1 - y2) * (x1 - x3)) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((x1 + t * (x2 - x1), y1 + t * (y2 - y1)))
    } else {
        None
    }
}

/// Euclidean distance between two points
pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// Unit vector in the direction of (dx, dy), or None for a zero-length input
pub fn normalize(dx: f32, dy: f32) -> Option<(f32, f32)> {
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON || !len.is_finite() {
        return None;
    }
    Some((dx / len, dy / len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_segments_meet_at_center() {
        let a = Segment::new(0.0, 0.0, 10.0, 10.0);
        let b = Segment::new(0.0, 10.0, 10.0, 0.0);
        let (x, y) = a.intersect(&b).unwrap();
        assert!((x - 5.0).abs() < 1e-4);
        assert!((y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn disjoint_segments_do_not_intersect() {
        let a = Segment::new(0.0, 0.0, 1.0, 1.0);
        let b = Segment::new(5.0, 0.0, 6.0, -3.0);
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let a = Segment::new(0.0, 0.0, 10.0, 0.0);
        let b = Segment::new(0.0, 1.0, 10.0, 1.0);
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn touching_endpoint_counts() {
        let a = Segment::new(0.0, 0.0, 10.0, 0.0);
        let b = Segment::new(10.0, -5.0, 10.0, 5.0);
        let (x, y) = a.intersect(&b).unwrap();
        assert!((x - 10.0).abs() < 1e-4);
        assert!(y.abs() < 1e-4);
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        assert!(normalize(0.0, 0.0).is_none());
        let (x, y) = normalize(3.0, 4.0).unwrap();
        assert!((x - 0.6).abs() < 1e-6);
        assert!((y - 0.8).abs() < 1e-6);
    }
}
