//! Curves in surface parameter space, used as trimming curves.

use stepbrep_math::{Point2, Vec2};

use crate::{Curve2d, GeomError};

// =============================================================================
// Line2d
// =============================================================================

/// A 2D line segment in parameter space; `t ∈ [0, 1]`.
#[derive(Debug, Clone)]
pub struct Line2d {
    /// Starting point.
    pub origin: Point2,
    /// Direction.
    pub direction: Vec2,
}

impl Line2d {
    /// Create from two endpoints.
    pub fn from_points(start: Point2, end: Point2) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }
}

impl Curve2d for Line2d {
    fn evaluate(&self, t: f64) -> Point2 {
        self.origin + t * self.direction
    }

    fn tangent(&self, _t: f64) -> Vec2 {
        self.direction
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Polyline2d
// =============================================================================

/// A piecewise-linear curve in parameter space; segment `i` spans
/// `t ∈ [i, i + 1]`. Pulled-back edge curves are stored this way.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline2d {
    /// Vertices in order.
    pub points: Vec<Point2>,
}

impl Polyline2d {
    /// Create a polyline through at least two points.
    pub fn new(points: Vec<Point2>) -> Result<Self, GeomError> {
        if points.len() < 2 {
            return Err(GeomError::TooFewPoints {
                degree: 1,
                needed: 2,
                got: points.len(),
            });
        }
        Ok(Self { points })
    }

    /// The same polyline moved by `offset`.
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            points: self.points.iter().map(|p| p + offset).collect(),
        }
    }

    fn segment(&self, t: f64) -> (usize, f64) {
        let last = self.points.len() - 2;
        let t = t.clamp(0.0, (last + 1) as f64);
        let i = (t.floor() as usize).min(last);
        (i, t - i as f64)
    }
}

impl Curve2d for Polyline2d {
    fn evaluate(&self, t: f64) -> Point2 {
        let (i, s) = self.segment(t);
        self.points[i] + s * (self.points[i + 1] - self.points[i])
    }

    fn tangent(&self, t: f64) -> Vec2 {
        let (i, _) = self.segment(t);
        self.points[i + 1] - self.points[i]
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, (self.points.len() - 1) as f64)
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }
}
