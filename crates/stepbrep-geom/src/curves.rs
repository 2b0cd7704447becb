//! Lines, conics and polylines.

use std::f64::consts::PI;

use stepbrep_math::{Frame, Point3, Vec3};

use crate::{wrap_angle, Curve3d, CurveKind, GeomError};

// =============================================================================
// Line3d
// =============================================================================

/// A 3D line defined by origin and direction.
///
/// Parameterization: `P(t) = origin + t * direction`
#[derive(Debug, Clone)]
pub struct Line3d {
    /// Point at `t = 0`.
    pub origin: Point3,
    /// Direction (not necessarily unit length, magnitude determines speed).
    pub direction: Vec3,
}

impl Line3d {
    /// Create a line from an origin and a direction vector.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Create a line from two endpoints, parameterized so `t=0` gives `start` and `t=1` gives `end`.
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }
}

impl Curve3d for Line3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    fn tangent(&self, _t: f64) -> Vec3 {
        self.direction
    }

    fn domain(&self) -> (f64, f64) {
        (-1e10, 1e10)
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let len2 = self.direction.norm_squared();
        if len2 < 1e-30 {
            return 0.0;
        }
        (p - self.origin).dot(&self.direction) / len2
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Circle3d
// =============================================================================

/// A circle in its placement frame.
///
/// Parameterization: `P(t) = center + radius * (cos(t) * x + sin(t) * y)`,
/// `t ∈ [0, 2π)`.
#[derive(Debug, Clone)]
pub struct Circle3d {
    /// Placement; the origin is the center, `z` the circle normal.
    pub frame: Frame,
    /// Radius.
    pub radius: f64,
}

impl Circle3d {
    /// Create a circle in the given frame.
    pub fn new(frame: Frame, radius: f64) -> Result<Self, GeomError> {
        if radius <= 0.0 {
            return Err(GeomError::NonPositive {
                what: "radius",
                value: radius,
            });
        }
        Ok(Self { frame, radius })
    }

    /// Center of the circle.
    pub fn center(&self) -> Point3 {
        self.frame.origin
    }
}

impl Curve3d for Circle3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.frame.to_world(&Vec3::new(
            self.radius * cos_t,
            self.radius * sin_t,
            0.0,
        ))
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.radius * (-sin_t * self.frame.x.as_ref() + cos_t * self.frame.y.as_ref())
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 2.0 * PI)
    }

    fn period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let l = self.frame.to_local(p);
        wrap_angle(l.y.atan2(l.x))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Circle
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Ellipse3d
// =============================================================================

/// An ellipse in its placement frame.
///
/// Parameterization: `P(t) = center + a * cos(t) * x + b * sin(t) * y`.
#[derive(Debug, Clone)]
pub struct Ellipse3d {
    /// Placement; the origin is the center.
    pub frame: Frame,
    /// Semi-axis along `x`.
    pub semi_axis_1: f64,
    /// Semi-axis along `y`.
    pub semi_axis_2: f64,
}

impl Ellipse3d {
    /// Create an ellipse in the given frame.
    pub fn new(frame: Frame, semi_axis_1: f64, semi_axis_2: f64) -> Result<Self, GeomError> {
        for value in [semi_axis_1, semi_axis_2] {
            if value <= 0.0 {
                return Err(GeomError::NonPositive {
                    what: "semi-axis",
                    value,
                });
            }
        }
        Ok(Self {
            frame,
            semi_axis_1,
            semi_axis_2,
        })
    }
}

impl Curve3d for Ellipse3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.frame.to_world(&Vec3::new(
            self.semi_axis_1 * cos_t,
            self.semi_axis_2 * sin_t,
            0.0,
        ))
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (sin_t, cos_t) = t.sin_cos();
        -self.semi_axis_1 * sin_t * self.frame.x.as_ref()
            + self.semi_axis_2 * cos_t * self.frame.y.as_ref()
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 2.0 * PI)
    }

    fn period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        // Eccentric anomaly; exact for points on the ellipse.
        let l = self.frame.to_local(p);
        wrap_angle((l.y / self.semi_axis_2).atan2(l.x / self.semi_axis_1))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Ellipse
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Hyperbola3d
// =============================================================================

/// One branch of a hyperbola.
///
/// Parameterization: `P(t) = center + a * cosh(t) * x + b * sinh(t) * y`.
#[derive(Debug, Clone)]
pub struct Hyperbola3d {
    /// Placement; the origin is the center.
    pub frame: Frame,
    /// Transverse semi-axis `a`.
    pub semi_axis: f64,
    /// Conjugate semi-axis `b`.
    pub semi_imag_axis: f64,
}

impl Hyperbola3d {
    /// Create a hyperbola branch in the given frame.
    pub fn new(frame: Frame, semi_axis: f64, semi_imag_axis: f64) -> Result<Self, GeomError> {
        for (what, value) in [("semi_axis", semi_axis), ("semi_imag_axis", semi_imag_axis)] {
            if value <= 0.0 {
                return Err(GeomError::NonPositive { what, value });
            }
        }
        Ok(Self {
            frame,
            semi_axis,
            semi_imag_axis,
        })
    }
}

impl Curve3d for Hyperbola3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.frame.to_world(&Vec3::new(
            self.semi_axis * t.cosh(),
            self.semi_imag_axis * t.sinh(),
            0.0,
        ))
    }

    fn tangent(&self, t: f64) -> Vec3 {
        self.semi_axis * t.sinh() * self.frame.x.as_ref()
            + self.semi_imag_axis * t.cosh() * self.frame.y.as_ref()
    }

    fn domain(&self) -> (f64, f64) {
        (-20.0, 20.0)
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let l = self.frame.to_local(p);
        (l.y / self.semi_imag_axis).asinh()
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Hyperbola
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Parabola3d
// =============================================================================

/// A parabola.
///
/// Parameterization: `P(t) = apex + f * (t² * x + 2t * y)`.
#[derive(Debug, Clone)]
pub struct Parabola3d {
    /// Placement; the origin is the apex.
    pub frame: Frame,
    /// Focal distance `f`.
    pub focal_dist: f64,
}

impl Parabola3d {
    /// Create a parabola in the given frame.
    pub fn new(frame: Frame, focal_dist: f64) -> Result<Self, GeomError> {
        if focal_dist <= 0.0 {
            return Err(GeomError::NonPositive {
                what: "focal_dist",
                value: focal_dist,
            });
        }
        Ok(Self { frame, focal_dist })
    }
}

impl Curve3d for Parabola3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.frame.to_world(&Vec3::new(
            self.focal_dist * t * t,
            2.0 * self.focal_dist * t,
            0.0,
        ))
    }

    fn tangent(&self, t: f64) -> Vec3 {
        2.0 * self.focal_dist * (t * self.frame.x.as_ref() + self.frame.y.as_ref())
    }

    fn domain(&self) -> (f64, f64) {
        (-1e5, 1e5)
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        self.frame.to_local(p).y / (2.0 * self.focal_dist)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Parabola
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Polyline3d
// =============================================================================

/// A piecewise-linear curve; segment `i` spans `t ∈ [i, i + 1]`.
#[derive(Debug, Clone)]
pub struct Polyline3d {
    /// Vertices in order.
    pub points: Vec<Point3>,
}

impl Polyline3d {
    /// Create a polyline through at least two points.
    pub fn new(points: Vec<Point3>) -> Result<Self, GeomError> {
        if points.len() < 2 {
            return Err(GeomError::TooFewPoints {
                degree: 1,
                needed: 2,
                got: points.len(),
            });
        }
        Ok(Self { points })
    }

    fn segment(&self, t: f64) -> (usize, f64) {
        let last = self.points.len() - 2;
        let t = t.clamp(0.0, (last + 1) as f64);
        let i = (t.floor() as usize).min(last);
        (i, t - i as f64)
    }
}

impl Curve3d for Polyline3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (i, s) = self.segment(t);
        self.points[i] + s * (self.points[i + 1] - self.points[i])
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (i, _) = self.segment(t);
        self.points[i + 1] - self.points[i]
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, (self.points.len() - 1) as f64)
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let mut best = (f64::INFINITY, 0.0);
        for (i, w) in self.points.windows(2).enumerate() {
            let d = w[1] - w[0];
            let len2 = d.norm_squared();
            let s = if len2 < 1e-30 {
                0.0
            } else {
                ((p - w[0]).dot(&d) / len2).clamp(0.0, 1.0)
            };
            let dist = (w[0] + s * d - p).norm_squared();
            if dist < best.0 {
                best = (dist, i as f64 + s);
            }
        }
        best.1
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Polyline
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_at(origin: Point3) -> Frame {
        Frame {
            origin,
            ..Frame::world()
        }
    }

    #[test]
    fn test_line3d() {
        let line = Line3d::from_points(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
        let mid = line.evaluate(0.5);
        assert!((mid.x - 5.0).abs() < 1e-12);
        assert!((line.parameter_of(&Point3::new(2.5, 3.0, 0.0)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_circle3d() {
        let circle = Circle3d::new(Frame::world(), 5.0).unwrap();
        let pt = circle.evaluate(0.0);
        assert!((pt.x - 5.0).abs() < 1e-12);
        let pt90 = circle.evaluate(PI / 2.0);
        assert!(pt90.x.abs() < 1e-12);
        assert!((pt90.y - 5.0).abs() < 1e-12);
        let t = circle.parameter_of(&Point3::new(0.0, -5.0, 0.0));
        assert!((t - 1.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_circle_rejects_zero_radius() {
        assert!(Circle3d::new(Frame::world(), 0.0).is_err());
    }

    #[test]
    fn test_ellipse_parameter_round_trip() {
        let e = Ellipse3d::new(frame_at(Point3::new(1.0, 1.0, 0.0)), 4.0, 2.0).unwrap();
        for t in [0.1, 1.3, 2.9, 4.4, 6.0] {
            let back = e.parameter_of(&e.evaluate(t));
            assert!((back - t).abs() < 1e-10);
        }
    }

    #[test]
    fn test_hyperbola_and_parabola_inverse() {
        let h = Hyperbola3d {
            frame: Frame::world(),
            semi_axis: 2.0,
            semi_imag_axis: 1.0,
        };
        assert!((h.parameter_of(&h.evaluate(-0.7)) + 0.7).abs() < 1e-10);

        let p = Parabola3d {
            frame: Frame::world(),
            focal_dist: 0.5,
        };
        assert!((p.parameter_of(&p.evaluate(3.0)) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_polyline() {
        let pl = Polyline3d::new(vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ])
        .unwrap();
        assert_eq!(pl.domain(), (0.0, 2.0));
        let p = pl.evaluate(1.5);
        assert!((p.y - 0.5).abs() < 1e-12);
        assert!((pl.parameter_of(&Point3::new(1.2, 0.25, 0.0)) - 1.25).abs() < 1e-12);
        assert!(Polyline3d::new(vec![Point3::origin()]).is_err());
    }
}
