#![warn(missing_docs)]

//! Curve and surface primitives produced by the stepbrep importer.
//!
//! Provides trait-based abstractions for parametric surfaces and curves,
//! with concrete implementations for every geometric primitive a STEP
//! boundary representation can reference: lines, conics, polylines and
//! NURBS curves; planes, elementary quadrics, NURBS surfaces and swept
//! surfaces.
//!
//! Parameterizations follow ISO 10303-42 so that parameters read from a
//! file (trim values, seam offsets) mean the same thing here.

mod curves;
mod curves2d;
mod nurbs;
mod surfaces;

pub use curves::{Circle3d, Ellipse3d, Hyperbola3d, Line3d, Parabola3d, Polyline3d};
pub use curves2d::{Line2d, Polyline2d};
pub use nurbs::{
    bezier_knots, expand_knots, quasi_uniform_knots, uniform_knots, KnotSpec, NurbsCurve,
    NurbsSurface,
};
pub use surfaces::{
    ConeSurface, CylinderSurface, ExtrusionSurface, Plane, RevolutionSurface, SphereSurface,
    TorusSurface,
};

use std::any::Any;
use std::f64::consts::PI;

use stepbrep_math::{Dir3, Point2, Point3, Vec2, Vec3};
use thiserror::Error;

/// Errors raised while constructing a primitive.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    /// Knot vector is decreasing or has the wrong length.
    #[error("invalid knot vector: len={len} but expected {expected}")]
    InvalidKnots {
        /// Actual knot count.
        len: usize,
        /// Expected knot count (`n + degree + 1`).
        expected: usize,
    },

    /// Knot values and multiplicities differ in length.
    #[error("knot multiplicities ({mults}) do not match knot values ({knots})")]
    MultiplicityMismatch {
        /// Number of multiplicities.
        mults: usize,
        /// Number of distinct knots.
        knots: usize,
    },

    /// Control grid is ragged or does not match the declared size.
    #[error("control grid is not rectangular")]
    RaggedGrid,

    /// Weights do not match the control points.
    #[error("{weights} weights for {points} control points")]
    WeightMismatch {
        /// Number of weights.
        weights: usize,
        /// Number of control points.
        points: usize,
    },

    /// Too few control points for the degree.
    #[error("degree {degree} needs at least {needed} control points, got {got}")]
    TooFewPoints {
        /// Requested degree.
        degree: usize,
        /// Required point count.
        needed: usize,
        /// Supplied point count.
        got: usize,
    },

    /// A dimension (radius, magnitude) is zero or negative.
    #[error("non-positive {what}: {value}")]
    NonPositive {
        /// The offending dimension.
        what: &'static str,
        /// Its value.
        value: f64,
    },
}

// =============================================================================
// Surface trait
// =============================================================================

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface.
    Cylinder,
    /// Conical surface.
    Cone,
    /// Spherical surface.
    Sphere,
    /// Toroidal surface.
    Torus,
    /// B-spline or NURBS surface.
    BSpline,
    /// Surface of linear extrusion.
    Extrusion,
    /// Surface of revolution.
    Revolution,
}

/// One side of a surface's parameter rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainSide {
    /// `v = v_min`.
    South,
    /// `u = u_max`.
    East,
    /// `v = v_max`.
    North,
    /// `u = u_min`.
    West,
}

impl DomainSide {
    /// All four sides.
    pub const ALL: [DomainSide; 4] = [
        DomainSide::South,
        DomainSide::East,
        DomainSide::North,
        DomainSide::West,
    ];
}

/// A parametric surface in 3D space.
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at parameter `(u, v)` to get a 3D point.
    fn evaluate(&self, uv: Point2) -> Point3;

    /// Partial derivative with respect to u at `(u, v)`.
    fn d_du(&self, uv: Point2) -> Vec3;

    /// Partial derivative with respect to v at `(u, v)`.
    fn d_dv(&self, uv: Point2) -> Vec3;

    /// Surface normal at parameter `(u, v)`.
    fn normal(&self, uv: Point2) -> Dir3 {
        let n = self.d_du(uv).cross(&self.d_dv(uv));
        if n.norm() < 1e-15 {
            Dir3::new_normalize(Vec3::z())
        } else {
            Dir3::new_normalize(n)
        }
    }

    /// Parameter domain as `((u_min, u_max), (v_min, v_max))`.
    fn domain(&self) -> ((f64, f64), (f64, f64));

    /// Period in u and v, `None` when the direction is not closed.
    fn periods(&self) -> (Option<f64>, Option<f64>) {
        (None, None)
    }

    /// Whether `side` of the domain collapses to a single point (a pole
    /// or an apex).
    fn is_singular(&self, _side: DomainSide) -> bool {
        false
    }

    /// The singular side `uv` lies on, within `tol` in parameter space.
    fn singular_side(&self, uv: Point2, tol: f64) -> Option<DomainSide> {
        let ((u0, u1), (v0, v1)) = self.domain();
        DomainSide::ALL.into_iter().find(|&side| {
            let on_side = match side {
                DomainSide::South => (uv.y - v0).abs() <= tol,
                DomainSide::East => (uv.x - u1).abs() <= tol,
                DomainSide::North => (uv.y - v1).abs() <= tol,
                DomainSide::West => (uv.x - u0).abs() <= tol,
            };
            on_side && self.is_singular(side)
        })
    }

    /// Parameter of the point on the surface closest to `p`.
    fn project(&self, p: &Point3) -> Point2 {
        sampled_surface_projection(self, p)
    }

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;

    /// Clone this surface into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// =============================================================================
// Curve trait
// =============================================================================

/// The kind of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line.
    Line,
    /// Circle.
    Circle,
    /// Ellipse.
    Ellipse,
    /// One branch of a hyperbola.
    Hyperbola,
    /// Parabola.
    Parabola,
    /// Piecewise-linear polyline.
    Polyline,
    /// B-spline or NURBS curve.
    BSpline,
}

/// A parametric curve in 3D space.
pub trait Curve3d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 3D point.
    fn evaluate(&self, t: f64) -> Point3;

    /// Tangent vector at parameter `t`.
    fn tangent(&self, t: f64) -> Vec3;

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// Period of a closed curve.
    fn period(&self) -> Option<f64> {
        None
    }

    /// Parameter of the point on the curve closest to `p`.
    ///
    /// The default searches a sampled domain and refines with Newton steps.
    fn parameter_of(&self, p: &Point3) -> f64 {
        sampled_curve_parameter(self, p)
    }

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve3d>;
}

impl Clone for Box<dyn Curve3d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A 2D parametric curve (for trim curves in surface parameter space).
pub trait Curve2d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 2D point.
    fn evaluate(&self, t: f64) -> Point2;

    /// Tangent vector at parameter `t`.
    fn tangent(&self, t: f64) -> Vec2;

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// Point at the start of the domain.
    fn start(&self) -> Point2 {
        self.evaluate(self.domain().0)
    }

    /// Point at the end of the domain.
    fn end(&self) -> Point2 {
        self.evaluate(self.domain().1)
    }

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve2d>;
}

impl Clone for Box<dyn Curve2d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn wrap_angle(a: f64) -> f64 {
    let w = a.rem_euclid(2.0 * PI);
    if w >= 2.0 * PI {
        0.0
    } else {
        w
    }
}

// =============================================================================
// Closest-point search
// =============================================================================

const CURVE_SAMPLES: usize = 64;
const SURFACE_SAMPLES: usize = 24;
const NEWTON_STEPS: usize = 12;

/// Clamp an unbounded domain to something finite for sampling.
fn finite_range(lo: f64, hi: f64) -> (f64, f64) {
    (lo.max(-1e4), hi.min(1e4))
}

fn sampled_curve_parameter<C: Curve3d + ?Sized>(curve: &C, p: &Point3) -> f64 {
    let (lo, hi) = finite_range(curve.domain().0, curve.domain().1);
    let step = (hi - lo) / CURVE_SAMPLES as f64;
    let mut best_t = lo;
    let mut best_d = f64::INFINITY;
    for i in 0..=CURVE_SAMPLES {
        let t = lo + step * i as f64;
        let d = (curve.evaluate(t) - p).norm_squared();
        if d < best_d {
            best_d = d;
            best_t = t;
        }
    }

    // Newton on f(t) = (C(t) - p) . C'(t), with a finite-difference C''.
    let h = (hi - lo).abs().max(1.0) * 1e-6;
    let mut t = best_t;
    for _ in 0..NEWTON_STEPS {
        let d = curve.evaluate(t) - p;
        let d1 = curve.tangent(t);
        let d2 = (curve.tangent((t + h).min(hi)) - curve.tangent((t - h).max(lo))) / (2.0 * h);
        let f = d.dot(&d1);
        let df = d1.norm_squared() + d.dot(&d2);
        if df.abs() < 1e-30 {
            break;
        }
        let next = (t - f / df).clamp(lo, hi);
        if (next - t).abs() < 1e-14 {
            t = next;
            break;
        }
        t = next;
    }
    if (curve.evaluate(t) - p).norm_squared() <= best_d {
        t
    } else {
        best_t
    }
}

fn sampled_surface_projection<S: Surface + ?Sized>(surface: &S, p: &Point3) -> Point2 {
    let ((u0, u1), (v0, v1)) = surface.domain();
    let (u0, u1) = finite_range(u0, u1);
    let (v0, v1) = finite_range(v0, v1);
    let du = (u1 - u0) / SURFACE_SAMPLES as f64;
    let dv = (v1 - v0) / SURFACE_SAMPLES as f64;

    let mut best = Point2::new(u0, v0);
    let mut best_d = f64::INFINITY;
    for i in 0..=SURFACE_SAMPLES {
        for j in 0..=SURFACE_SAMPLES {
            let uv = Point2::new(u0 + du * i as f64, v0 + dv * j as f64);
            let d = (surface.evaluate(uv) - p).norm_squared();
            if d < best_d {
                best_d = d;
                best = uv;
            }
        }
    }

    // Gauss-Newton on the residual.
    let mut uv = best;
    for _ in 0..NEWTON_STEPS {
        let r = surface.evaluate(uv) - p;
        let su = surface.d_du(uv);
        let sv = surface.d_dv(uv);
        let a = su.dot(&su);
        let b = su.dot(&sv);
        let c = sv.dot(&sv);
        let det = a * c - b * b;
        if det.abs() < 1e-30 {
            break;
        }
        let gu = r.dot(&su);
        let gv = r.dot(&sv);
        let step_u = (c * gu - b * gv) / det;
        let step_v = (a * gv - b * gu) / det;
        uv = Point2::new((uv.x - step_u).clamp(u0, u1), (uv.y - step_v).clamp(v0, v1));
        if step_u.abs() + step_v.abs() < 1e-14 {
            break;
        }
    }
    if (surface.evaluate(uv) - p).norm_squared() <= best_d {
        uv
    } else {
        best
    }
}

// =============================================================================
// Geometry store
// =============================================================================

/// Storage for all geometric entities (surfaces and curves) associated with a B-rep.
#[derive(Debug, Clone, Default)]
pub struct GeometryStore {
    /// Surfaces indexed by position.
    pub surfaces: Vec<Box<dyn Surface>>,
    /// 3D curves indexed by position.
    pub curves_3d: Vec<Box<dyn Curve3d>>,
    /// 2D trim curves indexed by position.
    pub curves_2d: Vec<Box<dyn Curve2d>>,
}

impl GeometryStore {
    /// Create an empty geometry store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a surface and return its index.
    pub fn add_surface(&mut self, surface: Box<dyn Surface>) -> usize {
        let idx = self.surfaces.len();
        self.surfaces.push(surface);
        idx
    }

    /// Add a 3D curve and return its index.
    pub fn add_curve_3d(&mut self, curve: Box<dyn Curve3d>) -> usize {
        let idx = self.curves_3d.len();
        self.curves_3d.push(curve);
        idx
    }

    /// Add a 2D trim curve and return its index.
    pub fn add_curve_2d(&mut self, curve: Box<dyn Curve2d>) -> usize {
        let idx = self.curves_2d.len();
        self.curves_2d.push(curve);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepbrep_math::Frame;

    #[test]
    fn test_geometry_store() {
        let mut store = GeometryStore::new();
        let idx = store.add_surface(Box::new(Plane::new(Frame::world())));
        assert_eq!(idx, 0);
        let c = store.add_curve_3d(Box::new(Line3d::from_points(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
        )));
        assert_eq!(c, 0);
        let t = store.add_curve_2d(Box::new(Line2d::from_points(
            Point2::origin(),
            Point2::new(1.0, 0.0),
        )));
        assert_eq!(t, 0);
        assert_eq!(store.surfaces.len(), 1);
    }

    #[test]
    fn test_singular_sides() {
        let sphere = SphereSurface::new(Frame::world(), 2.0).unwrap();
        let pole = sphere.project(&Point3::new(0.0, 0.0, 2.0));
        assert_eq!(sphere.singular_side(pole, 1e-9), Some(DomainSide::North));
        let south = sphere.project(&Point3::new(0.0, 0.0, -2.0));
        assert_eq!(sphere.singular_side(south, 1e-9), Some(DomainSide::South));
        let equator = sphere.project(&Point3::new(2.0, 0.0, 0.0));
        assert_eq!(sphere.singular_side(equator, 1e-9), None);

        let cone = ConeSurface::new(Frame::world(), 1.0, PI / 4.0).unwrap();
        let apex = cone.project(&cone.apex());
        assert_eq!(cone.singular_side(apex, 1e-9), Some(DomainSide::South));

        // The seam of a cylinder is closed, not singular.
        let cyl = CylinderSurface::new(Frame::world(), 1.0).unwrap();
        assert_eq!(cyl.singular_side(Point2::new(0.0, 0.0), 1e-9), None);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
        assert!(wrap_angle(2.0 * PI).abs() < 1e-12);
        assert!((wrap_angle(5.0 * PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_sampled_projection_on_nurbs() {
        // A bilinear patch stored as a degree-1 NURBS surface.
        let grid = vec![
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 2.0, 0.0)],
            vec![Point3::new(2.0, 0.0, 0.0), Point3::new(2.0, 2.0, 0.0)],
        ];
        let s = NurbsSurface::new(
            grid,
            None,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            1,
            1,
        )
        .unwrap();
        let uv = s.project(&Point3::new(0.5, 1.5, 3.0));
        assert!((uv.x - 0.25).abs() < 1e-6);
        assert!((uv.y - 0.75).abs() < 1e-6);
    }
}
