//! Elementary and swept surfaces.
//!
//! Every elementary surface is positioned by a [`Frame`]; `u` runs around
//! the frame's `z` axis starting at `x`.

use std::any::Any;
use std::f64::consts::PI;

use stepbrep_math::{Dir3, Frame, Point2, Point3, Vec3};

use crate::{wrap_angle, Curve3d, DomainSide, GeomError, Surface, SurfaceKind};

const TWO_PI: f64 = 2.0 * PI;

fn check_positive(what: &'static str, value: f64) -> Result<(), GeomError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(GeomError::NonPositive { what, value })
    }
}

/// `cos(u) * x + sin(u) * y` in the frame.
fn radial(frame: &Frame, u: f64) -> Vec3 {
    let (sin_u, cos_u) = u.sin_cos();
    cos_u * frame.x.as_ref() + sin_u * frame.y.as_ref()
}

fn d_radial(frame: &Frame, u: f64) -> Vec3 {
    let (sin_u, cos_u) = u.sin_cos();
    -sin_u * frame.x.as_ref() + cos_u * frame.y.as_ref()
}

// =============================================================================
// Plane
// =============================================================================

/// An infinite plane.
///
/// Parameterization: `P(u, v) = origin + u * x + v * y`
#[derive(Debug, Clone)]
pub struct Plane {
    /// Placement; `z` is the plane normal.
    pub frame: Frame,
}

impl Plane {
    /// Create a plane from its placement.
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        self.frame.to_local(p).z
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.frame.to_world(&Vec3::new(uv.x, uv.y, 0.0))
    }

    fn normal(&self, _uv: Point2) -> Dir3 {
        self.frame.z
    }

    fn d_du(&self, _uv: Point2) -> Vec3 {
        *self.frame.x.as_ref()
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        *self.frame.y.as_ref()
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((-1e10, 1e10), (-1e10, 1e10))
    }

    fn project(&self, p: &Point3) -> Point2 {
        let l = self.frame.to_local(p);
        Point2::new(l.x, l.y)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Cylinder
// =============================================================================

/// A cylindrical surface.
///
/// Parameterization: `P(u, v) = origin + radius * (cos(u) * x + sin(u) * y) + v * z`
#[derive(Debug, Clone)]
pub struct CylinderSurface {
    /// Placement; `z` is the cylinder axis.
    pub frame: Frame,
    /// Radius of the cylinder.
    pub radius: f64,
}

impl CylinderSurface {
    /// Create a cylinder.
    pub fn new(frame: Frame, radius: f64) -> Result<Self, GeomError> {
        check_positive("radius", radius)?;
        Ok(Self { frame, radius })
    }
}

impl Surface for CylinderSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.frame.origin + self.radius * radial(&self.frame, uv.x) + uv.y * self.frame.z.as_ref()
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        Dir3::new_normalize(radial(&self.frame, uv.x))
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        self.radius * d_radial(&self.frame, uv.x)
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        *self.frame.z.as_ref()
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, TWO_PI), (-1e10, 1e10))
    }

    fn periods(&self) -> (Option<f64>, Option<f64>) {
        (Some(TWO_PI), None)
    }

    fn project(&self, p: &Point3) -> Point2 {
        let l = self.frame.to_local(p);
        Point2::new(wrap_angle(l.y.atan2(l.x)), l.z)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cylinder
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Cone
// =============================================================================

/// A conical surface.
///
/// Parameterization:
/// ```text
/// P(u, v) = origin + (radius + v·tan(semi_angle))·(cos(u)·x + sin(u)·y) + v·z
/// ```
///
/// `radius` is measured in the plane of the frame origin, so the apex sits
/// at `v = -radius / tan(semi_angle)`.
#[derive(Debug, Clone)]
pub struct ConeSurface {
    /// Placement; `z` is the cone axis.
    pub frame: Frame,
    /// Radius at `v = 0`.
    pub radius: f64,
    /// Half-angle of the cone in radians.
    pub semi_angle: f64,
}

impl ConeSurface {
    /// Create a cone.
    pub fn new(frame: Frame, radius: f64, semi_angle: f64) -> Result<Self, GeomError> {
        if radius < 0.0 {
            return Err(GeomError::NonPositive {
                what: "radius",
                value: radius,
            });
        }
        check_positive("semi-angle", semi_angle)?;
        Ok(Self {
            frame,
            radius,
            semi_angle,
        })
    }

    /// Apex of the cone.
    pub fn apex(&self) -> Point3 {
        self.frame.origin - (self.radius / self.semi_angle.tan()) * self.frame.z.as_ref()
    }
}

impl Surface for ConeSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let r = self.radius + uv.y * self.semi_angle.tan();
        self.frame.origin + r * radial(&self.frame, uv.x) + uv.y * self.frame.z.as_ref()
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sa, ca) = self.semi_angle.sin_cos();
        Dir3::new_normalize(ca * radial(&self.frame, uv.x) - sa * self.frame.z.as_ref())
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        let r = self.radius + uv.y * self.semi_angle.tan();
        r * d_radial(&self.frame, uv.x)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        self.semi_angle.tan() * radial(&self.frame, uv.x) + self.frame.z.as_ref()
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        let apex_v = -self.radius / self.semi_angle.tan();
        ((0.0, TWO_PI), (apex_v, 1e10))
    }

    fn periods(&self) -> (Option<f64>, Option<f64>) {
        (Some(TWO_PI), None)
    }

    fn is_singular(&self, side: DomainSide) -> bool {
        side == DomainSide::South
    }

    fn project(&self, p: &Point3) -> Point2 {
        let l = self.frame.to_local(p);
        Point2::new(wrap_angle(l.y.atan2(l.x)), l.z)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cone
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Sphere
// =============================================================================

/// A spherical surface.
///
/// Parameterization: `P(u, v) = center + radius * (cos(v) * (cos(u) * x + sin(u) * y) + sin(v) * z)`
///
/// Where `u ∈ [0, 2π)` is longitude and `v ∈ [-π/2, π/2]` is latitude.
#[derive(Debug, Clone)]
pub struct SphereSurface {
    /// Placement; the origin is the center, `z` points at the north pole.
    pub frame: Frame,
    /// Radius of the sphere.
    pub radius: f64,
}

impl SphereSurface {
    /// Create a sphere.
    pub fn new(frame: Frame, radius: f64) -> Result<Self, GeomError> {
        check_positive("radius", radius)?;
        Ok(Self { frame, radius })
    }
}

impl Surface for SphereSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.frame.origin
            + self.radius * (cos_v * radial(&self.frame, uv.x) + sin_v * self.frame.z.as_ref())
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        Dir3::new_normalize(cos_v * radial(&self.frame, uv.x) + sin_v * self.frame.z.as_ref())
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        self.radius * uv.y.cos() * d_radial(&self.frame, uv.x)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.radius * (-sin_v * radial(&self.frame, uv.x) + cos_v * self.frame.z.as_ref())
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, TWO_PI), (-PI / 2.0, PI / 2.0))
    }

    fn periods(&self) -> (Option<f64>, Option<f64>) {
        (Some(TWO_PI), None)
    }

    fn is_singular(&self, side: DomainSide) -> bool {
        matches!(side, DomainSide::South | DomainSide::North)
    }

    fn project(&self, p: &Point3) -> Point2 {
        let l = self.frame.to_local(p);
        let rho = (l.x * l.x + l.y * l.y).sqrt();
        Point2::new(wrap_angle(l.y.atan2(l.x)), l.z.atan2(rho))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Sphere
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Torus
// =============================================================================

/// A toroidal surface.
///
/// Parameterization:
/// ```text
/// P(u, v) = center + (R + r·cos(v))·(cos(u)·x + sin(u)·y) + r·sin(v)·z
/// ```
///
/// Both `u` (around the main axis) and `v` (around the tube) are periodic.
#[derive(Debug, Clone)]
pub struct TorusSurface {
    /// Placement; `z` is the torus axis.
    pub frame: Frame,
    /// Major radius: distance from center to tube center.
    pub major_radius: f64,
    /// Minor radius: radius of the tube.
    pub minor_radius: f64,
}

impl TorusSurface {
    /// Create a torus.
    pub fn new(frame: Frame, major_radius: f64, minor_radius: f64) -> Result<Self, GeomError> {
        check_positive("major radius", major_radius)?;
        check_positive("minor radius", minor_radius)?;
        Ok(Self {
            frame,
            major_radius,
            minor_radius,
        })
    }
}

impl Surface for TorusSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.frame.origin
            + (self.major_radius + self.minor_radius * cos_v) * radial(&self.frame, uv.x)
            + self.minor_radius * sin_v * self.frame.z.as_ref()
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        Dir3::new_normalize(cos_v * radial(&self.frame, uv.x) + sin_v * self.frame.z.as_ref())
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        (self.major_radius + self.minor_radius * uv.y.cos()) * d_radial(&self.frame, uv.x)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        -self.minor_radius * sin_v * radial(&self.frame, uv.x)
            + self.minor_radius * cos_v * self.frame.z.as_ref()
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, TWO_PI), (0.0, TWO_PI))
    }

    fn periods(&self) -> (Option<f64>, Option<f64>) {
        (Some(TWO_PI), Some(TWO_PI))
    }

    fn project(&self, p: &Point3) -> Point2 {
        let l = self.frame.to_local(p);
        let rho = (l.x * l.x + l.y * l.y).sqrt() - self.major_radius;
        Point2::new(wrap_angle(l.y.atan2(l.x)), wrap_angle(l.z.atan2(rho)))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Torus
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Swept surfaces
// =============================================================================

/// A curve swept along a vector.
///
/// Parameterization: `P(u, v) = curve(u) + v * extrusion`
#[derive(Debug, Clone)]
pub struct ExtrusionSurface {
    /// Profile curve.
    pub swept_curve: Box<dyn Curve3d>,
    /// Sweep direction scaled by its magnitude.
    pub extrusion: Vec3,
}

impl Surface for ExtrusionSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.swept_curve.evaluate(uv.x) + uv.y * self.extrusion
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        self.swept_curve.tangent(uv.x)
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        self.extrusion
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (self.swept_curve.domain(), (-1e10, 1e10))
    }

    fn periods(&self) -> (Option<f64>, Option<f64>) {
        (self.swept_curve.period(), None)
    }

    fn project(&self, p: &Point3) -> Point2 {
        // Remove the sweep component, then invert the profile.
        let len2 = self.extrusion.norm_squared();
        let v = if len2 < 1e-30 {
            0.0
        } else {
            (p - self.swept_curve.evaluate(self.swept_curve.domain().0.max(-1e4)))
                .dot(&self.extrusion)
                / len2
        };
        let u = self.swept_curve.parameter_of(&(p - v * self.extrusion));
        let base = self.swept_curve.evaluate(u);
        let v = if len2 < 1e-30 {
            0.0
        } else {
            (p - base).dot(&self.extrusion) / len2
        };
        Point2::new(u, v)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Extrusion
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A curve revolved around an axis.
///
/// `u` is the rotation angle, `v` the profile curve parameter.
#[derive(Debug, Clone)]
pub struct RevolutionSurface {
    /// Profile curve.
    pub swept_curve: Box<dyn Curve3d>,
    /// Point on the rotation axis.
    pub axis_origin: Point3,
    /// Rotation axis.
    pub axis: Dir3,
}

impl RevolutionSurface {
    /// Rotate `p` by angle `u` about the axis (Rodrigues).
    fn rotate(&self, p: &Point3, u: f64) -> Point3 {
        let a = self.axis.as_ref();
        let d = p - self.axis_origin;
        let (sin_u, cos_u) = u.sin_cos();
        self.axis_origin + d * cos_u + a.cross(&d) * sin_u + a * a.dot(&d) * (1.0 - cos_u)
    }
}

impl Surface for RevolutionSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.rotate(&self.swept_curve.evaluate(uv.y), uv.x)
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        let p = self.evaluate(uv);
        self.axis.as_ref().cross(&(p - self.axis_origin))
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        let t = self.swept_curve.tangent(uv.y);
        let a = self.axis.as_ref();
        let (sin_u, cos_u) = uv.x.sin_cos();
        t * cos_u + a.cross(&t) * sin_u + a * a.dot(&t) * (1.0 - cos_u)
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, TWO_PI), self.swept_curve.domain())
    }

    fn periods(&self) -> (Option<f64>, Option<f64>) {
        (Some(TWO_PI), self.swept_curve.period())
    }

    fn project(&self, p: &Point3) -> Point2 {
        // Find the profile point at the same axial height and radius, then
        // measure the angle between the two half-planes.
        let a = self.axis.as_ref();
        let d = p - self.axis_origin;
        let h = a.dot(&d);
        let r = (d - h * a).norm();

        let sample = {
            let c0 = self.swept_curve.evaluate(self.swept_curve.domain().0.max(-1e4));
            let c0d = c0 - self.axis_origin;
            let c0r = c0d - a.dot(&c0d) * a;
            let dir = if c0r.norm() > 1e-12 {
                c0r.normalize()
            } else {
                let seed = if a.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
                (seed - a.dot(&seed) * a).normalize()
            };
            self.axis_origin + h * a + r * dir
        };
        let v = self.swept_curve.parameter_of(&sample);

        let c = self.swept_curve.evaluate(v) - self.axis_origin;
        let cr = c - a.dot(&c) * a;
        let pr = d - h * a;
        let u = if cr.norm() < 1e-12 || pr.norm() < 1e-12 {
            0.0
        } else {
            wrap_angle(cr.cross(&pr).dot(a).atan2(cr.dot(&pr)))
        };
        Point2::new(u, v)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Revolution
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
