#![warn(missing_docs)]

//! Math types for the stepbrep importer.
//!
//! Thin wrappers around nalgebra providing domain-specific types
//! for STEP geometry: points, vectors, directions, tolerance constants,
//! and the placement frame construction used by every positioned entity.

mod frame;

pub use frame::{build_axes, first_proj_axis, Frame, FrameError};

use nalgebra::{Unit, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Angular tolerance, also used as the parallelism threshold for
    /// unit-vector cross products.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerances (1e-6 linear, 1e-9 angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-9,
    };

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if two unit vectors are parallel or anti-parallel.
    pub fn parallel(&self, a: &Dir3, b: &Dir3) -> bool {
        a.as_ref().cross(b.as_ref()).norm() < self.angular
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_is_zero() {
        let tol = Tolerance::DEFAULT;
        assert!(tol.is_zero(1e-7));
        assert!(tol.is_zero(-1e-7));
        assert!(!tol.is_zero(1e-3));
    }

    #[test]
    fn test_tolerance_parallel() {
        let tol = Tolerance::DEFAULT;
        let x = Dir3::new_normalize(Vec3::x());
        let neg_x = Dir3::new_normalize(-Vec3::x());
        let y = Dir3::new_normalize(Vec3::y());
        assert!(tol.parallel(&x, &neg_x));
        assert!(!tol.parallel(&x, &y));
    }

    #[test]
    fn test_tolerance_serde_defaults() {
        let tol: Tolerance = serde_json::from_str(r#"{"linear":0.001,"angular":1e-9}"#).unwrap();
        assert!((tol.linear - 0.001).abs() < 1e-15);
    }
}
