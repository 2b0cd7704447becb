//! Placement frames: `build_axes` and `first_proj_axis` from ISO 10303-42.
//!
//! A frame is an origin plus a right-handed orthonormal basis. The local Z
//! axis comes from the placement's `axis` (default global Z), the local X
//! axis is the reference direction projected orthogonal to Z, and Y closes
//! the basis as `Z x X`.

use thiserror::Error;

use crate::{Dir3, Point3, Tolerance, Vec3};

/// Errors raised while deriving a frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The axis direction has (numerically) zero length.
    #[error("axis direction has zero length")]
    ZeroLengthAxis,

    /// The reference direction is parallel to the axis, so it cannot be
    /// projected into the plane orthogonal to it.
    #[error("reference direction ({x}, {y}, {z}) is parallel to the axis")]
    DegenerateReference {
        /// X component of the rejected reference direction.
        x: f64,
        /// Y component of the rejected reference direction.
        y: f64,
        /// Z component of the rejected reference direction.
        z: f64,
    },
}

/// Derive the local X axis from a unit Z axis and an optional reference
/// direction.
///
/// Without a reference the seed is global X, or global Y when `z` is
/// parallel to global X. A zero reference, or one parallel to `z` within
/// the angular tolerance, is rejected.
pub fn first_proj_axis(
    z: &Dir3,
    ref_direction: Option<Vec3>,
    tolerance: &Tolerance,
) -> Result<Dir3, FrameError> {
    let seed = match ref_direction {
        None => {
            if tolerance.parallel(z, &Vec3::x_axis()) {
                Vec3::y()
            } else {
                Vec3::x()
            }
        }
        Some(r) => match Dir3::try_new(r, f64::EPSILON) {
            Some(d) if !tolerance.parallel(&d, z) => d.into_inner(),
            _ => {
                return Err(FrameError::DegenerateReference {
                    x: r.x,
                    y: r.y,
                    z: r.z,
                })
            }
        },
    };

    let projected = seed - seed.dot(z.as_ref()) * z.as_ref();
    Ok(Dir3::new_normalize(projected))
}

/// Build the `(x, y, z)` axes of a placement.
pub fn build_axes(
    axis: Option<Vec3>,
    ref_direction: Option<Vec3>,
    tolerance: &Tolerance,
) -> Result<[Dir3; 3], FrameError> {
    let z = match axis {
        Some(a) => Dir3::try_new(a, f64::EPSILON).ok_or(FrameError::ZeroLengthAxis)?,
        None => Dir3::new_unchecked(Vec3::z()),
    };
    let x = first_proj_axis(&z, ref_direction, tolerance)?;
    let y = Dir3::new_normalize(z.as_ref().cross(x.as_ref()));
    Ok([x, y, z])
}

/// An origin with a right-handed orthonormal basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Frame origin.
    pub origin: Point3,
    /// Local X axis (projected reference direction).
    pub x: Dir3,
    /// Local Y axis.
    pub y: Dir3,
    /// Local Z axis (the placement normal).
    pub z: Dir3,
}

impl Frame {
    /// Frame at the world origin aligned with the global axes.
    pub fn world() -> Self {
        Self {
            origin: Point3::origin(),
            x: Dir3::new_unchecked(Vec3::x()),
            y: Dir3::new_unchecked(Vec3::y()),
            z: Dir3::new_unchecked(Vec3::z()),
        }
    }

    /// Build a frame from a location and optional axis/reference.
    pub fn build(
        origin: Point3,
        axis: Option<Vec3>,
        ref_direction: Option<Vec3>,
        tolerance: &Tolerance,
    ) -> Result<Self, FrameError> {
        let [x, y, z] = build_axes(axis, ref_direction, tolerance)?;
        Ok(Self { origin, x, y, z })
    }

    /// Local Z axis.
    pub fn normal(&self) -> Dir3 {
        self.z
    }

    /// Local X axis.
    pub fn x_axis(&self) -> Dir3 {
        self.x
    }

    /// Local Y axis.
    pub fn y_axis(&self) -> Dir3 {
        self.y
    }

    /// Frame origin.
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// Map local coordinates to world space.
    pub fn to_world(&self, local: &Vec3) -> Point3 {
        self.origin
            + local.x * self.x.as_ref()
            + local.y * self.y.as_ref()
            + local.z * self.z.as_ref()
    }

    /// Map a world point into local coordinates.
    pub fn to_local(&self, p: &Point3) -> Vec3 {
        let d = p - self.origin;
        Vec3::new(
            d.dot(self.x.as_ref()),
            d.dot(self.y.as_ref()),
            d.dot(self.z.as_ref()),
        )
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::world()
    }
}
