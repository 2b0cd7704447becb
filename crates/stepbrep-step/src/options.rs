//! Reader configuration.

use serde::{Deserialize, Serialize};
use stepbrep_math::{Tolerance, Vec3};

use crate::error::{Result, StepError};

/// Top-level shape types used when the caller does not override them.
pub const PRIMARY_SHAPE_TYPES: &[&str] = &["ADVANCED_BREP_SHAPE_REPRESENTATION"];

/// Shape types tried when the file has no [`PRIMARY_SHAPE_TYPES`] instance.
pub const FALLBACK_SHAPE_TYPES: &[&str] = &[
    "MANIFOLD_SOLID_BREP",
    "BREP_WITH_VOIDS",
    "SHELL_BASED_SURFACE_MODEL",
];

/// Options controlling a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Parallelism threshold for axis/reference pairs.
    pub angular_tolerance: f64,
    /// Distance under which two points coincide.
    pub linear_tolerance: f64,
    /// Seed used in place of a reference direction parallel to its axis.
    pub fallback_ref_direction: Option<[f64; 3]>,
    /// Instance types converted as top-level shapes, in place of the
    /// defaults.
    pub shape_types: Option<Vec<String>>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            angular_tolerance: Tolerance::DEFAULT.angular,
            linear_tolerance: Tolerance::DEFAULT.linear,
            fallback_ref_direction: None,
            shape_types: None,
        }
    }
}

impl ReaderOptions {
    /// Validate ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.angular_tolerance > 0.0 && self.angular_tolerance < 0.1) {
            return Err(StepError::InvalidOptions(format!(
                "angular_tolerance must be in (0, 0.1), got {}",
                self.angular_tolerance
            )));
        }
        if !(self.linear_tolerance > 0.0 && self.linear_tolerance.is_finite()) {
            return Err(StepError::InvalidOptions(format!(
                "linear_tolerance must be positive, got {}",
                self.linear_tolerance
            )));
        }
        if let Some(r) = self.fallback_ref_direction {
            if !r.iter().all(|c| c.is_finite()) || Vec3::from(r).norm() < self.linear_tolerance {
                return Err(StepError::InvalidOptions(
                    "fallback_ref_direction must be a finite non-zero vector".into(),
                ));
            }
        }
        if let Some(types) = &self.shape_types {
            if types.is_empty() || types.iter().any(|t| t.trim().is_empty()) {
                return Err(StepError::InvalidOptions(
                    "shape_types must list at least one type name".into(),
                ));
            }
        }
        Ok(())
    }

    /// Tolerances as a [`Tolerance`].
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            linear: self.linear_tolerance,
            angular: self.angular_tolerance,
        }
    }

    /// The fallback reference as a vector.
    pub fn fallback_ref(&self) -> Option<Vec3> {
        self.fallback_ref_direction.map(Vec3::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let options = ReaderOptions::default();
        assert!(options.validate().is_ok());
        assert!((options.tolerance().angular - 1e-9).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut options = ReaderOptions {
            angular_tolerance: 0.0,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        options = ReaderOptions {
            fallback_ref_direction: Some([0.0, 0.0, 0.0]),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        options = ReaderOptions {
            shape_types: Some(vec![]),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let options: ReaderOptions =
            serde_json::from_str(r#"{"fallback_ref_direction":[1.0,0.0,0.0]}"#).unwrap();
        assert_eq!(options.fallback_ref(), Some(Vec3::x()));
        assert!((options.linear_tolerance - 1e-6).abs() < 1e-15);
    }
}
