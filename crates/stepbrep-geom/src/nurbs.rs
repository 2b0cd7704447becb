//! B-spline and NURBS curves and surfaces.
//!
//! Curves and surfaces are rational when `weights` is present, evaluated in
//! homogeneous space with De Boor's algorithm. Knot vectors are always stored
//! expanded (every knot repeated by its multiplicity); [`KnotSpec`] produces
//! them from the forms a STEP file can declare.

use std::any::Any;

use stepbrep_math::{Point2, Point3, Vec3};

use crate::{sampled_curve_parameter, Curve3d, CurveKind, GeomError, Surface, SurfaceKind};

// =============================================================================
// Knot vector utilities
// =============================================================================

/// How a knot vector is declared.
#[derive(Debug, Clone, PartialEq)]
pub enum KnotSpec {
    /// Distinct knot values with multiplicities.
    Explicit {
        /// Multiplicity of each distinct knot.
        multiplicities: Vec<usize>,
        /// Distinct knot values.
        knots: Vec<f64>,
    },
    /// Unclamped, unit spacing starting at `-degree`.
    Uniform,
    /// Clamped ends, unit interior spacing.
    QuasiUniform,
    /// Piecewise Bezier: clamped ends, interior knots of multiplicity `degree`.
    Bezier,
}

impl KnotSpec {
    /// Expanded knot vector for `n_points` control points.
    pub fn knot_vector(&self, n_points: usize, degree: usize) -> Result<Vec<f64>, GeomError> {
        let knots = match self {
            KnotSpec::Explicit {
                multiplicities,
                knots,
            } => expand_knots(multiplicities, knots)?,
            KnotSpec::Uniform => uniform_knots(n_points, degree),
            KnotSpec::QuasiUniform => quasi_uniform_knots(n_points, degree)?,
            KnotSpec::Bezier => bezier_knots(n_points, degree)?,
        };
        validate_knots(&knots, n_points, degree)?;
        Ok(knots)
    }
}

/// Repeat each knot by its multiplicity.
pub fn expand_knots(multiplicities: &[usize], knots: &[f64]) -> Result<Vec<f64>, GeomError> {
    if multiplicities.len() != knots.len() {
        return Err(GeomError::MultiplicityMismatch {
            mults: multiplicities.len(),
            knots: knots.len(),
        });
    }
    Ok(multiplicities
        .iter()
        .zip(knots)
        .flat_map(|(&m, &k)| std::iter::repeat(k).take(m))
        .collect())
}

/// Uniform knots `-degree, -degree + 1, ...`.
pub fn uniform_knots(n_points: usize, degree: usize) -> Vec<f64> {
    (0..n_points + degree + 1)
        .map(|i| i as f64 - degree as f64)
        .collect()
}

fn check_min_points(n_points: usize, degree: usize) -> Result<(), GeomError> {
    if n_points < degree + 1 {
        return Err(GeomError::TooFewPoints {
            degree,
            needed: degree + 1,
            got: n_points,
        });
    }
    Ok(())
}

/// Clamped knots `0 (x degree+1), 1, 2, ..., k (x degree+1)`.
pub fn quasi_uniform_knots(n_points: usize, degree: usize) -> Result<Vec<f64>, GeomError> {
    check_min_points(n_points, degree)?;
    let last = (n_points - degree) as f64;
    let mut knots = vec![0.0; degree + 1];
    for i in 1..(n_points - degree) {
        knots.push(i as f64);
    }
    knots.extend(std::iter::repeat(last).take(degree + 1));
    Ok(knots)
}

/// Knots of a piecewise Bezier curve with `(n_points - 1) / degree` segments.
pub fn bezier_knots(n_points: usize, degree: usize) -> Result<Vec<f64>, GeomError> {
    check_min_points(n_points, degree)?;
    if degree == 0 || (n_points - 1) % degree != 0 {
        return Err(GeomError::InvalidKnots {
            len: 0,
            expected: n_points + degree + 1,
        });
    }
    let segments = (n_points - 1) / degree;
    let mut knots = vec![0.0; degree + 1];
    for s in 1..segments {
        knots.extend(std::iter::repeat(s as f64).take(degree));
    }
    knots.extend(std::iter::repeat(segments as f64).take(degree + 1));
    Ok(knots)
}

/// Validate a knot vector: non-decreasing, length = n_control_points + degree + 1.
fn validate_knots(knots: &[f64], n_points: usize, degree: usize) -> Result<(), GeomError> {
    let expected = n_points + degree + 1;
    if knots.len() != expected || knots.windows(2).any(|w| w[1] < w[0]) {
        return Err(GeomError::InvalidKnots {
            len: knots.len(),
            expected,
        });
    }
    Ok(())
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to valid range.
/// For `t` at the end of the domain, returns the last valid span.
fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = number of control points - 1 (last index)
    if t >= knots[n + 1] {
        // Skip back over repeated end knots.
        let mut span = n;
        while span > degree && knots[span] >= knots[n + 1] {
            span -= 1;
        }
        return span;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Compute non-zero basis function values at parameter `t`.
///
/// Returns a vector of `degree + 1` values `N[span-degree..=span]` at `t`.
fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            if denom.abs() < 1e-30 {
                n[r] = saved;
                saved = 0.0;
                continue;
            }
            let temp = n[r] / denom;
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    n
}

/// Accumulate `sum(b_i * w_i * P_i) / sum(b_i * w_i)`.
fn weighted_sum<'a>(terms: impl Iterator<Item = (f64, &'a Point3, f64)>) -> Point3 {
    let mut acc = Vec3::zeros();
    let mut wsum = 0.0;
    for (b, p, w) in terms {
        acc += b * w * p.coords;
        wsum += b * w;
    }
    if wsum.abs() < 1e-30 {
        Point3::from(acc)
    } else {
        Point3::from(acc / wsum)
    }
}

// =============================================================================
// NURBS curve
// =============================================================================

/// A B-spline curve in 3D, rational when `weights` is set.
#[derive(Debug, Clone)]
pub struct NurbsCurve {
    /// Control points.
    pub control_points: Vec<Point3>,
    /// One weight per control point for rational curves.
    pub weights: Option<Vec<f64>>,
    /// Expanded knot vector. Length = control_points.len() + degree + 1.
    pub knots: Vec<f64>,
    /// Polynomial degree (order = degree + 1).
    pub degree: usize,
    /// Whether the curve is declared closed.
    pub closed: bool,
}

impl NurbsCurve {
    /// Create a curve, validating knots and weights.
    pub fn new(
        control_points: Vec<Point3>,
        weights: Option<Vec<f64>>,
        knots: Vec<f64>,
        degree: usize,
    ) -> Result<Self, GeomError> {
        check_min_points(control_points.len(), degree)?;
        validate_knots(&knots, control_points.len(), degree)?;
        if let Some(w) = &weights {
            if w.len() != control_points.len() {
                return Err(GeomError::WeightMismatch {
                    weights: w.len(),
                    points: control_points.len(),
                });
            }
        }
        Ok(Self {
            control_points,
            weights,
            knots,
            degree,
            closed: false,
        })
    }

    /// Mark the curve closed.
    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    fn weight(&self, i: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[i])
    }

    /// Evaluate the curve at parameter `t` using De Boor's algorithm.
    pub fn eval(&self, t: f64) -> Point3 {
        let n = self.control_points.len() - 1;
        let (t_min, t_max) = self.parameter_domain();
        let t = t.clamp(t_min, t_max);
        let span = find_span(&self.knots, n, self.degree, t);
        let basis = basis_functions(&self.knots, span, self.degree, t);

        weighted_sum(basis.iter().enumerate().map(|(i, &b)| {
            let idx = span - self.degree + i;
            (b, &self.control_points[idx], self.weight(idx))
        }))
    }

    /// Central-difference tangent at `t`.
    pub fn tangent(&self, t: f64) -> Vec3 {
        if self.degree == 0 || self.control_points.len() < 2 {
            return Vec3::zeros();
        }
        let (t_min, t_max) = self.parameter_domain();
        let dt = (t_max - t_min) * 1e-7;
        let a = (t - dt).max(t_min);
        let b = (t + dt).min(t_max);
        (self.eval(b) - self.eval(a)) / (b - a)
    }

    /// Parameter domain `(t_min, t_max)`.
    pub fn parameter_domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }
}

impl Curve3d for NurbsCurve {
    fn evaluate(&self, t: f64) -> Point3 {
        self.eval(t)
    }

    fn tangent(&self, t: f64) -> Vec3 {
        NurbsCurve::tangent(self, t)
    }

    fn domain(&self) -> (f64, f64) {
        self.parameter_domain()
    }

    fn period(&self) -> Option<f64> {
        self.closed.then(|| {
            let (a, b) = self.parameter_domain();
            b - a
        })
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let (t0, t1) = self.parameter_domain();
        let scale = self
            .control_points
            .iter()
            .map(|c| c.coords.norm())
            .fold(1.0, f64::max);
        let tol = 1e-9 * scale;
        if (self.eval(t0) - p).norm() < tol {
            return t0;
        }
        if (self.eval(t1) - p).norm() < tol {
            return t1;
        }
        sampled_curve_parameter(self, p)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::BSpline
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// NURBS surface
// =============================================================================

/// A tensor-product B-spline surface, rational when `weights` is set.
///
/// Control points are stored in row-major order: `points[v_idx * n_u + u_idx]`.
#[derive(Debug, Clone)]
pub struct NurbsSurface {
    /// Control points in row-major order.
    pub control_points: Vec<Point3>,
    /// Weights in the same order as the control points.
    pub weights: Option<Vec<f64>>,
    /// Number of control points in the u direction.
    pub n_u: usize,
    /// Number of control points in the v direction.
    pub n_v: usize,
    /// Knot vector in u. Length = n_u + degree_u + 1.
    pub knots_u: Vec<f64>,
    /// Knot vector in v. Length = n_v + degree_v + 1.
    pub knots_v: Vec<f64>,
    /// Polynomial degree in u.
    pub degree_u: usize,
    /// Polynomial degree in v.
    pub degree_v: usize,
    /// Whether the surface closes on itself in u.
    pub u_closed: bool,
    /// Whether the surface closes on itself in v.
    pub v_closed: bool,
}

fn flatten_grid<T: Copy>(grid: &[Vec<T>], n_u: usize, n_v: usize) -> Result<Vec<T>, GeomError> {
    if grid.len() != n_u || grid.iter().any(|row| row.len() != n_v) {
        return Err(GeomError::RaggedGrid);
    }
    let mut flat = Vec::with_capacity(n_u * n_v);
    for j in 0..n_v {
        for row in grid {
            flat.push(row[j]);
        }
    }
    Ok(flat)
}

impl NurbsSurface {
    /// Create a surface from a control grid indexed `grid[u][v]`, the
    /// layout STEP uses for `control_points_list`.
    pub fn new(
        grid: Vec<Vec<Point3>>,
        weights: Option<Vec<Vec<f64>>>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        degree_u: usize,
        degree_v: usize,
    ) -> Result<Self, GeomError> {
        let n_u = grid.len();
        let n_v = grid.first().map_or(0, Vec::len);
        check_min_points(n_u, degree_u)?;
        check_min_points(n_v, degree_v)?;
        let control_points = flatten_grid(&grid, n_u, n_v)?;
        let weights = match weights {
            Some(w) => Some(flatten_grid(&w, n_u, n_v).map_err(|_| {
                GeomError::WeightMismatch {
                    weights: w.iter().map(Vec::len).sum(),
                    points: n_u * n_v,
                }
            })?),
            None => None,
        };
        validate_knots(&knots_u, n_u, degree_u)?;
        validate_knots(&knots_v, n_v, degree_v)?;
        Ok(Self {
            control_points,
            weights,
            n_u,
            n_v,
            knots_u,
            knots_v,
            degree_u,
            degree_v,
            u_closed: false,
            v_closed: false,
        })
    }

    /// Record the closure flags.
    pub fn with_closure(mut self, u_closed: bool, v_closed: bool) -> Self {
        self.u_closed = u_closed;
        self.v_closed = v_closed;
        self
    }

    fn index(&self, u_idx: usize, v_idx: usize) -> usize {
        v_idx * self.n_u + u_idx
    }

    /// Evaluate the surface at `(u, v)` using tensor-product De Boor.
    pub fn eval(&self, u: f64, v: f64) -> Point3 {
        let nu = self.n_u - 1;
        let nv = self.n_v - 1;
        let ((u0, u1), (v0, v1)) = self.parameter_domain();
        let u = u.clamp(u0, u1);
        let v = v.clamp(v0, v1);

        let span_u = find_span(&self.knots_u, nu, self.degree_u, u);
        let span_v = find_span(&self.knots_v, nv, self.degree_v, v);
        let basis_u = basis_functions(&self.knots_u, span_u, self.degree_u, u);
        let basis_v = basis_functions(&self.knots_v, span_v, self.degree_v, v);

        let terms = basis_v.iter().enumerate().flat_map(|(j, &bv)| {
            let v_idx = span_v - self.degree_v + j;
            basis_u.iter().enumerate().map(move |(i, &bu)| {
                let u_idx = span_u - self.degree_u + i;
                let k = self.index(u_idx, v_idx);
                let w = self.weights.as_ref().map_or(1.0, |w| w[k]);
                (bu * bv, &self.control_points[k], w)
            })
        });
        weighted_sum(terms)
    }

    /// Partial derivative with respect to u.
    pub fn deriv_u(&self, u: f64, v: f64) -> Vec3 {
        let ((u_min, u_max), _) = self.parameter_domain();
        let du = (u_max - u_min) * 1e-7;
        let a = (u - du).max(u_min);
        let b = (u + du).min(u_max);
        (self.eval(b, v) - self.eval(a, v)) / (b - a)
    }

    /// Partial derivative with respect to v.
    pub fn deriv_v(&self, u: f64, v: f64) -> Vec3 {
        let (_, (v_min, v_max)) = self.parameter_domain();
        let dv = (v_max - v_min) * 1e-7;
        let a = (v - dv).max(v_min);
        let b = (v + dv).min(v_max);
        (self.eval(u, b) - self.eval(u, a)) / (b - a)
    }

    /// Parameter domain.
    pub fn parameter_domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.knots_u[self.degree_u], self.knots_u[self.n_u]),
            (self.knots_v[self.degree_v], self.knots_v[self.n_v]),
        )
    }
}

impl Surface for NurbsSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.eval(uv.x, uv.y)
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        self.deriv_u(uv.x, uv.y)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        self.deriv_v(uv.x, uv.y)
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        self.parameter_domain()
    }

    fn periods(&self) -> (Option<f64>, Option<f64>) {
        let ((u0, u1), (v0, v1)) = self.parameter_domain();
        (
            self.u_closed.then_some(u1 - u0),
            self.v_closed.then_some(v1 - v0),
        )
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::BSpline
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_knots() {
        let k = expand_knots(&[3, 1, 3], &[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(k, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
        assert!(expand_knots(&[1], &[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_generated_knots() {
        assert_eq!(uniform_knots(3, 2), vec![-2.0, -1.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(
            quasi_uniform_knots(4, 2).unwrap(),
            vec![0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0]
        );
        assert_eq!(
            bezier_knots(7, 3).unwrap(),
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]
        );
        assert!(bezier_knots(6, 3).is_err());
    }

    #[test]
    fn test_knot_spec_validates_length() {
        let spec = KnotSpec::Explicit {
            multiplicities: vec![2, 2],
            knots: vec![0.0, 1.0],
        };
        assert!(spec.knot_vector(2, 1).is_ok());
        assert!(spec.knot_vector(3, 1).is_err());
    }

    #[test]
    fn test_linear_curve() {
        let c = NurbsCurve::new(
            vec![Point3::origin(), Point3::new(10.0, 0.0, 0.0)],
            None,
            vec![0.0, 0.0, 1.0, 1.0],
            1,
        )
        .unwrap();
        assert!((c.eval(0.5).x - 5.0).abs() < 1e-12);
        assert!((c.eval(1.0).x - 10.0).abs() < 1e-12);
        assert!((c.parameter_of(&Point3::new(10.0, 0.0, 0.0)) - 1.0).abs() < 1e-12);
        assert!((c.parameter_of(&Point3::new(2.5, 1.0, 0.0)) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_rational_quarter_circle() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let c = NurbsCurve::new(
            vec![
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            Some(vec![1.0, w, 1.0]),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            2,
        )
        .unwrap();
        for i in 0..=10 {
            let p = c.eval(i as f64 / 10.0);
            assert!((p.coords.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_weight_mismatch() {
        let err = NurbsCurve::new(
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            Some(vec![1.0]),
            vec![0.0, 0.0, 1.0, 1.0],
            1,
        )
        .unwrap_err();
        assert!(matches!(err, GeomError::WeightMismatch { .. }));
    }

    #[test]
    fn test_surface_grid_layout() {
        let grid = vec![
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![Point3::new(1.0, 0.0, 1.0), Point3::new(1.0, 1.0, 1.0)],
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
        let p = s.eval(1.0, 0.0);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!(p.y.abs() < 1e-12);
        assert!((p.z - 1.0).abs() < 1e-12);
        assert_eq!(s.periods(), (None, None));
        let closed = s.with_closure(true, false);
        assert_eq!(closed.periods(), (Some(1.0), None));
    }

    #[test]
    fn test_ragged_grid_rejected() {
        let grid = vec![vec![Point3::origin(), Point3::origin()], vec![Point3::origin()]];
        let err = NurbsSurface::new(grid, None, vec![0.0, 0.0, 1.0, 1.0], vec![0.0, 0.0, 1.0, 1.0], 1, 1)
            .unwrap_err();
        assert_eq!(err, GeomError::RaggedGrid);
    }
}
