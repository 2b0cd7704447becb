//! Pullback of edge curves into surface parameter space.
//!
//! Each trim is sampled along its edge curve and projected onto the face
//! surface. Samples are then made continuous: a sample on a pole or apex
//! takes its free coordinate from its neighbour, and periodic coordinates
//! are unwrapped so no segment jumps a whole period. The loop builder in
//! [`crate::emit`] shifts whole trims so consecutive trims meet.

use stepbrep_geom::{CurveKind, Curve3d, DomainSide, Surface, SurfaceKind};
use stepbrep_math::{Point2, Vec2};

/// Parameter-space distance under which two points coincide.
pub(crate) const UV_TOL: f64 = 1e-6;

/// Segments per trim for curved edges.
const SEGMENTS: usize = 16;

fn segments(surface: &dyn Surface, curve: &dyn Curve3d, span: f64) -> usize {
    match (curve.curve_type(), surface.surface_type()) {
        (
            CurveKind::Line,
            SurfaceKind::Plane | SurfaceKind::Cylinder | SurfaceKind::Cone,
        ) => 1,
        (CurveKind::Polyline, _) => (4.0 * span.abs().ceil()).max(1.0) as usize,
        _ => SEGMENTS,
    }
}

/// Parameter-space samples of `curve` from `start` to `end`, singular
/// samples resolved and periods unwrapped.
pub(crate) fn trim_samples(
    surface: &dyn Surface,
    curve: &dyn Curve3d,
    start: f64,
    end: f64,
) -> Vec<Point2> {
    let n = segments(surface, curve, end - start);
    let mut points: Vec<Point2> = (0..=n)
        .map(|i| {
            let t = start + (end - start) * i as f64 / n as f64;
            surface.project(&curve.evaluate(t))
        })
        .collect();
    resolve_singular(surface, &mut points);
    unwrap_periods(surface, &mut points);
    points
}

/// Move samples lying on a collapsed domain side onto that side, taking
/// the free coordinate from the nearest regular sample. Earlier samples
/// win ties. Left alone when every sample is singular.
pub(crate) fn resolve_singular(surface: &dyn Surface, points: &mut [Point2]) {
    let ((u0, u1), (v0, v1)) = surface.domain();
    let sides: Vec<Option<DomainSide>> = points
        .iter()
        .map(|p| surface.singular_side(*p, UV_TOL))
        .collect();
    let n = points.len();
    for i in 0..n {
        let Some(side) = sides[i] else { continue };
        let neighbour = (1..n).find_map(|d| {
            let before = i.checked_sub(d).filter(|&j| sides[j].is_none());
            let after = Some(i + d).filter(|&j| j < n && sides[j].is_none());
            before.or(after)
        });
        let Some(j) = neighbour else { continue };
        let free = points[j];
        points[i] = match side {
            DomainSide::South => Point2::new(free.x, v0),
            DomainSide::North => Point2::new(free.x, v1),
            DomainSide::East => Point2::new(u1, free.y),
            DomainSide::West => Point2::new(u0, free.y),
        };
    }
}

/// Shift each sample by whole periods toward the one before it.
pub(crate) fn unwrap_periods(surface: &dyn Surface, points: &mut [Point2]) {
    for i in 1..points.len() {
        let shift = period_shift(surface, points[i], points[i - 1]);
        points[i] += shift;
    }
}

/// The multiple of the surface periods that brings `from` nearest `toward`.
pub(crate) fn period_shift(surface: &dyn Surface, from: Point2, toward: Point2) -> Vec2 {
    let (pu, pv) = surface.periods();
    let step = |p: Option<f64>, d: f64| p.map_or(0.0, |p| p * (d / p).round());
    Vec2::new(step(pu, toward.x - from.x), step(pv, toward.y - from.y))
}

/// The singular side shared by two points that do not meet. A loop
/// crossing a pole or apex is closed along that side.
pub(crate) fn bridge_side(surface: &dyn Surface, end: Point2, next: Point2) -> Option<DomainSide> {
    if (next - end).norm() <= UV_TOL {
        return None;
    }
    let side = surface.singular_side(end, UV_TOL)?;
    (surface.singular_side(next, UV_TOL) == Some(side)).then_some(side)
}

/// Pick the seam shift for the second use of a seam edge: `base` lines
/// the use up with the first one, and one period `step` either way
/// moves it across the seam. The candidate starting nearer `previous`
/// wins; on a tie, the one ending nearer `first`.
pub(crate) fn seam_shift(
    points: &[Point2],
    base: Vec2,
    step: Vec2,
    previous: Point2,
    first: Point2,
) -> Vec2 {
    let (Some(&start), Some(&end)) = (points.first(), points.last()) else {
        return base;
    };
    let score = |shift: Vec2| {
        (
            (start + shift - previous).norm(),
            (end + shift - first).norm(),
        )
    };
    let (plus, minus) = (score(base + step), score(base - step));
    let take_plus = if (plus.0 - minus.0).abs() <= UV_TOL {
        plus.1 <= minus.1
    } else {
        plus.0 < minus.0
    };
    if take_plus {
        base + step
    } else {
        base - step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use stepbrep_geom::{Circle3d, CylinderSurface, Line3d, Plane, SphereSurface};
    use stepbrep_math::{Frame, Point3};

    #[test]
    fn test_line_on_plane_is_one_segment() {
        let plane = Plane::new(Frame::world());
        let line = Line3d::from_points(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 0.0));
        let points = trim_samples(&plane, &line, 0.0, 1.0);
        assert_eq!(points.len(), 2);
        assert!((points[1] - Point2::new(2.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_full_circle_unwraps_to_one_period() {
        let cylinder = CylinderSurface::new(Frame::world(), 1.0).unwrap();
        let circle = Circle3d::new(Frame::world(), 1.0).unwrap();
        let points = trim_samples(&cylinder, &circle, 0.0, 2.0 * PI);
        assert_eq!(points.len(), SEGMENTS + 1);
        assert!(points[0].x.abs() < 1e-9);
        assert!((points[SEGMENTS].x - 2.0 * PI).abs() < 1e-9);
        for w in points.windows(2) {
            assert!(w[1].x > w[0].x);
        }

        // Backwards, starting on the seam.
        let points = trim_samples(&cylinder, &circle, 2.0 * PI, 0.0);
        assert!((points[0].x - points[SEGMENTS].x - 2.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_pole_takes_neighbour_longitude() {
        let sphere = SphereSurface::new(Frame::world(), 1.0).unwrap();
        let north = PI / 2.0;
        let mut points = [Point2::new(1.0, 0.5), Point2::new(0.0, north - 1e-9)];
        resolve_singular(&sphere, &mut points);
        assert!((points[1] - Point2::new(1.0, north)).norm() < 1e-12);

        // A pole at the start looks ahead.
        let mut points = [
            Point2::new(0.0, -north),
            Point2::new(0.0, -north),
            Point2::new(2.0, -1.0),
        ];
        resolve_singular(&sphere, &mut points);
        assert!((points[0] - Point2::new(2.0, -north)).norm() < 1e-12);
        assert!((points[1] - Point2::new(2.0, -north)).norm() < 1e-12);

        // Nothing to borrow from.
        let mut points = [Point2::new(0.5, north), Point2::new(0.7, north)];
        resolve_singular(&sphere, &mut points);
        assert!((points[0].x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_period_shift() {
        let cylinder = CylinderSurface::new(Frame::world(), 1.0).unwrap();
        let s = period_shift(&cylinder, Point2::new(0.1, 5.0), Point2::new(6.2, 0.0));
        assert!((s.x - 2.0 * PI).abs() < 1e-12);
        assert!(s.y.abs() < 1e-12);

        let plane = Plane::new(Frame::world());
        let s = period_shift(&plane, Point2::new(0.0, 0.0), Point2::new(100.0, 0.0));
        assert!(s.norm() < 1e-12);
    }

    #[test]
    fn test_bridge_only_along_one_side() {
        let sphere = SphereSurface::new(Frame::world(), 1.0).unwrap();
        let north = PI / 2.0;
        let side = bridge_side(&sphere, Point2::new(2.0 * PI, north), Point2::new(0.0, north));
        assert_eq!(side, Some(DomainSide::North));
        assert_eq!(
            bridge_side(&sphere, Point2::new(1.0, north), Point2::new(1.0, north)),
            None
        );
        assert_eq!(
            bridge_side(&sphere, Point2::new(1.0, north), Point2::new(1.0, -north)),
            None
        );
        assert_eq!(
            bridge_side(&sphere, Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)),
            None
        );
    }

    #[test]
    fn test_seam_shift_prefers_nearest_then_closing() {
        let step = Vec2::new(2.0 * PI, 0.0);
        let base = Vec2::new(2.0 * PI, 0.0);
        // Seam down from (0, 1) to (0, 0) after a trim ending at (0, 1).
        let points = [Point2::new(0.0, 1.0), Point2::new(0.0, 0.0)];
        let s = seam_shift(&points, base, step, Point2::new(0.0, 1.0), Point2::origin());
        assert!(s.norm() < 1e-12);

        // Both candidates start 2 PI away; the one closing the loop wins.
        let s = seam_shift(
            &points,
            base,
            step,
            Point2::new(2.0 * PI, 1.0),
            Point2::origin(),
        );
        assert!(s.norm() < 1e-12);
    }
}
