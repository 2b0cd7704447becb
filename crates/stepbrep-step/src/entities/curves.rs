//! Curve entities and the edge parameter range computation.

use log::warn;
use stepbrep_geom::{
    Circle3d, Curve3d, Ellipse3d, GeomError, Hyperbola3d, KnotSpec, Line3d, NurbsCurve,
    Parabola3d, Polyline3d,
};
use stepbrep_math::{Frame, Point3, Vec3};
use stepbrep_topo::ParamRange;

use super::{Entity, RepresentationItem};
use crate::error::{Result, StepError};
use crate::query::{Instance, Logical, Narrowed, SelectValue};
use crate::registry::{EntityId, Registry};

/// How a trimmed curve bounds its basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveTrim {
    /// Parameter values on the basis curve.
    Parameters {
        /// First trim.
        start: f64,
        /// Second trim.
        end: f64,
    },
    /// Points on the basis curve.
    Points {
        /// First trim.
        start: Point3,
        /// Second trim.
        end: Point3,
    },
}

impl CurveTrim {
    fn swapped(self) -> Self {
        match self {
            CurveTrim::Parameters { start, end } => CurveTrim::Parameters {
                start: end,
                end: start,
            },
            CurveTrim::Points { start, end } => CurveTrim::Points {
                start: end,
                end: start,
            },
        }
    }
}

/// Control data of a B-spline curve, rational or not.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurveData {
    /// Polynomial degree.
    pub degree: usize,
    /// Control points.
    pub control_points: Vec<Point3>,
    /// Knot declaration.
    pub knots: KnotSpec,
    /// Weights of a rational curve.
    pub weights: Option<Vec<f64>>,
    /// `closed_curve` flag.
    pub closed: bool,
}

impl BSplineCurveData {
    fn build(&self) -> std::result::Result<NurbsCurve, GeomError> {
        let knots = self.knots.knot_vector(self.control_points.len(), self.degree)?;
        Ok(NurbsCurve::new(
            self.control_points.clone(),
            self.weights.clone(),
            knots,
            self.degree,
        )?
        .with_closed(self.closed))
    }
}

/// Geometry of a [`Curve`].
#[derive(Debug, Clone, PartialEq)]
pub enum CurveGeometry {
    /// `LINE`: `origin + t * direction`.
    Line {
        /// The `pnt` attribute.
        origin: Point3,
        /// The `dir` vector, scaled by its magnitude.
        direction: Vec3,
    },
    /// `CIRCLE`
    Circle {
        /// Placement frame.
        frame: Frame,
        /// Radius.
        radius: f64,
    },
    /// `ELLIPSE`
    Ellipse {
        /// Placement frame.
        frame: Frame,
        /// Semi-axis along local X.
        semi_axis_1: f64,
        /// Semi-axis along local Y.
        semi_axis_2: f64,
    },
    /// `HYPERBOLA`
    Hyperbola {
        /// Placement frame.
        frame: Frame,
        /// Real semi-axis.
        semi_axis: f64,
        /// Imaginary semi-axis.
        semi_imag_axis: f64,
    },
    /// `PARABOLA`
    Parabola {
        /// Placement frame.
        frame: Frame,
        /// Focal distance.
        focal_dist: f64,
    },
    /// `POLYLINE`
    Polyline {
        /// Vertices in order.
        points: Vec<Point3>,
    },
    /// Any B-spline curve form.
    BSpline(BSplineCurveData),
    /// `TRIMMED_CURVE` over another curve.
    Trimmed {
        /// The basis curve.
        basis: EntityId,
        /// Whether the trimmed curve runs with its basis.
        sense_agreement: bool,
    },
    /// `SURFACE_CURVE` or `SEAM_CURVE`.
    OnSurface {
        /// The 3D curve.
        curve_3d: EntityId,
        /// Whether this is a `SEAM_CURVE`.
        seam: bool,
        /// Surfaces and pcurves the curve lies on.
        associated: Vec<EntityId>,
    },
    /// `PCURVE`: a 2D curve in a surface's parameter space.
    Pcurve {
        /// The surface.
        basis_surface: EntityId,
        /// The `DEFINITIONAL_REPRESENTATION` holding the 2D curve.
        reference: EntityId,
    },
}

/// Any supported curve entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    /// Name facet.
    pub item: RepresentationItem,
    /// Geometry.
    pub geometry: CurveGeometry,
    /// Trim of a `TRIMMED_CURVE`, in its own direction.
    pub trim: Option<CurveTrim>,
}

impl Curve {
    /// Build the 3D primitive. Trimmed and surface curves build their
    /// basis curve.
    pub fn build(&self, reg: &Registry<'_>, id: u64) -> Result<Box<dyn Curve3d>> {
        let geom = |source| StepError::Geometry { id, source };
        let curve: Box<dyn Curve3d> = match &self.geometry {
            CurveGeometry::Line { origin, direction } => Box::new(Line3d::new(*origin, *direction)),
            CurveGeometry::Circle { frame, radius } => {
                Box::new(Circle3d::new(*frame, *radius).map_err(geom)?)
            }
            CurveGeometry::Ellipse {
                frame,
                semi_axis_1,
                semi_axis_2,
            } => Box::new(Ellipse3d::new(*frame, *semi_axis_1, *semi_axis_2).map_err(geom)?),
            CurveGeometry::Hyperbola {
                frame,
                semi_axis,
                semi_imag_axis,
            } => Box::new(Hyperbola3d::new(*frame, *semi_axis, *semi_imag_axis).map_err(geom)?),
            CurveGeometry::Parabola { frame, focal_dist } => {
                Box::new(Parabola3d::new(*frame, *focal_dist).map_err(geom)?)
            }
            CurveGeometry::Polyline { points } => {
                Box::new(Polyline3d::new(points.clone()).map_err(geom)?)
            }
            CurveGeometry::BSpline(data) => Box::new(data.build().map_err(geom)?),
            CurveGeometry::Trimmed { basis, .. } => return build_curve(reg, *basis, id),
            CurveGeometry::OnSurface { curve_3d, .. } => return build_curve(reg, *curve_3d, id),
            CurveGeometry::Pcurve { .. } => {
                return Err(StepError::UnsupportedEntity {
                    id,
                    type_name: "PCURVE".into(),
                })
            }
        };
        Ok(curve)
    }
}

/// Build the curve behind `key`.
pub(crate) fn build_curve(reg: &Registry<'_>, key: EntityId, owner: u64) -> Result<Box<dyn Curve3d>> {
    let curve = reg.fetch(key, "CURVE", Entity::as_curve)?;
    curve.build(reg, reg.file_id(key).unwrap_or(owner))
}

/// The curve an edge actually runs along, found by looking through
/// trimmed and surface curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Carrier {
    /// The innermost curve.
    pub key: EntityId,
    /// Whether the outer curve runs in the carrier's direction.
    pub sense: bool,
    /// The outermost trim, ordered along the carrier.
    pub trim: Option<CurveTrim>,
}

impl Carrier {
    /// Follow `key` down to its carrier.
    pub fn resolve(reg: &Registry<'_>, key: EntityId) -> Result<Self> {
        let mut key = key;
        let mut sense = true;
        // Trim in the direction of the trimmed curve that declared it, and
        // whether that curve agrees with the carrier so far.
        let mut trim: Option<(CurveTrim, bool)> = None;
        loop {
            let curve = reg.fetch(key, "CURVE", Entity::as_curve)?;
            match &curve.geometry {
                CurveGeometry::Trimmed {
                    basis,
                    sense_agreement,
                } => {
                    sense ^= !sense_agreement;
                    match &mut trim {
                        Some((_, agrees)) => *agrees ^= !sense_agreement,
                        None => trim = curve.trim.map(|t| (t, *sense_agreement)),
                    }
                    key = *basis;
                }
                CurveGeometry::OnSurface { curve_3d, .. } => key = *curve_3d,
                _ => break,
            }
        }
        Ok(Self {
            key,
            sense,
            trim: trim.map(|(t, agrees)| if agrees { t } else { t.swapped() }),
        })
    }
}

/// Parameter range of an edge on its carrier curve.
///
/// An explicit trim wins over vertex positions. `ends` are the edge's
/// vertex points ordered along the carrier; `closed` marks an edge that
/// starts and ends at the same vertex, which covers a full period (or the
/// whole domain of a non-periodic curve). On periodic curves the end is
/// shifted by whole periods until it lies after the start.
pub fn parameter_range(
    curve: &dyn Curve3d,
    id: u64,
    trim: Option<&CurveTrim>,
    ends: Option<(Point3, Point3)>,
    closed: bool,
    tolerance: f64,
) -> Result<ParamRange> {
    let period = curve.period();
    let (start, mut end) = match (trim, ends) {
        (Some(CurveTrim::Parameters { start, end }), _) => (*start, *end),
        (Some(CurveTrim::Points { start, end }), _) => {
            (curve.parameter_of(start), curve.parameter_of(end))
        }
        (None, Some((a, _))) if closed => {
            let start = curve.parameter_of(&a);
            match period {
                Some(p) => (start, start + p),
                None => curve.domain(),
            }
        }
        (None, Some((a, b))) => (curve.parameter_of(&a), curve.parameter_of(&b)),
        (None, None) => return Err(StepError::NoEndpointData(id)),
    };

    if let Some(p) = period {
        while end <= start + tolerance {
            end += p;
        }
        while end - start > p + tolerance {
            end -= p;
        }
    } else if end < start - tolerance {
        return Err(StepError::geometry(
            id,
            format!("edge range [{start}, {end}] runs against its curve"),
        ));
    }
    Ok(ParamRange::new(start, end))
}

fn curve_entity(inst: &Instance<'_>, geometry: CurveGeometry, trim: Option<CurveTrim>) -> Result<Entity> {
    Ok(Entity::Curve(Curve {
        item: RepresentationItem::load(inst)?,
        geometry,
        trim,
    }))
}

pub(crate) fn load_line(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("LINE")?;
    let origin = reg.point_at(attrs.entity("pnt")?)?;
    let (_, dir) = reg.resolve_as(attrs.entity("dir")?, "VECTOR", Entity::as_vector)?;
    let direction = dir.scaled();
    if reg.tolerance().is_zero(direction.norm()) {
        return Err(StepError::geometry(inst.id(), "line direction has zero length"));
    }
    curve_entity(&inst, CurveGeometry::Line { origin, direction }, None)
}

pub(crate) fn load_conic(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let frame = reg.frame_at(inst.narrow("CONIC")?.entity("position")?)?;
    let geometry = if inst.is_a("CIRCLE") {
        CurveGeometry::Circle {
            frame,
            radius: inst.narrow("CIRCLE")?.real("radius")?,
        }
    } else if inst.is_a("ELLIPSE") {
        let attrs = inst.narrow("ELLIPSE")?;
        CurveGeometry::Ellipse {
            frame,
            semi_axis_1: attrs.real("semi_axis_1")?,
            semi_axis_2: attrs.real("semi_axis_2")?,
        }
    } else if inst.is_a("HYPERBOLA") {
        let attrs = inst.narrow("HYPERBOLA")?;
        CurveGeometry::Hyperbola {
            frame,
            semi_axis: attrs.real("semi_axis")?,
            semi_imag_axis: attrs.real("semi_imag_axis")?,
        }
    } else {
        CurveGeometry::Parabola {
            frame,
            focal_dist: inst.narrow("PARABOLA")?.real("focal_dist")?,
        }
    };
    curve_entity(&inst, geometry, None)
}

pub(crate) fn load_polyline(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let ids = inst.narrow("POLYLINE")?.entity_list("points")?;
    let points = points_at(reg, &ids)?;
    curve_entity(&inst, CurveGeometry::Polyline { points }, None)
}

pub(crate) fn points_at(reg: &mut Registry<'_>, ids: &[u64]) -> Result<Vec<Point3>> {
    ids.iter().map(|id| reg.point_at(*id)).collect()
}

/// A non-negative integer such as a degree or multiplicity.
pub(crate) fn count(attrs: &Narrowed<'_>, attribute: &str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        StepError::geometry(attrs.id(), format!("negative {attribute} {value}"))
    })
}

pub(crate) fn multiplicities(attrs: &Narrowed<'_>, attribute: &str) -> Result<Vec<usize>> {
    attrs
        .integer_list(attribute)?
        .into_iter()
        .map(|m| count(attrs, attribute, m))
        .collect()
}

fn curve_knots(inst: &Instance<'_>) -> Result<KnotSpec> {
    if inst.is_a("B_SPLINE_CURVE_WITH_KNOTS") {
        let attrs = inst.narrow("B_SPLINE_CURVE_WITH_KNOTS")?;
        Ok(KnotSpec::Explicit {
            multiplicities: multiplicities(&attrs, "knot_multiplicities")?,
            knots: attrs.real_list("knots")?,
        })
    } else if inst.is_a("BEZIER_CURVE") {
        Ok(KnotSpec::Bezier)
    } else if inst.is_a("UNIFORM_CURVE") {
        Ok(KnotSpec::Uniform)
    } else {
        Ok(KnotSpec::QuasiUniform)
    }
}

pub(crate) fn load_b_spline_curve(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("B_SPLINE_CURVE")?;
    let degree = count(&attrs, "degree", attrs.integer("degree")?)?;
    let control_points = points_at(reg, &attrs.entity_list("control_points_list")?)?;
    let closed = attrs.logical("closed_curve")? == Logical::True;
    let weights = if inst.is_a("RATIONAL_B_SPLINE_CURVE") {
        Some(inst.narrow("RATIONAL_B_SPLINE_CURVE")?.real_list("weights_data")?)
    } else {
        None
    };
    let data = BSplineCurveData {
        degree,
        control_points,
        knots: curve_knots(&inst)?,
        weights,
        closed,
    };
    curve_entity(&inst, CurveGeometry::BSpline(data), None)
}

#[derive(Default)]
struct TrimSide {
    parameter: Option<f64>,
    point: Option<Point3>,
}

fn trim_side(reg: &mut Registry<'_>, owner: u64, attribute: &str, values: &[SelectValue<'_>]) -> Result<TrimSide> {
    let mut side = TrimSide::default();
    for value in values {
        match value {
            SelectValue::Entity(id) => side.point = Some(reg.point_at(*id)?),
            SelectValue::Typed {
                type_name: "PARAMETER_VALUE",
                value,
            } => side.parameter = value.as_real(),
            SelectValue::Value(v) if v.as_real().is_some() => side.parameter = v.as_real(),
            SelectValue::Typed { type_name, .. } => {
                return Err(StepError::UnhandledSelect {
                    id: owner,
                    attribute: attribute.to_string(),
                    variant: type_name.to_string(),
                })
            }
            SelectValue::Value(v) => {
                return Err(StepError::UnhandledSelect {
                    id: owner,
                    attribute: attribute.to_string(),
                    variant: v.describe().to_string(),
                })
            }
        }
    }
    Ok(side)
}

pub(crate) fn load_trimmed_curve(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("TRIMMED_CURVE")?;
    let basis = reg.resolve(attrs.entity("basis_curve")?)?;
    reg.fetch(basis, "CURVE", Entity::as_curve)?;
    let first = trim_side(reg, inst.id(), "trim_1", &attrs.select_list("trim_1")?)?;
    let second = trim_side(reg, inst.id(), "trim_2", &attrs.select_list("trim_2")?)?;
    let sense_agreement = attrs.boolean("sense_agreement")?;
    let prefer_points = attrs.opt_enumeration("master_representation")? == Some("CARTESIAN");

    let points = first.point.zip(second.point);
    let parameters = first.parameter.zip(second.parameter);
    let trim = match (points, parameters) {
        (Some((start, end)), _) if prefer_points => Some(CurveTrim::Points { start, end }),
        (_, Some((start, end))) => Some(CurveTrim::Parameters { start, end }),
        (Some((start, end)), None) => Some(CurveTrim::Points { start, end }),
        (None, None) => None,
    };
    curve_entity(
        &inst,
        CurveGeometry::Trimmed {
            basis,
            sense_agreement,
        },
        trim,
    )
}

pub(crate) fn load_surface_curve(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("SURFACE_CURVE")?;
    let curve_3d = reg.resolve(attrs.entity("curve_3d")?)?;
    reg.fetch(curve_3d, "CURVE", Entity::as_curve)?;

    // Pcurves and surfaces here only describe the curve; one that fails to
    // load does not make the 3D curve unusable.
    let mut associated = Vec::new();
    for value in attrs.select_list("associated_geometry")? {
        match reg.resolve_select(inst.id(), "associated_geometry", value) {
            Ok(key) => associated.push(key),
            Err(err) => warn!("#{}: skipping associated geometry: {err}", inst.id()),
        }
    }
    curve_entity(
        &inst,
        CurveGeometry::OnSurface {
            curve_3d,
            seam: inst.is_a("SEAM_CURVE"),
            associated,
        },
        None,
    )
}

pub(crate) fn load_pcurve(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("PCURVE")?;
    let basis_surface = reg.resolve(attrs.entity("basis_surface")?)?;
    let reference = reg.resolve(attrs.entity("reference_to_curve")?)?;
    curve_entity(
        &inst,
        CurveGeometry::Pcurve {
            basis_surface,
            reference,
        },
        None,
    )
}
