//! Domain entities built from STEP instances.
//!
//! Each supported type has a loader. A loader first runs the loaders of
//! the type's supertypes (which fill the facets it embeds, such as the
//! [`RepresentationItem`] name), then narrows the instance to its own
//! declared type and reads the remaining attributes by name. References
//! become [`EntityId`] handles resolved through the [`Registry`].

pub mod curves;
pub mod geometry;
pub mod representation;
pub mod surfaces;
pub mod topology;
pub mod units;

pub use curves::{BSplineCurveData, Carrier, Curve, CurveGeometry, CurveTrim};
pub use geometry::{CartesianPoint, Direction, Placement, PlacementKind, Vector};
pub use representation::Representation;
pub use surfaces::{BSplineSurfaceData, Surface, SurfaceGeometry};
pub use topology::{
    EdgeCurve, EdgeLoop, EdgeUse, Face, FaceBound, OrientedEdge, OrientedFace, Shell, Solid,
    SurfaceModel, VertexLoop, VertexPoint,
};
pub use units::{Record, RecordDetail, UnitQuantity};

use crate::error::Result;
use crate::query::Instance;
use crate::registry::{EntityId, Loader, Registry};

/// Facet shared by every `REPRESENTATION_ITEM` subtype.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepresentationItem {
    /// Item name; often empty.
    pub name: String,
}

impl RepresentationItem {
    /// Read the `name` attribute.
    pub fn load(inst: &Instance<'_>) -> Result<Self> {
        let item = inst.narrow("REPRESENTATION_ITEM")?;
        Ok(Self {
            name: item.opt_string("name")?.unwrap_or_default().to_string(),
        })
    }
}

/// A resolved entity.
#[derive(Debug, Clone)]
pub enum Entity {
    /// `CARTESIAN_POINT`
    Point(CartesianPoint),
    /// `DIRECTION`
    Direction(Direction),
    /// `VECTOR`
    Vector(Vector),
    /// `AXIS1_PLACEMENT`, `AXIS2_PLACEMENT_2D`, `AXIS2_PLACEMENT_3D`
    Placement(Placement),
    /// Any supported curve.
    Curve(Curve),
    /// Any supported surface.
    Surface(Surface),
    /// `VERTEX_POINT`
    Vertex(VertexPoint),
    /// `EDGE_CURVE`
    EdgeCurve(EdgeCurve),
    /// `ORIENTED_EDGE`
    OrientedEdge(OrientedEdge),
    /// `EDGE_LOOP`
    EdgeLoop(EdgeLoop),
    /// `VERTEX_LOOP`
    VertexLoop(VertexLoop),
    /// `FACE_BOUND`, `FACE_OUTER_BOUND`
    FaceBound(FaceBound),
    /// `ADVANCED_FACE`, `FACE_SURFACE`
    Face(Face),
    /// `ORIENTED_FACE`
    OrientedFace(OrientedFace),
    /// `OPEN_SHELL`, `CLOSED_SHELL`, `ORIENTED_CLOSED_SHELL`
    Shell(Shell),
    /// `MANIFOLD_SOLID_BREP`, `BREP_WITH_VOIDS`
    Solid(Solid),
    /// `SHELL_BASED_SURFACE_MODEL`
    SurfaceModel(SurfaceModel),
    /// Shape and definitional representations.
    Representation(Representation),
    /// Units, measures, contexts and inline values.
    Record(Record),
}

macro_rules! accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self) -> Option<&$ty> {
            match self {
                Entity::$variant(inner) => Some(inner),
                _ => None,
            }
        }
    };
}

impl Entity {
    /// Kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entity::Point(_) => "CARTESIAN_POINT",
            Entity::Direction(_) => "DIRECTION",
            Entity::Vector(_) => "VECTOR",
            Entity::Placement(p) => p.kind.type_name(),
            Entity::Curve(_) => "CURVE",
            Entity::Surface(_) => "SURFACE",
            Entity::Vertex(_) => "VERTEX_POINT",
            Entity::EdgeCurve(_) => "EDGE_CURVE",
            Entity::OrientedEdge(_) => "ORIENTED_EDGE",
            Entity::EdgeLoop(_) => "EDGE_LOOP",
            Entity::VertexLoop(_) => "VERTEX_LOOP",
            Entity::FaceBound(_) => "FACE_BOUND",
            Entity::Face(_) => "FACE_SURFACE",
            Entity::OrientedFace(_) => "ORIENTED_FACE",
            Entity::Shell(_) => "CONNECTED_FACE_SET",
            Entity::Solid(_) => "MANIFOLD_SOLID_BREP",
            Entity::SurfaceModel(_) => "SHELL_BASED_SURFACE_MODEL",
            Entity::Representation(_) => "REPRESENTATION",
            Entity::Record(_) => "RECORD",
        }
    }

    accessor!(
        /// As a point.
        as_point, Point, CartesianPoint
    );
    accessor!(
        /// As a direction.
        as_direction, Direction, Direction
    );
    accessor!(
        /// As a vector.
        as_vector, Vector, Vector
    );
    accessor!(
        /// As a placement.
        as_placement, Placement, Placement
    );
    accessor!(
        /// As a curve.
        as_curve, Curve, Curve
    );
    accessor!(
        /// As a surface.
        as_surface, Surface, Surface
    );
    accessor!(
        /// As a vertex.
        as_vertex, Vertex, VertexPoint
    );
    accessor!(
        /// As an edge curve.
        as_edge_curve, EdgeCurve, EdgeCurve
    );
    accessor!(
        /// As an oriented edge.
        as_oriented_edge, OrientedEdge, OrientedEdge
    );
    accessor!(
        /// As an edge loop.
        as_edge_loop, EdgeLoop, EdgeLoop
    );
    accessor!(
        /// As a face bound.
        as_face_bound, FaceBound, FaceBound
    );
    accessor!(
        /// As a face.
        as_face, Face, Face
    );
    accessor!(
        /// As a shell.
        as_shell, Shell, Shell
    );
    accessor!(
        /// As a representation.
        as_representation, Representation, Representation
    );
    accessor!(
        /// As a unit, measure or context record.
        as_record, Record, Record
    );
}

/// Resolve every id in `ids`.
pub(crate) fn resolve_all(reg: &mut Registry<'_>, ids: &[u64]) -> Result<Vec<EntityId>> {
    ids.iter().map(|id| reg.resolve(*id)).collect()
}

/// Constructor table used by [`Registry::new`].
pub static LOADERS: &[(&str, Loader)] = &[
    // Points and placements
    ("CARTESIAN_POINT", geometry::load_cartesian_point),
    ("DIRECTION", geometry::load_direction),
    ("VECTOR", geometry::load_vector),
    ("AXIS1_PLACEMENT", geometry::load_axis1_placement),
    ("AXIS2_PLACEMENT_2D", geometry::load_axis2_placement_2d),
    ("AXIS2_PLACEMENT_3D", geometry::load_axis2_placement_3d),
    // Curves
    ("LINE", curves::load_line),
    ("CIRCLE", curves::load_conic),
    ("ELLIPSE", curves::load_conic),
    ("HYPERBOLA", curves::load_conic),
    ("PARABOLA", curves::load_conic),
    ("POLYLINE", curves::load_polyline),
    ("B_SPLINE_CURVE_WITH_KNOTS", curves::load_b_spline_curve),
    ("BEZIER_CURVE", curves::load_b_spline_curve),
    ("UNIFORM_CURVE", curves::load_b_spline_curve),
    ("QUASI_UNIFORM_CURVE", curves::load_b_spline_curve),
    ("B_SPLINE_CURVE_WITH_KNOTS+RATIONAL_B_SPLINE_CURVE", curves::load_b_spline_curve),
    ("BEZIER_CURVE+RATIONAL_B_SPLINE_CURVE", curves::load_b_spline_curve),
    ("RATIONAL_B_SPLINE_CURVE+UNIFORM_CURVE", curves::load_b_spline_curve),
    ("QUASI_UNIFORM_CURVE+RATIONAL_B_SPLINE_CURVE", curves::load_b_spline_curve),
    ("TRIMMED_CURVE", curves::load_trimmed_curve),
    ("SURFACE_CURVE", curves::load_surface_curve),
    ("SEAM_CURVE", curves::load_surface_curve),
    ("PCURVE", curves::load_pcurve),
    // Surfaces
    ("PLANE", surfaces::load_elementary_surface),
    ("CYLINDRICAL_SURFACE", surfaces::load_elementary_surface),
    ("CONICAL_SURFACE", surfaces::load_elementary_surface),
    ("SPHERICAL_SURFACE", surfaces::load_elementary_surface),
    ("TOROIDAL_SURFACE", surfaces::load_elementary_surface),
    ("B_SPLINE_SURFACE_WITH_KNOTS", surfaces::load_b_spline_surface),
    ("BEZIER_SURFACE", surfaces::load_b_spline_surface),
    ("UNIFORM_SURFACE", surfaces::load_b_spline_surface),
    ("QUASI_UNIFORM_SURFACE", surfaces::load_b_spline_surface),
    ("B_SPLINE_SURFACE_WITH_KNOTS+RATIONAL_B_SPLINE_SURFACE", surfaces::load_b_spline_surface),
    ("BEZIER_SURFACE+RATIONAL_B_SPLINE_SURFACE", surfaces::load_b_spline_surface),
    ("RATIONAL_B_SPLINE_SURFACE+UNIFORM_SURFACE", surfaces::load_b_spline_surface),
    ("QUASI_UNIFORM_SURFACE+RATIONAL_B_SPLINE_SURFACE", surfaces::load_b_spline_surface),
    ("SURFACE_OF_LINEAR_EXTRUSION", surfaces::load_linear_extrusion),
    ("SURFACE_OF_REVOLUTION", surfaces::load_revolution),
    // Topology
    ("VERTEX_POINT", topology::load_vertex_point),
    ("EDGE_CURVE", topology::load_edge_curve),
    ("ORIENTED_EDGE", topology::load_oriented_edge),
    ("EDGE_LOOP", topology::load_edge_loop),
    ("VERTEX_LOOP", topology::load_vertex_loop),
    ("FACE_BOUND", topology::load_face_bound),
    ("FACE_OUTER_BOUND", topology::load_face_bound),
    ("ADVANCED_FACE", topology::load_face),
    ("FACE_SURFACE", topology::load_face),
    ("ORIENTED_FACE", topology::load_oriented_face),
    ("OPEN_SHELL", topology::load_shell),
    ("CLOSED_SHELL", topology::load_shell),
    ("ORIENTED_CLOSED_SHELL", topology::load_oriented_closed_shell),
    ("MANIFOLD_SOLID_BREP", topology::load_solid),
    ("BREP_WITH_VOIDS", topology::load_solid),
    ("SHELL_BASED_SURFACE_MODEL", topology::load_surface_model),
    // Representations
    ("SHAPE_REPRESENTATION", representation::load_representation),
    ("ADVANCED_BREP_SHAPE_REPRESENTATION", representation::load_representation),
    ("MANIFOLD_SURFACE_SHAPE_REPRESENTATION", representation::load_representation),
    ("DEFINITIONAL_REPRESENTATION", representation::load_representation),
    // Units, measures and contexts
    ("SI_UNIT", units::load_si_unit),
    ("LENGTH_UNIT+SI_UNIT", units::load_si_unit),
    ("PLANE_ANGLE_UNIT+SI_UNIT", units::load_si_unit),
    ("SI_UNIT+SOLID_ANGLE_UNIT", units::load_si_unit),
    ("CONVERSION_BASED_UNIT+LENGTH_UNIT", units::load_conversion_based_unit),
    ("CONVERSION_BASED_UNIT+PLANE_ANGLE_UNIT", units::load_conversion_based_unit),
    ("DIMENSIONAL_EXPONENTS", units::load_dimensional_exponents),
    ("MEASURE_WITH_UNIT", units::load_measure_with_unit),
    ("LENGTH_MEASURE_WITH_UNIT", units::load_measure_with_unit),
    ("PLANE_ANGLE_MEASURE_WITH_UNIT", units::load_measure_with_unit),
    ("UNCERTAINTY_MEASURE_WITH_UNIT", units::load_measure_with_unit),
    ("REPRESENTATION_CONTEXT", units::load_context),
    ("GEOMETRIC_REPRESENTATION_CONTEXT", units::load_context),
    (
        "GEOMETRIC_REPRESENTATION_CONTEXT+GLOBAL_UNCERTAINTY_ASSIGNED_CONTEXT+GLOBAL_UNIT_ASSIGNED_CONTEXT",
        units::load_context,
    ),
    (
        "GEOMETRIC_REPRESENTATION_CONTEXT+GLOBAL_UNIT_ASSIGNED_CONTEXT",
        units::load_context,
    ),
    (
        "GEOMETRIC_REPRESENTATION_CONTEXT+PARAMETRIC_REPRESENTATION_CONTEXT",
        units::load_context,
    ),
];
