//! Points, directions, vectors and placements.

use log::warn;
use stepbrep_math::{Frame, FrameError, Point3, Vec3};

use super::{Entity, RepresentationItem};
use crate::error::{Result, StepError};
use crate::query::{Instance, Narrowed};
use crate::registry::{EntityId, Registry};

/// `CARTESIAN_POINT`. Missing coordinates are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianPoint {
    /// Name facet.
    pub item: RepresentationItem,
    /// Position.
    pub coordinates: Point3,
    /// Number of coordinates given in the file (1 to 3).
    pub dimension: usize,
}

/// `DIRECTION`, stored as written (not normalized).
#[derive(Debug, Clone, PartialEq)]
pub struct Direction {
    /// Name facet.
    pub item: RepresentationItem,
    /// Direction ratios.
    pub ratios: Vec3,
    /// Number of ratios given in the file.
    pub dimension: usize,
}

/// `VECTOR`
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    /// Name facet.
    pub item: RepresentationItem,
    /// The `orientation` direction.
    pub orientation: EntityId,
    /// Its ratios, normalized.
    pub direction: Vec3,
    /// Length.
    pub magnitude: f64,
}

impl Vector {
    /// Direction scaled by magnitude.
    pub fn scaled(&self) -> Vec3 {
        self.direction * self.magnitude
    }
}

/// Which placement entity a [`Placement`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    /// `AXIS1_PLACEMENT`
    Axis1,
    /// `AXIS2_PLACEMENT_2D`
    Axis2d,
    /// `AXIS2_PLACEMENT_3D`
    Axis3d,
}

impl PlacementKind {
    /// EXPRESS type name.
    pub fn type_name(self) -> &'static str {
        match self {
            PlacementKind::Axis1 => "AXIS1_PLACEMENT",
            PlacementKind::Axis2d => "AXIS2_PLACEMENT_2D",
            PlacementKind::Axis3d => "AXIS2_PLACEMENT_3D",
        }
    }
}

/// A placement with its derived orthonormal frame. Also serves as the
/// `AXIS2_PLACEMENT` select.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Name facet.
    pub item: RepresentationItem,
    /// Source entity type.
    pub kind: PlacementKind,
    /// The `location` point.
    pub location: EntityId,
    /// The `axis` direction, if given.
    pub axis: Option<EntityId>,
    /// The `ref_direction`, if given.
    pub ref_direction: Option<EntityId>,
    /// Frame derived on load.
    pub frame: Frame,
}

impl Placement {
    /// Local Z axis.
    pub fn normal(&self) -> Vec3 {
        self.frame.normal().into_inner()
    }

    /// Local X axis.
    pub fn x_axis(&self) -> Vec3 {
        self.frame.x_axis().into_inner()
    }

    /// Local Y axis.
    pub fn y_axis(&self) -> Vec3 {
        self.frame.y_axis().into_inner()
    }

    /// Origin.
    pub fn origin(&self) -> Point3 {
        self.frame.origin()
    }
}

fn read_triple(attrs: &Narrowed<'_>, type_name: &str, attribute: &str) -> Result<(Vec3, usize)> {
    let values = attrs.real_list(attribute)?;
    if values.is_empty() || values.len() > 3 {
        return Err(StepError::MissingAttribute {
            id: attrs.id(),
            type_name: type_name.into(),
            attribute: attribute.into(),
            detail: Some(format!("expected 1 to 3 values, found {}", values.len())),
        });
    }
    let mut v = Vec3::zeros();
    for (i, c) in values.iter().enumerate() {
        v[i] = *c;
    }
    Ok((v, values.len()))
}

pub(crate) fn load_cartesian_point(_reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let (v, dimension) = read_triple(&inst.narrow("CARTESIAN_POINT")?, "CARTESIAN_POINT", "coordinates")?;
    Ok(Entity::Point(CartesianPoint {
        item,
        coordinates: Point3::from(v),
        dimension,
    }))
}

pub(crate) fn load_direction(_reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let (ratios, dimension) = read_triple(&inst.narrow("DIRECTION")?, "DIRECTION", "direction_ratios")?;
    Ok(Entity::Direction(Direction {
        item,
        ratios,
        dimension,
    }))
}

pub(crate) fn load_vector(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let attrs = inst.narrow("VECTOR")?;
    let orientation_id = attrs.entity("orientation")?;
    let magnitude = attrs.real("magnitude")?;
    if magnitude < 0.0 {
        return Err(StepError::geometry(
            inst.id(),
            format!("negative vector magnitude {magnitude}"),
        ));
    }
    let orientation = reg.resolve(orientation_id)?;
    let ratios = reg.direction_at(orientation_id)?;
    let direction = ratios
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| StepError::geometry(inst.id(), "zero-length vector orientation"))?;
    Ok(Entity::Vector(Vector {
        item,
        orientation,
        direction,
        magnitude,
    }))
}

/// Build a frame, retrying a degenerate reference direction with the
/// configured fallback seed.
pub(crate) fn frame_with_fallback(
    reg: &Registry<'_>,
    id: u64,
    origin: Point3,
    axis: Option<Vec3>,
    reference: Option<Vec3>,
) -> Result<Frame> {
    let tolerance = reg.tolerance();
    match Frame::build(origin, axis, reference, &tolerance) {
        Ok(frame) => Ok(frame),
        Err(source @ FrameError::DegenerateReference { .. }) => {
            let Some(fallback) = reg.options().fallback_ref() else {
                return Err(StepError::Frame { id, source });
            };
            warn!("#{id}: {source}; using fallback reference {fallback:?}");
            Frame::build(origin, axis, Some(fallback), &tolerance)
                .map_err(|source| StepError::Frame { id, source })
        }
        Err(source) => Err(StepError::Frame { id, source }),
    }
}

struct PlacementFacet {
    item: RepresentationItem,
    location: EntityId,
    origin: Point3,
}

fn load_placement_facet(reg: &mut Registry<'_>, inst: &Instance<'_>) -> Result<PlacementFacet> {
    let item = RepresentationItem::load(inst)?;
    let location_id = inst.narrow("PLACEMENT")?.entity("location")?;
    let location = reg.resolve(location_id)?;
    let origin = reg.point_at(location_id)?;
    Ok(PlacementFacet {
        item,
        location,
        origin,
    })
}

fn opt_direction(reg: &mut Registry<'_>, id: Option<u64>) -> Result<(Option<EntityId>, Option<Vec3>)> {
    match id {
        Some(id) => Ok((Some(reg.resolve(id)?), Some(reg.direction_at(id)?))),
        None => Ok((None, None)),
    }
}

pub(crate) fn load_axis2_placement_3d(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let facet = load_placement_facet(reg, &inst)?;
    let attrs = inst.narrow("AXIS2_PLACEMENT_3D")?;
    let (axis, axis_vec) = opt_direction(reg, attrs.opt_entity("axis")?)?;
    let (ref_direction, ref_vec) = opt_direction(reg, attrs.opt_entity("ref_direction")?)?;
    let frame = frame_with_fallback(reg, inst.id(), facet.origin, axis_vec, ref_vec)?;
    Ok(Entity::Placement(Placement {
        item: facet.item,
        kind: PlacementKind::Axis3d,
        location: facet.location,
        axis,
        ref_direction,
        frame,
    }))
}

pub(crate) fn load_axis2_placement_2d(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let facet = load_placement_facet(reg, &inst)?;
    let attrs = inst.narrow("AXIS2_PLACEMENT_2D")?;
    let (ref_direction, ref_vec) = opt_direction(reg, attrs.opt_entity("ref_direction")?)?;
    let frame = frame_with_fallback(reg, inst.id(), facet.origin, None, ref_vec)?;
    Ok(Entity::Placement(Placement {
        item: facet.item,
        kind: PlacementKind::Axis2d,
        location: facet.location,
        axis: None,
        ref_direction,
        frame,
    }))
}

pub(crate) fn load_axis1_placement(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let facet = load_placement_facet(reg, &inst)?;
    let attrs = inst.narrow("AXIS1_PLACEMENT")?;
    let (axis, axis_vec) = opt_direction(reg, attrs.opt_entity("axis")?)?;
    let frame = frame_with_fallback(reg, inst.id(), facet.origin, axis_vec, None)?;
    Ok(Entity::Placement(Placement {
        item: facet.item,
        kind: PlacementKind::Axis1,
        location: facet.location,
        axis,
        ref_direction: None,
        frame,
    }))
}
