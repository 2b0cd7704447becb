//! Topological entities: vertices through solids.
//!
//! Orientation flags are composed on load: an [`OrientedEdge`] records its
//! sense relative to the root [`EdgeCurve`], an [`OrientedFace`] relative to
//! the root [`Face`], and an `ORIENTED_CLOSED_SHELL` folds into a reversed
//! [`Shell`]. The entities they wrap are never modified.

use stepbrep_math::Point3;

use super::{Entity, RepresentationItem};
use crate::assembly::LoopBuilder;
use crate::error::{Result, StepError};
use crate::query::Instance;
use crate::registry::{EntityId, Registry};

/// `VERTEX_POINT`
#[derive(Debug, Clone, PartialEq)]
pub struct VertexPoint {
    /// Name facet.
    pub item: RepresentationItem,
    /// The `vertex_geometry` point.
    pub point: EntityId,
    /// Its coordinates.
    pub position: Point3,
}

/// `EDGE_CURVE`
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCurve {
    /// Name facet.
    pub item: RepresentationItem,
    /// `edge_start` vertex.
    pub start: EntityId,
    /// `edge_end` vertex.
    pub end: EntityId,
    /// `edge_geometry` curve.
    pub curve: EntityId,
    /// Whether the edge runs with its curve.
    pub same_sense: bool,
}

/// `ORIENTED_EDGE`, possibly over another oriented edge.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedEdge {
    /// Name facet.
    pub item: RepresentationItem,
    /// The wrapped edge as written.
    pub edge_element: EntityId,
    /// The `orientation` flag as written.
    pub orientation: bool,
    /// The root edge curve.
    pub edge_curve: EntityId,
    /// Whether this edge runs with the root edge.
    pub sense: bool,
    /// Effective start vertex.
    pub start: EntityId,
    /// Effective end vertex.
    pub end: EntityId,
}

/// One entry of a loop's edge list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeUse {
    /// The oriented edge listed in the loop.
    pub oriented: EntityId,
    /// Its root edge curve.
    pub edge: EntityId,
    /// Whether the use runs with the root edge.
    pub sense: bool,
    /// Effective start vertex.
    pub start: EntityId,
    /// Effective end vertex.
    pub end: EntityId,
}

/// `EDGE_LOOP`, checked for closure on load.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLoop {
    /// Name facet.
    pub item: RepresentationItem,
    /// Uses in file order.
    pub uses: Vec<EdgeUse>,
    /// Root edges used twice, once in each direction.
    pub seams: Vec<EntityId>,
}

/// `VERTEX_LOOP`
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLoop {
    /// Name facet.
    pub item: RepresentationItem,
    /// The `loop_vertex`.
    pub vertex: EntityId,
}

/// `FACE_BOUND` or `FACE_OUTER_BOUND`.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBound {
    /// Name facet.
    pub item: RepresentationItem,
    /// An [`EdgeLoop`] or [`VertexLoop`].
    pub bound: EntityId,
    /// When false the loop is traversed backwards on emission.
    pub orientation: bool,
    /// Tagged as the outer bound.
    pub outer: bool,
}

/// `ADVANCED_FACE` or `FACE_SURFACE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Name facet.
    pub item: RepresentationItem,
    /// Bounds in file order.
    pub bounds: Vec<EntityId>,
    /// `face_geometry`
    pub surface: EntityId,
    /// Whether the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Index into `bounds` of the outer bound.
    pub outer: Option<usize>,
}

impl Face {
    /// Bounds with the outer one first.
    pub fn ordered_bounds(&self) -> Vec<EntityId> {
        let mut ordered = Vec::with_capacity(self.bounds.len());
        ordered.extend(self.outer.map(|i| self.bounds[i]));
        ordered.extend(
            self.bounds
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != self.outer)
                .map(|(_, b)| *b),
        );
        ordered
    }
}

/// `ORIENTED_FACE`, possibly nested.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedFace {
    /// Name facet.
    pub item: RepresentationItem,
    /// The root face.
    pub face: EntityId,
    /// Whether this face agrees with the root face.
    pub orientation: bool,
}

/// A connected face set.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    /// Name facet.
    pub item: RepresentationItem,
    /// Faces and oriented faces.
    pub faces: Vec<EntityId>,
    /// `CLOSED_SHELL` or an oriented closed shell.
    pub closed: bool,
    /// Every face is flipped.
    pub reversed: bool,
}

/// `MANIFOLD_SOLID_BREP` or `BREP_WITH_VOIDS`.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    /// Name facet.
    pub item: RepresentationItem,
    /// Outer shell.
    pub outer: EntityId,
    /// Void shells.
    pub voids: Vec<EntityId>,
}

/// `SHELL_BASED_SURFACE_MODEL`
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceModel {
    /// Name facet.
    pub item: RepresentationItem,
    /// Boundary shells.
    pub shells: Vec<EntityId>,
}

pub(crate) fn load_vertex_point(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let point_id = inst.narrow("VERTEX_POINT")?.entity("vertex_geometry")?;
    let (point, p) = reg.resolve_as(point_id, "CARTESIAN_POINT", Entity::as_point)?;
    let position = p.coordinates;
    Ok(Entity::Vertex(VertexPoint {
        item,
        point,
        position,
    }))
}

fn vertex(reg: &mut Registry<'_>, id: u64) -> Result<EntityId> {
    let (key, _) = reg.resolve_as(id, "VERTEX_POINT", Entity::as_vertex)?;
    Ok(key)
}

pub(crate) fn load_edge_curve(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let edge = inst.narrow("EDGE")?;
    let start = vertex(reg, edge.entity("edge_start")?)?;
    let end = vertex(reg, edge.entity("edge_end")?)?;
    let attrs = inst.narrow("EDGE_CURVE")?;
    let (curve, _) = reg.resolve_as(attrs.entity("edge_geometry")?, "CURVE", Entity::as_curve)?;
    Ok(Entity::EdgeCurve(EdgeCurve {
        item,
        start,
        end,
        curve,
        same_sense: attrs.boolean("same_sense")?,
    }))
}

pub(crate) fn load_oriented_edge(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let attrs = inst.narrow("ORIENTED_EDGE")?;
    let orientation = attrs.boolean("orientation")?;
    let edge_element = reg.resolve(attrs.entity("edge_element")?)?;
    let (edge_curve, sense, start, end) = match reg.get(edge_element)? {
        Entity::EdgeCurve(ec) => (edge_element, orientation, ec.start, ec.end),
        Entity::OrientedEdge(inner) => (inner.edge_curve, inner.sense == orientation, inner.start, inner.end),
        other => {
            return Err(StepError::type_mismatch(
                reg.file_id(edge_element).unwrap_or(0),
                "EDGE_CURVE",
                other.kind_name(),
            ))
        }
    };
    let (start, end) = if orientation { (start, end) } else { (end, start) };
    Ok(Entity::OrientedEdge(OrientedEdge {
        item,
        edge_element,
        orientation,
        edge_curve,
        sense,
        start,
        end,
    }))
}

pub(crate) fn load_edge_loop(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let ids = inst.narrow("PATH")?.entity_list("edge_list")?;
    let mut uses = Vec::with_capacity(ids.len());
    for id in ids {
        let (oriented, oe) = reg.resolve_as(id, "ORIENTED_EDGE", Entity::as_oriented_edge)?;
        uses.push(EdgeUse {
            oriented,
            edge: oe.edge_curve,
            sense: oe.sense,
            start: oe.start,
            end: oe.end,
        });
    }

    let mut builder = LoopBuilder::new(reg, inst.id());
    for u in uses {
        builder.push(u)?;
    }
    builder.close()?;
    let closed = builder.finish()?;
    Ok(Entity::EdgeLoop(EdgeLoop {
        item,
        uses: closed.uses,
        seams: closed.seams,
    }))
}

pub(crate) fn load_vertex_loop(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let vertex = vertex(reg, inst.narrow("VERTEX_LOOP")?.entity("loop_vertex")?)?;
    Ok(Entity::VertexLoop(VertexLoop { item, vertex }))
}

pub(crate) fn load_face_bound(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let attrs = inst.narrow("FACE_BOUND")?;
    let bound = reg.resolve(attrs.entity("bound")?)?;
    match reg.get(bound)? {
        Entity::EdgeLoop(_) | Entity::VertexLoop(_) => {}
        other => {
            return Err(StepError::type_mismatch(
                reg.file_id(bound).unwrap_or(0),
                "LOOP",
                other.kind_name(),
            ))
        }
    }
    Ok(Entity::FaceBound(FaceBound {
        item,
        bound,
        orientation: attrs.boolean("orientation")?,
        outer: inst.is_a("FACE_OUTER_BOUND"),
    }))
}

pub(crate) fn load_face(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let mut bounds = Vec::new();
    let mut outers = Vec::new();
    for (i, id) in inst.narrow("FACE")?.entity_list("bounds")?.into_iter().enumerate() {
        let (key, fb) = reg.resolve_as(id, "FACE_BOUND", Entity::as_face_bound)?;
        if fb.outer {
            outers.push(i);
        }
        bounds.push(key);
    }
    let outer = match outers.as_slice() {
        [] => bounds.len().checked_sub(1),
        [i] => Some(*i),
        _ => {
            return Err(StepError::topology(
                inst.id(),
                format!("{} bounds are tagged outer", outers.len()),
            ))
        }
    };

    let attrs = inst.narrow("FACE_SURFACE")?;
    let (surface, _) = reg.resolve_as(attrs.entity("face_geometry")?, "SURFACE", Entity::as_surface)?;
    Ok(Entity::Face(Face {
        item,
        bounds,
        surface,
        same_sense: attrs.boolean("same_sense")?,
        outer,
    }))
}

pub(crate) fn load_oriented_face(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let attrs = inst.narrow("ORIENTED_FACE")?;
    let orientation = attrs.boolean("orientation")?;
    let element = reg.resolve(attrs.entity("face_element")?)?;
    let (face, inner) = match reg.get(element)? {
        Entity::Face(_) => (element, true),
        Entity::OrientedFace(of) => (of.face, of.orientation),
        other => {
            return Err(StepError::type_mismatch(
                reg.file_id(element).unwrap_or(0),
                "FACE",
                other.kind_name(),
            ))
        }
    };
    Ok(Entity::OrientedFace(OrientedFace {
        item,
        face,
        orientation: inner == orientation,
    }))
}

pub(crate) fn load_shell(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let mut faces = Vec::new();
    for id in inst.narrow("CONNECTED_FACE_SET")?.entity_list("cfs_faces")? {
        let key = reg.resolve(id)?;
        match reg.get(key)? {
            Entity::Face(_) | Entity::OrientedFace(_) => faces.push(key),
            other => return Err(StepError::type_mismatch(id, "FACE", other.kind_name())),
        }
    }
    Ok(Entity::Shell(Shell {
        item,
        faces,
        closed: inst.is_a("CLOSED_SHELL"),
        reversed: false,
    }))
}

pub(crate) fn load_oriented_closed_shell(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let attrs = inst.narrow("ORIENTED_CLOSED_SHELL")?;
    let orientation = attrs.boolean("orientation")?;
    let (_, element) = reg.resolve_as(attrs.entity("closed_shell_element")?, "CLOSED_SHELL", Entity::as_shell)?;
    Ok(Entity::Shell(Shell {
        item,
        faces: element.faces.clone(),
        closed: true,
        reversed: element.reversed == orientation,
    }))
}

fn shell(reg: &mut Registry<'_>, id: u64) -> Result<EntityId> {
    let (key, _) = reg.resolve_as(id, "CONNECTED_FACE_SET", Entity::as_shell)?;
    Ok(key)
}

pub(crate) fn load_solid(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let outer = shell(reg, inst.narrow("MANIFOLD_SOLID_BREP")?.entity("outer")?)?;
    let voids = if inst.is_a("BREP_WITH_VOIDS") {
        inst.narrow("BREP_WITH_VOIDS")?
            .entity_list("voids")?
            .into_iter()
            .map(|id| shell(reg, id))
            .collect::<Result<Vec<_>>>()?
    } else {
        Vec::new()
    };
    Ok(Entity::Solid(Solid { item, outer, voids }))
}

pub(crate) fn load_surface_model(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let item = RepresentationItem::load(&inst)?;
    let shells = inst
        .narrow("SHELL_BASED_SURFACE_MODEL")?
        .entity_list("sbsm_boundary")?
        .into_iter()
        .map(|id| shell(reg, id))
        .collect::<Result<Vec<_>>>()?;
    Ok(Entity::SurfaceModel(SurfaceModel { item, shells }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_util::{parse, SQUARE};
    use crate::error::ErrorKind;
    use crate::options::ReaderOptions;

    fn oriented<'r>(reg: &'r mut Registry<'_>, id: u64) -> &'r OrientedEdge {
        reg.resolve_as(id, "ORIENTED_EDGE", Entity::as_oriented_edge).unwrap().1
    }

    fn edge_loop(reg: &mut Registry<'_>, id: u64) -> Result<EdgeLoop> {
        let key = reg.resolve(id)?;
        match reg.get(key)? {
            Entity::EdgeLoop(l) => Ok(l.clone()),
            other => panic!("unexpected {}", other.kind_name()),
        }
    }

    #[test]
    fn test_reversed_oriented_edge_swaps_ends() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);

        let v7 = reg.resolve(7).unwrap();
        let v8 = reg.resolve(8).unwrap();
        let oe = oriented(&mut reg, 23).clone();
        assert!(!oe.sense);
        assert_eq!((oe.start, oe.end), (v7, v8));

        // The edge itself is untouched.
        let ec = reg.fetch(oe.edge_curve, "EDGE_CURVE", Entity::as_edge_curve).unwrap();
        assert_eq!((ec.start, ec.end), (v8, v7));
        assert!(ec.same_sense);

        // Reversing again composes back to the edge's own direction.
        let nested = oriented(&mut reg, 45).clone();
        assert_eq!(nested.edge_curve, oe.edge_curve);
        assert!(nested.sense);
        assert_eq!((nested.start, nested.end), (v8, v7));
    }

    #[test]
    fn test_square_loop_closes() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let l = edge_loop(&mut reg, 25).unwrap();
        assert_eq!(l.uses.len(), 4);
        assert!(l.seams.is_empty());
        assert_eq!(
            l.uses.iter().map(|u| u.sense).collect::<Vec<_>>(),
            vec![true, true, false, false]
        );
    }

    #[test]
    fn test_open_loop_is_topology_mismatch() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let err = edge_loop(&mut reg, 31).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        assert_eq!(err.instance_id(), Some(31));
        assert!(reg.cached(31).is_none());
    }

    #[test]
    fn test_vertices_sharing_a_point_meet() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        assert_eq!(edge_loop(&mut reg, 48).unwrap().uses.len(), 4);
    }

    #[test]
    fn test_seam_detected_once() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let l = edge_loop(&mut reg, 32).unwrap();
        let edge = reg.resolve(17).unwrap();
        assert_eq!(l.seams, vec![edge]);
        assert_ne!(l.uses[0].sense, l.uses[1].sense);
    }

    #[test]
    fn test_repeated_edges_are_not_seams() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);

        let err = edge_loop(&mut reg, 34).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        assert!(err.to_string().contains("4 times"));

        let err = edge_loop(&mut reg, 44).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        assert!(err.to_string().contains("same direction"));
    }

    #[test]
    fn test_face_bounds() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);

        let (_, face) = reg.resolve_as(30, "FACE", Entity::as_face).unwrap();
        assert_eq!(face.outer, Some(0));
        assert!(face.same_sense);

        let err = reg.resolve(52).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);

        // No outer tag: the last bound is outer.
        let (_, face) = reg.resolve_as(54, "FACE", Entity::as_face).unwrap();
        assert_eq!(face.outer, Some(1));
        let ordered = face.ordered_bounds();
        assert_eq!(ordered[0], face.bounds[1]);
        assert_eq!(ordered[1], face.bounds[0]);
    }

    #[test]
    fn test_oriented_face_and_shells() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);

        let face = reg.resolve(30).unwrap();
        let key = reg.resolve(55).unwrap();
        match reg.get(key).unwrap() {
            Entity::OrientedFace(of) => {
                assert_eq!(of.face, face);
                assert!(!of.orientation);
            }
            other => panic!("unexpected {}", other.kind_name()),
        }

        let (_, shell) = reg.resolve_as(57, "CLOSED_SHELL", Entity::as_shell).unwrap();
        assert!(shell.closed);
        assert!(shell.reversed);
        assert_eq!(shell.faces.len(), 2);

        let key = reg.resolve(59).unwrap();
        match reg.get(key).unwrap() {
            Entity::Solid(s) => assert_eq!(s.voids.len(), 1),
            other => panic!("unexpected {}", other.kind_name()),
        }
        let key = reg.resolve(60).unwrap();
        match reg.get(key).unwrap() {
            Entity::SurfaceModel(m) => assert_eq!(m.shells.len(), 1),
            other => panic!("unexpected {}", other.kind_name()),
        }
    }

    #[test]
    fn test_vertex_loop_bound() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let (_, fb) = reg.resolve_as(63, "FACE_BOUND", Entity::as_face_bound).unwrap();
        let bound = fb.bound;
        assert!(matches!(reg.get(bound).unwrap(), Entity::VertexLoop(_)));
    }

    #[test]
    fn test_bound_must_be_a_loop() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let err = reg.resolve(64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvableReference);
    }
}
