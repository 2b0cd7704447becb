//! BREP emission: materializes resolved topology into a [`BrepSink`].
//!
//! One [`Emitter`] handles one top-level shape. Faces are emitted in
//! phases (vertices, edges, loops, faces, then the shell) and every
//! phase maps entity handles to container indices so shared vertices,
//! curves, surfaces and edges are emitted once.
//!
//! Errors raised while emitting a face drop that face only: it is recorded
//! as a [`FaceFailure`] and its shell is built from the remaining faces.
//! Elements the face emitted before failing stay in the container.

use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;
use stepbrep_geom::{Curve3d, Line2d, Polyline2d, Surface};
use stepbrep_math::{Point2, Point3, Vec2};
use stepbrep_topo::{
    BrepSink, CurveIndex, EdgeIndex, FaceIndex, LoopIndex, LoopKind, ParamBounds, ParamRange,
    ShellIndex, SurfaceIndex, TrimKind, VertexIndex,
};

use crate::assembly::same_vertex;
use crate::entities::curves::{build_curve, parameter_range};
use crate::entities::surfaces::build_surface;
use crate::entities::{Carrier, EdgeLoop, Entity, FaceBound, VertexPoint};
use crate::error::{ErrorKind, Result, StepError};
use crate::pullback::{bridge_side, period_shift, seam_shift, trim_samples};
use crate::registry::{EntityId, Registry};

/// A face left out of the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceFailure {
    /// File id of the face.
    pub face: u64,
    /// Classification of the error.
    pub kind: ErrorKind,
    /// The error, rendered.
    pub message: String,
}

/// A face as its shell uses it.
#[derive(Debug, Clone, Copy)]
struct FaceUse {
    face: EntityId,
    id: u64,
    /// The face normal opposes its surface normal.
    reversed: bool,
}

#[derive(Debug, Clone, Copy)]
struct EmittedEdge {
    index: EdgeIndex,
    carrier: EntityId,
    range: ParamRange,
    /// The edge curve runs in the direction of its carrier.
    along: bool,
}

/// One trim of a loop, pulled back into parameter space.
struct Pulled {
    edge: EdgeIndex,
    bounds: ParamBounds,
    points: Vec<Point2>,
    kind: TrimKind,
    /// Vertex the trim arrives at.
    arrives: VertexIndex,
}

impl Pulled {
    fn start(&self) -> Point2 {
        self.points[0]
    }

    fn end(&self) -> Point2 {
        self.points[self.points.len() - 1]
    }

    /// Point over the start of the edge.
    fn edge_start(&self) -> Point2 {
        if self.bounds.reversed {
            self.end()
        } else {
            self.start()
        }
    }
}

/// Emits one shape into a sink.
pub struct Emitter<'a, 'f, S: BrepSink> {
    reg: &'a Registry<'f>,
    sink: &'a mut S,
    /// Keyed by point, so vertices over one point share an index.
    vertices: HashMap<EntityId, VertexIndex>,
    curves: HashMap<EntityId, (CurveIndex, Box<dyn Curve3d>)>,
    surfaces: HashMap<EntityId, (SurfaceIndex, Box<dyn Surface>)>,
    edges: HashMap<EntityId, EmittedEdge>,
    failures: Vec<FaceFailure>,
}

impl<'a, 'f, S: BrepSink> Emitter<'a, 'f, S> {
    /// Emitter writing into `sink`.
    pub fn new(reg: &'a Registry<'f>, sink: &'a mut S) -> Self {
        Self {
            reg,
            sink,
            vertices: HashMap::new(),
            curves: HashMap::new(),
            surfaces: HashMap::new(),
            edges: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// Faces skipped so far.
    pub fn failures(&self) -> &[FaceFailure] {
        &self.failures
    }

    /// Consume the emitter, returning the skipped faces.
    pub fn finish(self) -> Vec<FaceFailure> {
        self.failures
    }

    fn id_of(&self, key: EntityId) -> u64 {
        self.reg.file_id(key).unwrap_or(0)
    }

    /// Emit a solid, surface model or shell. Returns the shells added; a
    /// shell whose faces all failed is left out.
    pub fn emit(&mut self, key: EntityId) -> Result<Vec<ShellIndex>> {
        let shells = match self.reg.get(key)? {
            Entity::Solid(solid) => {
                let mut shells = vec![solid.outer];
                shells.extend(&solid.voids);
                shells
            }
            Entity::SurfaceModel(model) => model.shells.clone(),
            Entity::Shell(_) => vec![key],
            other => {
                return Err(StepError::UnsupportedEntity {
                    id: self.id_of(key),
                    type_name: other.kind_name().to_string(),
                })
            }
        };
        let mut emitted = Vec::with_capacity(shells.len());
        for shell in shells {
            emitted.extend(self.emit_shell(shell)?);
        }
        Ok(emitted)
    }

    /// Emit one shell through all phases.
    pub fn emit_shell(&mut self, key: EntityId) -> Result<Option<ShellIndex>> {
        let shell = self.reg.fetch(key, "CONNECTED_FACE_SET", Entity::as_shell)?;
        let mut faces = Vec::with_capacity(shell.faces.len());
        for &f in &shell.faces {
            let (face, flipped) = match self.reg.get(f)? {
                Entity::OrientedFace(of) => (of.face, !of.orientation),
                _ => (f, false),
            };
            let same_sense = self.reg.fetch(face, "FACE", Entity::as_face)?.same_sense;
            faces.push(FaceUse {
                face,
                id: self.id_of(face),
                reversed: !same_sense ^ flipped ^ shell.reversed,
            });
        }

        let faces = self.phase(faces, Self::face_vertices);
        let faces = self.phase(faces, Self::face_edges);
        let mut bounded = Vec::with_capacity(faces.len());
        for face in faces {
            match self.face_loops(&face) {
                Ok(loops) => bounded.push((face, loops)),
                Err(err) => self.fail(face.id, err),
            }
        }
        let mut emitted = Vec::with_capacity(bounded.len());
        for (face, loops) in bounded {
            match self.add_face(&face, loops) {
                Ok(index) => emitted.push(index),
                Err(err) => self.fail(face.id, err),
            }
        }

        let id = self.id_of(key);
        if emitted.is_empty() {
            warn!("shell #{id}: no faces could be emitted, skipping");
            return Ok(None);
        }
        debug!("shell #{id}: {} faces", emitted.len());
        Ok(Some(self.sink.add_shell(emitted, shell.closed)?))
    }

    /// Run one per-face step, keeping the faces that passed.
    fn phase(
        &mut self,
        faces: Vec<FaceUse>,
        step: fn(&mut Self, &FaceUse) -> Result<()>,
    ) -> Vec<FaceUse> {
        let mut kept = Vec::with_capacity(faces.len());
        for face in faces {
            match step(self, &face) {
                Ok(()) => kept.push(face),
                Err(err) => self.fail(face.id, err),
            }
        }
        kept
    }

    fn fail(&mut self, face: u64, err: StepError) {
        warn!("face #{face} skipped: {err}");
        self.failures.push(FaceFailure {
            face,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn bounds(&self, face: &FaceUse) -> Result<Vec<&'a FaceBound>> {
        let reg = self.reg;
        let face_entity = reg.fetch(face.face, "FACE", Entity::as_face)?;
        let ordered = face_entity.ordered_bounds();
        if ordered.is_empty() {
            return Err(StepError::topology(face.id, "face has no bounds"));
        }
        ordered
            .into_iter()
            .map(|b| reg.fetch(b, "FACE_BOUND", Entity::as_face_bound))
            .collect()
    }

    fn face_vertices(&mut self, face: &FaceUse) -> Result<()> {
        let reg = self.reg;
        for bound in self.bounds(face)? {
            match reg.get(bound.bound)? {
                Entity::EdgeLoop(lp) => {
                    for u in &lp.uses {
                        self.vertex(u.start)?;
                        self.vertex(u.end)?;
                    }
                }
                Entity::VertexLoop(vl) => {
                    self.vertex(vl.vertex)?;
                }
                other => {
                    return Err(StepError::type_mismatch(
                        self.id_of(bound.bound),
                        "LOOP",
                        other.kind_name(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn vertex_point(&self, key: EntityId) -> Result<&'a VertexPoint> {
        self.reg.fetch(key, "VERTEX_POINT", Entity::as_vertex)
    }

    fn vertex(&mut self, key: EntityId) -> Result<VertexIndex> {
        let vp = self.vertex_point(key)?;
        if let Some(index) = self.vertices.get(&vp.point) {
            return Ok(*index);
        }
        let index = self.sink.add_vertex(vp.position);
        self.vertices.insert(vp.point, index);
        Ok(index)
    }

    fn face_edges(&mut self, face: &FaceUse) -> Result<()> {
        let reg = self.reg;
        for bound in self.bounds(face)? {
            if let Entity::EdgeLoop(lp) = reg.get(bound.bound)? {
                for u in &lp.uses {
                    self.edge(u.edge)?;
                }
            }
        }
        Ok(())
    }

    fn curve(&mut self, carrier: EntityId, owner: u64) -> Result<CurveIndex> {
        if let Some((index, _)) = self.curves.get(&carrier) {
            return Ok(*index);
        }
        let curve = build_curve(self.reg, carrier, owner)?;
        let index = self.sink.add_curve(curve.clone_box());
        self.curves.insert(carrier, (index, curve));
        Ok(index)
    }

    fn edge(&mut self, key: EntityId) -> Result<EmittedEdge> {
        if let Some(edge) = self.edges.get(&key) {
            return Ok(*edge);
        }
        let reg = self.reg;
        let id = self.id_of(key);
        let ec = reg.fetch(key, "EDGE_CURVE", Entity::as_edge_curve)?;
        let carrier = Carrier::resolve(reg, ec.curve)?;
        let curve_index = self.curve(carrier.key, id)?;

        // Vertices in carrier order.
        let along = ec.same_sense == carrier.sense;
        let (start, end) = if along {
            (ec.start, ec.end)
        } else {
            (ec.end, ec.start)
        };
        let closed = same_vertex(reg, start, end);
        let ends: (Point3, Point3) = (
            self.vertex_point(start)?.position,
            self.vertex_point(end)?.position,
        );
        let range = {
            let (_, curve) = &self.curves[&carrier.key];
            parameter_range(
                curve.as_ref(),
                id,
                carrier.trim.as_ref(),
                Some(ends),
                closed,
                reg.tolerance().linear,
            )?
        };

        let (v0, v1) = (self.vertex(start)?, self.vertex(end)?);
        let index = self.sink.add_edge_curve(Some(curve_index), v0, v1, range)?;
        debug!("edge #{id}: [{}, {}]", range.start, range.end);
        let edge = EmittedEdge {
            index,
            carrier: carrier.key,
            range,
            along,
        };
        self.edges.insert(key, edge);
        Ok(edge)
    }

    fn surface(&mut self, key: EntityId, owner: u64) -> Result<SurfaceIndex> {
        if let Some((index, _)) = self.surfaces.get(&key) {
            return Ok(*index);
        }
        let surface = build_surface(self.reg, key, owner)?;
        let index = self.sink.add_surface(surface.clone_box());
        self.surfaces.insert(key, (index, surface));
        Ok(index)
    }

    fn face_loops(&mut self, face: &FaceUse) -> Result<Vec<LoopIndex>> {
        let reg = self.reg;
        let surface = reg.fetch(face.face, "FACE", Entity::as_face)?.surface;
        self.surface(surface, face.id)?;
        let bounds = self.bounds(face)?;
        let mut loops = Vec::with_capacity(bounds.len());
        for (i, bound) in bounds.into_iter().enumerate() {
            let kind = if i == 0 { LoopKind::Outer } else { LoopKind::Inner };
            let reversed = !bound.orientation ^ face.reversed;
            let index = match reg.get(bound.bound)? {
                Entity::EdgeLoop(lp) => self.edge_loop(lp, surface, face.id, kind, reversed)?,
                Entity::VertexLoop(vl) => {
                    let v = self.vertex(vl.vertex)?;
                    let position = self.vertex_point(vl.vertex)?.position;
                    let uv = self.surface_of(surface, face.id)?.project(&position);
                    let edge = self.sink.add_edge_curve(None, v, v, ParamRange::new(0.0, 0.0))?;
                    let curve = self.sink.add_curve_2d(Box::new(Line2d::from_points(uv, uv)));
                    let trim = self.sink.add_trim(
                        edge,
                        ParamBounds::along(ParamRange::new(0.0, 0.0), false),
                        curve,
                        TrimKind::Boundary,
                    )?;
                    self.sink.add_loop(vec![trim], kind)?
                }
                other => {
                    return Err(StepError::type_mismatch(
                        self.id_of(bound.bound),
                        "LOOP",
                        other.kind_name(),
                    ))
                }
            };
            loops.push(index);
        }
        Ok(loops)
    }

    fn surface_of(&self, key: EntityId, owner: u64) -> Result<&dyn Surface> {
        self.surfaces
            .get(&key)
            .map(|(_, surface)| surface.as_ref())
            .ok_or_else(|| StepError::topology(owner, "face surface was not emitted"))
    }

    /// Emit an edge loop with a parameter-space curve per trim.
    ///
    /// Every trim after the first is shifted by whole periods to start where
    /// the previous one ended. The second use of a seam edge is placed one
    /// period across the seam from the first. Where consecutive trims meet
    /// a pole or apex at different points, a singular trim over a
    /// degenerate edge closes the gap.
    fn edge_loop(
        &mut self,
        lp: &EdgeLoop,
        surface: EntityId,
        owner: u64,
        kind: LoopKind,
        reversed: bool,
    ) -> Result<LoopIndex> {
        let mut uses = lp.uses.clone();
        if reversed {
            uses.reverse();
        }
        let mut placed = Vec::with_capacity(uses.len());
        for u in &uses {
            let edge = self.edge(u.edge)?;
            let arrives = self.vertex(if reversed { u.start } else { u.end })?;
            let bounds = ParamBounds::along(edge.range, (u.sense != edge.along) ^ reversed);
            placed.push((u.edge, edge, bounds, arrives));
        }

        // Field borrow, so the sink stays writable below.
        let surf = self
            .surfaces
            .get(&surface)
            .map(|(_, surface)| surface.as_ref())
            .ok_or_else(|| StepError::topology(owner, "face surface was not emitted"))?;
        let mut anchors: HashMap<EntityId, Point2> = HashMap::new();
        let mut pulled: Vec<Pulled> = Vec::with_capacity(placed.len());
        for (key, edge, mut bounds, arrives) in placed {
            let (_, curve) = self.curves.get(&edge.carrier).ok_or_else(|| {
                StepError::topology(owner, "edge curve was not emitted")
            })?;
            let mut points = trim_samples(surf, curve.as_ref(), bounds.start, bounds.end);
            let seam = lp.seams.contains(&key);
            let own = if bounds.reversed {
                points[points.len() - 1]
            } else {
                points[0]
            };
            let shift = match (pulled.first(), pulled.last()) {
                (Some(first), Some(previous)) => match anchors.get(&key) {
                    Some(&anchor) if seam => {
                        let step = seam_offset(surf, curve.as_ref(), edge.range).unwrap_or_else(|| {
                            warn!("face #{owner}: seam edge on a non-periodic surface");
                            Vec2::zeros()
                        });
                        let shift =
                            seam_shift(&points, anchor - own, step, previous.end(), first.start());
                        bounds.uv_offset = own + shift - anchor;
                        shift
                    }
                    _ => period_shift(surf, points[0], previous.end()),
                },
                _ => Vec2::zeros(),
            };
            for p in &mut points {
                *p += shift;
            }
            let trim = Pulled {
                edge: edge.index,
                bounds,
                points,
                kind: if seam { TrimKind::Seam } else { TrimKind::Boundary },
                arrives,
            };
            if seam {
                anchors.entry(key).or_insert_with(|| trim.edge_start());
            }
            pulled.push(trim);
        }

        let n = pulled.len();
        let mut trims = Vec::with_capacity(n);
        for (i, trim) in pulled.iter().enumerate() {
            let curve = Polyline2d::new(trim.points.clone())
                .map_err(|source| StepError::Geometry { id: owner, source })?;
            let uv = self.sink.add_curve_2d(Box::new(curve));
            trims.push(self.sink.add_trim(trim.edge, trim.bounds, uv, trim.kind)?);

            let next = pulled[(i + 1) % n].start();
            if let Some(side) = bridge_side(surf, trim.end(), next) {
                debug!("face #{owner}: singular trim along {side:?}");
                let v = trim.arrives;
                let edge = self.sink.add_edge_curve(None, v, v, ParamRange::new(0.0, 0.0))?;
                let uv = self
                    .sink
                    .add_curve_2d(Box::new(Line2d::from_points(trim.end(), next)));
                trims.push(self.sink.add_trim(
                    edge,
                    ParamBounds::along(ParamRange::new(0.0, 0.0), false),
                    uv,
                    TrimKind::Singular,
                )?);
            }
        }
        Ok(self.sink.add_loop(trims, kind)?)
    }

    fn add_face(&mut self, face: &FaceUse, loops: Vec<LoopIndex>) -> Result<FaceIndex> {
        let surface = self.reg.fetch(face.face, "FACE", Entity::as_face)?.surface;
        let (index, _) = self.surfaces.get(&surface).ok_or_else(|| {
            StepError::topology(face.id, "face surface was not emitted")
        })?;
        let index = *index;
        debug!("face #{}: {} loops", face.id, loops.len());
        Ok(self.sink.add_face(index, loops, face.reversed)?)
    }
}

/// Shift across a seam: one period along the surface parameter that
/// varies least over the edge. `None` on a non-periodic surface.
fn seam_offset(surface: &dyn Surface, curve: &dyn Curve3d, range: ParamRange) -> Option<Vec2> {
    match surface.periods() {
        (Some(pu), Some(pv)) => {
            let span = range.end - range.start;
            let a = surface.project(&curve.evaluate(range.start + 0.25 * span));
            let b = surface.project(&curve.evaluate(range.start + 0.75 * span));
            let du = wrapped(b.x - a.x, pu).abs();
            let dv = wrapped(b.y - a.y, pv).abs();
            Some(if du <= dv {
                Vec2::new(pu, 0.0)
            } else {
                Vec2::new(0.0, pv)
            })
        }
        (Some(pu), None) => Some(Vec2::new(pu, 0.0)),
        (None, Some(pv)) => Some(Vec2::new(0.0, pv)),
        (None, None) => None,
    }
}

/// Difference `d` folded into `[-period / 2, period / 2]`.
fn wrapped(d: f64, period: f64) -> f64 {
    d - period * (d / period).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_util::{parse, CYLINDER, SQUARE};
    use crate::options::ReaderOptions;
    use std::f64::consts::PI;
    use stepbrep_topo::Brep;

    fn emit(data: &str, root: u64) -> (Brep, Vec<FaceFailure>) {
        let file = parse(data);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let key = reg.resolve(root).unwrap();
        let mut brep = Brep::new();
        let mut emitter = Emitter::new(&reg, &mut brep);
        emitter.emit(key).unwrap();
        let failures = emitter.finish();
        (brep, failures)
    }

    #[test]
    fn test_shared_face_emits_once_per_use() {
        // #56 holds #30 and #30 reversed.
        let (brep, failures) = emit(SQUARE, 56);
        assert!(failures.is_empty());
        let counts = brep.counts();
        assert_eq!(counts.vertices, 4);
        assert_eq!(counts.curves, 4);
        assert_eq!(counts.surfaces, 1);
        assert_eq!(counts.edges, 4);
        assert_eq!(counts.trims, 8);
        assert_eq!(counts.loops, 2);
        assert_eq!(counts.faces, 2);
        assert!(brep.shells[0].closed);
        assert!(!brep.faces[0].reversed);
        assert!(brep.faces[1].reversed);
        assert!(brep.validate().is_ok());

        // The second loop runs the square the other way round.
        let forward = brep.loop_vertices(brep.faces[0].loops[0]);
        let backward = brep.loop_vertices(brep.faces[1].loops[0]);
        assert_eq!(forward.len(), 4);
        assert_eq!(backward, vec![forward[0], forward[3], forward[2], forward[1]]);
    }

    #[test]
    fn test_single_face() {
        let (brep, failures) = emit(SQUARE, 61);
        assert!(failures.is_empty());
        let counts = brep.counts();
        assert_eq!(counts.vertices, 4);
        assert_eq!(counts.edges, 4);
        assert_eq!(counts.curves_2d, 4);
        assert_eq!(counts.loops, 1);
        assert_eq!(counts.faces, 1);
        assert!(!brep.shells[0].closed);
        assert!(brep.validate().is_ok());

        // The plane frame is the world frame, so the loop is the unit square.
        let lp = brep.faces[0].loops[0];
        assert!(brep.uv_gaps(lp).iter().all(|g| *g < 1e-9));
        let (start, end) = brep.trim_uv(brep.loops[lp.index()].trims[1]);
        assert!((start - Point2::new(1.0, 0.0)).norm() < 1e-9);
        assert!((end - Point2::new(1.0, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn test_reversed_bound() {
        let loop_of = |brep: &Brep| {
            let face = &brep.faces[0];
            (face.reversed, brep.loop_vertices(face.loops[0]))
        };
        let ids = |v: Vec<VertexIndex>| v.into_iter().map(|v| v.index()).collect::<Vec<_>>();

        // #66 traverses #25 backwards.
        let (brep, _) = emit(SQUARE, 67);
        let (reversed, vertices) = loop_of(&brep);
        assert!(!reversed);
        assert_eq!(ids(vertices), vec![0, 3, 2, 1]);
        assert!(brep.uv_gaps(brep.faces[0].loops[0]).iter().all(|g| *g < 1e-9));

        // On a reversed face the two flips cancel.
        let (brep, _) = emit(SQUARE, 69);
        let (reversed, vertices) = loop_of(&brep);
        assert!(reversed);
        assert_eq!(ids(vertices), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_edge_ranges_follow_vertices() {
        let (brep, _) = emit(SQUARE, 61);
        for edge in &brep.edges {
            assert!((edge.range.start - 0.0).abs() < 1e-9);
            assert!((edge.range.end - 1.0).abs() < 1e-9);
        }
        // #23 uses #19 against its direction.
        let trims = &brep.loops[0].trims;
        assert!(!brep.trims[trims[0].index()].bounds.reversed);
        assert!(brep.trims[trims[2].index()].bounds.reversed);
    }

    #[test]
    fn test_seam_second_use_is_shifted() {
        let (brep, failures) = emit(CYLINDER, 26);
        assert!(failures.is_empty());
        let counts = brep.counts();
        assert_eq!(counts.vertices, 2);
        assert_eq!(counts.edges, 3);
        assert_eq!(counts.trims, 4);
        assert!(brep.validate().is_ok());

        let lp = brep.faces[0].loops[0];
        let trims: Vec<_> = brep.loops[lp.index()]
            .trims
            .iter()
            .map(|t| brep.trims[t.index()].clone())
            .collect();
        // Full circles.
        let bottom = &brep.edges[trims[0].edge.index()];
        assert!((bottom.range.start - 0.0).abs() < 1e-9);
        assert!((bottom.range.end - 2.0 * PI).abs() < 1e-9);
        // Seam used forward, then backward one period over.
        assert_eq!(trims[1].edge, trims[3].edge);
        assert_eq!(trims[0].kind, TrimKind::Boundary);
        assert_eq!(trims[1].kind, TrimKind::Seam);
        assert_eq!(trims[3].kind, TrimKind::Seam);
        assert!(trims[1].bounds.uv_offset.norm() < 1e-12);
        assert!((trims[3].bounds.uv_offset.x.abs() - 2.0 * PI).abs() < 1e-9);
        assert!(trims[3].bounds.uv_offset.y.abs() < 1e-12);
        assert!(trims[3].bounds.reversed);

        // The walk closes in (u, v) at every join, across the seam too.
        let gaps = brep.uv_gaps(lp);
        assert_eq!(gaps.len(), 4);
        assert!(gaps.iter().all(|g| *g < 1e-9), "{gaps:?}");
        let uv: Vec<_> = brep.loops[lp.index()]
            .trims
            .iter()
            .map(|&t| brep.trim_uv(t))
            .collect();
        assert!(((uv[1].0.x - uv[3].1.x).abs() - 2.0 * PI).abs() < 1e-9);
        assert!((uv[1].1.y - 1.0).abs() < 1e-9);
    }

    /// Upper unit hemisphere: the equator plus a meridian seam up to the
    /// north pole.
    const HEMISPHERE: &str = r#"#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));
#2 = CARTESIAN_POINT('', (1.0, 0.0, 0.0));
#3 = CARTESIAN_POINT('', (0.0, 0.0, 1.0));
#4 = DIRECTION('', (0.0, 0.0, 1.0));
#5 = DIRECTION('', (1.0, 0.0, 0.0));
#6 = DIRECTION('', (0.0, -1.0, 0.0));
#7 = AXIS2_PLACEMENT_3D('', #1, #4, #5);
#8 = AXIS2_PLACEMENT_3D('', #1, #6, #5);
#9 = SPHERICAL_SURFACE('', #7, 1.0);
#10 = CIRCLE('', #7, 1.0);
#11 = CIRCLE('', #8, 1.0);
#12 = VERTEX_POINT('', #2);
#13 = VERTEX_POINT('', #3);
#14 = EDGE_CURVE('', #12, #12, #10, .T.);
#15 = EDGE_CURVE('', #12, #13, #11, .T.);
#16 = ORIENTED_EDGE('', *, *, #14, .T.);
#17 = ORIENTED_EDGE('', *, *, #15, .T.);
#18 = ORIENTED_EDGE('', *, *, #15, .F.);
#19 = EDGE_LOOP('', (#16, #17, #18));
#20 = FACE_OUTER_BOUND('', #19, .T.);
#21 = ADVANCED_FACE('', (#20), #9, .T.);
#22 = OPEN_SHELL('', (#21));"#;

    #[test]
    fn test_pole_gets_singular_trim() {
        let (brep, failures) = emit(HEMISPHERE, 22);
        assert!(failures.is_empty());
        assert!(brep.validate().is_ok());

        let lp = brep.faces[0].loops[0];
        let trims = brep.loops[lp.index()].trims.clone();
        assert_eq!(trims.len(), 4);
        let kinds: Vec<_> = trims.iter().map(|t| brep.trims[t.index()].kind).collect();
        assert_eq!(
            kinds,
            vec![TrimKind::Boundary, TrimKind::Seam, TrimKind::Singular, TrimKind::Seam]
        );

        // The singular trim runs along the pole over a collapsed edge.
        let singular = &brep.trims[trims[2].index()];
        let edge = &brep.edges[singular.edge.index()];
        assert!(edge.is_degenerate());
        assert_eq!(edge.start, brep.trim_end(trims[1]));
        let (start, end) = brep.trim_uv(trims[2]);
        assert!((start.y - PI / 2.0).abs() < 1e-9);
        assert!((end.y - PI / 2.0).abs() < 1e-9);
        assert!(((start.x - end.x).abs() - 2.0 * PI).abs() < 1e-9);

        let gaps = brep.uv_gaps(lp);
        assert!(gaps.iter().all(|g| *g < 1e-9), "{gaps:?}");
    }

    #[test]
    fn test_vertex_loop_becomes_degenerate_edge() {
        let data = format!("{SQUARE}\n#77 = OPEN_SHELL('', (#54));");
        let (brep, failures) = emit(&data, 77);
        assert!(failures.is_empty());
        let face = &brep.faces[0];
        assert!(face.reversed);
        assert_eq!(face.loops.len(), 2);
        assert_eq!(brep.loops[face.loops[0].index()].kind, LoopKind::Outer);
        let hole = &brep.loops[face.loops[1].index()];
        assert_eq!(hole.kind, LoopKind::Inner);
        assert_eq!(hole.trims.len(), 1);
        let edge = &brep.edges[brep.trims[hole.trims[0].index()].edge.index()];
        assert!(edge.is_degenerate());
        assert_eq!(edge.start, edge.end);
        // A point at the vertex in parameter space.
        let (start, end) = brep.trim_uv(hole.trims[0]);
        assert!(start.coords.norm() < 1e-9);
        assert!((end - start).norm() < 1e-12);
    }

    #[test]
    fn test_bad_face_is_skipped() {
        let data = format!(
            r#"{SQUARE}
#70 = CIRCLE('', #28, 0.0);
#71 = EDGE_CURVE('', #6, #6, #70, .T.);
#72 = ORIENTED_EDGE('', *, *, #71, .T.);
#73 = EDGE_LOOP('', (#72));
#74 = FACE_OUTER_BOUND('', #73, .T.);
#75 = ADVANCED_FACE('', (#74), #29, .T.);
#76 = OPEN_SHELL('', (#30, #75));"#
        );
        let (brep, failures) = emit(&data, 76);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].face, 75);
        assert_eq!(failures[0].kind, ErrorKind::DegenerateGeometry);
        assert_eq!(brep.faces.len(), 1);
        assert_eq!(brep.shells[0].faces.len(), 1);
    }

    #[test]
    fn test_unsupported_root() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let key = reg.resolve(29).unwrap();
        let mut brep = Brep::new();
        let err = Emitter::new(&reg, &mut brep).emit(key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_wrapped() {
        assert!((wrapped(2.0 * PI - 0.1, 2.0 * PI) + 0.1).abs() < 1e-12);
        assert!((wrapped(0.3, 2.0 * PI) - 0.3).abs() < 1e-12);
    }
}
