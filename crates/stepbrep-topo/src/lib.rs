#![warn(missing_docs)]

//! BREP container for the stepbrep importer.
//!
//! [`BrepSink`] is the interface the importer emits into; [`Brep`] is the
//! in-memory implementation. Entities are appended in dependency order
//! (vertices, curves and surfaces, edges, trims, loops, faces, shells) and
//! referenced by typed indices. Every `add_*` call checks that the indices
//! it receives already exist, so a container built through the sink never
//! holds dangling references.
//!
//! Edges run in the direction of their curve: `start` sits at
//! `range.start` and `end` at `range.end`. A trim uses an edge within one
//! loop, reversed relative to the edge when its `reversed` flag is set,
//! and carries a 2D curve in the face surface's parameter space running in
//! the trim's own direction.

use stepbrep_geom::{Curve2d, Curve3d, GeometryStore, Surface};
use stepbrep_math::{Point2, Point3, Vec2};
use thiserror::Error;

// =============================================================================
// Indices
// =============================================================================

macro_rules! index_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            /// Position in the owning container.
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

index_type!(
    /// Index of a vertex.
    VertexIndex
);
index_type!(
    /// Index of a 3D curve.
    CurveIndex
);
index_type!(
    /// Index of a 2D trimming curve.
    Curve2dIndex
);
index_type!(
    /// Index of a surface.
    SurfaceIndex
);
index_type!(
    /// Index of an edge.
    EdgeIndex
);
index_type!(
    /// Index of a trim (an edge use within a loop).
    TrimIndex
);
index_type!(
    /// Index of a loop.
    LoopIndex
);
index_type!(
    /// Index of a face.
    FaceIndex
);
index_type!(
    /// Index of a shell.
    ShellIndex
);

// =============================================================================
// Records
// =============================================================================

/// Curve parameter interval of an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Parameter at the edge's start vertex.
    pub start: f64,
    /// Parameter at the edge's end vertex.
    pub end: f64,
}

impl ParamRange {
    /// Create a range.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// How a loop uses an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    /// Curve parameter where the trim starts.
    pub start: f64,
    /// Curve parameter where the trim ends.
    pub end: f64,
    /// The trim runs against the edge direction.
    pub reversed: bool,
    /// For the second use of a seam edge, the shift of its parameter curve
    /// relative to the first use: one period across the seam. Zero
    /// otherwise.
    pub uv_offset: Vec2,
}

impl ParamBounds {
    /// Bounds covering `range`, optionally reversed, with no offset.
    pub fn along(range: ParamRange, reversed: bool) -> Self {
        let (start, end) = if reversed {
            (range.end, range.start)
        } else {
            (range.start, range.end)
        };
        Self {
            start,
            end,
            reversed,
            uv_offset: Vec2::zeros(),
        }
    }
}

/// Role of a loop within its face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// The outer boundary.
    Outer,
    /// A hole.
    Inner,
}

/// An edge: a curve segment between two vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Underlying curve; `None` for a degenerate edge collapsed to a point.
    pub curve: Option<CurveIndex>,
    /// Vertex at `range.start`.
    pub start: VertexIndex,
    /// Vertex at `range.end`.
    pub end: VertexIndex,
    /// Curve interval.
    pub range: ParamRange,
}

impl Edge {
    /// Whether the edge collapses to a single vertex.
    pub fn is_degenerate(&self) -> bool {
        self.curve.is_none()
    }
}

/// What a trim traces in parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimKind {
    /// An ordinary edge use.
    Boundary,
    /// One of the two uses of a seam edge.
    Seam,
    /// A stretch of a collapsed domain side (pole or apex), over a
    /// degenerate edge.
    Singular,
}

/// One use of an edge within a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Trim {
    /// The edge being used.
    pub edge: EdgeIndex,
    /// Direction and parameter bounds of the use.
    pub bounds: ParamBounds,
    /// Curve in surface parameter space, in the trim's direction.
    pub uv_curve: Curve2dIndex,
    /// Boundary, seam or singular.
    pub kind: TrimKind,
}

/// A closed sequence of trims.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    /// Trims in traversal order.
    pub trims: Vec<TrimIndex>,
    /// Outer or inner.
    pub kind: LoopKind,
}

/// A bounded region of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Carrier surface.
    pub surface: SurfaceIndex,
    /// Outer loop first, then holes.
    pub loops: Vec<LoopIndex>,
    /// Face normal is opposite to the surface normal.
    pub reversed: bool,
}

/// A connected set of faces.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    /// Member faces.
    pub faces: Vec<FaceIndex>,
    /// Whether the shell encloses a volume.
    pub closed: bool,
}

/// Errors raised by the container.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopoError {
    /// An index does not refer to an existing element.
    #[error("{kind} index {index} out of range")]
    DanglingIndex {
        /// Element kind.
        kind: &'static str,
        /// Offending index.
        index: usize,
    },

    /// A loop has no trims.
    #[error("loop has no trims")]
    EmptyLoop,

    /// Face loops are not one outer loop followed by inner loops.
    #[error("face needs exactly one outer loop, listed first")]
    BadFaceLoops,

    /// Consecutive trims of a loop do not share a vertex.
    #[error("loop {index} is not closed")]
    OpenLoop {
        /// The loop.
        index: usize,
    },
}

// =============================================================================
// Sink
// =============================================================================

/// Receiver of emitted BREP entities.
pub trait BrepSink {
    /// Add a vertex.
    fn add_vertex(&mut self, point: Point3) -> VertexIndex;

    /// Add a 3D curve.
    fn add_curve(&mut self, curve: Box<dyn Curve3d>) -> CurveIndex;

    /// Add a 2D curve in some surface's parameter space.
    fn add_curve_2d(&mut self, curve: Box<dyn Curve2d>) -> Curve2dIndex;

    /// Add a surface.
    fn add_surface(&mut self, surface: Box<dyn Surface>) -> SurfaceIndex;

    /// Add an edge along `curve` from `start` to `end`.
    fn add_edge_curve(
        &mut self,
        curve: Option<CurveIndex>,
        start: VertexIndex,
        end: VertexIndex,
        range: ParamRange,
    ) -> Result<EdgeIndex, TopoError>;

    /// Add a use of `edge` traced by `uv_curve`.
    fn add_trim(
        &mut self,
        edge: EdgeIndex,
        bounds: ParamBounds,
        uv_curve: Curve2dIndex,
        kind: TrimKind,
    ) -> Result<TrimIndex, TopoError>;

    /// Add a loop from trims in traversal order.
    fn add_loop(&mut self, trims: Vec<TrimIndex>, kind: LoopKind) -> Result<LoopIndex, TopoError>;

    /// Add a face bounded by `loops` (outer first).
    fn add_face(
        &mut self,
        surface: SurfaceIndex,
        loops: Vec<LoopIndex>,
        reversed: bool,
    ) -> Result<FaceIndex, TopoError>;

    /// Add a shell.
    fn add_shell(&mut self, faces: Vec<FaceIndex>, closed: bool) -> Result<ShellIndex, TopoError>;
}

// =============================================================================
// Brep
// =============================================================================

/// Element counts of a [`Brep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrepCounts {
    /// Number of vertices.
    pub vertices: usize,
    /// Number of 3D curves.
    pub curves: usize,
    /// Number of 2D trimming curves.
    pub curves_2d: usize,
    /// Number of surfaces.
    pub surfaces: usize,
    /// Number of edges.
    pub edges: usize,
    /// Number of trims.
    pub trims: usize,
    /// Number of loops.
    pub loops: usize,
    /// Number of faces.
    pub faces: usize,
    /// Number of shells.
    pub shells: usize,
}

/// In-memory boundary representation.
#[derive(Debug, Clone, Default)]
pub struct Brep {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Curves and surfaces.
    pub geometry: GeometryStore,
    /// Edges.
    pub edges: Vec<Edge>,
    /// Edge uses.
    pub trims: Vec<Trim>,
    /// Loops.
    pub loops: Vec<Loop>,
    /// Faces.
    pub faces: Vec<Face>,
    /// Shells.
    pub shells: Vec<Shell>,
}

fn check(kind: &'static str, index: usize, len: usize) -> Result<(), TopoError> {
    if index < len {
        Ok(())
    } else {
        Err(TopoError::DanglingIndex { kind, index })
    }
}

impl Brep {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Element counts.
    pub fn counts(&self) -> BrepCounts {
        BrepCounts {
            vertices: self.vertices.len(),
            curves: self.geometry.curves_3d.len(),
            curves_2d: self.geometry.curves_2d.len(),
            surfaces: self.geometry.surfaces.len(),
            edges: self.edges.len(),
            trims: self.trims.len(),
            loops: self.loops.len(),
            faces: self.faces.len(),
            shells: self.shells.len(),
        }
    }

    /// Vertex a trim starts from, honouring its direction.
    pub fn trim_start(&self, trim: TrimIndex) -> VertexIndex {
        let t = &self.trims[trim.0];
        let e = &self.edges[t.edge.0];
        if t.bounds.reversed {
            e.end
        } else {
            e.start
        }
    }

    /// Vertex a trim ends at, honouring its direction.
    pub fn trim_end(&self, trim: TrimIndex) -> VertexIndex {
        let t = &self.trims[trim.0];
        let e = &self.edges[t.edge.0];
        if t.bounds.reversed {
            e.start
        } else {
            e.end
        }
    }

    /// Start vertices of a loop's trims in traversal order.
    pub fn loop_vertices(&self, lp: LoopIndex) -> Vec<VertexIndex> {
        self.loops[lp.0]
            .trims
            .iter()
            .map(|&t| self.trim_start(t))
            .collect()
    }

    /// Parameter-space end points of a trim.
    pub fn trim_uv(&self, trim: TrimIndex) -> (Point2, Point2) {
        let c = &self.geometry.curves_2d[self.trims[trim.0].uv_curve.0];
        (c.start(), c.end())
    }

    /// Parameter-space distance from the end of each trim of a loop to the
    /// start of the next, wrapping around.
    pub fn uv_gaps(&self, lp: LoopIndex) -> Vec<f64> {
        let trims = &self.loops[lp.0].trims;
        let n = trims.len();
        (0..n)
            .map(|i| {
                let (_, end) = self.trim_uv(trims[i]);
                let (start, _) = self.trim_uv(trims[(i + 1) % n]);
                (start - end).norm()
            })
            .collect()
    }

    /// Check that every loop closes: each trim ends where the next begins.
    pub fn validate(&self) -> Result<(), TopoError> {
        for (index, lp) in self.loops.iter().enumerate() {
            let n = lp.trims.len();
            for i in 0..n {
                let here = self.trim_end(lp.trims[i]);
                let next = self.trim_start(lp.trims[(i + 1) % n]);
                if here != next {
                    return Err(TopoError::OpenLoop { index });
                }
            }
        }
        Ok(())
    }
}

impl BrepSink for Brep {
    fn add_vertex(&mut self, point: Point3) -> VertexIndex {
        self.vertices.push(point);
        VertexIndex(self.vertices.len() - 1)
    }

    fn add_curve(&mut self, curve: Box<dyn Curve3d>) -> CurveIndex {
        CurveIndex(self.geometry.add_curve_3d(curve))
    }

    fn add_curve_2d(&mut self, curve: Box<dyn Curve2d>) -> Curve2dIndex {
        Curve2dIndex(self.geometry.add_curve_2d(curve))
    }

    fn add_surface(&mut self, surface: Box<dyn Surface>) -> SurfaceIndex {
        SurfaceIndex(self.geometry.add_surface(surface))
    }

    fn add_edge_curve(
        &mut self,
        curve: Option<CurveIndex>,
        start: VertexIndex,
        end: VertexIndex,
        range: ParamRange,
    ) -> Result<EdgeIndex, TopoError> {
        if let Some(c) = curve {
            check("curve", c.0, self.geometry.curves_3d.len())?;
        }
        check("vertex", start.0, self.vertices.len())?;
        check("vertex", end.0, self.vertices.len())?;
        self.edges.push(Edge {
            curve,
            start,
            end,
            range,
        });
        Ok(EdgeIndex(self.edges.len() - 1))
    }

    fn add_trim(
        &mut self,
        edge: EdgeIndex,
        bounds: ParamBounds,
        uv_curve: Curve2dIndex,
        kind: TrimKind,
    ) -> Result<TrimIndex, TopoError> {
        check("edge", edge.0, self.edges.len())?;
        check("2d curve", uv_curve.0, self.geometry.curves_2d.len())?;
        self.trims.push(Trim {
            edge,
            bounds,
            uv_curve,
            kind,
        });
        Ok(TrimIndex(self.trims.len() - 1))
    }

    fn add_loop(&mut self, trims: Vec<TrimIndex>, kind: LoopKind) -> Result<LoopIndex, TopoError> {
        if trims.is_empty() {
            return Err(TopoError::EmptyLoop);
        }
        for t in &trims {
            check("trim", t.0, self.trims.len())?;
        }
        self.loops.push(Loop { trims, kind });
        Ok(LoopIndex(self.loops.len() - 1))
    }

    fn add_face(
        &mut self,
        surface: SurfaceIndex,
        loops: Vec<LoopIndex>,
        reversed: bool,
    ) -> Result<FaceIndex, TopoError> {
        check("surface", surface.0, self.geometry.surfaces.len())?;
        for l in &loops {
            check("loop", l.0, self.loops.len())?;
        }
        let kinds: Vec<LoopKind> = loops.iter().map(|l| self.loops[l.0].kind).collect();
        let well_formed = kinds.first() == Some(&LoopKind::Outer)
            && kinds[1..].iter().all(|k| *k == LoopKind::Inner);
        if !well_formed {
            return Err(TopoError::BadFaceLoops);
        }
        self.faces.push(Face {
            surface,
            loops,
            reversed,
        });
        Ok(FaceIndex(self.faces.len() - 1))
    }

    fn add_shell(&mut self, faces: Vec<FaceIndex>, closed: bool) -> Result<ShellIndex, TopoError> {
        for f in &faces {
            check("face", f.0, self.faces.len())?;
        }
        self.shells.push(Shell { faces, closed });
        Ok(ShellIndex(self.shells.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepbrep_geom::{Line2d, Line3d, Plane};
    use stepbrep_math::Frame;

    /// Unit square on the XY plane, loop optionally reversed.
    fn square(reversed: bool) -> (Brep, LoopIndex) {
        let mut b = Brep::new();
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let v: Vec<VertexIndex> = pts.iter().map(|p| b.add_vertex(*p)).collect();
        let mut trims = Vec::new();
        for i in 0..4 {
            let (a, c) = (pts[i], pts[(i + 1) % 4]);
            let curve = b.add_curve(Box::new(Line3d::from_points(a, c)));
            let e = b
                .add_edge_curve(Some(curve), v[i], v[(i + 1) % 4], ParamRange::new(0.0, 1.0))
                .unwrap();
            trims.push((e, a, c));
        }
        if reversed {
            trims.reverse();
        }
        let trims = trims
            .into_iter()
            .map(|(e, a, c)| {
                let (from, to) = if reversed { (c, a) } else { (a, c) };
                let uv = b.add_curve_2d(Box::new(Line2d::from_points(
                    Point2::new(from.x, from.y),
                    Point2::new(to.x, to.y),
                )));
                let bounds = ParamBounds::along(ParamRange::new(0.0, 1.0), reversed);
                b.add_trim(e, bounds, uv, TrimKind::Boundary).unwrap()
            })
            .collect();
        let lp = b.add_loop(trims, LoopKind::Outer).unwrap();
        (b, lp)
    }

    #[test]
    fn test_square_face() {
        let (mut b, lp) = square(false);
        let s = b.add_surface(Box::new(Plane::new(Frame::world())));
        let f = b.add_face(s, vec![lp], false).unwrap();
        b.add_shell(vec![f], false).unwrap();
        b.validate().unwrap();
        let counts = b.counts();
        assert_eq!(counts.vertices, 4);
        assert_eq!(counts.edges, 4);
        assert_eq!(counts.loops, 1);
        assert_eq!(counts.faces, 1);
        assert_eq!(counts.shells, 1);
        assert_eq!(counts.curves_2d, 4);
        let order: Vec<usize> = b.loop_vertices(lp).iter().map(|v| v.0).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(b.uv_gaps(lp).iter().all(|g| *g < 1e-12));
    }

    #[test]
    fn test_reversed_loop_still_closes() {
        let (b, lp) = square(true);
        b.validate().unwrap();
        let order: Vec<usize> = b.loop_vertices(lp).iter().map(|v| v.0).collect();
        assert_eq!(order, vec![0, 3, 2, 1]);
        let t = &b.trims[b.loops[lp.0].trims[0].0].bounds;
        assert!(t.reversed);
        assert!((t.start - 1.0).abs() < 1e-12);
        assert!(b.uv_gaps(lp).iter().all(|g| *g < 1e-12));
        let (start, end) = b.trim_uv(b.loops[lp.0].trims[0]);
        assert!((start - Point2::new(0.0, 0.0)).norm() < 1e-12);
        assert!((end - Point2::new(0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_dangling_indices_rejected() {
        let mut b = Brep::new();
        let v = b.add_vertex(Point3::origin());
        let err = b
            .add_edge_curve(Some(CurveIndex(3)), v, v, ParamRange::new(0.0, 1.0))
            .unwrap_err();
        assert_eq!(
            err,
            TopoError::DanglingIndex {
                kind: "curve",
                index: 3
            }
        );
        assert_eq!(b.add_loop(vec![], LoopKind::Outer).unwrap_err(), TopoError::EmptyLoop);
        let e = b.add_edge_curve(None, v, v, ParamRange::new(0.0, 0.0)).unwrap();
        let bounds = ParamBounds::along(ParamRange::new(0.0, 0.0), false);
        let err = b
            .add_trim(e, bounds, Curve2dIndex(0), TrimKind::Singular)
            .unwrap_err();
        assert_eq!(
            err,
            TopoError::DanglingIndex {
                kind: "2d curve",
                index: 0
            }
        );
    }

    #[test]
    fn test_face_needs_outer_first() {
        let (mut b, lp) = square(false);
        b.loops[lp.0].kind = LoopKind::Inner;
        let s = b.add_surface(Box::new(Plane::new(Frame::world())));
        assert_eq!(b.add_face(s, vec![lp], false).unwrap_err(), TopoError::BadFaceLoops);
    }

    #[test]
    fn test_degenerate_edge() {
        let mut b = Brep::new();
        let v = b.add_vertex(Point3::origin());
        let e = b.add_edge_curve(None, v, v, ParamRange::new(0.0, 0.0)).unwrap();
        assert!(b.edges[e.0].is_degenerate());
        let uv = b.add_curve_2d(Box::new(Line2d::from_points(
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
        )));
        let t = b
            .add_trim(
                e,
                ParamBounds::along(ParamRange::new(0.0, 0.0), false),
                uv,
                TrimKind::Singular,
            )
            .unwrap();
        b.add_loop(vec![t], LoopKind::Outer).unwrap();
        b.validate().unwrap();
    }
}
