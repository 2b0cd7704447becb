//! Surface entities.

use stepbrep_geom::{
    ConeSurface, CylinderSurface, ExtrusionSurface, GeomError, KnotSpec, NurbsSurface, Plane,
    RevolutionSurface, SphereSurface, Surface as GeomSurface, TorusSurface,
};
use stepbrep_math::{Dir3, Frame, Point3, Vec3};

use super::curves::{build_curve, count, multiplicities, points_at};
use super::{Entity, RepresentationItem};
use crate::error::{Result, StepError};
use crate::query::{Instance, Logical};
use crate::registry::{EntityId, Registry};

/// Control data of a B-spline surface, rational or not.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineSurfaceData {
    /// Degree in u.
    pub u_degree: usize,
    /// Degree in v.
    pub v_degree: usize,
    /// Control grid indexed `[u][v]`.
    pub control_points: Vec<Vec<Point3>>,
    /// Knot declaration in u.
    pub knots_u: KnotSpec,
    /// Knot declaration in v.
    pub knots_v: KnotSpec,
    /// Weights of a rational surface, same layout as the grid.
    pub weights: Option<Vec<Vec<f64>>>,
    /// `u_closed` flag.
    pub u_closed: bool,
    /// `v_closed` flag.
    pub v_closed: bool,
}

impl BSplineSurfaceData {
    fn build(&self) -> std::result::Result<NurbsSurface, GeomError> {
        let n_u = self.control_points.len();
        let n_v = self.control_points.first().map_or(0, Vec::len);
        let knots_u = self.knots_u.knot_vector(n_u, self.u_degree)?;
        let knots_v = self.knots_v.knot_vector(n_v, self.v_degree)?;
        Ok(NurbsSurface::new(
            self.control_points.clone(),
            self.weights.clone(),
            knots_u,
            knots_v,
            self.u_degree,
            self.v_degree,
        )?
        .with_closure(self.u_closed, self.v_closed))
    }
}

/// Geometry of a [`Surface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceGeometry {
    /// `PLANE`
    Plane {
        /// Placement frame.
        frame: Frame,
    },
    /// `CYLINDRICAL_SURFACE`
    Cylinder {
        /// Placement frame.
        frame: Frame,
        /// Radius.
        radius: f64,
    },
    /// `CONICAL_SURFACE`
    Cone {
        /// Placement frame.
        frame: Frame,
        /// Radius at the placement origin.
        radius: f64,
        /// Half-angle, in radians.
        semi_angle: f64,
    },
    /// `SPHERICAL_SURFACE`
    Sphere {
        /// Placement frame.
        frame: Frame,
        /// Radius.
        radius: f64,
    },
    /// `TOROIDAL_SURFACE`
    Torus {
        /// Placement frame.
        frame: Frame,
        /// Distance from the axis to the tube centre.
        major_radius: f64,
        /// Tube radius.
        minor_radius: f64,
    },
    /// Any B-spline surface form.
    BSpline(BSplineSurfaceData),
    /// `SURFACE_OF_LINEAR_EXTRUSION`
    Extrusion {
        /// Profile curve.
        swept_curve: EntityId,
        /// Sweep vector, scaled by its magnitude.
        extrusion: Vec3,
    },
    /// `SURFACE_OF_REVOLUTION`
    Revolution {
        /// Profile curve.
        swept_curve: EntityId,
        /// Point on the axis.
        axis_origin: Point3,
        /// Unit axis direction.
        axis: Vec3,
    },
}

/// Any supported surface entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// Name facet.
    pub item: RepresentationItem,
    /// Geometry.
    pub geometry: SurfaceGeometry,
}

impl Surface {
    /// Build the primitive.
    pub fn build(&self, reg: &Registry<'_>, id: u64) -> Result<Box<dyn GeomSurface>> {
        let geom = |source| StepError::Geometry { id, source };
        let surface: Box<dyn GeomSurface> = match &self.geometry {
            SurfaceGeometry::Plane { frame } => Box::new(Plane::new(*frame)),
            SurfaceGeometry::Cylinder { frame, radius } => {
                Box::new(CylinderSurface::new(*frame, *radius).map_err(geom)?)
            }
            SurfaceGeometry::Cone {
                frame,
                radius,
                semi_angle,
            } => Box::new(ConeSurface::new(*frame, *radius, *semi_angle).map_err(geom)?),
            SurfaceGeometry::Sphere { frame, radius } => {
                Box::new(SphereSurface::new(*frame, *radius).map_err(geom)?)
            }
            SurfaceGeometry::Torus {
                frame,
                major_radius,
                minor_radius,
            } => Box::new(TorusSurface::new(*frame, *major_radius, *minor_radius).map_err(geom)?),
            SurfaceGeometry::BSpline(data) => Box::new(data.build().map_err(geom)?),
            SurfaceGeometry::Extrusion {
                swept_curve,
                extrusion,
            } => Box::new(ExtrusionSurface {
                swept_curve: build_curve(reg, *swept_curve, id)?,
                extrusion: *extrusion,
            }),
            SurfaceGeometry::Revolution {
                swept_curve,
                axis_origin,
                axis,
            } => Box::new(RevolutionSurface {
                swept_curve: build_curve(reg, *swept_curve, id)?,
                axis_origin: *axis_origin,
                axis: Dir3::try_new(*axis, f64::EPSILON)
                    .ok_or_else(|| StepError::geometry(id, "revolution axis has zero length"))?,
            }),
        };
        Ok(surface)
    }
}

/// Build the surface behind `key`.
pub(crate) fn build_surface(reg: &Registry<'_>, key: EntityId, owner: u64) -> Result<Box<dyn GeomSurface>> {
    let surface = reg.fetch(key, "SURFACE", Entity::as_surface)?;
    surface.build(reg, reg.file_id(key).unwrap_or(owner))
}

fn surface_entity(inst: &Instance<'_>, geometry: SurfaceGeometry) -> Result<Entity> {
    Ok(Entity::Surface(Surface {
        item: RepresentationItem::load(inst)?,
        geometry,
    }))
}

pub(crate) fn load_elementary_surface(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let frame = reg.frame_at(inst.narrow("ELEMENTARY_SURFACE")?.entity("position")?)?;
    let geometry = if inst.is_a("CYLINDRICAL_SURFACE") {
        SurfaceGeometry::Cylinder {
            frame,
            radius: inst.narrow("CYLINDRICAL_SURFACE")?.real("radius")?,
        }
    } else if inst.is_a("CONICAL_SURFACE") {
        let attrs = inst.narrow("CONICAL_SURFACE")?;
        SurfaceGeometry::Cone {
            frame,
            radius: attrs.real("radius")?,
            semi_angle: attrs.real("semi_angle")?,
        }
    } else if inst.is_a("SPHERICAL_SURFACE") {
        SurfaceGeometry::Sphere {
            frame,
            radius: inst.narrow("SPHERICAL_SURFACE")?.real("radius")?,
        }
    } else if inst.is_a("TOROIDAL_SURFACE") {
        let attrs = inst.narrow("TOROIDAL_SURFACE")?;
        SurfaceGeometry::Torus {
            frame,
            major_radius: attrs.real("major_radius")?,
            minor_radius: attrs.real("minor_radius")?,
        }
    } else {
        SurfaceGeometry::Plane { frame }
    };
    surface_entity(&inst, geometry)
}

fn surface_knots(inst: &Instance<'_>) -> Result<(KnotSpec, KnotSpec)> {
    if inst.is_a("B_SPLINE_SURFACE_WITH_KNOTS") {
        let attrs = inst.narrow("B_SPLINE_SURFACE_WITH_KNOTS")?;
        Ok((
            KnotSpec::Explicit {
                multiplicities: multiplicities(&attrs, "u_multiplicities")?,
                knots: attrs.real_list("u_knots")?,
            },
            KnotSpec::Explicit {
                multiplicities: multiplicities(&attrs, "v_multiplicities")?,
                knots: attrs.real_list("v_knots")?,
            },
        ))
    } else if inst.is_a("BEZIER_SURFACE") {
        Ok((KnotSpec::Bezier, KnotSpec::Bezier))
    } else if inst.is_a("UNIFORM_SURFACE") {
        Ok((KnotSpec::Uniform, KnotSpec::Uniform))
    } else {
        Ok((KnotSpec::QuasiUniform, KnotSpec::QuasiUniform))
    }
}

pub(crate) fn load_b_spline_surface(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("B_SPLINE_SURFACE")?;
    let u_degree = count(&attrs, "u_degree", attrs.integer("u_degree")?)?;
    let v_degree = count(&attrs, "v_degree", attrs.integer("v_degree")?)?;
    let control_points = attrs
        .entity_grid("control_points_list")?
        .iter()
        .map(|row| points_at(reg, row))
        .collect::<Result<Vec<_>>>()?;
    let weights = if inst.is_a("RATIONAL_B_SPLINE_SURFACE") {
        Some(inst.narrow("RATIONAL_B_SPLINE_SURFACE")?.real_grid("weights_data")?)
    } else {
        None
    };
    let (knots_u, knots_v) = surface_knots(&inst)?;
    let data = BSplineSurfaceData {
        u_degree,
        v_degree,
        control_points,
        knots_u,
        knots_v,
        weights,
        u_closed: attrs.logical("u_closed")? == Logical::True,
        v_closed: attrs.logical("v_closed")? == Logical::True,
    };
    surface_entity(&inst, SurfaceGeometry::BSpline(data))
}

fn swept_curve(reg: &mut Registry<'_>, inst: &Instance<'_>) -> Result<EntityId> {
    let (key, _) = reg.resolve_as(
        inst.narrow("SWEPT_SURFACE")?.entity("swept_curve")?,
        "CURVE",
        Entity::as_curve,
    )?;
    Ok(key)
}

pub(crate) fn load_linear_extrusion(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let swept_curve = swept_curve(reg, &inst)?;
    let vector = inst.narrow("SURFACE_OF_LINEAR_EXTRUSION")?.entity("extrusion_axis")?;
    let (_, vector) = reg.resolve_as(vector, "VECTOR", Entity::as_vector)?;
    let extrusion = vector.scaled();
    surface_entity(
        &inst,
        SurfaceGeometry::Extrusion {
            swept_curve,
            extrusion,
        },
    )
}

pub(crate) fn load_revolution(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let swept_curve = swept_curve(reg, &inst)?;
    let axis = inst.narrow("SURFACE_OF_REVOLUTION")?.entity("axis_position")?;
    let frame = reg.frame_at(axis)?;
    surface_entity(
        &inst,
        SurfaceGeometry::Revolution {
            swept_curve,
            axis_origin: frame.origin(),
            axis: frame.normal().into_inner(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::entities::test_util::parse;
    use crate::options::ReaderOptions;
    use stepbrep_math::Point2;

    const SURFACES: &str = r#"#1 = CARTESIAN_POINT('', (0.0, 0.0, 1.0));
#2 = DIRECTION('', (0.0, 0.0, 1.0));
#3 = DIRECTION('', (1.0, 0.0, 0.0));
#4 = AXIS2_PLACEMENT_3D('', #1, #2, #3);
#5 = PLANE('', #4);
#6 = CYLINDRICAL_SURFACE('', #4, 3.0);
#7 = CONICAL_SURFACE('', #4, 1.0, 0.7853981633974483);
#8 = SPHERICAL_SURFACE('', #4, 2.0);
#9 = TOROIDAL_SURFACE('', #4, 5.0, 1.0);
#10 = CYLINDRICAL_SURFACE('', #4, -1.0);
#11 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));
#12 = CARTESIAN_POINT('', (1.0, 0.0, 0.0));
#13 = CARTESIAN_POINT('', (0.0, 1.0, 0.0));
#14 = CARTESIAN_POINT('', (1.0, 1.0, 1.0));
#15 = B_SPLINE_SURFACE_WITH_KNOTS('', 1, 1, ((#11, #13), (#12, #14)), .UNSPECIFIED., .F., .F., .F., (2), (2), (0.0), (1.0), .UNSPECIFIED.);
#16 = B_SPLINE_SURFACE_WITH_KNOTS('', 1, 1, ((#11, #13), (#12, #14)), .UNSPECIFIED., .F., .F., .F., (2, 2), (2, 2), (0.0, 1.0), (0.0, 1.0), .UNSPECIFIED.);
#17 = VECTOR('', #3, 1.0);
#18 = LINE('', #11, #17);
#19 = VECTOR('', #2, 4.0);
#20 = SURFACE_OF_LINEAR_EXTRUSION('', #18, #19);
#21 = CARTESIAN_POINT('', (2.0, 0.0, 0.0));
#22 = VECTOR('', #2, 1.0);
#23 = LINE('', #21, #22);
#24 = AXIS1_PLACEMENT('', #11, #2);
#25 = SURFACE_OF_REVOLUTION('', #23, #24);
#26 = ( BOUNDED_SURFACE() B_SPLINE_SURFACE(1, 1, ((#11, #13), (#12, #14)), .UNSPECIFIED., .F., .F., .F.) B_SPLINE_SURFACE_WITH_KNOTS((2, 2), (2, 2), (0.0, 1.0), (0.0, 1.0), .UNSPECIFIED.) GEOMETRIC_REPRESENTATION_ITEM() RATIONAL_B_SPLINE_SURFACE(((1.0, 1.0), (1.0, 1.0))) REPRESENTATION_ITEM('') SURFACE() );"#;

    fn built(reg: &mut Registry<'_>, id: u64) -> Result<Box<dyn GeomSurface>> {
        let key = reg.resolve(id)?;
        build_surface(reg, key, id)
    }

    #[test]
    fn test_elementary_surfaces() {
        let file = parse(SURFACES);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);

        let plane = built(&mut reg, 5).unwrap();
        assert!((plane.evaluate(Point2::new(1.0, 2.0)) - Point3::new(1.0, 2.0, 1.0)).norm() < 1e-12);

        let cylinder = built(&mut reg, 6).unwrap();
        assert!((cylinder.evaluate(Point2::new(0.0, 1.0)) - Point3::new(3.0, 0.0, 2.0)).norm() < 1e-12);
        assert_eq!(cylinder.periods().0.map(|p| (p - std::f64::consts::TAU).abs() < 1e-12), Some(true));

        let cone = built(&mut reg, 7).unwrap();
        assert!((cone.evaluate(Point2::new(0.0, 0.0)) - Point3::new(1.0, 0.0, 1.0)).norm() < 1e-12);

        let sphere = built(&mut reg, 8).unwrap();
        let p = sphere.evaluate(Point2::new(0.3, 0.2));
        assert!(((p - Point3::new(0.0, 0.0, 1.0)).norm() - 2.0).abs() < 1e-12);

        let torus = built(&mut reg, 9).unwrap();
        assert!((torus.evaluate(Point2::new(0.0, 0.0)) - Point3::new(6.0, 0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_negative_radius_fails_on_build() {
        let file = parse(SURFACES);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        assert!(reg.resolve(10).is_ok());
        let err = built(&mut reg, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);
        assert_eq!(err.instance_id(), Some(10));
    }

    #[test]
    fn test_b_spline_surfaces() {
        let file = parse(SURFACES);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);

        // Knot values and multiplicities must pair up.
        let err = built(&mut reg, 15).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);

        let patch = built(&mut reg, 16).unwrap();
        assert!((patch.evaluate(Point2::new(1.0, 0.0)) - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((patch.evaluate(Point2::new(0.0, 1.0)) - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((patch.evaluate(Point2::new(1.0, 1.0)) - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);

        let rational = built(&mut reg, 26).unwrap();
        let mid = rational.evaluate(Point2::new(0.5, 0.5));
        assert!((mid - patch.evaluate(Point2::new(0.5, 0.5))).norm() < 1e-12);
    }

    #[test]
    fn test_swept_surfaces() {
        let file = parse(SURFACES);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);

        let extrusion = built(&mut reg, 20).unwrap();
        assert!((extrusion.evaluate(Point2::new(1.0, 0.5)) - Point3::new(1.0, 0.0, 2.0)).norm() < 1e-12);

        let revolution = built(&mut reg, 25).unwrap();
        let p = revolution.evaluate(Point2::new(std::f64::consts::FRAC_PI_2, 3.0));
        assert!((p - Point3::new(0.0, 2.0, 3.0)).norm() < 1e-12);
    }
}
