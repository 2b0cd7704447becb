//! STEP file reader: converts parsed STEP data into BREP containers.

use std::path::Path;

use log::{debug, info, warn};
use stepbrep_topo::Brep;

use crate::emit::{Emitter, FaceFailure};
use crate::entities::Entity;
use crate::error::{Result, StepError};
use crate::options::{ReaderOptions, FALLBACK_SHAPE_TYPES, PRIMARY_SHAPE_TYPES};
use crate::parser::{Parser, StepFile};
use crate::query::Instance;
use crate::registry::{EntityId, Registry, RegistryStats};
use crate::schema::Schema;

/// Result of converting one top-level shape.
#[derive(Debug)]
pub struct ShapeOutcome {
    /// File id of the top-level instance.
    pub root: u64,
    /// Its runtime type key.
    pub type_name: String,
    /// The shape, or why it could not be built.
    pub result: Result<Brep>,
    /// Faces left out of the shape.
    pub face_failures: Vec<FaceFailure>,
    /// Length unit named by the representation context, if any.
    pub length_unit: Option<String>,
}

/// Everything read from one file.
#[derive(Debug)]
pub struct Conversion {
    /// Schema names from the header.
    pub schema: Vec<String>,
    /// One outcome per top-level shape, in file id order.
    pub shapes: Vec<ShapeOutcome>,
    /// Registry counters after the last shape.
    pub stats: RegistryStats,
}

impl Conversion {
    /// Whether no shape converted.
    pub fn all_failed(&self) -> bool {
        self.shapes.iter().all(|s| s.result.is_err())
    }

    /// Shapes that converted.
    pub fn breps(&self) -> impl Iterator<Item = &Brep> {
        self.shapes.iter().filter_map(|s| s.result.as_ref().ok())
    }
}

/// Read a STEP file from a path.
///
/// # Arguments
///
/// * `path` - Path to the STEP file
/// * `options` - Tolerances and shape selection
///
/// # Returns
///
/// One outcome per top-level shape. Errors are returned only for problems
/// with the file as a whole.
pub fn read_step(path: impl AsRef<Path>, options: &ReaderOptions) -> Result<Conversion> {
    let data = std::fs::read(path)?;
    read_step_from_buffer(&data, options)
}

/// Read a STEP file from a byte buffer.
pub fn read_step_from_buffer(data: &[u8], options: &ReaderOptions) -> Result<Conversion> {
    options.validate()?;
    let file = Parser::parse(data)?;
    let roots = shape_roots(&file, options);
    if roots.is_empty() {
        return Err(StepError::NoShapes);
    }
    debug!("{} top-level shapes", roots.len());

    let mut reg = Registry::new(&file, options);
    let shapes = roots
        .into_iter()
        .map(|root| convert_shape(&mut reg, root))
        .collect();
    Ok(Conversion {
        schema: file.schema_names().into_iter().map(String::from).collect(),
        shapes,
        stats: reg.stats(),
    })
}

/// Ids of the top-level shapes: the caller's types, else the primary
/// types, else the fallback types.
fn shape_roots(file: &StepFile, options: &ReaderOptions) -> Vec<u64> {
    if let Some(types) = &options.shape_types {
        return ids_of_types(file, types.iter().map(String::as_str));
    }
    let primary = ids_of_types(file, PRIMARY_SHAPE_TYPES.iter().copied());
    if !primary.is_empty() {
        return primary;
    }
    ids_of_types(file, FALLBACK_SHAPE_TYPES.iter().copied())
}

fn ids_of_types<'t>(file: &StepFile, types: impl IntoIterator<Item = &'t str>) -> Vec<u64> {
    let mut ids: Vec<u64> = types.into_iter().flat_map(|t| file.ids_of_type(t)).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn convert_shape(reg: &mut Registry<'_>, root: u64) -> ShapeOutcome {
    let type_name = reg
        .file()
        .get(root)
        .map(|raw| Instance::new(raw, Schema::shared()).type_key())
        .unwrap_or_default();
    let mut length_unit = None;
    let mut face_failures = Vec::new();

    let result = shape_items(reg, root, &mut length_unit).and_then(|items| {
        let mut brep = Brep::new();
        let mut emitter = Emitter::new(reg, &mut brep);
        let emitted = items
            .into_iter()
            .map(|item| emitter.emit(item))
            .collect::<Result<Vec<_>>>();
        face_failures = emitter.finish();
        emitted?;
        if brep.shells.is_empty() {
            return Err(StepError::topology(root, "no faces could be emitted"));
        }
        Ok(brep)
    });

    match &result {
        Ok(brep) => {
            let counts = brep.counts();
            info!(
                "#{root} {type_name}: {} shells, {} faces, {} edges, {} vertices ({} faces skipped)",
                counts.shells,
                counts.faces,
                counts.edges,
                counts.vertices,
                face_failures.len(),
            );
        }
        Err(err) => warn!("#{root} {type_name}: skipped: {err}"),
    }
    ShapeOutcome {
        root,
        type_name,
        result,
        face_failures,
        length_unit,
    }
}

/// Resolve a top-level instance to the solids, surface models and shells
/// it contains.
fn shape_items(
    reg: &mut Registry<'_>,
    root: u64,
    length_unit: &mut Option<String>,
) -> Result<Vec<EntityId>> {
    let key = reg.resolve(root)?;
    let rep = match reg.get(key)? {
        Entity::Solid(_) | Entity::SurfaceModel(_) | Entity::Shell(_) => return Ok(vec![key]),
        Entity::Representation(rep) => rep.clone(),
        other => {
            return Err(StepError::UnsupportedEntity {
                id: root,
                type_name: other.kind_name().to_string(),
            })
        }
    };
    *length_unit = rep.length_unit(reg);

    let mut items = Vec::new();
    for id in rep.items {
        let item = match reg.resolve(id) {
            Ok(item) => item,
            Err(StepError::UnknownType { id: unknown, type_name }) if unknown == id => {
                debug!("#{root}: ignoring item #{id} ({type_name})");
                continue;
            }
            Err(err) => return Err(err),
        };
        match reg.get(item)? {
            Entity::Solid(_) | Entity::SurfaceModel(_) | Entity::Shell(_) => items.push(item),
            other => debug!("#{root}: ignoring item #{id} ({})", other.kind_name()),
        }
    }
    if items.is_empty() {
        return Err(StepError::UnsupportedEntity {
            id: root,
            type_name: rep.type_name,
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_util::{wrap, SQUARE};
    use crate::error::ErrorKind;

    const CUBE: &str = r#"#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));
#2 = CARTESIAN_POINT('', (2.0, 0.0, 0.0));
#3 = CARTESIAN_POINT('', (2.0, 2.0, 0.0));
#4 = CARTESIAN_POINT('', (0.0, 2.0, 0.0));
#5 = CARTESIAN_POINT('', (0.0, 0.0, 2.0));
#6 = CARTESIAN_POINT('', (2.0, 0.0, 2.0));
#7 = CARTESIAN_POINT('', (2.0, 2.0, 2.0));
#8 = CARTESIAN_POINT('', (0.0, 2.0, 2.0));
#11 = VERTEX_POINT('', #1);
#12 = VERTEX_POINT('', #2);
#13 = VERTEX_POINT('', #3);
#14 = VERTEX_POINT('', #4);
#15 = VERTEX_POINT('', #5);
#16 = VERTEX_POINT('', #6);
#17 = VERTEX_POINT('', #7);
#18 = VERTEX_POINT('', #8);
#20 = DIRECTION('', (1.0, 0.0, 0.0));
#21 = DIRECTION('', (0.0, 1.0, 0.0));
#22 = DIRECTION('', (0.0, 0.0, 1.0));
#23 = DIRECTION('', (-1.0, 0.0, 0.0));
#24 = DIRECTION('', (0.0, -1.0, 0.0));
#25 = DIRECTION('', (0.0, 0.0, -1.0));
#26 = VECTOR('', #20, 2.0);
#27 = VECTOR('', #21, 2.0);
#28 = VECTOR('', #22, 2.0);
#30 = LINE('', #1, #26);
#31 = LINE('', #2, #27);
#32 = LINE('', #4, #26);
#33 = LINE('', #1, #27);
#34 = LINE('', #5, #26);
#35 = LINE('', #6, #27);
#36 = LINE('', #8, #26);
#37 = LINE('', #5, #27);
#38 = LINE('', #1, #28);
#39 = LINE('', #2, #28);
#40 = LINE('', #3, #28);
#41 = LINE('', #4, #28);
#50 = EDGE_CURVE('', #11, #12, #30, .T.);
#51 = EDGE_CURVE('', #12, #13, #31, .T.);
#52 = EDGE_CURVE('', #14, #13, #32, .T.);
#53 = EDGE_CURVE('', #11, #14, #33, .T.);
#54 = EDGE_CURVE('', #15, #16, #34, .T.);
#55 = EDGE_CURVE('', #16, #17, #35, .T.);
#56 = EDGE_CURVE('', #18, #17, #36, .T.);
#57 = EDGE_CURVE('', #15, #18, #37, .T.);
#58 = EDGE_CURVE('', #11, #15, #38, .T.);
#59 = EDGE_CURVE('', #12, #16, #39, .T.);
#60 = EDGE_CURVE('', #13, #17, #40, .T.);
#61 = EDGE_CURVE('', #14, #18, #41, .T.);
#70 = ORIENTED_EDGE('', *, *, #53, .T.);
#71 = ORIENTED_EDGE('', *, *, #52, .T.);
#72 = ORIENTED_EDGE('', *, *, #51, .F.);
#73 = ORIENTED_EDGE('', *, *, #50, .F.);
#74 = ORIENTED_EDGE('', *, *, #54, .T.);
#75 = ORIENTED_EDGE('', *, *, #55, .T.);
#76 = ORIENTED_EDGE('', *, *, #56, .F.);
#77 = ORIENTED_EDGE('', *, *, #57, .F.);
#78 = ORIENTED_EDGE('', *, *, #50, .T.);
#79 = ORIENTED_EDGE('', *, *, #59, .T.);
#80 = ORIENTED_EDGE('', *, *, #54, .F.);
#81 = ORIENTED_EDGE('', *, *, #58, .F.);
#82 = ORIENTED_EDGE('', *, *, #52, .F.);
#83 = ORIENTED_EDGE('', *, *, #61, .T.);
#84 = ORIENTED_EDGE('', *, *, #56, .T.);
#85 = ORIENTED_EDGE('', *, *, #60, .F.);
#86 = ORIENTED_EDGE('', *, *, #58, .T.);
#87 = ORIENTED_EDGE('', *, *, #57, .T.);
#88 = ORIENTED_EDGE('', *, *, #61, .F.);
#89 = ORIENTED_EDGE('', *, *, #53, .F.);
#90 = ORIENTED_EDGE('', *, *, #51, .T.);
#91 = ORIENTED_EDGE('', *, *, #60, .T.);
#92 = ORIENTED_EDGE('', *, *, #55, .F.);
#93 = ORIENTED_EDGE('', *, *, #59, .F.);
#100 = EDGE_LOOP('', (#70, #71, #72, #73));
#101 = EDGE_LOOP('', (#74, #75, #76, #77));
#102 = EDGE_LOOP('', (#78, #79, #80, #81));
#103 = EDGE_LOOP('', (#82, #83, #84, #85));
#104 = EDGE_LOOP('', (#86, #87, #88, #89));
#105 = EDGE_LOOP('', (#90, #91, #92, #93));
#110 = FACE_OUTER_BOUND('', #100, .T.);
#111 = FACE_OUTER_BOUND('', #101, .T.);
#112 = FACE_OUTER_BOUND('', #102, .T.);
#113 = FACE_OUTER_BOUND('', #103, .T.);
#114 = FACE_OUTER_BOUND('', #104, .T.);
#115 = FACE_OUTER_BOUND('', #105, .T.);
#120 = AXIS2_PLACEMENT_3D('', #1, #25, #20);
#121 = AXIS2_PLACEMENT_3D('', #5, #22, #20);
#122 = AXIS2_PLACEMENT_3D('', #1, #24, #20);
#123 = AXIS2_PLACEMENT_3D('', #4, #21, #20);
#124 = AXIS2_PLACEMENT_3D('', #1, #23, #21);
#125 = AXIS2_PLACEMENT_3D('', #2, #20, #21);
#130 = PLANE('', #120);
#131 = PLANE('', #121);
#132 = PLANE('', #122);
#133 = PLANE('', #123);
#134 = PLANE('', #124);
#135 = PLANE('', #125);
#140 = ADVANCED_FACE('', (#110), #130, .T.);
#141 = ADVANCED_FACE('', (#111), #131, .T.);
#142 = ADVANCED_FACE('', (#112), #132, .T.);
#143 = ADVANCED_FACE('', (#113), #133, .T.);
#144 = ADVANCED_FACE('', (#114), #134, .T.);
#145 = ADVANCED_FACE('', (#115), #135, .T.);
#150 = CLOSED_SHELL('', (#140, #141, #142, #143, #144, #145));
#151 = MANIFOLD_SOLID_BREP('cube', #150);
#160 = ( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.) );
#161 = ( NAMED_UNIT(*) PLANE_ANGLE_UNIT() SI_UNIT($,.RADIAN.) );
#162 = ( GEOMETRIC_REPRESENTATION_CONTEXT(3) GLOBAL_UNIT_ASSIGNED_CONTEXT((#160, #161)) REPRESENTATION_CONTEXT('', '') );
#170 = ADVANCED_BREP_SHAPE_REPRESENTATION('cube', (#151, #120, #171), #162);
#171 = STYLED_ITEM('', (), #151);"#;

    fn read(data: &str, options: &ReaderOptions) -> Result<Conversion> {
        read_step_from_buffer(wrap(data).as_bytes(), options)
    }

    #[test]
    fn test_read_cube() {
        let conversion = read(CUBE, &ReaderOptions::default()).unwrap();
        assert_eq!(conversion.schema, vec!["AUTOMOTIVE_DESIGN".to_string()]);
        assert_eq!(conversion.shapes.len(), 1);
        assert!(!conversion.all_failed());

        let shape = &conversion.shapes[0];
        assert_eq!(shape.root, 170);
        assert_eq!(shape.type_name, "ADVANCED_BREP_SHAPE_REPRESENTATION");
        assert_eq!(shape.length_unit.as_deref(), Some("millimetre"));
        assert!(shape.face_failures.is_empty());

        let brep = shape.result.as_ref().unwrap();
        let counts = brep.counts();
        assert_eq!(counts.vertices, 8);
        assert_eq!(counts.edges, 12);
        assert_eq!(counts.curves, 12);
        assert_eq!(counts.surfaces, 6);
        assert_eq!(counts.trims, 24);
        assert_eq!(counts.loops, 6);
        assert_eq!(counts.faces, 6);
        assert_eq!(counts.shells, 1);
        assert!(brep.shells[0].closed);
        assert!(brep.validate().is_ok());
        for edge in &brep.edges {
            assert!(edge.range.start.abs() < 1e-9);
            assert!((edge.range.end - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_each_entity_loads_once() {
        let conversion = read(CUBE, &ReaderOptions::default()).unwrap();
        // Every instance except the styled item, which has no loader.
        assert_eq!(conversion.stats.loaded, 109);
        assert_eq!(conversion.stats.failed, 0);
        assert!(conversion.stats.cache_hits > 0);
    }

    #[test]
    fn test_no_shapes() {
        let result = read("#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));", &ReaderOptions::default());
        assert!(matches!(result, Err(StepError::NoShapes)));
    }

    #[test]
    fn test_invalid_options() {
        let options = ReaderOptions {
            linear_tolerance: -1.0,
            ..Default::default()
        };
        let err = read(CUBE, &options).unwrap_err();
        assert!(matches!(err, StepError::InvalidOptions(_)));
    }

    #[test]
    fn test_fallback_shape_types() {
        let conversion = read(SQUARE, &ReaderOptions::default()).unwrap();
        let roots: Vec<u64> = conversion.shapes.iter().map(|s| s.root).collect();
        assert_eq!(roots, vec![58, 59, 60]);
        assert!(conversion.shapes.iter().all(|s| s.result.is_ok()));
        assert!(conversion.shapes.iter().all(|s| s.length_unit.is_none()));

        // Outer shell plus the reversed void.
        let with_voids = conversion.shapes[1].result.as_ref().unwrap();
        assert_eq!(with_voids.shells.len(), 2);
        assert_eq!(with_voids.faces.len(), 4);
        assert!(with_voids.faces[2].reversed);
        assert!(!with_voids.faces[3].reversed);

        let model = conversion.shapes[2].result.as_ref().unwrap();
        assert!(!model.shells[0].closed);
    }

    #[test]
    fn test_shape_type_override() {
        let options = ReaderOptions {
            shape_types: Some(vec!["SHELL_BASED_SURFACE_MODEL".into()]),
            ..Default::default()
        };
        let conversion = read(SQUARE, &options).unwrap();
        assert_eq!(conversion.shapes.len(), 1);
        assert_eq!(conversion.shapes[0].root, 60);
    }

    #[test]
    fn test_failed_shape_does_not_stop_others() {
        let data = format!(
            r#"{SQUARE}
#80 = FACE_OUTER_BOUND('', #31, .T.);
#81 = ADVANCED_FACE('', (#80), #29, .T.);
#82 = CLOSED_SHELL('', (#81));
#83 = MANIFOLD_SOLID_BREP('', #82);"#
        );
        let options = ReaderOptions {
            shape_types: Some(vec!["MANIFOLD_SOLID_BREP".into()]),
            ..Default::default()
        };
        let conversion = read(&data, &options).unwrap();
        assert_eq!(conversion.shapes.len(), 2);
        assert!(!conversion.all_failed());
        assert!(conversion.shapes[0].result.is_ok());

        let failed = &conversion.shapes[1];
        assert_eq!(failed.root, 83);
        let err = failed.result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        assert_eq!(err.instance_id(), Some(31));
        assert_eq!(conversion.breps().count(), 1);
        assert!(conversion.stats.failed >= 4);
    }

    #[test]
    fn test_all_failed() {
        let data = format!(
            r#"{SQUARE}
#80 = FACE_OUTER_BOUND('', #31, .T.);
#81 = ADVANCED_FACE('', (#80), #29, .T.);
#82 = CLOSED_SHELL('', (#81));
#83 = MANIFOLD_SOLID_BREP('', #82);"#
        );
        let options = ReaderOptions {
            shape_types: Some(vec!["MANIFOLD_SOLID_BREP".into()]),
            ..Default::default()
        };
        let mut conversion = read(&data, &options).unwrap();
        conversion.shapes.remove(0);
        assert!(conversion.all_failed());
    }

    #[test]
    fn test_representation_without_solids() {
        let data = format!("{SQUARE}\n#90 = SHAPE_REPRESENTATION('', (#28), $);");
        let options = ReaderOptions {
            shape_types: Some(vec!["SHAPE_REPRESENTATION".into()]),
            ..Default::default()
        };
        let conversion = read(&data, &options).unwrap();
        let err = conversion.shapes[0].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(conversion.all_failed());
    }

    #[test]
    fn test_missing_file() {
        let err = read_step("/nonexistent/part.step", &ReaderOptions::default()).unwrap_err();
        assert!(matches!(err, StepError::Io(_)));
    }
}
