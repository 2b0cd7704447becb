//! stepbrep CLI - STEP to BREP converter
//!
//! Converts every top-level shape of a STEP file and reports per-shape
//! results, as text or JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stepbrep_step::{
    read_step, Conversion, ErrorKind, FaceFailure, ReaderOptions, RegistryStats, ShapeOutcome,
};
use stepbrep_topo::BrepCounts;

#[derive(Parser)]
#[command(name = "stepbrep")]
#[command(about = "Convert STEP boundary representations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the shapes of a STEP file and print a summary
    Convert {
        /// Input STEP file (.step or .stp)
        file: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        /// Reader options as a JSON file; flags override its values
        #[arg(long)]
        options: Option<PathBuf>,
        /// Parallelism threshold for placement axes
        #[arg(long)]
        angular_tolerance: Option<f64>,
        /// Distance under which two points coincide
        #[arg(long)]
        linear_tolerance: Option<f64>,
        /// Reference direction used when a placement's ref_direction is
        /// parallel to its axis, as X,Y,Z
        #[arg(long, value_delimiter = ',', num_args = 3)]
        fallback_ref_direction: Option<Vec<f64>>,
        /// Top-level shape type to convert (repeatable)
        #[arg(long = "shape-type")]
        shape_types: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            file,
            json,
            options,
            angular_tolerance,
            linear_tolerance,
            fallback_ref_direction,
            shape_types,
        } => {
            let mut opts = match options {
                Some(path) => load_options(&path)?,
                None => ReaderOptions::default(),
            };
            if let Some(t) = angular_tolerance {
                opts.angular_tolerance = t;
            }
            if let Some(t) = linear_tolerance {
                opts.linear_tolerance = t;
            }
            if let Some([x, y, z]) = fallback_ref_direction.as_deref() {
                opts.fallback_ref_direction = Some([*x, *y, *z]);
            }
            if !shape_types.is_empty() {
                opts.shape_types = Some(shape_types);
            }
            convert(&file, &opts, json)?;
        }
    }

    Ok(())
}

fn load_options(path: &Path) -> Result<ReaderOptions> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading options from {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing options in {}", path.display()))
}

fn convert(file: &Path, options: &ReaderOptions, json: bool) -> Result<()> {
    let conversion =
        read_step(file, options).with_context(|| format!("converting {}", file.display()))?;
    let summary = ConversionSummary::new(file, &conversion);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render());
    }

    if conversion.all_failed() {
        let ids: Vec<String> = summary.shapes.iter().map(|s| format!("#{}", s.root)).collect();
        anyhow::bail!("no shape converted ({})", ids.join(", "));
    }
    Ok(())
}

/// Element counts of a converted shape.
#[derive(Debug, Serialize)]
struct ShapeCounts {
    vertices: usize,
    edges: usize,
    faces: usize,
    shells: usize,
}

impl From<BrepCounts> for ShapeCounts {
    fn from(c: BrepCounts) -> Self {
        Self {
            vertices: c.vertices,
            edges: c.edges,
            faces: c.faces,
            shells: c.shells,
        }
    }
}

/// Error of a failed shape.
#[derive(Debug, Serialize)]
struct ShapeError {
    kind: ErrorKind,
    instance: Option<u64>,
    message: String,
}

#[derive(Debug, Serialize)]
struct ShapeSummary {
    root: u64,
    type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    length_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<ShapeCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ShapeError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped_faces: Vec<FaceFailure>,
}

impl From<&ShapeOutcome> for ShapeSummary {
    fn from(shape: &ShapeOutcome) -> Self {
        let (counts, error) = match &shape.result {
            Ok(brep) => (Some(brep.counts().into()), None),
            Err(e) => (
                None,
                Some(ShapeError {
                    kind: e.kind(),
                    instance: e.instance_id(),
                    message: e.to_string(),
                }),
            ),
        };
        Self {
            root: shape.root,
            type_name: shape.type_name.clone(),
            length_unit: shape.length_unit.clone(),
            counts,
            error,
            skipped_faces: shape.face_failures.clone(),
        }
    }
}

/// Report for one file.
#[derive(Debug, Serialize)]
struct ConversionSummary {
    file: String,
    schema: Vec<String>,
    shapes: Vec<ShapeSummary>,
    stats: RegistryStats,
}

impl ConversionSummary {
    fn new(file: &Path, conversion: &Conversion) -> Self {
        Self {
            file: file.display().to_string(),
            schema: conversion.schema.clone(),
            shapes: conversion.shapes.iter().map(ShapeSummary::from).collect(),
            stats: conversion.stats,
        }
    }

    fn render(&self) -> String {
        let mut out = format!("{} ({})\n", self.file, self.schema.join(", "));
        for shape in &self.shapes {
            out.push_str(&format!("  #{} {}", shape.root, shape.type_name));
            if let Some(c) = &shape.counts {
                out.push_str(&format!(
                    ": {} shells, {} faces, {} edges, {} vertices",
                    c.shells, c.faces, c.edges, c.vertices
                ));
            }
            if let Some(unit) = &shape.length_unit {
                out.push_str(&format!(" [{unit}]"));
            }
            if let Some(e) = &shape.error {
                out.push_str(&format!(": failed: {}", e.message));
            }
            out.push('\n');
            for face in &shape.skipped_faces {
                out.push_str(&format!("    skipped face #{}: {}\n", face.face, face.message));
            }
        }
        out.push_str(&format!(
            "  {} entities loaded, {} cache hits, {} failed loads\n",
            self.stats.loaded, self.stats.cache_hits, self.stats.failed
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepbrep_step::read_step_from_buffer;

    const TRIANGLE: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('CONFIG_CONTROL_DESIGN'));
ENDSEC;
DATA;
#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));
#2 = CARTESIAN_POINT('', (1.0, 0.0, 0.0));
#3 = CARTESIAN_POINT('', (0.0, 1.0, 0.0));
#4 = VERTEX_POINT('', #1);
#5 = VERTEX_POINT('', #2);
#6 = VERTEX_POINT('', #3);
#7 = POLYLINE('', (#1, #2));
#8 = POLYLINE('', (#2, #3));
#9 = POLYLINE('', (#3, #1));
#10 = EDGE_CURVE('', #4, #5, #7, .T.);
#11 = EDGE_CURVE('', #5, #6, #8, .T.);
#12 = EDGE_CURVE('', #6, #4, #9, .T.);
#13 = ORIENTED_EDGE('', *, *, #10, .T.);
#14 = ORIENTED_EDGE('', *, *, #11, .T.);
#15 = ORIENTED_EDGE('', *, *, #12, .T.);
#16 = EDGE_LOOP('', (#13, #14, #15));
#17 = FACE_OUTER_BOUND('', #16, .T.);
#18 = DIRECTION('', (0.0, 0.0, 1.0));
#19 = DIRECTION('', (1.0, 0.0, 0.0));
#20 = AXIS2_PLACEMENT_3D('', #1, #18, #19);
#21 = PLANE('', #20);
#22 = ADVANCED_FACE('', (#17), #21, .T.);
#23 = OPEN_SHELL('', (#22));
#24 = SHELL_BASED_SURFACE_MODEL('', (#23));
#25 = CLOSED_SHELL('', (#26));
#26 = ADVANCED_FACE('', (#17), #27, .T.);
#27 = PLANE('', #28);
#28 = AXIS2_PLACEMENT_3D('', #1, #18, #18);
#29 = MANIFOLD_SOLID_BREP('', #25);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_summary() {
        let conversion =
            read_step_from_buffer(TRIANGLE.as_bytes(), &ReaderOptions::default()).unwrap();
        let summary = ConversionSummary::new(Path::new("triangle.step"), &conversion);
        assert_eq!(summary.shapes.len(), 2);

        let model = &summary.shapes[0];
        assert_eq!(model.root, 24);
        let counts = model.counts.as_ref().unwrap();
        assert_eq!(counts.vertices, 3);
        assert_eq!(counts.edges, 3);
        assert_eq!(counts.faces, 1);

        // The solid's plane has its reference along its axis.
        let solid = &summary.shapes[1];
        assert_eq!(solid.root, 29);
        let error = solid.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::DegenerateGeometry);
        assert_eq!(error.instance, Some(28));

        let text = summary.render();
        assert!(text.starts_with("triangle.step (CONFIG_CONTROL_DESIGN)\n"));
        assert!(text.contains("#24 SHELL_BASED_SURFACE_MODEL: 1 shells, 1 faces, 3 edges, 3 vertices"));
        assert!(text.contains("#29 MANIFOLD_SOLID_BREP: failed:"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["shapes"][1]["error"]["kind"], "degenerate-geometry");
        assert!(json["shapes"][0].get("error").is_none());
    }

    #[test]
    fn test_fallback_reference_recovers_shape() {
        let options = ReaderOptions {
            fallback_ref_direction: Some([1.0, 0.0, 0.0]),
            ..Default::default()
        };
        let conversion = read_step_from_buffer(TRIANGLE.as_bytes(), &options).unwrap();
        assert!(conversion.shapes.iter().all(|s| s.result.is_ok()));
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "stepbrep",
            "convert",
            "part.step",
            "--json",
            "--fallback-ref-direction",
            "1,0,0",
            "--shape-type",
            "MANIFOLD_SOLID_BREP",
            "--shape-type",
            "BREP_WITH_VOIDS",
        ])
        .unwrap();
        let Commands::Convert {
            file,
            json,
            fallback_ref_direction,
            shape_types,
            ..
        } = cli.command;
        assert_eq!(file, PathBuf::from("part.step"));
        assert!(json);
        assert_eq!(fallback_ref_direction, Some(vec![1.0, 0.0, 0.0]));
        assert_eq!(shape_types.len(), 2);
    }
}
