//! A slice of the AP203/AP214/AP242 EXPRESS schema.
//!
//! Only what attribute access needs: each entity's direct supertypes and
//! the names of the attributes it declares itself. The flattened layout of
//! a simple instance is derived from this table.

use std::collections::HashMap;
use std::sync::OnceLock;

/// One EXPRESS entity declaration.
#[derive(Debug)]
pub struct EntityDef {
    /// Upper-case entity name.
    pub name: &'static str,
    /// Direct supertypes, in declaration order.
    pub supertypes: &'static [&'static str],
    /// Explicit attributes declared by this entity.
    pub attributes: &'static [&'static str],
}

macro_rules! entity {
    ($name:literal : [$($sup:literal),*] ($($attr:literal),*)) => {
        EntityDef {
            name: $name,
            supertypes: &[$($sup),*],
            attributes: &[$($attr),*],
        }
    };
}

static DEFINITIONS: &[EntityDef] = &[
    entity!("REPRESENTATION_ITEM": [] ("name")),
    entity!("GEOMETRIC_REPRESENTATION_ITEM": ["REPRESENTATION_ITEM"] ()),
    entity!("TOPOLOGICAL_REPRESENTATION_ITEM": ["REPRESENTATION_ITEM"] ()),
    // Points and placements
    entity!("POINT": ["GEOMETRIC_REPRESENTATION_ITEM"] ()),
    entity!("CARTESIAN_POINT": ["POINT"] ("coordinates")),
    entity!("DIRECTION": ["GEOMETRIC_REPRESENTATION_ITEM"] ("direction_ratios")),
    entity!("VECTOR": ["GEOMETRIC_REPRESENTATION_ITEM"] ("orientation", "magnitude")),
    entity!("PLACEMENT": ["GEOMETRIC_REPRESENTATION_ITEM"] ("location")),
    entity!("AXIS1_PLACEMENT": ["PLACEMENT"] ("axis")),
    entity!("AXIS2_PLACEMENT_2D": ["PLACEMENT"] ("ref_direction")),
    entity!("AXIS2_PLACEMENT_3D": ["PLACEMENT"] ("axis", "ref_direction")),
    // Curves
    entity!("CURVE": ["GEOMETRIC_REPRESENTATION_ITEM"] ()),
    entity!("LINE": ["CURVE"] ("pnt", "dir")),
    entity!("CONIC": ["CURVE"] ("position")),
    entity!("CIRCLE": ["CONIC"] ("radius")),
    entity!("ELLIPSE": ["CONIC"] ("semi_axis_1", "semi_axis_2")),
    entity!("HYPERBOLA": ["CONIC"] ("semi_axis", "semi_imag_axis")),
    entity!("PARABOLA": ["CONIC"] ("focal_dist")),
    entity!("BOUNDED_CURVE": ["CURVE"] ()),
    entity!("POLYLINE": ["BOUNDED_CURVE"] ("points")),
    entity!("B_SPLINE_CURVE": ["BOUNDED_CURVE"] (
        "degree", "control_points_list", "curve_form", "closed_curve", "self_intersect"
    )),
    entity!("B_SPLINE_CURVE_WITH_KNOTS": ["B_SPLINE_CURVE"] ("knot_multiplicities", "knots", "knot_spec")),
    entity!("BEZIER_CURVE": ["B_SPLINE_CURVE"] ()),
    entity!("UNIFORM_CURVE": ["B_SPLINE_CURVE"] ()),
    entity!("QUASI_UNIFORM_CURVE": ["B_SPLINE_CURVE"] ()),
    entity!("RATIONAL_B_SPLINE_CURVE": ["B_SPLINE_CURVE"] ("weights_data")),
    entity!("TRIMMED_CURVE": ["BOUNDED_CURVE"] (
        "basis_curve", "trim_1", "trim_2", "sense_agreement", "master_representation"
    )),
    entity!("SURFACE_CURVE": ["CURVE"] ("curve_3d", "associated_geometry", "master_representation")),
    entity!("SEAM_CURVE": ["SURFACE_CURVE"] ()),
    entity!("PCURVE": ["CURVE"] ("basis_surface", "reference_to_curve")),
    // Surfaces
    entity!("SURFACE": ["GEOMETRIC_REPRESENTATION_ITEM"] ()),
    entity!("ELEMENTARY_SURFACE": ["SURFACE"] ("position")),
    entity!("PLANE": ["ELEMENTARY_SURFACE"] ()),
    entity!("CYLINDRICAL_SURFACE": ["ELEMENTARY_SURFACE"] ("radius")),
    entity!("CONICAL_SURFACE": ["ELEMENTARY_SURFACE"] ("radius", "semi_angle")),
    entity!("SPHERICAL_SURFACE": ["ELEMENTARY_SURFACE"] ("radius")),
    entity!("TOROIDAL_SURFACE": ["ELEMENTARY_SURFACE"] ("major_radius", "minor_radius")),
    entity!("BOUNDED_SURFACE": ["SURFACE"] ()),
    entity!("B_SPLINE_SURFACE": ["BOUNDED_SURFACE"] (
        "u_degree", "v_degree", "control_points_list", "surface_form", "u_closed", "v_closed",
        "self_intersect"
    )),
    entity!("B_SPLINE_SURFACE_WITH_KNOTS": ["B_SPLINE_SURFACE"] (
        "u_multiplicities", "v_multiplicities", "u_knots", "v_knots", "knot_spec"
    )),
    entity!("BEZIER_SURFACE": ["B_SPLINE_SURFACE"] ()),
    entity!("UNIFORM_SURFACE": ["B_SPLINE_SURFACE"] ()),
    entity!("QUASI_UNIFORM_SURFACE": ["B_SPLINE_SURFACE"] ()),
    entity!("RATIONAL_B_SPLINE_SURFACE": ["B_SPLINE_SURFACE"] ("weights_data")),
    entity!("SWEPT_SURFACE": ["SURFACE"] ("swept_curve")),
    entity!("SURFACE_OF_LINEAR_EXTRUSION": ["SWEPT_SURFACE"] ("extrusion_axis")),
    entity!("SURFACE_OF_REVOLUTION": ["SWEPT_SURFACE"] ("axis_position")),
    // Topology
    entity!("VERTEX": ["TOPOLOGICAL_REPRESENTATION_ITEM"] ()),
    entity!("VERTEX_POINT": ["VERTEX", "GEOMETRIC_REPRESENTATION_ITEM"] ("vertex_geometry")),
    entity!("EDGE": ["TOPOLOGICAL_REPRESENTATION_ITEM"] ("edge_start", "edge_end")),
    entity!("EDGE_CURVE": ["EDGE", "GEOMETRIC_REPRESENTATION_ITEM"] ("edge_geometry", "same_sense")),
    entity!("ORIENTED_EDGE": ["EDGE"] ("edge_element", "orientation")),
    entity!("LOOP": ["TOPOLOGICAL_REPRESENTATION_ITEM"] ()),
    entity!("PATH": ["TOPOLOGICAL_REPRESENTATION_ITEM"] ("edge_list")),
    entity!("EDGE_LOOP": ["LOOP", "PATH"] ()),
    entity!("VERTEX_LOOP": ["LOOP"] ("loop_vertex")),
    entity!("FACE_BOUND": ["TOPOLOGICAL_REPRESENTATION_ITEM"] ("bound", "orientation")),
    entity!("FACE_OUTER_BOUND": ["FACE_BOUND"] ()),
    entity!("FACE": ["TOPOLOGICAL_REPRESENTATION_ITEM"] ("bounds")),
    entity!("FACE_SURFACE": ["FACE", "GEOMETRIC_REPRESENTATION_ITEM"] ("face_geometry", "same_sense")),
    entity!("ADVANCED_FACE": ["FACE_SURFACE"] ()),
    entity!("ORIENTED_FACE": ["FACE"] ("face_element", "orientation")),
    entity!("CONNECTED_FACE_SET": ["TOPOLOGICAL_REPRESENTATION_ITEM"] ("cfs_faces")),
    entity!("OPEN_SHELL": ["CONNECTED_FACE_SET"] ()),
    entity!("CLOSED_SHELL": ["CONNECTED_FACE_SET"] ()),
    entity!("ORIENTED_CLOSED_SHELL": ["CLOSED_SHELL"] ("closed_shell_element", "orientation")),
    entity!("SOLID_MODEL": ["GEOMETRIC_REPRESENTATION_ITEM"] ()),
    entity!("MANIFOLD_SOLID_BREP": ["SOLID_MODEL"] ("outer")),
    entity!("BREP_WITH_VOIDS": ["MANIFOLD_SOLID_BREP"] ("voids")),
    entity!("SHELL_BASED_SURFACE_MODEL": ["GEOMETRIC_REPRESENTATION_ITEM"] ("sbsm_boundary")),
    // Representations
    entity!("REPRESENTATION": [] ("name", "items", "context_of_items")),
    entity!("SHAPE_REPRESENTATION": ["REPRESENTATION"] ()),
    entity!("ADVANCED_BREP_SHAPE_REPRESENTATION": ["SHAPE_REPRESENTATION"] ()),
    entity!("MANIFOLD_SURFACE_SHAPE_REPRESENTATION": ["SHAPE_REPRESENTATION"] ()),
    entity!("DEFINITIONAL_REPRESENTATION": ["REPRESENTATION"] ()),
    // Contexts
    entity!("REPRESENTATION_CONTEXT": [] ("context_identifier", "context_type")),
    entity!("GEOMETRIC_REPRESENTATION_CONTEXT": ["REPRESENTATION_CONTEXT"] ("coordinate_space_dimension")),
    entity!("PARAMETRIC_REPRESENTATION_CONTEXT": ["REPRESENTATION_CONTEXT"] ()),
    entity!("GLOBAL_UNIT_ASSIGNED_CONTEXT": ["REPRESENTATION_CONTEXT"] ("units")),
    entity!("GLOBAL_UNCERTAINTY_ASSIGNED_CONTEXT": ["REPRESENTATION_CONTEXT"] ("uncertainty")),
    // Units and measures
    entity!("DIMENSIONAL_EXPONENTS": [] (
        "length_exponent", "mass_exponent", "time_exponent", "electric_current_exponent",
        "thermodynamic_temperature_exponent", "amount_of_substance_exponent",
        "luminous_intensity_exponent"
    )),
    entity!("NAMED_UNIT": [] ("dimensions")),
    entity!("SI_UNIT": ["NAMED_UNIT"] ("prefix", "name")),
    entity!("LENGTH_UNIT": ["NAMED_UNIT"] ()),
    entity!("MASS_UNIT": ["NAMED_UNIT"] ()),
    entity!("PLANE_ANGLE_UNIT": ["NAMED_UNIT"] ()),
    entity!("SOLID_ANGLE_UNIT": ["NAMED_UNIT"] ()),
    entity!("CONVERSION_BASED_UNIT": ["NAMED_UNIT"] ("name", "conversion_factor")),
    entity!("MEASURE_WITH_UNIT": [] ("value_component", "unit_component")),
    entity!("LENGTH_MEASURE_WITH_UNIT": ["MEASURE_WITH_UNIT"] ()),
    entity!("PLANE_ANGLE_MEASURE_WITH_UNIT": ["MEASURE_WITH_UNIT"] ()),
    entity!("UNCERTAINTY_MEASURE_WITH_UNIT": ["MEASURE_WITH_UNIT"] ("name", "description")),
];

/// Lookup table over the entity declarations.
#[derive(Debug)]
pub struct Schema {
    defs: HashMap<&'static str, &'static EntityDef>,
}

impl Schema {
    /// The built-in schema slice.
    pub fn standard() -> Self {
        Self {
            defs: DEFINITIONS.iter().map(|d| (d.name, d)).collect(),
        }
    }

    /// Process-wide instance of [`Schema::standard`].
    pub fn shared() -> &'static Schema {
        static SHARED: OnceLock<Schema> = OnceLock::new();
        SHARED.get_or_init(Schema::standard)
    }

    /// Declaration of `name`.
    pub fn get(&self, name: &str) -> Option<&'static EntityDef> {
        self.defs.get(name).copied()
    }

    /// Whether `sub` is `sup` or inherits from it.
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        self.get(sub).is_some_and(|def| {
            def.supertypes
                .iter()
                .any(|parent| self.is_subtype_of(parent, sup))
        })
    }

    /// Flattened attribute layout of a simple instance of `name`, as
    /// `(declaring entity, attribute)` pairs.
    ///
    /// Supertypes come first, depth-first in declaration order; a common
    /// ancestor reached through several paths contributes once.
    pub fn layout(&self, name: &str) -> Option<Vec<(&'static str, &'static str)>> {
        let def = self.get(name)?;
        let mut visited = Vec::new();
        let mut out = Vec::new();
        self.collect_layout(def, &mut visited, &mut out);
        Some(out)
    }

    fn collect_layout(
        &self,
        def: &'static EntityDef,
        visited: &mut Vec<&'static str>,
        out: &mut Vec<(&'static str, &'static str)>,
    ) {
        if visited.contains(&def.name) {
            return;
        }
        visited.push(def.name);
        for parent in def.supertypes {
            if let Some(parent_def) = self.get(parent) {
                self.collect_layout(parent_def, visited, out);
            }
        }
        out.extend(def.attributes.iter().map(|attr| (def.name, *attr)));
    }

    /// Leaf partial types of a complex instance: those that are not a
    /// supertype of another partial. Sorted and deduplicated.
    pub fn leaves<'t>(&self, partials: &[&'t str]) -> Vec<&'t str> {
        let mut leaves: Vec<&'t str> = partials
            .iter()
            .copied()
            .filter(|candidate| {
                !partials
                    .iter()
                    .any(|other| other != candidate && self.is_subtype_of(other, candidate))
            })
            .collect();
        leaves.sort_unstable();
        leaves.dedup();
        leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(layout: &[(&str, &'static str)]) -> Vec<&'static str> {
        layout.iter().map(|(_, a)| *a).collect()
    }

    #[test]
    fn test_supertype_names_exist() {
        let schema = Schema::standard();
        for def in DEFINITIONS {
            for sup in def.supertypes {
                assert!(schema.get(sup).is_some(), "{} -> {}", def.name, sup);
            }
        }
    }

    #[test]
    fn test_layout_shares_common_ancestor() {
        let schema = Schema::standard();
        let layout = schema.layout("EDGE_CURVE").unwrap();
        assert_eq!(
            attrs(&layout),
            vec!["name", "edge_start", "edge_end", "edge_geometry", "same_sense"]
        );
        assert_eq!(layout[3].0, "EDGE_CURVE");

        let layout = schema.layout("ADVANCED_FACE").unwrap();
        assert_eq!(
            attrs(&layout),
            vec!["name", "bounds", "face_geometry", "same_sense"]
        );

        let layout = schema.layout("ORIENTED_CLOSED_SHELL").unwrap();
        assert_eq!(
            attrs(&layout),
            vec!["name", "cfs_faces", "closed_shell_element", "orientation"]
        );
    }

    #[test]
    fn test_layout_bspline() {
        let schema = Schema::standard();
        let layout = schema.layout("B_SPLINE_CURVE_WITH_KNOTS").unwrap();
        assert_eq!(layout.len(), 9);
        assert_eq!(layout[1], ("B_SPLINE_CURVE", "degree"));
        assert_eq!(layout[6], ("B_SPLINE_CURVE_WITH_KNOTS", "knot_multiplicities"));
    }

    #[test]
    fn test_subtypes() {
        let schema = Schema::standard();
        assert!(schema.is_subtype_of("ADVANCED_FACE", "FACE"));
        assert!(schema.is_subtype_of("EDGE_LOOP", "PATH"));
        assert!(schema.is_subtype_of("SEAM_CURVE", "CURVE"));
        assert!(!schema.is_subtype_of("PLANE", "CURVE"));
        assert!(!schema.is_subtype_of("NOT_A_TYPE", "CURVE"));
    }

    #[test]
    fn test_leaves() {
        let schema = Schema::standard();
        assert_eq!(
            schema.leaves(&["NAMED_UNIT", "SI_UNIT", "LENGTH_UNIT"]),
            vec!["LENGTH_UNIT", "SI_UNIT"]
        );
        assert_eq!(
            schema.leaves(&[
                "BOUNDED_CURVE",
                "B_SPLINE_CURVE",
                "B_SPLINE_CURVE_WITH_KNOTS",
                "CURVE",
                "GEOMETRIC_REPRESENTATION_ITEM",
                "RATIONAL_B_SPLINE_CURVE",
                "REPRESENTATION_ITEM",
            ]),
            vec!["B_SPLINE_CURVE_WITH_KNOTS", "RATIONAL_B_SPLINE_CURVE"]
        );
    }
}
