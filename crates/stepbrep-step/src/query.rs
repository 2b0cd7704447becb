//! Name-based attribute access over raw instances.
//!
//! A loader never indexes argument lists directly. It narrows the instance
//! to the entity type it declares ([`Instance::narrow`]) and reads that
//! type's own attributes by name. Narrowing works the same for simple
//! instances (where the attributes sit at an offset in the flattened
//! layout) and complex instances (where they live in one partial record).

use crate::error::{Result, StepError};
use crate::parser::{RawInstance, StepValue};
use crate::schema::Schema;

/// EXPRESS `LOGICAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logical {
    /// `.T.`
    True,
    /// `.F.`
    False,
    /// `.U.`
    Unknown,
}

/// The active branch of a SELECT attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectValue<'a> {
    /// Reference to another instance.
    Entity(u64),
    /// Inline typed value such as `PARAMETER_VALUE(0.5)`.
    Typed {
        /// Defined type name.
        type_name: &'a str,
        /// Wrapped value.
        value: &'a StepValue,
    },
    /// Bare value with no type tag.
    Value(&'a StepValue),
}

/// A raw instance bound to the schema.
#[derive(Debug, Clone, Copy)]
pub struct Instance<'a> {
    raw: &'a RawInstance,
    schema: &'a Schema,
}

impl<'a> Instance<'a> {
    /// Bind `raw` to `schema`.
    pub fn new(raw: &'a RawInstance, schema: &'a Schema) -> Self {
        Self { raw, schema }
    }

    /// File id.
    pub fn id(&self) -> u64 {
        self.raw.id
    }

    /// Whether the instance uses the external mapping.
    pub fn is_complex(&self) -> bool {
        self.raw.complex
    }

    /// Dispatch key: the type name of a simple instance, or the sorted leaf
    /// partial types of a complex one joined with `+`.
    pub fn type_key(&self) -> String {
        if self.raw.complex {
            self.leaf_types().join("+")
        } else {
            self.raw.type_name().to_string()
        }
    }

    /// Leaf partial types (all partials for a simple instance).
    pub fn leaf_types(&self) -> Vec<&'a str> {
        let partials: Vec<&'a str> = self
            .raw
            .records
            .iter()
            .map(|r| r.type_name.as_str())
            .collect();
        self.schema.leaves(&partials)
    }

    /// Whether some partial of the instance is `type_name` or a subtype.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.raw
            .records
            .iter()
            .any(|r| self.schema.is_subtype_of(&r.type_name, type_name))
    }

    /// View the instance as `type_name`, exposing that type's own attributes.
    pub fn narrow(&self, type_name: &'static str) -> Result<Narrowed<'a>> {
        let def = self.schema.get(type_name).ok_or_else(|| StepError::UnknownType {
            id: self.id(),
            type_name: type_name.to_string(),
        })?;

        let values: &'a [StepValue] = if self.raw.complex {
            self.raw
                .records
                .iter()
                .find(|r| r.type_name == type_name)
                .map_or(&[][..], |r| r.args.as_slice())
        } else {
            let actual = self.raw.type_name();
            if !self.schema.is_subtype_of(actual, type_name) {
                return Err(StepError::type_mismatch(self.id(), type_name, actual));
            }
            let layout = self.schema.layout(actual).ok_or_else(|| StepError::UnknownType {
                id: self.id(),
                type_name: actual.to_string(),
            })?;
            let offset = layout
                .iter()
                .position(|(owner, _)| *owner == type_name)
                .unwrap_or(layout.len());
            let args = &self.raw.records[0].args;
            args.get(offset..).unwrap_or(&[])
        };

        Ok(Narrowed {
            id: self.id(),
            type_name,
            attributes: def.attributes,
            values,
        })
    }
}

/// One declared type's attributes of an instance.
#[derive(Debug, Clone, Copy)]
pub struct Narrowed<'a> {
    id: u64,
    type_name: &'static str,
    attributes: &'static [&'static str],
    values: &'a [StepValue],
}

impl<'a> Narrowed<'a> {
    /// File id of the instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn missing(&self, attribute: &str, detail: Option<String>) -> StepError {
        StepError::MissingAttribute {
            id: self.id,
            type_name: self.type_name.to_string(),
            attribute: attribute.to_string(),
            detail,
        }
    }

    fn wrong(&self, attribute: &str, expected: &str, found: &StepValue) -> StepError {
        self.missing(
            attribute,
            Some(format!("expected {expected}, found {}", found.describe())),
        )
    }

    fn raw(&self, attribute: &str) -> Result<Option<&'a StepValue>> {
        let index = self
            .attributes
            .iter()
            .position(|a| *a == attribute)
            .ok_or_else(|| self.missing(attribute, Some("not declared".into())))?;
        Ok(self.values.get(index))
    }

    /// Whether the attribute is written as `*`.
    pub fn is_derived(&self, attribute: &str) -> Result<bool> {
        Ok(self.raw(attribute)?.is_some_and(StepValue::is_derived))
    }

    /// Present value, or `None` for `$`, `*` or a short record.
    pub fn opt_value(&self, attribute: &str) -> Result<Option<&'a StepValue>> {
        Ok(self
            .raw(attribute)?
            .filter(|v| !v.is_null() && !v.is_derived()))
    }

    /// Present value, or Missing-Attribute.
    pub fn value(&self, attribute: &str) -> Result<&'a StepValue> {
        match self.raw(attribute)? {
            Some(v) if v.is_null() || v.is_derived() => {
                Err(self.missing(attribute, Some(format!("found {}", v.describe()))))
            }
            Some(v) => Ok(v),
            None => Err(self.missing(attribute, None)),
        }
    }

    /// STRING attribute.
    pub fn string(&self, attribute: &str) -> Result<&'a str> {
        let v = self.value(attribute)?;
        v.as_string().ok_or_else(|| self.wrong(attribute, "string", v))
    }

    /// Optional STRING attribute.
    pub fn opt_string(&self, attribute: &str) -> Result<Option<&'a str>> {
        match self.opt_value(attribute)? {
            Some(v) => v
                .as_string()
                .map(Some)
                .ok_or_else(|| self.wrong(attribute, "string", v)),
            None => Ok(None),
        }
    }

    /// REAL attribute. Integers and typed measures are accepted.
    pub fn real(&self, attribute: &str) -> Result<f64> {
        let v = self.value(attribute)?;
        real_of(v).ok_or_else(|| self.wrong(attribute, "real", v))
    }

    /// Optional REAL attribute.
    pub fn opt_real(&self, attribute: &str) -> Result<Option<f64>> {
        match self.opt_value(attribute)? {
            Some(v) => real_of(v)
                .map(Some)
                .ok_or_else(|| self.wrong(attribute, "real", v)),
            None => Ok(None),
        }
    }

    /// INTEGER attribute.
    pub fn integer(&self, attribute: &str) -> Result<i64> {
        let v = self.value(attribute)?;
        v.as_integer().ok_or_else(|| self.wrong(attribute, "integer", v))
    }

    /// BOOLEAN attribute (`.T.` / `.F.`).
    pub fn boolean(&self, attribute: &str) -> Result<bool> {
        let v = self.value(attribute)?;
        match v.as_enum() {
            Some("T") | Some("TRUE") => Ok(true),
            Some("F") | Some("FALSE") => Ok(false),
            _ => Err(self.wrong(attribute, "boolean", v)),
        }
    }

    /// LOGICAL attribute (`.T.` / `.F.` / `.U.`).
    pub fn logical(&self, attribute: &str) -> Result<Logical> {
        let v = self.value(attribute)?;
        match v.as_enum() {
            Some("T") | Some("TRUE") => Ok(Logical::True),
            Some("F") | Some("FALSE") => Ok(Logical::False),
            Some("U") | Some("UNKNOWN") => Ok(Logical::Unknown),
            _ => Err(self.wrong(attribute, "logical", v)),
        }
    }

    /// Enumeration literal, without the dots.
    pub fn enumeration(&self, attribute: &str) -> Result<&'a str> {
        let v = self.value(attribute)?;
        v.as_enum().ok_or_else(|| self.wrong(attribute, "enumeration", v))
    }

    /// Optional enumeration literal.
    pub fn opt_enumeration(&self, attribute: &str) -> Result<Option<&'a str>> {
        match self.opt_value(attribute)? {
            Some(v) => v
                .as_enum()
                .map(Some)
                .ok_or_else(|| self.wrong(attribute, "enumeration", v)),
            None => Ok(None),
        }
    }

    /// Entity reference.
    pub fn entity(&self, attribute: &str) -> Result<u64> {
        let v = self.value(attribute)?;
        v.as_entity_ref()
            .ok_or_else(|| self.wrong(attribute, "entity reference", v))
    }

    /// Optional entity reference.
    pub fn opt_entity(&self, attribute: &str) -> Result<Option<u64>> {
        match self.opt_value(attribute)? {
            Some(v) => v
                .as_entity_ref()
                .map(Some)
                .ok_or_else(|| self.wrong(attribute, "entity reference", v)),
            None => Ok(None),
        }
    }

    fn list(&self, attribute: &str) -> Result<&'a [StepValue]> {
        let v = self.value(attribute)?;
        v.as_list().ok_or_else(|| self.wrong(attribute, "list", v))
    }

    /// List of entity references.
    pub fn entity_list(&self, attribute: &str) -> Result<Vec<u64>> {
        self.list(attribute)?
            .iter()
            .map(|v| {
                v.as_entity_ref()
                    .ok_or_else(|| self.wrong(attribute, "entity reference", v))
            })
            .collect()
    }

    /// List of lists of entity references.
    pub fn entity_grid(&self, attribute: &str) -> Result<Vec<Vec<u64>>> {
        self.list(attribute)?
            .iter()
            .map(|row| {
                row.as_list()
                    .ok_or_else(|| self.wrong(attribute, "list", row))?
                    .iter()
                    .map(|v| {
                        v.as_entity_ref()
                            .ok_or_else(|| self.wrong(attribute, "entity reference", v))
                    })
                    .collect()
            })
            .collect()
    }

    /// List of reals.
    pub fn real_list(&self, attribute: &str) -> Result<Vec<f64>> {
        self.list(attribute)?
            .iter()
            .map(|v| v.as_real().ok_or_else(|| self.wrong(attribute, "real", v)))
            .collect()
    }

    /// List of lists of reals.
    pub fn real_grid(&self, attribute: &str) -> Result<Vec<Vec<f64>>> {
        self.list(attribute)?
            .iter()
            .map(|row| {
                row.as_list()
                    .ok_or_else(|| self.wrong(attribute, "list", row))?
                    .iter()
                    .map(|v| v.as_real().ok_or_else(|| self.wrong(attribute, "real", v)))
                    .collect()
            })
            .collect()
    }

    /// List of integers.
    pub fn integer_list(&self, attribute: &str) -> Result<Vec<i64>> {
        self.list(attribute)?
            .iter()
            .map(|v| {
                v.as_integer()
                    .ok_or_else(|| self.wrong(attribute, "integer", v))
            })
            .collect()
    }

    /// SELECT attribute.
    pub fn select(&self, attribute: &str) -> Result<SelectValue<'a>> {
        let v = self.value(attribute)?;
        self.select_of(attribute, v)
    }

    /// Aggregate of SELECT values (trimming selects, unit lists).
    pub fn select_list(&self, attribute: &str) -> Result<Vec<SelectValue<'a>>> {
        self.list(attribute)?
            .iter()
            .map(|v| self.select_of(attribute, v))
            .collect()
    }

    fn select_of(&self, attribute: &str, v: &'a StepValue) -> Result<SelectValue<'a>> {
        match v {
            StepValue::EntityRef(id) => Ok(SelectValue::Entity(*id)),
            StepValue::Typed { type_name, args } => match args.as_slice() {
                [inner] => Ok(SelectValue::Typed {
                    type_name,
                    value: inner,
                }),
                _ => Err(StepError::UnhandledSelect {
                    id: self.id,
                    attribute: attribute.to_string(),
                    variant: type_name.clone(),
                }),
            },
            StepValue::List(_) | StepValue::Null | StepValue::Derived => {
                Err(self.wrong(attribute, "select value", v))
            }
            other => Ok(SelectValue::Value(other)),
        }
    }
}

fn real_of(v: &StepValue) -> Option<f64> {
    match v {
        StepValue::Typed { args, .. } if args.len() == 1 => args[0].as_real(),
        other => other.as_real(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    const FIXTURE: &str = r#"ISO-10303-21;
HEADER;
ENDSEC;
DATA;
#1 = EDGE_CURVE('e', #2, #3, #4, .T.);
#5 = ( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.) );
#6 = TRIMMED_CURVE('', #4, (PARAMETER_VALUE(0.), #2), (PARAMETER_VALUE(1.5)), .F., .PARAMETER.);
#7 = CIRCLE('', #8, $);
#9 = B_SPLINE_SURFACE_WITH_KNOTS('',1,1,((#2,#3),(#10,#11)),.UNSPECIFIED.,.F.,.F.,.U.,(2,2),(2,2),(0.,1.),(0.,1.),.UNSPECIFIED.);
ENDSEC;
END-ISO-10303-21;
"#;

    fn with_instance(id: u64, f: impl FnOnce(Instance<'_>)) {
        let file = Parser::parse(FIXTURE.as_bytes()).unwrap();
        let schema = Schema::standard();
        f(Instance::new(file.get(id).unwrap(), &schema));
    }

    #[test]
    fn test_narrow_simple_instance() {
        with_instance(1, |inst| {
            assert_eq!(inst.type_key(), "EDGE_CURVE");
            assert!(inst.is_a("EDGE"));
            let item = inst.narrow("REPRESENTATION_ITEM").unwrap();
            assert_eq!(item.string("name").unwrap(), "e");
            let edge = inst.narrow("EDGE").unwrap();
            assert_eq!(edge.entity("edge_start").unwrap(), 2);
            assert_eq!(edge.entity("edge_end").unwrap(), 3);
            let ec = inst.narrow("EDGE_CURVE").unwrap();
            assert_eq!(ec.entity("edge_geometry").unwrap(), 4);
            assert!(ec.boolean("same_sense").unwrap());
            // No own attributes, still a valid view.
            assert!(inst.narrow("GEOMETRIC_REPRESENTATION_ITEM").is_ok());
            assert!(matches!(
                inst.narrow("FACE"),
                Err(StepError::TypeMismatch { .. })
            ));
        });
    }

    #[test]
    fn test_narrow_complex_instance() {
        with_instance(5, |inst| {
            assert_eq!(inst.type_key(), "LENGTH_UNIT+SI_UNIT");
            let si = inst.narrow("SI_UNIT").unwrap();
            assert_eq!(si.enumeration("prefix").unwrap(), "MILLI");
            assert_eq!(si.enumeration("name").unwrap(), "METRE");
            let named = inst.narrow("NAMED_UNIT").unwrap();
            assert!(named.is_derived("dimensions").unwrap());
            assert_eq!(named.opt_entity("dimensions").unwrap(), None);
            assert!(inst.narrow("LENGTH_UNIT").is_ok());
        });
    }

    #[test]
    fn test_select_lists() {
        with_instance(6, |inst| {
            let tc = inst.narrow("TRIMMED_CURVE").unwrap();
            let trim_1 = tc.select_list("trim_1").unwrap();
            assert_eq!(trim_1.len(), 2);
            match trim_1[0] {
                SelectValue::Typed { type_name, value } => {
                    assert_eq!(type_name, "PARAMETER_VALUE");
                    assert_eq!(value.as_real(), Some(0.0));
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(trim_1[1], SelectValue::Entity(2));
            assert!(!tc.boolean("sense_agreement").unwrap());
        });
    }

    #[test]
    fn test_missing_and_wrong_kind() {
        with_instance(7, |inst| {
            let circle = inst.narrow("CIRCLE").unwrap();
            let err = circle.real("radius").unwrap_err();
            assert!(matches!(
                err,
                StepError::MissingAttribute { id: 7, ref attribute, .. } if attribute == "radius"
            ));
            assert_eq!(circle.opt_real("radius").unwrap(), None);
            let conic = inst.narrow("CONIC").unwrap();
            assert!(conic.real("position").is_err());
            assert!(conic.entity("no_such_attribute").is_err());
        });
    }

    #[test]
    fn test_grids_and_logicals() {
        with_instance(9, |inst| {
            let s = inst.narrow("B_SPLINE_SURFACE").unwrap();
            assert_eq!(s.integer("u_degree").unwrap(), 1);
            assert_eq!(
                s.entity_grid("control_points_list").unwrap(),
                vec![vec![2, 3], vec![10, 11]]
            );
            assert_eq!(s.logical("self_intersect").unwrap(), Logical::Unknown);
            let k = inst.narrow("B_SPLINE_SURFACE_WITH_KNOTS").unwrap();
            assert_eq!(k.integer_list("u_multiplicities").unwrap(), vec![2, 2]);
            assert_eq!(k.real_list("v_knots").unwrap(), vec![0.0, 1.0]);
        });
    }
}
