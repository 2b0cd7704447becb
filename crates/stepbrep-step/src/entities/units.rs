//! Units, measures and representation contexts.
//!
//! These never reach the BREP. They are loaded so that representation
//! contexts resolve and the length unit of a shape can be reported.

use super::{resolve_all, Entity};
use crate::error::Result;
use crate::query::Instance;
use crate::registry::{EntityId, Registry};

/// Physical quantity a named unit measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitQuantity {
    /// `LENGTH_UNIT`
    Length,
    /// `PLANE_ANGLE_UNIT`
    PlaneAngle,
    /// `SOLID_ANGLE_UNIT`
    SolidAngle,
    /// Anything else.
    Other,
}

impl UnitQuantity {
    fn of(inst: &Instance<'_>) -> Self {
        if inst.is_a("LENGTH_UNIT") {
            UnitQuantity::Length
        } else if inst.is_a("PLANE_ANGLE_UNIT") {
            UnitQuantity::PlaneAngle
        } else if inst.is_a("SOLID_ANGLE_UNIT") {
            UnitQuantity::SolidAngle
        } else {
            UnitQuantity::Other
        }
    }
}

/// Payload of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordDetail {
    /// `SI_UNIT`, alone or combined with a quantity unit.
    SiUnit {
        /// Measured quantity.
        quantity: UnitQuantity,
        /// SI prefix such as `MILLI`.
        prefix: Option<String>,
        /// SI unit name such as `METRE`.
        name: String,
    },
    /// `CONVERSION_BASED_UNIT`
    ConversionUnit {
        /// Measured quantity.
        quantity: UnitQuantity,
        /// Unit name such as `INCH`.
        name: String,
        /// The `conversion_factor` measure.
        factor: EntityId,
    },
    /// `DIMENSIONAL_EXPONENTS`: length, mass, time, current, temperature,
    /// amount, luminous intensity.
    Dimensions([f64; 7]),
    /// A `MEASURE_WITH_UNIT` or subtype.
    Measure {
        /// The value, usually an unmapped [`RecordDetail::MeasureValue`].
        value: EntityId,
        /// The unit.
        unit: EntityId,
        /// Name of an uncertainty measure.
        name: Option<String>,
    },
    /// Inline typed measure value.
    MeasureValue(f64),
    /// A representation context.
    Context {
        /// `context_identifier`
        identifier: String,
        /// Coordinate space dimension of a geometric context.
        dimension: Option<i64>,
        /// Globally assigned units.
        units: Vec<EntityId>,
        /// Global uncertainty measures.
        uncertainty: Vec<EntityId>,
    },
    /// A bare handle to another instance, stored by registry test loaders.
    #[cfg(test)]
    Link(EntityId),
}

/// An entity with no geometric meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Runtime type key.
    pub type_key: String,
    /// Payload.
    pub detail: RecordDetail,
}

impl Record {
    /// Quantity measured, for unit records.
    pub fn quantity(&self) -> Option<UnitQuantity> {
        match &self.detail {
            RecordDetail::SiUnit { quantity, .. } | RecordDetail::ConversionUnit { quantity, .. } => {
                Some(*quantity)
            }
            _ => None,
        }
    }

    /// Lower-case unit label such as `millimetre` or `inch`.
    pub fn unit_label(&self) -> Option<String> {
        match &self.detail {
            RecordDetail::SiUnit { prefix, name, .. } => Some(format!(
                "{}{}",
                prefix.as_deref().unwrap_or_default().to_lowercase(),
                name.to_lowercase()
            )),
            RecordDetail::ConversionUnit { name, .. } => Some(name.to_lowercase()),
            _ => None,
        }
    }
}

fn record(inst: &Instance<'_>, detail: RecordDetail) -> Entity {
    Entity::Record(Record {
        type_key: inst.type_key(),
        detail,
    })
}

/// Resolve the `dimensions` of a named unit when it is given explicitly.
fn load_named_unit(reg: &mut Registry<'_>, inst: &Instance<'_>) -> Result<()> {
    if let Some(dimensions) = inst.narrow("NAMED_UNIT")?.opt_entity("dimensions")? {
        reg.resolve(dimensions)?;
    }
    Ok(())
}

pub(crate) fn load_si_unit(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    load_named_unit(reg, &inst)?;
    let attrs = inst.narrow("SI_UNIT")?;
    let detail = RecordDetail::SiUnit {
        quantity: UnitQuantity::of(&inst),
        prefix: attrs.opt_enumeration("prefix")?.map(str::to_string),
        name: attrs.enumeration("name")?.to_string(),
    };
    Ok(record(&inst, detail))
}

pub(crate) fn load_conversion_based_unit(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    load_named_unit(reg, &inst)?;
    let attrs = inst.narrow("CONVERSION_BASED_UNIT")?;
    let name = attrs.string("name")?.to_string();
    let factor = reg.resolve(attrs.entity("conversion_factor")?)?;
    Ok(record(
        &inst,
        RecordDetail::ConversionUnit {
            quantity: UnitQuantity::of(&inst),
            name,
            factor,
        },
    ))
}

pub(crate) fn load_dimensional_exponents(_reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("DIMENSIONAL_EXPONENTS")?;
    let mut exponents = [0.0; 7];
    let names = [
        "length_exponent",
        "mass_exponent",
        "time_exponent",
        "electric_current_exponent",
        "thermodynamic_temperature_exponent",
        "amount_of_substance_exponent",
        "luminous_intensity_exponent",
    ];
    for (slot, name) in exponents.iter_mut().zip(names) {
        *slot = attrs.real(name)?;
    }
    Ok(record(&inst, RecordDetail::Dimensions(exponents)))
}

pub(crate) fn load_measure_with_unit(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("MEASURE_WITH_UNIT")?;
    let value = reg.resolve_select(inst.id(), "value_component", attrs.select("value_component")?)?;
    let unit = reg.resolve(attrs.entity("unit_component")?)?;
    let name = if inst.is_a("UNCERTAINTY_MEASURE_WITH_UNIT") {
        inst.narrow("UNCERTAINTY_MEASURE_WITH_UNIT")?
            .opt_string("name")?
            .map(str::to_string)
    } else {
        None
    };
    Ok(record(&inst, RecordDetail::Measure { value, unit, name }))
}

pub(crate) fn load_context(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let identifier = inst
        .narrow("REPRESENTATION_CONTEXT")?
        .opt_string("context_identifier")?
        .unwrap_or_default()
        .to_string();
    let dimension = if inst.is_a("GEOMETRIC_REPRESENTATION_CONTEXT") {
        Some(
            inst.narrow("GEOMETRIC_REPRESENTATION_CONTEXT")?
                .integer("coordinate_space_dimension")?,
        )
    } else {
        None
    };
    let units = if inst.is_a("GLOBAL_UNIT_ASSIGNED_CONTEXT") {
        let ids = inst.narrow("GLOBAL_UNIT_ASSIGNED_CONTEXT")?.entity_list("units")?;
        resolve_all(reg, &ids)?
    } else {
        Vec::new()
    };
    let uncertainty = if inst.is_a("GLOBAL_UNCERTAINTY_ASSIGNED_CONTEXT") {
        let ids = inst
            .narrow("GLOBAL_UNCERTAINTY_ASSIGNED_CONTEXT")?
            .entity_list("uncertainty")?;
        resolve_all(reg, &ids)?
    } else {
        Vec::new()
    };
    Ok(record(
        &inst,
        RecordDetail::Context {
            identifier,
            dimension,
            units,
            uncertainty,
        },
    ))
}

/// Label of the length unit a context assigns, if any.
pub(crate) fn context_length_unit(reg: &Registry<'_>, context: EntityId) -> Option<String> {
    let record = reg.get(context).ok()?.as_record()?;
    let RecordDetail::Context { units, .. } = &record.detail else {
        return None;
    };
    units
        .iter()
        .filter_map(|u| reg.get(*u).ok()?.as_record())
        .find(|r| r.quantity() == Some(UnitQuantity::Length))
        .and_then(Record::unit_label)
}
