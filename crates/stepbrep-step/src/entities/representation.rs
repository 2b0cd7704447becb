//! Shape and definitional representations.

use log::warn;

use super::units::context_length_unit;
use super::Entity;
use crate::error::Result;
use crate::query::Instance;
use crate::registry::{EntityId, Registry};

/// A `REPRESENTATION` or subtype.
///
/// Items are kept as file ids and resolved by whoever walks them, so a
/// representation listing an unsupported item (a styled item, an axis
/// placement used only for display) still loads.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    /// Runtime type key.
    pub type_name: String,
    /// The `name` attribute.
    pub name: String,
    /// Item ids in file order.
    pub items: Vec<u64>,
    /// The `context_of_items`, when it resolved.
    pub context: Option<EntityId>,
}

impl Representation {
    /// Label of the length unit assigned by the context.
    pub fn length_unit(&self, reg: &Registry<'_>) -> Option<String> {
        context_length_unit(reg, self.context?)
    }
}

pub(crate) fn load_representation(reg: &mut Registry<'_>, inst: Instance<'_>) -> Result<Entity> {
    let attrs = inst.narrow("REPRESENTATION")?;
    let context = match attrs.opt_entity("context_of_items")? {
        Some(id) => match reg.resolve(id) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!("#{}: ignoring context #{id}: {err}", inst.id());
                None
            }
        },
        None => None,
    };
    Ok(Entity::Representation(Representation {
        type_name: inst.type_key(),
        name: attrs.opt_string("name")?.unwrap_or_default().to_string(),
        items: attrs.entity_list("items")?,
        context,
    }))
}
