//! Entity registry: identity cache and type dispatch.
//!
//! Every file id is loaded at most once. [`Registry::resolve`] inserts a
//! placeholder slot and its cache entry *before* calling the loader, so a
//! reference cycle that reaches back to an entity still loading gets the
//! same handle instead of recursing. When a load fails its cache entry and
//! slot are removed; handles that escaped to other entities then read as
//! stale instead of aliasing a later entity.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;
use slotmap::{new_key_type, SlotMap};
use stepbrep_math::{Frame, Tolerance, Vec3};

use crate::entities::{Entity, Record, RecordDetail, LOADERS};
use crate::error::{Result, StepError};
use crate::options::ReaderOptions;
use crate::parser::StepFile;
use crate::query::{Instance, SelectValue};
use crate::schema::Schema;

new_key_type! {
    /// Handle to a resolved entity.
    pub struct EntityId;
}

/// Populates a domain entity from a raw instance.
pub type Loader = fn(&mut Registry<'_>, Instance<'_>) -> Result<Entity>;

/// Counters describing one registry's work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Loads that completed.
    pub loaded: usize,
    /// Resolutions answered from the cache.
    pub cache_hits: usize,
    /// Loads that failed and were rolled back.
    pub failed: usize,
    /// Entities created from inline values.
    pub unmapped: usize,
}

enum Slot {
    /// Placeholder for a load in progress.
    Loading { id: u64 },
    Ready { id: Option<u64>, entity: Entity },
}

/// Arena of resolved entities for one file.
pub struct Registry<'f> {
    file: &'f StepFile,
    schema: &'static Schema,
    loaders: HashMap<&'static str, Loader>,
    arena: SlotMap<EntityId, Slot>,
    cache: HashMap<u64, EntityId>,
    unmapped: Vec<EntityId>,
    stats: RegistryStats,
    options: ReaderOptions,
}

impl<'f> Registry<'f> {
    /// Registry over `file` with every supported entity type.
    pub fn new(file: &'f StepFile, options: &ReaderOptions) -> Self {
        Self::with_types(file, options, LOADERS)
    }

    /// Registry with an explicit constructor table.
    pub fn with_types(
        file: &'f StepFile,
        options: &ReaderOptions,
        table: &[(&'static str, Loader)],
    ) -> Self {
        let mut registry = Self {
            file,
            schema: Schema::shared(),
            loaders: HashMap::with_capacity(table.len()),
            arena: SlotMap::with_key(),
            cache: HashMap::new(),
            unmapped: Vec::new(),
            stats: RegistryStats::default(),
            options: options.clone(),
        };
        for (name, loader) in table {
            registry.register(name, *loader);
        }
        registry
    }

    /// Register `loader` for a type key (a simple type name, or sorted
    /// leaf types joined by `+`). Returns the key.
    pub fn register(&mut self, name: &'static str, loader: Loader) -> &'static str {
        self.loaders.insert(name, loader);
        name
    }

    /// The parsed file.
    pub fn file(&self) -> &'f StepFile {
        self.file
    }

    /// Options the registry was built with.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Geometric tolerances.
    pub fn tolerance(&self) -> Tolerance {
        self.options.tolerance()
    }

    /// Counters so far.
    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    /// Handle for `id` if it is already loaded or loading.
    pub fn cached(&self, id: u64) -> Option<EntityId> {
        self.cache.get(&id).copied()
    }

    /// Constructor for an instance: the exact type key, or for a complex
    /// instance the single registered leaf type.
    fn loader_for(&self, inst: &Instance<'_>) -> Result<(String, Loader)> {
        let key = inst.type_key();
        if let Some(loader) = self.loaders.get(key.as_str()) {
            return Ok((key, *loader));
        }
        if inst.is_complex() {
            let registered: Vec<(&str, Loader)> = inst
                .leaf_types()
                .into_iter()
                .filter_map(|t| self.loaders.get(t).map(|l| (t, *l)))
                .collect();
            if let [(leaf, loader)] = registered.as_slice() {
                debug!("#{}: dispatching {} as {}", inst.id(), key, leaf);
                return Ok((key, *loader));
            }
        }
        Err(StepError::UnknownType {
            id: inst.id(),
            type_name: key,
        })
    }

    /// Resolve a file id to its entity, loading it on first use.
    pub fn resolve(&mut self, id: u64) -> Result<EntityId> {
        if let Some(key) = self.cached(id) {
            self.stats.cache_hits += 1;
            return Ok(key);
        }

        let file = self.file;
        let raw = file.require(id)?;
        let inst = Instance::new(raw, self.schema);
        let (type_key, loader) = self.loader_for(&inst)?;

        let key = self.arena.insert(Slot::Loading { id });
        self.cache.insert(id, key);
        debug!("#{id}: loading {type_key}");

        match loader(self, inst) {
            Ok(entity) => {
                self.arena[key] = Slot::Ready {
                    id: Some(id),
                    entity,
                };
                self.stats.loaded += 1;
                Ok(key)
            }
            Err(err) => {
                self.cache.remove(&id);
                self.arena.remove(key);
                self.stats.failed += 1;
                debug!("#{id}: {type_key} failed: {err}");
                Err(err)
            }
        }
    }

    /// Store an entity built from an inline value.
    pub fn insert_unmapped(&mut self, entity: Entity) -> EntityId {
        let key = self.arena.insert(Slot::Ready { id: None, entity });
        self.unmapped.push(key);
        self.stats.unmapped += 1;
        key
    }

    /// Entities with no file id, in creation order.
    pub fn unmapped(&self) -> &[EntityId] {
        &self.unmapped
    }

    /// Resolve the active branch of a select: referenced instances through
    /// [`Registry::resolve`], typed measure values as unmapped records.
    pub fn resolve_select(
        &mut self,
        owner: u64,
        attribute: &str,
        value: SelectValue<'_>,
    ) -> Result<EntityId> {
        match value {
            SelectValue::Entity(id) => self.resolve(id),
            SelectValue::Typed { type_name, value } if is_measure_type(type_name) => {
                let magnitude = value.as_real().ok_or_else(|| StepError::UnhandledSelect {
                    id: owner,
                    attribute: attribute.to_string(),
                    variant: type_name.to_string(),
                })?;
                Ok(self.insert_unmapped(Entity::Record(Record {
                    type_key: type_name.to_string(),
                    detail: RecordDetail::MeasureValue(magnitude),
                })))
            }
            SelectValue::Typed { type_name, .. } => Err(StepError::UnhandledSelect {
                id: owner,
                attribute: attribute.to_string(),
                variant: type_name.to_string(),
            }),
            SelectValue::Value(v) => Err(StepError::UnhandledSelect {
                id: owner,
                attribute: attribute.to_string(),
                variant: v.describe().to_string(),
            }),
        }
    }

    /// File id of a handle, if it has one.
    pub fn file_id(&self, key: EntityId) -> Option<u64> {
        match self.arena.get(key)? {
            Slot::Loading { id } => Some(*id),
            Slot::Ready { id, .. } => *id,
        }
    }

    /// Entity behind a handle.
    pub fn get(&self, key: EntityId) -> Result<&Entity> {
        match self.arena.get(key) {
            Some(Slot::Ready { entity, .. }) => Ok(entity),
            Some(Slot::Loading { id }) => Err(StepError::CyclicReference(*id)),
            None => Err(StepError::StaleHandle),
        }
    }

    /// Entity behind a handle, narrowed with `pick`; a different kind is a
    /// type mismatch naming `expected`.
    pub fn fetch<'s, T: ?Sized>(
        &'s self,
        key: EntityId,
        expected: &str,
        pick: fn(&'s Entity) -> Option<&'s T>,
    ) -> Result<&'s T> {
        let entity = self.get(key)?;
        pick(entity).ok_or_else(|| {
            StepError::type_mismatch(self.file_id(key).unwrap_or(0), expected, entity.kind_name())
        })
    }

    /// Resolve `id` and narrow it with `pick`.
    pub fn resolve_as<T: ?Sized>(
        &mut self,
        id: u64,
        expected: &str,
        pick: for<'s> fn(&'s Entity) -> Option<&'s T>,
    ) -> Result<(EntityId, &T)> {
        let key = self.resolve(id)?;
        Ok((key, self.fetch(key, expected, pick)?))
    }

    /// Resolve a point reference and return its coordinates.
    pub fn point_at(&mut self, id: u64) -> Result<stepbrep_math::Point3> {
        let (_, point) = self.resolve_as(id, "CARTESIAN_POINT", Entity::as_point)?;
        Ok(point.coordinates)
    }

    /// Resolve a direction reference and return its (unnormalized) ratios.
    pub fn direction_at(&mut self, id: u64) -> Result<Vec3> {
        let (_, dir) = self.resolve_as(id, "DIRECTION", Entity::as_direction)?;
        Ok(dir.ratios)
    }

    /// Resolve a placement reference and return its frame.
    pub fn frame_at(&mut self, id: u64) -> Result<Frame> {
        let (_, placement) = self.resolve_as(id, "AXIS2_PLACEMENT", Entity::as_placement)?;
        Ok(placement.frame)
    }
}

/// Defined types whose inline values become unmapped measure records.
fn is_measure_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "LENGTH_MEASURE"
            | "POSITIVE_LENGTH_MEASURE"
            | "PLANE_ANGLE_MEASURE"
            | "POSITIVE_PLANE_ANGLE_MEASURE"
            | "SOLID_ANGLE_MEASURE"
            | "RATIO_MEASURE"
            | "POSITIVE_RATIO_MEASURE"
            | "PARAMETER_VALUE"
            | "COUNT_MEASURE"
            | "AREA_MEASURE"
            | "VOLUME_MEASURE"
            | "MASS_MEASURE"
    )
}
