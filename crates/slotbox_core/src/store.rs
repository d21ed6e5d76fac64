//! Store facade.

use crate::binding::{EntityBinding, SlotMap};
use crate::config::Config;
use crate::cursor::{with_cursor, Cursor};
use crate::engine::Engine;
use crate::entity_box::EntityBox;
use crate::error::{CoreError, CoreResult};
use crate::memory::MemoryEngine;
use crate::query::QueryBuilder;
use slotbox_model::Model;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// An engine with a model installed.
///
/// `Store` is the entry point of the core: it hands the binary model to the
/// engine once, keeps the slot table of every entity, and creates cursors,
/// entity boxes and query builders.
///
/// ```rust,ignore
/// let store = Store::open_in_memory(&model, Config::default())?;
/// let events = store.entity_box::<Event>()?;
/// events.put(&mut Event::new("device 1", 1))?;
/// ```
pub struct Store {
    engine: Arc<dyn Engine>,
    model: Model,
    slots: HashMap<String, Arc<SlotMap>>,
    config: Config,
}

impl Store {
    /// Opens a store on `engine`, installing `model`.
    pub fn open(engine: Arc<dyn Engine>, model: &Model, config: Config) -> CoreResult<Self> {
        model.validate()?;
        engine.open(&model.to_binary())?;
        let slots: HashMap<String, Arc<SlotMap>> = model
            .entities
            .iter()
            .map(|entity| (entity.name.clone(), Arc::new(SlotMap::from_entity(entity))))
            .collect();
        info!("Opened store with {} entities", slots.len());
        Ok(Self {
            engine,
            model: model.clone(),
            slots,
            config,
        })
    }

    /// Opens a store on a fresh [`MemoryEngine`].
    pub fn open_in_memory(model: &Model, config: Config) -> CoreResult<Self> {
        let engine = MemoryEngine::with_config(&config);
        Self::open(Arc::new(engine), model, config)
    }

    /// The engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// The installed model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Slot table of an entity.
    pub fn slot_map(&self, entity: &str) -> CoreResult<&Arc<SlotMap>> {
        self.slots
            .get(entity)
            .ok_or_else(|| CoreError::entity_not_found(entity))
    }

    /// Opens a cursor on an entity.
    pub fn begin(&self, entity: &str, write: bool) -> CoreResult<Cursor> {
        let slots = self.slot_map(entity)?;
        Cursor::open(Arc::clone(&self.engine), slots.entity_id(), write)
    }

    /// Runs `f` with a cursor on `entity`.
    ///
    /// A write cursor is committed if `f` succeeds and discarded otherwise.
    /// The cursor is always closed.
    pub fn run_with_cursor<T, F>(&self, entity: &str, write: bool, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Cursor) -> CoreResult<T>,
    {
        let slots = self.slot_map(entity)?;
        with_cursor(&self.engine, slots.entity_id(), write, f)
    }

    /// Typed access to the objects of `T`.
    pub fn entity_box<T: EntityBinding>(&self) -> CoreResult<EntityBox<T>> {
        let slots = self.slot_map(T::ENTITY)?;
        Ok(EntityBox::new(
            Arc::clone(&self.engine),
            Arc::clone(slots),
            self.config.clone(),
        ))
    }

    /// Starts a query on `T`.
    pub fn query<T: EntityBinding>(&self) -> CoreResult<QueryBuilder<T>> {
        let slots = self.slot_map(T::ENTITY)?;
        QueryBuilder::new(
            Arc::clone(&self.engine),
            Arc::clone(slots),
            self.config.clone(),
        )
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entities: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        entities.sort_unstable();
        f.debug_struct("Store")
            .field("entities", &entities)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
