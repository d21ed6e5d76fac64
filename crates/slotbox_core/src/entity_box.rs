//! Typed access to the objects of one entity.

use crate::binding::{decode, encode, EntityBinding, SlotMap};
use crate::config::Config;
use crate::cursor::{with_cursor, Cursor};
use crate::engine::Engine;
use crate::error::CoreResult;
use crate::query::QueryBuilder;
use std::marker::PhantomData;
use std::sync::Arc;

/// Objects of type `T`.
///
/// Each method without a cursor argument runs in its own cursor; writes
/// are committed when the method succeeds. The `_in` variants work inside
/// a caller's cursor instead.
pub struct EntityBox<T> {
    engine: Arc<dyn Engine>,
    slots: Arc<SlotMap>,
    config: Config,
    _marker: PhantomData<fn() -> T>,
}

impl<T: EntityBinding> EntityBox<T> {
    /// Creates a box. Usually obtained from `Store::entity_box`.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>, slots: Arc<SlotMap>, config: Config) -> Self {
        Self {
            engine,
            slots,
            config,
            _marker: PhantomData,
        }
    }

    /// Slot table of `T`.
    #[must_use]
    pub fn slots(&self) -> &SlotMap {
        &self.slots
    }

    fn run<R>(&self, write: bool, f: impl FnOnce(&mut Cursor) -> CoreResult<R>) -> CoreResult<R> {
        with_cursor(&self.engine, self.slots.entity_id(), write, f)
    }

    /// Stores an object inside `cursor`. An object with ID 0 gets a fresh
    /// ID, which is written back to it.
    pub fn put_in(&self, cursor: &mut Cursor, object: &mut T) -> CoreResult<u64> {
        cursor.ensure_entity(self.slots.entity_id())?;
        let id = match object.id() {
            0 => cursor.next_id()?,
            id => id,
        };
        object.set_id(id);
        cursor.put(id, &encode(&self.slots, object)?)?;
        Ok(id)
    }

    /// Stores an object.
    pub fn put(&self, object: &mut T) -> CoreResult<u64> {
        self.run(true, |cursor| self.put_in(cursor, object))
    }

    /// Stores several objects in one cursor.
    pub fn put_all(&self, objects: &mut [T]) -> CoreResult<Vec<u64>> {
        self.run(true, |cursor| {
            objects
                .iter_mut()
                .map(|object| self.put_in(cursor, object))
                .collect()
        })
    }

    /// Reads one object inside `cursor`.
    pub fn get_in(&self, cursor: &Cursor, id: u64) -> CoreResult<Option<T>> {
        cursor.ensure_entity(self.slots.entity_id())?;
        cursor
            .get(id)?
            .map(|record| decode(&self.slots, &record))
            .transpose()
    }

    /// Reads one object.
    pub fn get(&self, id: u64) -> CoreResult<Option<T>> {
        self.run(false, |cursor| self.get_in(cursor, id))
    }

    /// Reads every object in ID order.
    pub fn get_all(&self) -> CoreResult<Vec<T>> {
        self.run(false, |cursor| {
            cursor
                .get_all()?
                .iter()
                .map(|record| decode(&self.slots, record))
                .collect()
        })
    }

    /// Number of stored objects.
    pub fn count(&self) -> CoreResult<u64> {
        self.run(false, |cursor| cursor.count())
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.count()? == 0)
    }

    /// Removes one object. Returns false if it did not exist.
    pub fn remove(&self, id: u64) -> CoreResult<bool> {
        self.run(true, |cursor| cursor.remove(id))
    }

    /// Removes every object. Returns how many were removed.
    pub fn remove_all(&self) -> CoreResult<u64> {
        self.run(true, Cursor::remove_all)
    }

    /// Starts a query on `T`.
    pub fn query(&self) -> CoreResult<QueryBuilder<T>> {
        QueryBuilder::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.slots),
            self.config.clone(),
        )
    }
}

impl<T> std::fmt::Debug for EntityBox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityBox")
            .field("entity", &self.slots.entity_name())
            .finish_non_exhaustive()
    }
}
