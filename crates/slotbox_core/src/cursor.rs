//! Scoped engine cursors.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::types::{CursorId, EntityTypeId};
use std::sync::Arc;
use tracing::{debug, warn};

/// An open engine cursor on one entity type.
///
/// The cursor is closed when dropped, discarding uncommitted writes. Use
/// [`Cursor::close`] to observe close errors, or [`with_cursor`] to get
/// commit-on-success behavior.
pub struct Cursor {
    engine: Arc<dyn Engine>,
    id: CursorId,
    entity: EntityTypeId,
    write: bool,
    closed: bool,
}

impl Cursor {
    /// Opens a cursor.
    pub fn open(engine: Arc<dyn Engine>, entity: EntityTypeId, write: bool) -> CoreResult<Self> {
        let id = engine.begin(entity, write)?;
        debug!("Opened {} on {} (write: {})", id, entity, write);
        Ok(Self {
            engine,
            id,
            entity,
            write,
            closed: false,
        })
    }

    /// The engine handle.
    #[must_use]
    pub fn id(&self) -> CursorId {
        self.id
    }

    /// The entity type the cursor reads and writes.
    #[must_use]
    pub fn entity(&self) -> EntityTypeId {
        self.entity
    }

    /// Returns true for write cursors.
    #[must_use]
    pub fn is_write(&self) -> bool {
        self.write
    }

    /// Fails unless the cursor belongs to `entity`.
    pub fn ensure_entity(&self, entity: EntityTypeId) -> CoreResult<()> {
        if self.entity == entity {
            Ok(())
        } else {
            Err(CoreError::WrongCursor {
                expected: entity.as_u32(),
                actual: self.entity.as_u32(),
            })
        }
    }

    fn ensure_write(&self) -> CoreResult<()> {
        if self.write {
            Ok(())
        } else {
            Err(CoreError::ReadOnlyCursor)
        }
    }

    /// Makes this cursor's writes visible. The cursor stays usable.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_write()?;
        self.engine.commit(self.id)?;
        Ok(())
    }

    /// Closes the cursor, discarding uncommitted writes.
    pub fn close(mut self) -> CoreResult<()> {
        self.closed = true;
        self.engine.close(self.id)?;
        Ok(())
    }

    /// Returns a fresh object ID.
    pub fn next_id(&mut self) -> CoreResult<u64> {
        self.ensure_write()?;
        Ok(self.engine.next_id(self.id)?)
    }

    /// Stores a record.
    pub fn put(&mut self, id: u64, record: &[u8]) -> CoreResult<()> {
        self.ensure_write()?;
        Ok(self.engine.put(self.id, id, record)?)
    }

    /// Reads one record.
    pub fn get(&self, id: u64) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.engine.get(self.id, id)?)
    }

    /// Reads every record in ID order.
    pub fn get_all(&self) -> CoreResult<Vec<Vec<u8>>> {
        Ok(self.engine.get_all(self.id)?)
    }

    /// Removes one record.
    pub fn remove(&mut self, id: u64) -> CoreResult<bool> {
        self.ensure_write()?;
        Ok(self.engine.remove(self.id, id)?)
    }

    /// Removes every record.
    pub fn remove_all(&mut self) -> CoreResult<u64> {
        self.ensure_write()?;
        Ok(self.engine.remove_all(self.id)?)
    }

    /// Number of records visible to the cursor.
    pub fn count(&self) -> CoreResult<u64> {
        Ok(self.engine.count(self.id)?)
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.engine.close(self.id) {
                warn!("Failed to close {}: {}", self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("entity", &self.entity)
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

/// Runs `f` with a fresh cursor.
///
/// A write cursor is committed if `f` succeeds. The cursor is always closed;
/// if `f` fails its writes are discarded and its error is returned.
pub fn with_cursor<T, F>(
    engine: &Arc<dyn Engine>,
    entity: EntityTypeId,
    write: bool,
    f: F,
) -> CoreResult<T>
where
    F: FnOnce(&mut Cursor) -> CoreResult<T>,
{
    let mut cursor = Cursor::open(Arc::clone(engine), entity, write)?;
    match f(&mut cursor) {
        Ok(value) => {
            if write {
                cursor.commit()?;
            }
            cursor.close()?;
            Ok(value)
        }
        Err(e) => {
            debug!("Discarding {} after error: {}", cursor.id, e);
            drop(cursor);
            Err(e)
        }
    }
}
