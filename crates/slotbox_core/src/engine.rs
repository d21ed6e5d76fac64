//! The storage engine boundary.

use crate::error::EngineResult;
use crate::types::{BuilderId, CursorId, EntityTypeId, QueryId};

/// A storage and query engine driven through opaque handles and encoded
/// buffers.
///
/// The engine owns every handle it returns until the matching release call.
/// Handles are plain values; the core wraps them in guards that release
/// them exactly once.
///
/// # Invariants
///
/// - At most one write cursor is open at a time
/// - Writes through a cursor become visible to other cursors on commit
/// - `find` returns records in ascending object ID order
pub trait Engine: Send + Sync {
    /// Installs the binary model. Must be called before anything else.
    fn open(&self, model: &[u8]) -> EngineResult<()>;

    /// Opens a cursor on one entity type.
    fn begin(&self, entity: EntityTypeId, write: bool) -> EngineResult<CursorId>;

    /// Makes the cursor's writes visible. The cursor stays open.
    fn commit(&self, cursor: CursorId) -> EngineResult<()>;

    /// Closes the cursor, discarding uncommitted writes.
    fn close(&self, cursor: CursorId) -> EngineResult<()>;

    /// Returns a fresh object ID for the cursor's entity.
    fn next_id(&self, cursor: CursorId) -> EngineResult<u64>;

    /// Stores a record under `id`, replacing any previous one.
    fn put(&self, cursor: CursorId, id: u64, record: &[u8]) -> EngineResult<()>;

    /// Reads the record stored under `id`.
    fn get(&self, cursor: CursorId, id: u64) -> EngineResult<Option<Vec<u8>>>;

    /// Reads every record in ascending ID order.
    fn get_all(&self, cursor: CursorId) -> EngineResult<Vec<Vec<u8>>>;

    /// Removes the record stored under `id`. Returns false if there was none.
    fn remove(&self, cursor: CursorId, id: u64) -> EngineResult<bool>;

    /// Removes every record. Returns how many were removed.
    fn remove_all(&self, cursor: CursorId) -> EngineResult<u64>;

    /// Number of records visible to the cursor.
    fn count(&self, cursor: CursorId) -> EngineResult<u64>;

    /// Creates a query builder for one entity type.
    fn create_builder(&self, entity: EntityTypeId) -> EngineResult<BuilderId>;

    /// Releases a query builder.
    fn release_builder(&self, builder: BuilderId) -> EngineResult<()>;

    /// Builds a query from an encoded condition list.
    fn build_query(&self, builder: BuilderId, conditions: &[u8]) -> EngineResult<QueryId>;

    /// Runs a query, returning the matching records.
    fn find(&self, query: QueryId, cursor: CursorId) -> EngineResult<Vec<Vec<u8>>>;

    /// Releases a query.
    fn release_query(&self, query: QueryId) -> EngineResult<()>;
}
