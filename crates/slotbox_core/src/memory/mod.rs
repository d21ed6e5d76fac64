//! In-memory reference engine.
//!
//! [`MemoryEngine`] implements the [`Engine`] boundary entirely in process:
//! records are kept per entity in ordered maps, cursors hold their own
//! pending writes until commit, and queries are evaluated by decoding each
//! record through the installed model's slot table.
//!
//! It exists so that the core can be exercised end to end. It does not
//! persist anything.

mod cursor;

use crate::binding::{PropertySlot, SlotMap};
use crate::condition::{decode_conditions, Condition};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::types::{BuilderId, CursorId, EntityTypeId, QueryId};
use crate::value::Value;
use cursor::{CursorState, Records};
use parking_lot::Mutex;
use slotbox_codec::Table;
use slotbox_model::{Model, PropertyFlags};
use std::collections::HashMap;
use tracing::debug;

/// A query compiled against the installed schema.
#[derive(Debug)]
struct CompiledQuery {
    entity: EntityTypeId,
    conditions: Vec<(PropertySlot, Condition)>,
}

impl CompiledQuery {
    fn matches(&self, record: &[u8]) -> bool {
        let table = Table::root(record);
        self.conditions.iter().all(|(property, condition)| {
            let value = Value::read(&table, property.slot, property.property_type);
            condition.matches(&value, property.flags.contains(PropertyFlags::UNSIGNED))
        })
    }
}

#[derive(Debug, Default)]
struct State {
    /// Slot tables by entity ID; `None` until `open`.
    schema: Option<HashMap<EntityTypeId, SlotMap>>,
    records: HashMap<EntityTypeId, Records>,
    cursors: HashMap<CursorId, CursorState>,
    builders: HashMap<BuilderId, EntityTypeId>,
    queries: HashMap<QueryId, CompiledQuery>,
    write_cursor: Option<CursorId>,
    last_handle: u64,
}

impl State {
    fn next_handle(&mut self) -> u64 {
        self.last_handle += 1;
        self.last_handle
    }

    fn schema(&self) -> EngineResult<&HashMap<EntityTypeId, SlotMap>> {
        self.schema
            .as_ref()
            .ok_or_else(|| EngineError::illegal_state("no model installed"))
    }

    fn slots(&self, entity: EntityTypeId) -> EngineResult<&SlotMap> {
        self.schema()?
            .get(&entity)
            .ok_or_else(|| EngineError::new(EngineError::SCHEMA, format!("unknown {entity}")))
    }

    /// The cursor and its entity's committed records.
    fn cursor(&self, id: CursorId) -> EngineResult<(&CursorState, &Records)> {
        let cursor = self
            .cursors
            .get(&id)
            .ok_or_else(|| EngineError::unknown_handle("cursor", id))?;
        let records = self
            .records
            .get(&cursor.entity)
            .ok_or_else(|| EngineError::illegal_state(format!("no records for {}", cursor.entity)))?;
        Ok((cursor, records))
    }

    fn write_cursor(&mut self, id: CursorId) -> EngineResult<(&mut CursorState, &mut Records)> {
        let cursor = self
            .cursors
            .get_mut(&id)
            .ok_or_else(|| EngineError::unknown_handle("cursor", id))?;
        if !cursor.write {
            return Err(EngineError::illegal_state(format!("{id} is read-only")));
        }
        let records = self
            .records
            .get_mut(&cursor.entity)
            .ok_or_else(|| EngineError::illegal_state(format!("no records for {}", cursor.entity)))?;
        Ok((cursor, records))
    }

    fn compile(&self, entity: EntityTypeId, conditions: &[u8]) -> EngineResult<CompiledQuery> {
        let (encoded_entity, conditions) = decode_conditions(conditions)
            .ok_or_else(|| EngineError::illegal_argument("malformed condition list"))?;
        if encoded_entity != entity.as_u32() {
            return Err(EngineError::illegal_argument(format!(
                "conditions for entity:{encoded_entity} passed to a builder of {entity}"
            )));
        }
        let slots = self.slots(entity)?;
        let conditions = conditions
            .into_iter()
            .map(|condition| {
                let property = slots.property_by_id(condition.property_id).ok_or_else(|| {
                    EngineError::new(
                        EngineError::SCHEMA,
                        format!(
                            "entity '{}' has no property #{}",
                            slots.entity_name(),
                            condition.property_id
                        ),
                    )
                })?;
                if let Some(what) = condition.mismatch(property.property_type) {
                    return Err(EngineError::new(
                        EngineError::PROPERTY_TYPE_MISMATCH,
                        format!(
                            "{what} does not apply to '{}' of type {}",
                            property.name, property.property_type
                        ),
                    ));
                }
                Ok((property.clone(), condition))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(CompiledQuery { entity, conditions })
    }
}

/// An [`Engine`] that keeps everything in memory.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Arc::new(MemoryEngine::new());
/// let store = Store::open(engine.clone(), &model, Config::default())?;
/// // ...
/// assert_eq!(engine.live_handles(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
    require_conditions: bool,
}

impl MemoryEngine {
    /// Creates an engine with no model installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine honoring the engine-side settings of `config`.
    #[must_use]
    pub fn with_config(config: &Config) -> Self {
        Self {
            state: Mutex::default(),
            require_conditions: config.require_conditions,
        }
    }

    /// Number of cursors, builders and queries not yet released.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        let state = self.state.lock();
        state.cursors.len() + state.builders.len() + state.queries.len()
    }
}

impl Engine for MemoryEngine {
    fn open(&self, model: &[u8]) -> EngineResult<()> {
        let model = Model::from_binary(model)
            .map_err(|e| EngineError::new(EngineError::SCHEMA, e.to_string()))?;
        if model.entities.is_empty() {
            return Err(EngineError::new(EngineError::SCHEMA, "model has no entities"));
        }
        let mut state = self.state.lock();
        if !state.cursors.is_empty() {
            return Err(EngineError::illegal_state(
                "cannot install a model while cursors are open",
            ));
        }
        let schema: HashMap<EntityTypeId, SlotMap> = model
            .entities
            .iter()
            .map(|entity| {
                let slots = SlotMap::from_entity(entity);
                (slots.entity_id(), slots)
            })
            .collect();
        for entity in schema.keys() {
            state.records.entry(*entity).or_default();
        }
        debug!("Installed model with {} entities", schema.len());
        state.schema = Some(schema);
        Ok(())
    }

    fn begin(&self, entity: EntityTypeId, write: bool) -> EngineResult<CursorId> {
        let mut state = self.state.lock();
        state.slots(entity)?;
        if write && state.write_cursor.is_some() {
            return Err(EngineError::illegal_state("a write cursor is already open"));
        }
        let id = CursorId(state.next_handle());
        state.cursors.insert(id, CursorState::new(entity, write));
        if write {
            state.write_cursor = Some(id);
        }
        Ok(id)
    }

    fn commit(&self, cursor: CursorId) -> EngineResult<()> {
        let mut state = self.state.lock();
        let (cursor, records) = state.write_cursor(cursor)?;
        cursor.commit_into(records);
        Ok(())
    }

    fn close(&self, cursor: CursorId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .cursors
            .remove(&cursor)
            .ok_or_else(|| EngineError::unknown_handle("cursor", cursor))?;
        if state.write_cursor == Some(cursor) {
            state.write_cursor = None;
        }
        Ok(())
    }

    fn next_id(&self, cursor: CursorId) -> EngineResult<u64> {
        let mut state = self.state.lock();
        let (_, records) = state.write_cursor(cursor)?;
        records.last_id += 1;
        Ok(records.last_id)
    }

    fn put(&self, cursor: CursorId, id: u64, record: &[u8]) -> EngineResult<()> {
        if id == 0 {
            return Err(EngineError::illegal_argument("object ID 0 is reserved"));
        }
        let mut state = self.state.lock();
        let (cursor, records) = state.write_cursor(cursor)?;
        // `next_id` stays above every explicit ID, pending or committed.
        records.last_id = records.last_id.max(id);
        cursor.put(id, record.to_vec());
        Ok(())
    }

    fn get(&self, cursor: CursorId, id: u64) -> EngineResult<Option<Vec<u8>>> {
        let state = self.state.lock();
        let (cursor, records) = state.cursor(cursor)?;
        Ok(cursor.get(records, id).map(<[u8]>::to_vec))
    }

    fn get_all(&self, cursor: CursorId) -> EngineResult<Vec<Vec<u8>>> {
        let state = self.state.lock();
        let (cursor, records) = state.cursor(cursor)?;
        Ok(cursor
            .visible(records)
            .into_iter()
            .map(|(_, record)| record.to_vec())
            .collect())
    }

    fn remove(&self, cursor: CursorId, id: u64) -> EngineResult<bool> {
        let mut state = self.state.lock();
        let (cursor, records) = state.write_cursor(cursor)?;
        Ok(cursor.remove(records, id))
    }

    fn remove_all(&self, cursor: CursorId) -> EngineResult<u64> {
        let mut state = self.state.lock();
        let (cursor, records) = state.write_cursor(cursor)?;
        Ok(cursor.remove_all(records))
    }

    fn count(&self, cursor: CursorId) -> EngineResult<u64> {
        let state = self.state.lock();
        let (cursor, records) = state.cursor(cursor)?;
        Ok(cursor.count(records))
    }

    fn create_builder(&self, entity: EntityTypeId) -> EngineResult<BuilderId> {
        let mut state = self.state.lock();
        state.slots(entity)?;
        let id = BuilderId(state.next_handle());
        state.builders.insert(id, entity);
        Ok(id)
    }

    fn release_builder(&self, builder: BuilderId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .builders
            .remove(&builder)
            .map(|_| ())
            .ok_or_else(|| EngineError::unknown_handle("builder", builder))
    }

    fn build_query(&self, builder: BuilderId, conditions: &[u8]) -> EngineResult<QueryId> {
        let mut state = self.state.lock();
        let entity = *state
            .builders
            .get(&builder)
            .ok_or_else(|| EngineError::unknown_handle("builder", builder))?;
        let query = state.compile(entity, conditions)?;
        if self.require_conditions && query.conditions.is_empty() {
            return Err(EngineError::illegal_argument("query has no conditions"));
        }
        let id = QueryId(state.next_handle());
        state.queries.insert(id, query);
        Ok(id)
    }

    fn find(&self, query: QueryId, cursor: CursorId) -> EngineResult<Vec<Vec<u8>>> {
        let state = self.state.lock();
        let compiled = state
            .queries
            .get(&query)
            .ok_or_else(|| EngineError::unknown_handle("query", query))?;
        let (cursor_state, records) = state.cursor(cursor)?;
        if cursor_state.entity != compiled.entity {
            return Err(EngineError::illegal_argument(format!(
                "{query} is for {} but {cursor} is on {}",
                compiled.entity, cursor_state.entity
            )));
        }
        Ok(cursor_state
            .visible(records)
            .into_iter()
            .filter(|(_, record)| compiled.matches(record))
            .map(|(_, record)| record.to_vec())
            .collect())
    }

    fn release_query(&self, query: QueryId) -> EngineResult<()> {
        let mut state = self.state.lock();
        state
            .queries
            .remove(&query)
            .map(|_| ())
            .ok_or_else(|| EngineError::unknown_handle("query", query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::encode;
    use crate::condition::{finish_conditions, ConditionOp, Operand};
    use crate::testing::{sensor_model, Sensor};
    use slotbox_codec::Builder;

    const SENSOR: EntityTypeId = EntityTypeId::new(1);

    fn opened() -> (MemoryEngine, SlotMap) {
        let model = sensor_model();
        let engine = MemoryEngine::new();
        engine.open(&model.to_binary()).unwrap();
        let slots = SlotMap::from_entity(model.entity("Sensor").unwrap());
        (engine, slots)
    }

    fn conditions(conditions: &[Condition]) -> Vec<u8> {
        let mut builder = Builder::new();
        let offsets: Vec<_> = conditions.iter().map(|c| c.encode(&mut builder)).collect();
        finish_conditions(builder, SENSOR.as_u32(), &offsets)
    }

    fn store(engine: &MemoryEngine, slots: &SlotMap, levels: &[i32]) {
        let cursor = engine.begin(SENSOR, true).unwrap();
        for level in levels {
            let mut sensor = Sensor::named(&format!("sensor {level}"), *level);
            sensor.id = engine.next_id(cursor).unwrap();
            engine.put(cursor, sensor.id, &encode(slots, &sensor).unwrap()).unwrap();
        }
        engine.commit(cursor).unwrap();
        engine.close(cursor).unwrap();
    }

    #[test]
    fn nothing_works_before_open() {
        let engine = MemoryEngine::new();
        let err = engine.begin(SENSOR, false).unwrap_err();
        assert_eq!(err.code, EngineError::ILLEGAL_STATE);
    }

    #[test]
    fn garbage_model_is_a_schema_error() {
        let engine = MemoryEngine::new();
        let err = engine.open(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.code, EngineError::SCHEMA);
    }

    #[test]
    fn one_write_cursor_at_a_time() {
        let (engine, _) = opened();
        let first = engine.begin(SENSOR, true).unwrap();
        let err = engine.begin(SENSOR, true).unwrap_err();
        assert_eq!(err.code, EngineError::ILLEGAL_STATE);
        let reader = engine.begin(SENSOR, false).unwrap();
        engine.close(first).unwrap();
        engine.begin(SENSOR, true).unwrap();
        engine.close(reader).unwrap();
    }

    #[test]
    fn writes_are_isolated_until_commit() {
        let (engine, slots) = opened();
        let writer = engine.begin(SENSOR, true).unwrap();
        let id = engine.next_id(writer).unwrap();
        let record = encode(&slots, &Sensor { id, ..Sensor::named("a", 1) }).unwrap();
        engine.put(writer, id, &record).unwrap();

        let reader = engine.begin(SENSOR, false).unwrap();
        assert_eq!(engine.count(writer).unwrap(), 1);
        assert_eq!(engine.count(reader).unwrap(), 0);

        engine.commit(writer).unwrap();
        assert_eq!(engine.get(reader, id).unwrap(), Some(record));
    }

    #[test]
    fn next_id_skips_explicit_pending_ids() {
        let (engine, slots) = opened();
        let writer = engine.begin(SENSOR, true).unwrap();
        let explicit = encode(&slots, &Sensor { id: 7, ..Sensor::named("pinned", 1) }).unwrap();
        engine.put(writer, 7, &explicit).unwrap();

        let fresh = engine.next_id(writer).unwrap();
        assert_eq!(fresh, 8);
        let record = encode(&slots, &Sensor { id: fresh, ..Sensor::named("fresh", 2) }).unwrap();
        engine.put(writer, fresh, &record).unwrap();
        engine.commit(writer).unwrap();

        assert_eq!(engine.get(writer, 7).unwrap(), Some(explicit));
        assert_eq!(engine.count(writer).unwrap(), 2);
    }

    #[test]
    fn find_filters_in_id_order() {
        let (engine, slots) = opened();
        store(&engine, &slots, &[5, 1, 4, 2, 3]);

        let builder = engine.create_builder(SENSOR).unwrap();
        let query = engine
            .build_query(
                builder,
                &conditions(&[Condition::new(ConditionOp::Between, 4, Operand::IntRange(2, 4))]),
            )
            .unwrap();
        let cursor = engine.begin(SENSOR, false).unwrap();
        let found: Vec<u64> = engine
            .find(query, cursor)
            .unwrap()
            .iter()
            .map(|record| slots.record_id(record))
            .collect();
        assert_eq!(found, vec![3, 4, 5]);
    }

    #[test]
    fn type_mismatch_and_unknown_property() {
        let (engine, _) = opened();
        let builder = engine.create_builder(SENSOR).unwrap();

        let wrong_type = conditions(&[Condition::new(
            ConditionOp::Equal,
            2,
            Operand::Int(1),
        )]);
        let err = engine.build_query(builder, &wrong_type).unwrap_err();
        assert_eq!(err.code, EngineError::PROPERTY_TYPE_MISMATCH);

        let missing = conditions(&[Condition::new(ConditionOp::IsNull, 42, Operand::None)]);
        let err = engine.build_query(builder, &missing).unwrap_err();
        assert_eq!(err.code, EngineError::SCHEMA);
    }

    #[test]
    fn condition_less_queries_can_be_refused() {
        let model = sensor_model();
        let engine = MemoryEngine::with_config(&Config::new().require_conditions(true));
        engine.open(&model.to_binary()).unwrap();
        let builder = engine.create_builder(SENSOR).unwrap();
        let err = engine.build_query(builder, &conditions(&[])).unwrap_err();
        assert_eq!(err.code, EngineError::ILLEGAL_ARGUMENT);
    }

    #[test]
    fn released_handles_are_unknown() {
        let (engine, _) = opened();
        let builder = engine.create_builder(SENSOR).unwrap();
        let query = engine.build_query(builder, &conditions(&[])).unwrap();
        assert_eq!(engine.live_handles(), 2);

        engine.release_builder(builder).unwrap();
        engine.release_query(query).unwrap();
        assert_eq!(engine.live_handles(), 0);

        assert_eq!(
            engine.release_query(query).unwrap_err().code,
            EngineError::UNKNOWN_HANDLE
        );
        assert_eq!(
            engine.build_query(builder, &[]).unwrap_err().code,
            EngineError::UNKNOWN_HANDLE
        );
    }

    #[test]
    fn query_and_cursor_must_share_an_entity() {
        let (engine, _) = opened();
        let builder = engine.create_builder(SENSOR).unwrap();
        let query = engine.build_query(builder, &conditions(&[])).unwrap();
        let cursor = engine.begin(EntityTypeId::new(2), false).unwrap();
        assert_eq!(
            engine.find(query, cursor).unwrap_err().code,
            EngineError::ILLEGAL_ARGUMENT
        );
    }
}
