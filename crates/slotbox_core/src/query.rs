//! Query condition builder and result materializer.
//!
//! A [`QueryBuilder`] owns an engine-side builder handle and accumulates
//! encoded conditions. Repeated condition calls are conjunctive. `build`
//! hands the encoded list to the engine and returns a [`Query`], which runs
//! against a [`Cursor`] and materializes every match.
//!
//! Both handles are released exactly once: by `destroy`, or on drop.
//!
//! ```rust,ignore
//! let mut builder = store.query::<Event>()?;
//! builder.string_equal(2, "device 2", false)?;
//! let query = builder.build_and_destroy()?;
//! let events = store.run_with_cursor("Event", false, |cursor| query.find(cursor))?;
//! ```

use crate::binding::{decode, EntityBinding, SlotMap};
use crate::condition::{finish_conditions, Condition, ConditionOp, Operand};
use crate::config::Config;
use crate::cursor::Cursor;
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::types::{BuilderId, QueryId};
use slotbox_codec::{Builder, Offset};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

/// Accumulates conditions for one query on entity `T`.
///
/// Properties are referenced by their model ID. Every condition method
/// fails with [`CoreError::Released`] after [`QueryBuilder::destroy`].
pub struct QueryBuilder<T> {
    engine: Arc<dyn Engine>,
    handle: Option<BuilderId>,
    slots: Arc<SlotMap>,
    config: Config,
    codec: Builder,
    conditions: Vec<Offset>,
    described: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: EntityBinding> QueryBuilder<T> {
    /// Creates a builder for the entity described by `slots`.
    pub fn new(engine: Arc<dyn Engine>, slots: Arc<SlotMap>, config: Config) -> CoreResult<Self> {
        let handle = engine.create_builder(slots.entity_id())?;
        Ok(Self {
            engine,
            handle: Some(handle),
            slots,
            config,
            codec: Builder::new(),
            conditions: Vec::new(),
            described: Vec::new(),
            _marker: PhantomData,
        })
    }

    /// Number of conditions added so far.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Returns true once the builder was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.handle.is_none()
    }

    fn handle(&self) -> CoreResult<BuilderId> {
        self.handle.ok_or_else(|| CoreError::released("query builder"))
    }

    fn add(&mut self, condition: Condition) -> CoreResult<&mut Self> {
        self.handle()?;
        let property = self.slots.require_id(condition.property_id)?;
        if let Some(what) = condition.mismatch(property.property_type) {
            return Err(CoreError::type_mismatch(
                what,
                &property.name,
                property.property_type,
            ));
        }
        self.described.push(format!("{} ({condition})", property.name));
        let offset = condition.encode(&mut self.codec);
        self.conditions.push(offset);
        Ok(self)
    }

    fn int(&mut self, op: ConditionOp, property: u32, value: i64) -> CoreResult<&mut Self> {
        self.add(Condition::new(op, property, Operand::Int(value)))
    }

    fn string(
        &mut self,
        op: ConditionOp,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.add(
            Condition::new(op, property, Operand::String(value.to_string()))
                .case_sensitive(case_sensitive),
        )
    }

    fn bytes(&mut self, op: ConditionOp, property: u32, value: &[u8]) -> CoreResult<&mut Self> {
        self.add(Condition::new(op, property, Operand::Bytes(value.to_vec())))
    }

    /// Property is null.
    pub fn is_null(&mut self, property: u32) -> CoreResult<&mut Self> {
        self.add(Condition::new(ConditionOp::IsNull, property, Operand::None))
    }

    /// Property is not null.
    pub fn not_null(&mut self, property: u32) -> CoreResult<&mut Self> {
        self.add(Condition::new(ConditionOp::NotNull, property, Operand::None))
    }

    /// Integer property equals `value`.
    pub fn int_equal(&mut self, property: u32, value: i64) -> CoreResult<&mut Self> {
        self.int(ConditionOp::Equal, property, value)
    }

    /// Integer property differs from `value`.
    pub fn int_not_equal(&mut self, property: u32, value: i64) -> CoreResult<&mut Self> {
        self.int(ConditionOp::NotEqual, property, value)
    }

    /// Integer property is greater than `value`.
    pub fn int_greater(&mut self, property: u32, value: i64) -> CoreResult<&mut Self> {
        self.int(ConditionOp::Greater, property, value)
    }

    /// Integer property is less than `value`.
    pub fn int_less(&mut self, property: u32, value: i64) -> CoreResult<&mut Self> {
        self.int(ConditionOp::Less, property, value)
    }

    /// Integer property lies in `[low, high]`.
    pub fn int_between(&mut self, property: u32, low: i64, high: i64) -> CoreResult<&mut Self> {
        self.add(Condition::new(
            ConditionOp::Between,
            property,
            Operand::IntRange(low, high),
        ))
    }

    /// Integer property is one of `values`.
    pub fn int_in(&mut self, property: u32, values: &[i64]) -> CoreResult<&mut Self> {
        self.add(Condition::new(
            ConditionOp::In,
            property,
            Operand::Ints(values.to_vec()),
        ))
    }

    /// String property equals `value`.
    pub fn string_equal(
        &mut self,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.string(ConditionOp::Equal, property, value, case_sensitive)
    }

    /// String property differs from `value`.
    pub fn string_not_equal(
        &mut self,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.string(ConditionOp::NotEqual, property, value, case_sensitive)
    }

    /// String property contains `value`; for string vectors, has it as an
    /// element.
    pub fn string_contains(
        &mut self,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.string(ConditionOp::Contains, property, value, case_sensitive)
    }

    /// String property starts with `value`.
    pub fn string_starts_with(
        &mut self,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.string(ConditionOp::StartsWith, property, value, case_sensitive)
    }

    /// String property ends with `value`.
    pub fn string_ends_with(
        &mut self,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.string(ConditionOp::EndsWith, property, value, case_sensitive)
    }

    /// String property sorts after `value`.
    pub fn string_greater(
        &mut self,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.string(ConditionOp::Greater, property, value, case_sensitive)
    }

    /// String property sorts before `value`.
    pub fn string_less(
        &mut self,
        property: u32,
        value: &str,
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        self.string(ConditionOp::Less, property, value, case_sensitive)
    }

    /// String property is one of `values`.
    pub fn string_in(
        &mut self,
        property: u32,
        values: &[&str],
        case_sensitive: bool,
    ) -> CoreResult<&mut Self> {
        let values = values.iter().map(|s| (*s).to_string()).collect();
        self.add(
            Condition::new(ConditionOp::In, property, Operand::Strings(values))
                .case_sensitive(case_sensitive),
        )
    }

    /// Floating point property is greater than `value`.
    pub fn double_greater(&mut self, property: u32, value: f64) -> CoreResult<&mut Self> {
        self.add(Condition::new(ConditionOp::Greater, property, Operand::Float(value)))
    }

    /// Floating point property is less than `value`.
    pub fn double_less(&mut self, property: u32, value: f64) -> CoreResult<&mut Self> {
        self.add(Condition::new(ConditionOp::Less, property, Operand::Float(value)))
    }

    /// Floating point property lies in `[low, high]`.
    pub fn double_between(&mut self, property: u32, low: f64, high: f64) -> CoreResult<&mut Self> {
        self.add(Condition::new(
            ConditionOp::Between,
            property,
            Operand::FloatRange(low, high),
        ))
    }

    /// Byte vector property equals `value`.
    pub fn bytes_equal(&mut self, property: u32, value: &[u8]) -> CoreResult<&mut Self> {
        self.bytes(ConditionOp::Equal, property, value)
    }

    /// Byte vector property sorts after `value`.
    pub fn bytes_greater(&mut self, property: u32, value: &[u8]) -> CoreResult<&mut Self> {
        self.bytes(ConditionOp::Greater, property, value)
    }

    /// Byte vector property sorts before `value`.
    pub fn bytes_less(&mut self, property: u32, value: &[u8]) -> CoreResult<&mut Self> {
        self.bytes(ConditionOp::Less, property, value)
    }

    /// Builds a query from the conditions added so far.
    ///
    /// The builder stays usable; more conditions can be added and another
    /// query built.
    pub fn build(&mut self) -> CoreResult<Query<T>> {
        let handle = self.handle()?;
        let entity = self.slots.entity_id();
        let bytes = finish_conditions(self.codec.clone(), entity.as_u32(), &self.conditions);
        let description = self.describe();
        if self.config.logs_queries() {
            info!(
                "Building query on {} with {} condition(s)",
                self.slots.entity_name(),
                self.conditions.len()
            );
            if self.config.logs_query_parameters() {
                for condition in &self.described {
                    info!("  {}", condition);
                }
            }
        }
        let id = self.engine.build_query(handle, &bytes)?;
        Ok(Query {
            engine: Arc::clone(&self.engine),
            handle: Some(id),
            slots: Arc::clone(&self.slots),
            config: self.config.clone(),
            description,
            _marker: PhantomData,
        })
    }

    /// Builds the query and destroys the builder.
    ///
    /// The builder is destroyed even if building fails.
    pub fn build_and_destroy(mut self) -> CoreResult<Query<T>> {
        let built = self.build();
        let destroyed = self.destroy();
        let query = built?;
        destroyed?;
        Ok(query)
    }

    /// Releases the engine-side builder. Later calls are no-ops.
    pub fn destroy(&mut self) -> CoreResult<()> {
        if let Some(handle) = self.handle.take() {
            self.engine.release_builder(handle)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        if self.described.is_empty() {
            format!("all {}", self.slots.entity_name())
        } else {
            format!("{} where {}", self.slots.entity_name(), self.described.join(" and "))
        }
    }
}

impl<T> Drop for QueryBuilder<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.engine.release_builder(handle) {
                warn!("Failed to release {}: {}", handle, e);
            }
        }
    }
}

impl<T> std::fmt::Debug for QueryBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("entity", &self.slots.entity_name())
            .field("handle", &self.handle)
            .field("conditions", &self.described)
            .finish_non_exhaustive()
    }
}

/// A built query on entity `T`.
pub struct Query<T> {
    engine: Arc<dyn Engine>,
    handle: Option<QueryId>,
    slots: Arc<SlotMap>,
    config: Config,
    description: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: EntityBinding> Query<T> {
    fn handle(&self) -> CoreResult<QueryId> {
        self.handle.ok_or_else(|| CoreError::released("query"))
    }

    /// Human readable form of the conditions.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runs the query and returns the raw records in engine order.
    pub fn find_bytes(&self, cursor: &Cursor) -> CoreResult<Vec<Vec<u8>>> {
        let handle = self.handle()?;
        cursor.ensure_entity(self.slots.entity_id())?;
        let records = self.engine.find(handle, cursor.id())?;
        if self.config.logs_queries() {
            info!("Query {} matched {} record(s)", self.description, records.len());
        }
        Ok(records)
    }

    /// Runs the query and decodes every match.
    pub fn find(&self, cursor: &Cursor) -> CoreResult<Vec<T>> {
        self.find_bytes(cursor)?
            .iter()
            .map(|record| decode(&self.slots, record))
            .collect()
    }

    /// Runs the query and returns the IDs of the matches.
    pub fn find_ids(&self, cursor: &Cursor) -> CoreResult<Vec<u64>> {
        Ok(self
            .find_bytes(cursor)?
            .iter()
            .map(|record| self.slots.record_id(record))
            .collect())
    }

    /// Number of matches.
    pub fn count(&self, cursor: &Cursor) -> CoreResult<u64> {
        Ok(self.find_bytes(cursor)?.len() as u64)
    }

    /// Releases the engine-side query. Later calls are no-ops.
    pub fn destroy(&mut self) -> CoreResult<()> {
        if let Some(handle) = self.handle.take() {
            self.engine.release_query(handle)?;
        }
        Ok(())
    }
}

impl<T> Drop for Query<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.engine.release_query(handle) {
                warn!("Failed to release {}: {}", handle, e);
            }
        }
    }
}

impl<T> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("handle", &self.handle)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
