//! # SlotBox Core
//!
//! The binding between application objects and a storage engine driven by
//! a binary schema.
//!
//! This crate provides:
//! - The [`Engine`] boundary: opaque handles in, encoded buffers out
//! - Scoped cursors, query builders and queries that release their engine
//!   handles exactly once
//! - The query condition builder and result materializer
//! - Typed entity boxes over [`EntityBinding`] implementations
//! - [`MemoryEngine`], an in-process reference engine
//!
//! ## Example
//!
//! ```rust,ignore
//! use slotbox_core::{Config, Store};
//!
//! let store = Store::open_in_memory(&model, Config::default())?;
//! let events = store.entity_box::<Event>()?;
//! events.put_all(&mut fixtures)?;
//!
//! let mut builder = events.query()?;
//! builder.int_between(3, from, to)?;
//! let query = builder.build_and_destroy()?;
//! let found = store.run_with_cursor("Event", false, |cursor| query.find(cursor))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binding;
mod condition;
mod config;
mod cursor;
mod engine;
mod entity_box;
mod error;
mod memory;
mod query;
mod store;
mod types;
mod value;

#[cfg(test)]
mod testing;

pub use binding::{decode, encode, EntityBinding, PropertySlot, RecordReader, RecordWriter, SlotMap};
pub use condition::{decode_conditions, finish_conditions, Condition, ConditionOp, Operand};
pub use config::{Config, DebugFlags};
pub use cursor::{with_cursor, Cursor};
pub use engine::Engine;
pub use entity_box::EntityBox;
pub use error::{CoreError, CoreResult, EngineError, EngineResult};
pub use memory::MemoryEngine;
pub use query::{Query, QueryBuilder};
pub use store::Store;
pub use types::{BuilderId, CursorId, EntityTypeId, QueryId};
pub use value::Value;

// Re-export the schema types applications need alongside the store.
pub use slotbox_model::{Model, PropertyFlags, PropertyType};
