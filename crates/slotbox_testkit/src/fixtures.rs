//! Test fixtures and store helpers.
//!
//! The fixture schema is a small IoT model: `Event` records what a device
//! reported and when, `Reading` holds measured values.

use slotbox_core::{
    Config, CoreResult, EntityBinding, MemoryEngine, RecordReader, RecordWriter, Store,
};
use slotbox_model::{
    DeclaredEntity, DeclaredModel, DeclaredProperty, DeclaredRelation, MergeConfig, MergeEngine,
    Model, PropertyFlags, PropertyType,
};
use std::sync::Arc;

/// Property IDs of `Event`.
pub mod event {
    /// `id`, the object ID.
    pub const ID: u32 = 1;
    /// `device`, a string.
    pub const DEVICE: u32 = 2;
    /// `date`, milliseconds since the epoch.
    pub const DATE: u32 = 3;
}

/// Property IDs of `Reading`.
pub mod reading {
    /// `id`, the object ID.
    pub const ID: u32 = 1;
    /// `date`, milliseconds since the epoch.
    pub const DATE: u32 = 2;
    /// `value`, a double.
    pub const VALUE: u32 = 3;
}

/// Date of the first fixture event.
pub const BASE_DATE: i64 = 1_700_000_000_000;

/// Seed used for UID minting in fixture models.
pub const UID_SEED: u64 = 0x510_7B0C;

/// A device event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Object ID; 0 until stored.
    pub id: u64,
    /// Reporting device.
    pub device: String,
    /// Event time in milliseconds.
    pub date: i64,
}

impl Event {
    /// Creates an unsaved event.
    pub fn new(device: impl Into<String>, date: i64) -> Self {
        Self {
            id: 0,
            device: device.into(),
            date,
        }
    }
}

impl EntityBinding for Event {
    const ENTITY: &'static str = "Event";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn write(&self, record: &mut RecordWriter<'_>) -> CoreResult<()> {
        record.put("id", self.id)?;
        record.put("device", self.device.as_str())?;
        record.put("date", self.date)
    }

    fn read(record: &RecordReader<'_>) -> CoreResult<Self> {
        Ok(Self {
            id: record.get_u64("id")?,
            device: record.get_string("device")?,
            date: record.get_int("date")?,
        })
    }
}

/// A measured value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    /// Object ID; 0 until stored.
    pub id: u64,
    /// Measurement time in milliseconds.
    pub date: i64,
    /// Measured value.
    pub value: f64,
}

impl EntityBinding for Reading {
    const ENTITY: &'static str = "Reading";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn write(&self, record: &mut RecordWriter<'_>) -> CoreResult<()> {
        record.put("id", self.id)?;
        record.put("date", self.date)?;
        record.put("value", self.value)
    }

    fn read(record: &RecordReader<'_>) -> CoreResult<Self> {
        Ok(Self {
            id: record.get_u64("id")?,
            date: record.get_int("date")?,
            value: record.get_float("value")?,
        })
    }
}

/// The declared IoT schema.
pub fn iot_declared() -> DeclaredModel {
    DeclaredModel::new()
        .entity(
            DeclaredEntity::new("Event")
                .property(DeclaredProperty::new("id", PropertyType::Long).flags(PropertyFlags::ID))
                .property(DeclaredProperty::new("device", PropertyType::String))
                .property(DeclaredProperty::new("date", PropertyType::Date))
                .relation(DeclaredRelation::new("readings", "Reading")),
        )
        .entity(
            DeclaredEntity::new("Reading")
                .property(DeclaredProperty::new("id", PropertyType::Long).flags(PropertyFlags::ID))
                .property(DeclaredProperty::new("date", PropertyType::Date).flags(PropertyFlags::INDEXED))
                .property(DeclaredProperty::new("value", PropertyType::Double)),
        )
}

/// A merge engine with deterministic UIDs.
pub fn merge_engine() -> MergeEngine {
    MergeEngine::new(MergeConfig::new().uid_seed(UID_SEED))
}

/// The IoT model, merged from scratch.
pub fn iot_model() -> Model {
    merge_engine()
        .merge(&Model::new(), &iot_declared())
        .expect("IoT fixture schema must merge")
        .model
}

/// `count` unsaved events, `"device 1"` onwards, one second apart.
pub fn events(count: usize) -> Vec<Event> {
    (1..=count)
        .map(|i| Event::new(format!("device {i}"), BASE_DATE + 1000 * i as i64))
        .collect()
}

/// A store on a memory engine whose handles can be inspected.
pub struct TestStore {
    /// The store.
    pub store: Store,
    /// The engine behind the store.
    pub engine: Arc<MemoryEngine>,
}

impl TestStore {
    /// Opens the IoT model with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Opens the IoT model with `config`.
    pub fn with_config(config: Config) -> Self {
        Self::with_model(&iot_model(), config)
    }

    /// Opens `model` with `config`.
    pub fn with_model(model: &Model, config: Config) -> Self {
        let engine = Arc::new(MemoryEngine::with_config(&config));
        let store = Store::open(engine.clone(), model, config).expect("Failed to open test store");
        Self { store, engine }
    }

    /// Stores `count` fixture events and returns them with their IDs.
    pub fn put_events(&self, count: usize) -> Vec<Event> {
        let mut fixtures = events(count);
        self.store
            .entity_box::<Event>()
            .and_then(|event_box| event_box.put_all(&mut fixtures))
            .expect("Failed to store fixture events");
        fixtures
    }

    /// Number of engine handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.engine.live_handles()
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a fresh IoT store.
///
/// # Example
///
/// ```rust,ignore
/// use slotbox_testkit::with_test_store;
///
/// #[test]
/// fn my_test() {
///     with_test_store(|store| {
///         store.put_events(3);
///         // ... test operations
///     });
/// }
/// ```
pub fn with_test_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::new();
    f(&store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_property_ids_match_the_model() {
        let model = iot_model();
        let event_entity = model.entity("Event").unwrap();
        assert_eq!(event_entity.property("device").unwrap().id.id(), event::DEVICE);
        assert_eq!(event_entity.property("date").unwrap().id.id(), event::DATE);
        let reading_entity = model.entity("Reading").unwrap();
        assert_eq!(reading_entity.property("value").unwrap().id.id(), reading::VALUE);
        assert!(reading_entity.property("date").unwrap().index_id.is_some());
    }

    #[test]
    fn put_events_assigns_ids() {
        with_test_store(|store| {
            let events = store.put_events(3);
            assert_eq!(
                events.iter().map(|e| e.id).collect::<Vec<_>>(),
                vec![1, 2, 3]
            );
            assert_eq!(events[1].device, "device 2");
            assert_eq!(store.live_handles(), 0);
        });
    }
}
