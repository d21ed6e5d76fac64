//! Mapping between application objects and stored records.
//!
//! A record is a codec table whose slot `n` holds the property with ID
//! `n + 1`. [`SlotMap`] resolves property names and IDs to slots and types
//! for one entity; [`RecordWriter`] and [`RecordReader`] use it so that
//! [`EntityBinding`] implementations only deal in property names.

use crate::error::{CoreError, CoreResult};
use crate::types::EntityTypeId;
use crate::value::Value;
use slotbox_codec::{Builder, Table};
use slotbox_model::{Entity, PropertyFlags, PropertyType};

/// Slot and type of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySlot {
    /// Property ID within the entity.
    pub id: u32,
    /// Property name.
    pub name: String,
    /// Record slot, `id - 1`.
    pub slot: u16,
    /// Storage type.
    pub property_type: PropertyType,
    /// Flags.
    pub flags: PropertyFlags,
}

/// Property-to-slot table of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMap {
    entity_id: EntityTypeId,
    entity_name: String,
    properties: Vec<PropertySlot>,
}

impl SlotMap {
    /// Builds the slot table of a model entity.
    #[must_use]
    pub fn from_entity(entity: &Entity) -> Self {
        let properties = entity
            .properties
            .iter()
            .map(|p| PropertySlot {
                id: p.id.id(),
                name: p.name.clone(),
                slot: p.slot(),
                property_type: p.property_type,
                flags: p.flags,
            })
            .collect();
        Self {
            entity_id: EntityTypeId::new(entity.id.id()),
            entity_name: entity.name.clone(),
            properties,
        }
    }

    /// The entity's type ID.
    #[must_use]
    pub fn entity_id(&self) -> EntityTypeId {
        self.entity_id
    }

    /// The entity's name.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// All properties in model order.
    #[must_use]
    pub fn properties(&self) -> &[PropertySlot] {
        &self.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySlot> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks up a property by ID.
    #[must_use]
    pub fn property_by_id(&self, id: u32) -> Option<&PropertySlot> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// The primary ID property.
    #[must_use]
    pub fn id_property(&self) -> Option<&PropertySlot> {
        self.properties
            .iter()
            .find(|p| p.flags.contains(PropertyFlags::ID))
    }

    /// Like [`Self::property`], but failing with a descriptive error.
    pub fn require(&self, name: &str) -> CoreResult<&PropertySlot> {
        self.property(name)
            .ok_or_else(|| CoreError::property_not_found(&self.entity_name, name))
    }

    /// Like [`Self::property_by_id`], but failing with a descriptive error.
    pub fn require_id(&self, id: u32) -> CoreResult<&PropertySlot> {
        self.property_by_id(id)
            .ok_or_else(|| CoreError::property_not_found(&self.entity_name, format!("#{id}")))
    }

    /// Reads the object ID from a record. Records without one read as 0.
    #[must_use]
    pub fn record_id(&self, record: &[u8]) -> u64 {
        match self.id_property() {
            Some(id) => Table::root(record).get_slot::<u64>(id.slot, 0),
            None => 0,
        }
    }
}

/// Writes one record, addressing properties by name.
#[derive(Debug)]
pub struct RecordWriter<'a> {
    slots: &'a SlotMap,
    builder: Builder,
}

impl<'a> RecordWriter<'a> {
    /// Starts a record for the entity described by `slots`.
    #[must_use]
    pub fn new(slots: &'a SlotMap) -> Self {
        let mut builder = Builder::new();
        builder.start_table();
        Self { slots, builder }
    }

    /// Writes a property. Null values are skipped.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> CoreResult<()> {
        let property = self.slots.require(name)?;
        let value = value.into();
        if value.write(&mut self.builder, property.slot, property.property_type) {
            Ok(())
        } else {
            Err(CoreError::type_mismatch(
                format!("writing {value}"),
                name,
                property.property_type,
            ))
        }
    }

    /// Finishes the record and returns its bytes.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        let root = self.builder.end_table();
        self.builder.finish(root)
    }
}

/// Reads one record, addressing properties by name.
///
/// Properties missing from the record read as their type's zero value.
#[derive(Debug, Clone, Copy)]
pub struct RecordReader<'a> {
    slots: &'a SlotMap,
    table: Table<'a>,
}

impl<'a> RecordReader<'a> {
    /// Opens a record of the entity described by `slots`.
    #[must_use]
    pub fn new(slots: &'a SlotMap, record: &'a [u8]) -> Self {
        Self {
            slots,
            table: Table::root(record),
        }
    }

    /// Reads a property as a [`Value`].
    pub fn value(&self, name: &str) -> CoreResult<Value> {
        let property = self.slots.require(name)?;
        Ok(Value::read(&self.table, property.slot, property.property_type))
    }

    /// The property type is checked first, so an absent slot never hides a
    /// mismatch.
    fn typed<T>(
        &self,
        name: &str,
        wanted: &str,
        accepts: fn(PropertyType) -> bool,
        f: impl FnOnce(&Value) -> Option<T>,
    ) -> CoreResult<T> {
        let property = self.slots.require(name)?;
        let mismatch =
            || CoreError::type_mismatch(format!("reading {wanted}"), name, property.property_type);
        if !accepts(property.property_type) {
            return Err(mismatch());
        }
        let value = Value::read(&self.table, property.slot, property.property_type);
        f(&value).ok_or_else(mismatch)
    }

    /// Reads a boolean property.
    pub fn get_bool(&self, name: &str) -> CoreResult<bool> {
        self.typed(name, "bool", PropertyType::is_integer, |v| v.as_int().map(|i| i != 0))
    }

    /// Reads an integer property of any width.
    pub fn get_int(&self, name: &str) -> CoreResult<i64> {
        self.typed(name, "integer", PropertyType::is_integer, Value::as_int)
    }

    /// Reads a 64-bit unsigned property, such as an object ID.
    pub fn get_u64(&self, name: &str) -> CoreResult<u64> {
        self.typed(name, "integer", PropertyType::is_integer, |v| v.as_int().map(|i| i as u64))
    }

    /// Reads a floating point property.
    pub fn get_float(&self, name: &str) -> CoreResult<f64> {
        self.typed(name, "float", PropertyType::is_floating, Value::as_float)
    }

    /// Reads a string property.
    pub fn get_string(&self, name: &str) -> CoreResult<String> {
        self.typed(name, "string", |t| t == PropertyType::String, |v| v.as_str().map(str::to_string))
    }

    /// Reads a byte vector property.
    pub fn get_bytes(&self, name: &str) -> CoreResult<Vec<u8>> {
        self.typed(name, "bytes", |t| t == PropertyType::ByteVector, |v| v.as_bytes().map(<[u8]>::to_vec))
    }

    /// Reads a string vector property.
    pub fn get_strings(&self, name: &str) -> CoreResult<Vec<String>> {
        self.typed(name, "strings", |t| t == PropertyType::StringVector, |v| v.as_strings().map(<[String]>::to_vec))
    }
}

/// An application type stored as records of one entity.
///
/// Usually generated from the declared schema.
///
/// ```rust,ignore
/// impl EntityBinding for Event {
///     const ENTITY: &'static str = "Event";
///
///     fn id(&self) -> u64 { self.id }
///     fn set_id(&mut self, id: u64) { self.id = id }
///
///     fn write(&self, record: &mut RecordWriter<'_>) -> CoreResult<()> {
///         record.put("id", self.id)?;
///         record.put("device", self.device.as_str())
///     }
///
///     fn read(record: &RecordReader<'_>) -> CoreResult<Self> {
///         Ok(Self { id: record.get_u64("id")?, device: record.get_string("device")? })
///     }
/// }
/// ```
pub trait EntityBinding: Sized {
    /// Name of the entity in the model.
    const ENTITY: &'static str;

    /// The object's ID; 0 for an object that was never stored.
    fn id(&self) -> u64;

    /// Sets the object's ID after it was assigned on put.
    fn set_id(&mut self, id: u64);

    /// Writes every property.
    fn write(&self, record: &mut RecordWriter<'_>) -> CoreResult<()>;

    /// Reads an object back.
    fn read(record: &RecordReader<'_>) -> CoreResult<Self>;
}

/// Encodes an object with its binding.
pub fn encode<T: EntityBinding>(slots: &SlotMap, object: &T) -> CoreResult<Vec<u8>> {
    let mut writer = RecordWriter::new(slots);
    object.write(&mut writer)?;
    Ok(writer.finish())
}

/// Decodes an object with its binding.
pub fn decode<T: EntityBinding>(slots: &SlotMap, record: &[u8]) -> CoreResult<T> {
    T::read(&RecordReader::new(slots, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbox_model::{IdUid, Property};

    fn event_entity() -> Entity {
        let property = |id: u32, name: &str, property_type, flags| Property {
            id: IdUid::new(id, 100 + u64::from(id)),
            name: name.to_string(),
            property_type,
            flags,
            index_id: None,
        };
        Entity {
            id: IdUid::new(1, 1),
            last_property_id: IdUid::new(4, 104),
            name: "Event".into(),
            properties: vec![
                property(1, "id", PropertyType::Long, PropertyFlags::ID),
                property(2, "device", PropertyType::String, PropertyFlags::NONE),
                property(4, "date", PropertyType::Date, PropertyFlags::NONE),
            ],
            relations: Vec::new(),
        }
    }

    #[test]
    fn slots_follow_property_ids() {
        let slots = SlotMap::from_entity(&event_entity());
        assert_eq!(slots.entity_id(), EntityTypeId::new(1));
        assert_eq!(slots.property("device").unwrap().slot, 1);
        assert_eq!(slots.property("date").unwrap().slot, 3);
        assert_eq!(slots.id_property().unwrap().name, "id");
        assert!(slots.require_id(3).is_err());
    }

    #[test]
    fn write_and_read_by_name() {
        let slots = SlotMap::from_entity(&event_entity());
        let mut writer = RecordWriter::new(&slots);
        writer.put("id", 7u64).unwrap();
        writer.put("device", "device 1").unwrap();
        let record = writer.finish();

        let reader = RecordReader::new(&slots, &record);
        assert_eq!(reader.get_u64("id").unwrap(), 7);
        assert_eq!(reader.get_string("device").unwrap(), "device 1");
        // Never written: zero value.
        assert_eq!(reader.get_int("date").unwrap(), 0);
        assert_eq!(slots.record_id(&record), 7);
    }

    #[test]
    fn unknown_and_mismatched_properties() {
        let slots = SlotMap::from_entity(&event_entity());
        let mut writer = RecordWriter::new(&slots);
        assert!(matches!(
            writer.put("missing", 1),
            Err(CoreError::PropertyNotFound { .. })
        ));
        assert!(matches!(
            writer.put("date", "yesterday"),
            Err(CoreError::TypeMismatch { .. })
        ));
        let record = writer.finish();
        let reader = RecordReader::new(&slots, &record);
        assert!(matches!(
            reader.get_string("date"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(reader.get_float("device").is_err());
        assert!(reader.get_bytes("device").is_err());
        assert!(reader.get_int("device").is_err());
        // Absent but of the asked type: zero value.
        assert_eq!(reader.get_string("device").unwrap(), "");
        assert_eq!(reader.get_int("date").unwrap(), 0);
    }

    #[test]
    fn out_of_range_integer_is_a_type_mismatch() {
        let model = crate::testing::sensor_model();
        let slots = SlotMap::from_entity(model.entity("Sensor").unwrap());
        let mut writer = RecordWriter::new(&slots);
        assert!(matches!(
            writer.put("level", 1i64 << 40),
            Err(CoreError::TypeMismatch { .. })
        ));
        writer.put("level", -5).unwrap();
        let record = writer.finish();
        assert_eq!(RecordReader::new(&slots, &record).get_int("level").unwrap(), -5);
    }
}
