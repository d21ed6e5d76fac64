//! Shared fixtures for unit tests.

use crate::binding::{EntityBinding, RecordReader, RecordWriter};
use crate::error::CoreResult;
use slotbox_model::{
    DeclaredEntity, DeclaredModel, DeclaredProperty, MergeConfig, MergeEngine, Model,
    PropertyFlags, PropertyType,
};

/// `Sensor` (entity 1) with properties 1..=7 in declaration order, and
/// `Alarm` (entity 2).
pub fn sensor_model() -> Model {
    let declared = DeclaredModel::new()
        .entity(
            DeclaredEntity::new("Sensor")
                .property(DeclaredProperty::new("id", PropertyType::Long).flags(PropertyFlags::ID))
                .property(DeclaredProperty::new("name", PropertyType::String))
                .property(DeclaredProperty::new("temperature", PropertyType::Double))
                .property(DeclaredProperty::new("level", PropertyType::Int))
                .property(DeclaredProperty::new("tags", PropertyType::StringVector))
                .property(DeclaredProperty::new("payload", PropertyType::ByteVector))
                .property(DeclaredProperty::new("serial", PropertyType::Long).flags(PropertyFlags::UNSIGNED)),
        )
        .entity(
            DeclaredEntity::new("Alarm")
                .property(DeclaredProperty::new("id", PropertyType::Long).flags(PropertyFlags::ID))
                .property(DeclaredProperty::new("level", PropertyType::Int)),
        );
    MergeEngine::new(MergeConfig::new().uid_seed(11))
        .merge(&Model::new(), &declared)
        .unwrap()
        .model
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sensor {
    pub id: u64,
    pub name: String,
    pub temperature: f64,
    pub level: i32,
    pub tags: Vec<String>,
    pub payload: Vec<u8>,
    pub serial: u64,
}

impl Sensor {
    pub fn named(name: &str, level: i32) -> Self {
        Self {
            name: name.to_string(),
            level,
            temperature: f64::from(level) / 2.0,
            ..Self::default()
        }
    }
}

impl EntityBinding for Sensor {
    const ENTITY: &'static str = "Sensor";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn write(&self, record: &mut RecordWriter<'_>) -> CoreResult<()> {
        record.put("id", self.id)?;
        record.put("name", self.name.as_str())?;
        record.put("temperature", self.temperature)?;
        record.put("level", self.level)?;
        record.put("tags", self.tags.clone())?;
        record.put("payload", self.payload.clone())?;
        record.put("serial", self.serial)
    }

    fn read(record: &RecordReader<'_>) -> CoreResult<Self> {
        Ok(Self {
            id: record.get_u64("id")?,
            name: record.get_string("name")?,
            temperature: record.get_float("temperature")?,
            level: record.get_int("level")? as i32,
            tags: record.get_strings("tags")?,
            payload: record.get_bytes("payload")?,
            serial: record.get_u64("serial")?,
        })
    }
}
