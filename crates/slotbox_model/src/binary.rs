//! Binary model encoding handed to the storage engine.
//!
//! The engine learns entities, property types and record slots from this
//! buffer. Scalars are written unconditionally; optional identities (indexes,
//! counters) are only written when set.

use crate::entity::Entity;
use crate::error::ModelResult;
use crate::id::IdUid;
use crate::model::Model;
use crate::property::{Property, PropertyFlags, PropertyType};
use crate::relation::Relation;
use slotbox_codec::{Builder, Offset, Table};

mod slots {
    pub mod model {
        pub const ENTITIES: u16 = 0;
        pub const LAST_ENTITY_ID: u16 = 1;
        pub const LAST_ENTITY_UID: u16 = 2;
        pub const LAST_INDEX_ID: u16 = 3;
        pub const LAST_INDEX_UID: u16 = 4;
        pub const LAST_RELATION_ID: u16 = 5;
        pub const LAST_RELATION_UID: u16 = 6;
        pub const MODEL_VERSION: u16 = 7;
    }

    pub mod entity {
        pub const ID: u16 = 0;
        pub const UID: u16 = 1;
        pub const NAME: u16 = 2;
        pub const PROPERTIES: u16 = 3;
        pub const RELATIONS: u16 = 4;
        pub const LAST_PROPERTY_ID: u16 = 5;
        pub const LAST_PROPERTY_UID: u16 = 6;
    }

    pub mod property {
        pub const ID: u16 = 0;
        pub const UID: u16 = 1;
        pub const NAME: u16 = 2;
        pub const TYPE: u16 = 3;
        pub const FLAGS: u16 = 4;
        pub const INDEX_ID: u16 = 5;
        pub const INDEX_UID: u16 = 6;
    }

    pub mod relation {
        pub const ID: u16 = 0;
        pub const UID: u16 = 1;
        pub const NAME: u16 = 2;
        pub const TARGET_ID: u16 = 3;
        pub const TARGET_UID: u16 = 4;
    }
}

impl Model {
    /// Encodes the model for the storage engine.
    #[must_use]
    pub fn to_binary(&self) -> Vec<u8> {
        let mut builder = Builder::new();
        let entities: Vec<Offset> = self
            .entities
            .iter()
            .map(|entity| write_entity(&mut builder, entity))
            .collect();
        let entities = builder.create_offset_vector(&entities);

        builder.start_table();
        builder.set_offset_slot(slots::model::ENTITIES, entities);
        set_id_uid(
            &mut builder,
            slots::model::LAST_ENTITY_ID,
            slots::model::LAST_ENTITY_UID,
            self.last_entity_id,
        );
        set_id_uid(
            &mut builder,
            slots::model::LAST_INDEX_ID,
            slots::model::LAST_INDEX_UID,
            self.last_index_id,
        );
        set_id_uid(
            &mut builder,
            slots::model::LAST_RELATION_ID,
            slots::model::LAST_RELATION_UID,
            self.last_relation_id,
        );
        builder.set_slot::<u32>(slots::model::MODEL_VERSION, self.model_version);
        let root = builder.end_table();
        builder.finish(root)
    }

    /// Decodes and validates a model produced by [`Model::to_binary`].
    ///
    /// Retired UIDs are not part of the binary form.
    pub fn from_binary(bytes: &[u8]) -> ModelResult<Self> {
        let table = Table::root(bytes);
        let mut model = Self::new();
        model.entities = table
            .get_table_vector_slot(slots::model::ENTITIES)
            .iter()
            .map(read_entity)
            .collect::<ModelResult<_>>()?;
        model.last_entity_id = get_id_uid(
            &table,
            slots::model::LAST_ENTITY_ID,
            slots::model::LAST_ENTITY_UID,
        );
        model.last_index_id = get_id_uid(
            &table,
            slots::model::LAST_INDEX_ID,
            slots::model::LAST_INDEX_UID,
        );
        model.last_relation_id = get_id_uid(
            &table,
            slots::model::LAST_RELATION_ID,
            slots::model::LAST_RELATION_UID,
        );
        model.model_version = table.get_slot::<u32>(slots::model::MODEL_VERSION, 0);
        model.validate()?;
        Ok(model)
    }
}

fn set_id_uid(builder: &mut Builder, id_slot: u16, uid_slot: u16, value: IdUid) {
    if value.is_unset() {
        return;
    }
    builder.set_slot::<u32>(id_slot, value.id());
    builder.set_slot::<u64>(uid_slot, value.uid());
}

fn get_id_uid(table: &Table<'_>, id_slot: u16, uid_slot: u16) -> IdUid {
    IdUid::new(
        table.get_slot::<u32>(id_slot, 0),
        table.get_slot::<u64>(uid_slot, 0),
    )
}

fn write_entity(builder: &mut Builder, entity: &Entity) -> Offset {
    let properties: Vec<Offset> = entity
        .properties
        .iter()
        .map(|property| write_property(builder, property))
        .collect();
    let properties = builder.create_offset_vector(&properties);
    let relations: Vec<Offset> = entity
        .relations
        .iter()
        .map(|relation| write_relation(builder, relation))
        .collect();
    let relations = builder.create_offset_vector(&relations);
    let name = builder.create_string_offset(&entity.name);

    builder.start_table();
    builder.set_slot::<u32>(slots::entity::ID, entity.id.id());
    builder.set_slot::<u64>(slots::entity::UID, entity.id.uid());
    builder.set_offset_slot(slots::entity::NAME, name);
    builder.set_offset_slot(slots::entity::PROPERTIES, properties);
    builder.set_offset_slot(slots::entity::RELATIONS, relations);
    set_id_uid(
        builder,
        slots::entity::LAST_PROPERTY_ID,
        slots::entity::LAST_PROPERTY_UID,
        entity.last_property_id,
    );
    builder.end_table()
}

fn write_property(builder: &mut Builder, property: &Property) -> Offset {
    let name = builder.create_string_offset(&property.name);
    builder.start_table();
    builder.set_slot::<u32>(slots::property::ID, property.id.id());
    builder.set_slot::<u64>(slots::property::UID, property.id.uid());
    builder.set_offset_slot(slots::property::NAME, name);
    builder.set_slot::<u16>(slots::property::TYPE, property.property_type.into());
    builder.set_slot::<u32>(slots::property::FLAGS, property.flags.bits());
    if let Some(index_id) = property.index_id {
        set_id_uid(
            builder,
            slots::property::INDEX_ID,
            slots::property::INDEX_UID,
            index_id,
        );
    }
    builder.end_table()
}

fn write_relation(builder: &mut Builder, relation: &Relation) -> Offset {
    let name = builder.create_string_offset(relation.name());
    builder.start_table();
    builder.set_slot::<u32>(slots::relation::ID, relation.id().id());
    builder.set_slot::<u64>(slots::relation::UID, relation.id().uid());
    builder.set_offset_slot(slots::relation::NAME, name);
    builder.set_slot::<u32>(slots::relation::TARGET_ID, relation.target_id().id());
    builder.set_slot::<u64>(slots::relation::TARGET_UID, relation.target_id().uid());
    builder.end_table()
}

fn read_entity(table: &Table<'_>) -> ModelResult<Entity> {
    let properties = table
        .get_table_vector_slot(slots::entity::PROPERTIES)
        .iter()
        .map(read_property)
        .collect::<ModelResult<_>>()?;
    let relations = table
        .get_table_vector_slot(slots::entity::RELATIONS)
        .iter()
        .map(read_relation)
        .collect::<ModelResult<_>>()?;

    Ok(Entity {
        id: get_id_uid(table, slots::entity::ID, slots::entity::UID),
        last_property_id: get_id_uid(
            table,
            slots::entity::LAST_PROPERTY_ID,
            slots::entity::LAST_PROPERTY_UID,
        ),
        name: table.get_string_slot(slots::entity::NAME).to_string(),
        properties,
        relations,
    })
}

fn read_property(table: &Table<'_>) -> ModelResult<Property> {
    let name = table.get_string_slot(slots::property::NAME).to_string();
    let raw_type = table.get_slot::<u16>(slots::property::TYPE, 0);
    let property_type = PropertyType::try_from(raw_type)
        .map_err(|reason| crate::ModelError::invalid(format!("property '{name}'"), reason))?;
    let index_id = get_id_uid(table, slots::property::INDEX_ID, slots::property::INDEX_UID);

    Ok(Property {
        id: get_id_uid(table, slots::property::ID, slots::property::UID),
        name,
        property_type,
        flags: PropertyFlags::from_bits(table.get_slot::<u32>(slots::property::FLAGS, 0)),
        index_id: (!index_id.is_unset()).then_some(index_id),
    })
}

fn read_relation(table: &Table<'_>) -> ModelResult<Relation> {
    Relation::new(
        get_id_uid(table, slots::relation::ID, slots::relation::UID),
        table.get_string_slot(slots::relation::NAME),
        get_id_uid(table, slots::relation::TARGET_ID, slots::relation::TARGET_UID),
    )
}
