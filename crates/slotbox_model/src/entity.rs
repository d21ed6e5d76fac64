//! Entities: named record types.

use crate::error::{ModelError, ModelResult};
use crate::id::IdUid;
use crate::property::Property;
use crate::relation::Relation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named record type with its properties and relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Entity ID and UID.
    pub id: IdUid,
    /// Last property ID handed out in this entity.
    pub last_property_id: IdUid,
    /// Entity name, unique within the model.
    pub name: String,
    /// Properties in declaration order.
    pub properties: Vec<Property>,
    /// Standalone relations owned by this entity.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
}

impl Entity {
    /// Finds a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Finds a property by its ID within this entity.
    #[must_use]
    pub fn property_by_id(&self, id: u32) -> Option<&Property> {
        self.properties.iter().find(|p| p.id.id() == id)
    }

    /// The primary ID property, if declared.
    #[must_use]
    pub fn id_property(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.is_id())
    }

    /// Finds a relation by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name() == name)
    }

    /// Checks the entity and everything it owns.
    pub fn validate(&self) -> ModelResult<()> {
        let context = format!("entity '{}'", self.name);
        self.id.validate().map_err(|e| e.within(&context))?;

        if self.name.is_empty() {
            return Err(ModelError::invalid("entity", "name is undefined"));
        }

        self.last_property_id
            .validate_counter()
            .map_err(|e| e.within(format!("{context} > lastPropertyId")))?;

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        let mut id_properties = 0;
        for property in &self.properties {
            property.validate().map_err(|e| e.within(&context))?;

            if !names.insert(property.name.as_str()) {
                return Err(ModelError::invalid(
                    context,
                    format!("duplicate property name '{}'", property.name),
                ));
            }
            if !ids.insert(property.id.id()) {
                return Err(ModelError::invalid(
                    context,
                    format!("duplicate property id {}", property.id.id()),
                ));
            }
            if property.id.id() > self.last_property_id.id() {
                return Err(ModelError::invalid(
                    context,
                    format!(
                        "property '{}' has id {} above lastPropertyId {}",
                        property.name, property.id, self.last_property_id
                    ),
                ));
            }
            if property.is_id() {
                id_properties += 1;
            }
        }

        if id_properties > 1 {
            return Err(ModelError::invalid(
                context,
                "more than one property is flagged as ID",
            ));
        }

        let mut relation_names = HashSet::new();
        for relation in &self.relations {
            relation.validate().map_err(|e| e.within(&context))?;
            if !relation_names.insert(relation.name()) {
                return Err(ModelError::invalid(
                    context,
                    format!("duplicate relation name '{}'", relation.name()),
                ));
            }
        }

        Ok(())
    }
}
