//! Declared schema: what the application source says the model looks like.
//!
//! Declared elements carry names, types and flags but no IDs. A UID may be
//! pinned to force a match against a previous element, which is how renames
//! are expressed.

use crate::error::{ModelError, ModelResult};
use crate::property::{PropertyFlags, PropertyType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A declared property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredProperty {
    /// Property name.
    pub name: String,
    /// Storage type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Flags.
    #[serde(default)]
    pub flags: PropertyFlags,
    /// Pinned UID of the previous property this one continues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    /// Drop the previous identity and start fresh, allowing a type change.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reset: bool,
}

impl DeclaredProperty {
    /// Declares a property.
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            flags: PropertyFlags::NONE,
            uid: None,
            reset: false,
        }
    }

    /// Sets the flags.
    #[must_use]
    pub fn flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Pins the UID.
    #[must_use]
    pub fn uid(mut self, uid: u64) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Requests a fresh identity on the next run.
    #[must_use]
    pub fn reset(mut self) -> Self {
        self.reset = true;
        self
    }
}

/// A declared standalone relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredRelation {
    /// Relation name.
    pub name: String,
    /// Name of the target entity.
    pub target: String,
    /// Pinned UID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
}

impl DeclaredRelation {
    /// Declares a relation to the entity named `target`.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            uid: None,
        }
    }

    /// Pins the UID.
    #[must_use]
    pub fn uid(mut self, uid: u64) -> Self {
        self.uid = Some(uid);
        self
    }
}

/// A declared entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredEntity {
    /// Entity name.
    pub name: String,
    /// Pinned UID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    /// Properties in source order.
    #[serde(default)]
    pub properties: Vec<DeclaredProperty>,
    /// Relations in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<DeclaredRelation>,
}

impl DeclaredEntity {
    /// Declares an entity with no properties yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: None,
            properties: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Pins the UID.
    #[must_use]
    pub fn uid(mut self, uid: u64) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Appends a property.
    #[must_use]
    pub fn property(mut self, property: DeclaredProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Appends a relation.
    #[must_use]
    pub fn relation(mut self, relation: DeclaredRelation) -> Self {
        self.relations.push(relation);
        self
    }
}

/// The declared schema for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredModel {
    /// Entities in source order.
    #[serde(default)]
    pub entities: Vec<DeclaredEntity>,
}

impl DeclaredModel {
    /// Creates an empty declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entity.
    #[must_use]
    pub fn entity(mut self, entity: DeclaredEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Parses a declaration from JSON.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let declared: Self = serde_json::from_str(json)?;
        declared.validate()?;
        Ok(declared)
    }

    /// Checks names, uniqueness and relation targets.
    ///
    /// Pinned UIDs are checked against the previous model during the merge.
    pub fn validate(&self) -> ModelResult<()> {
        let mut entity_names = HashSet::new();
        for entity in &self.entities {
            if entity.name.is_empty() {
                return Err(ModelError::invalid("entity", "name is undefined"));
            }
            let context = format!("entity '{}'", entity.name);
            if !entity_names.insert(entity.name.as_str()) {
                return Err(ModelError::invalid("model", format!("duplicate {context}")));
            }

            let mut names = HashSet::new();
            let mut id_properties = 0;
            for property in &entity.properties {
                if property.name.is_empty() {
                    return Err(ModelError::invalid(
                        format!("{context} > property"),
                        "name is undefined",
                    ));
                }
                if !names.insert(property.name.as_str()) {
                    return Err(ModelError::invalid(
                        context,
                        format!("duplicate property name '{}'", property.name),
                    ));
                }
                if property.flags.contains(PropertyFlags::ID) {
                    id_properties += 1;
                    if property.property_type != PropertyType::Long {
                        return Err(ModelError::invalid(
                            format!("{context} > property '{}'", property.name),
                            format!("ID property must be Long, not {}", property.property_type),
                        ));
                    }
                }
            }
            if id_properties > 1 {
                return Err(ModelError::invalid(
                    context,
                    "more than one property is flagged as ID",
                ));
            }

            let mut relation_names = HashSet::new();
            for relation in &entity.relations {
                if relation.name.is_empty() {
                    return Err(ModelError::invalid(
                        format!("{context} > relation"),
                        "name is undefined",
                    ));
                }
                if !relation_names.insert(relation.name.as_str()) {
                    return Err(ModelError::invalid(
                        context,
                        format!("duplicate relation name '{}'", relation.name),
                    ));
                }
            }
        }

        for entity in &self.entities {
            for relation in &entity.relations {
                if !entity_names.contains(relation.target.as_str()) {
                    return Err(ModelError::invalid(
                        format!("entity '{}' > relation '{}'", entity.name, relation.name),
                        format!("target entity '{}' is not declared", relation.target),
                    ));
                }
            }
        }

        Ok(())
    }
}
