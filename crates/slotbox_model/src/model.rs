//! The persisted model snapshot.

use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::id::IdUid;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Snapshot format version written by this build.
pub const MODEL_VERSION: u32 = 5;

/// Oldest parser able to read snapshots written by this build.
pub const MODEL_VERSION_PARSER_MINIMUM: u32 = 5;

fn default_notes() -> Vec<String> {
    vec![
        "KEEP THIS FILE! Check it into version control.".to_string(),
        "SlotBox tracks the IDs and UIDs of your object model here.".to_string(),
        "Resolve merge conflicts by hand and never reuse a retired UID.".to_string(),
    ]
}

const fn default_version() -> u32 {
    1
}

/// The full schema together with its ID/UID bookkeeping.
///
/// This is what the merge engine reads before a generation run and writes
/// back after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Human-readable notes at the top of the snapshot file.
    #[serde(rename = "_notes", default = "default_notes")]
    pub notes: Vec<String>,
    /// Entities in declaration order.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Last entity ID handed out.
    #[serde(default)]
    pub last_entity_id: IdUid,
    /// Last index ID handed out.
    #[serde(default)]
    pub last_index_id: IdUid,
    /// Last relation ID handed out.
    #[serde(default)]
    pub last_relation_id: IdUid,
    /// Snapshot format version.
    #[serde(default)]
    pub model_version: u32,
    /// Oldest parser able to read this snapshot.
    #[serde(default)]
    pub model_version_parser_minimum: u32,
    /// UIDs of removed entities.
    #[serde(default)]
    pub retired_entity_uids: Vec<u64>,
    /// UIDs of removed indexes.
    #[serde(default)]
    pub retired_index_uids: Vec<u64>,
    /// UIDs of removed properties.
    #[serde(default)]
    pub retired_property_uids: Vec<u64>,
    /// UIDs of removed relations.
    #[serde(default)]
    pub retired_relation_uids: Vec<u64>,
    /// Application-defined model version.
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self {
            notes: default_notes(),
            entities: Vec::new(),
            last_entity_id: IdUid::UNSET,
            last_index_id: IdUid::UNSET,
            last_relation_id: IdUid::UNSET,
            model_version: MODEL_VERSION,
            model_version_parser_minimum: MODEL_VERSION_PARSER_MINIMUM,
            retired_entity_uids: Vec::new(),
            retired_index_uids: Vec::new(),
            retired_property_uids: Vec::new(),
            retired_relation_uids: Vec::new(),
            version: default_version(),
        }
    }

    /// Finds an entity by name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Finds an entity by its ID.
    #[must_use]
    pub fn entity_by_id(&self, id: u32) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id.id() == id)
    }

    /// Every UID in the model, live and retired.
    #[must_use]
    pub fn all_uids(&self) -> HashSet<u64> {
        let mut uids: HashSet<u64> = self
            .retired_entity_uids
            .iter()
            .chain(&self.retired_index_uids)
            .chain(&self.retired_property_uids)
            .chain(&self.retired_relation_uids)
            .copied()
            .collect();
        for (uid, _) in self.live_uids() {
            uids.insert(uid);
        }
        uids
    }

    /// Live UIDs with a description of their owner, in model order.
    fn live_uids(&self) -> Vec<(u64, String)> {
        let mut owned = Vec::new();
        for entity in &self.entities {
            owned.push((entity.id.uid(), format!("entity '{}'", entity.name)));
            for property in &entity.properties {
                let owner = format!("property '{}.{}'", entity.name, property.name);
                owned.push((property.id.uid(), owner.clone()));
                if let Some(index_id) = property.index_id {
                    owned.push((index_id.uid(), format!("index of {owner}")));
                }
            }
            for relation in &entity.relations {
                owned.push((
                    relation.id().uid(),
                    format!("relation '{}.{}'", entity.name, relation.name()),
                ));
            }
        }
        owned
    }

    /// Checks the whole model.
    ///
    /// Runs once after loading or constructing a model so that later code
    /// can rely on well-formed elements. Never modifies the model.
    pub fn validate(&self) -> ModelResult<()> {
        if self.model_version_parser_minimum > MODEL_VERSION {
            return Err(ModelError::UnsupportedVersion {
                required: self.model_version_parser_minimum,
                supported: MODEL_VERSION,
            });
        }

        self.last_entity_id
            .validate_counter()
            .map_err(|e| e.within("lastEntityId"))?;
        self.last_index_id
            .validate_counter()
            .map_err(|e| e.within("lastIndexId"))?;
        self.last_relation_id
            .validate_counter()
            .map_err(|e| e.within("lastRelationId"))?;

        let mut names = HashSet::new();
        let mut entity_ids = HashSet::new();
        let mut index_ids = HashSet::new();
        let mut relation_ids = HashSet::new();

        for entity in &self.entities {
            entity.validate()?;
            let context = format!("entity '{}'", entity.name);

            if !names.insert(entity.name.as_str()) {
                return Err(ModelError::invalid("model", format!("duplicate {context}")));
            }
            check_id(
                &mut entity_ids,
                entity.id,
                self.last_entity_id,
                &context,
                "entity",
            )?;

            for property in &entity.properties {
                if let Some(index_id) = property.index_id {
                    let owner = format!("{context} > property '{}'", property.name);
                    check_id(&mut index_ids, index_id, self.last_index_id, &owner, "index")?;
                }
            }

            for relation in &entity.relations {
                let owner = format!("{context} > relation '{}'", relation.name());
                check_id(
                    &mut relation_ids,
                    relation.id(),
                    self.last_relation_id,
                    &owner,
                    "relation",
                )?;
                let target = relation.target_id();
                if !self.entities.iter().any(|e| e.id == target) {
                    return Err(ModelError::invalid(
                        owner,
                        format!("target entity {target} does not exist"),
                    ));
                }
            }
        }

        self.check_uids_unique()
    }

    fn check_uids_unique(&self) -> ModelResult<()> {
        let mut owners: HashMap<u64, String> = HashMap::new();
        let retired = [
            ("retired entity", &self.retired_entity_uids),
            ("retired index", &self.retired_index_uids),
            ("retired property", &self.retired_property_uids),
            ("retired relation", &self.retired_relation_uids),
        ];
        let retired = retired
            .iter()
            .flat_map(|(kind, uids)| uids.iter().map(move |uid| (*uid, (*kind).to_string())));

        for (uid, owner) in self.live_uids().into_iter().chain(retired) {
            if let Some(first) = owners.get(&uid) {
                return Err(ModelError::DuplicateUid {
                    uid,
                    first: first.clone(),
                    second: owner,
                });
            }
            owners.insert(uid, owner);
        }
        Ok(())
    }
}

fn check_id(
    seen: &mut HashSet<u32>,
    id: IdUid,
    last: IdUid,
    owner: &str,
    kind: &str,
) -> ModelResult<()> {
    id.validate().map_err(|e| e.within(owner))?;
    if !seen.insert(id.id()) {
        return Err(ModelError::invalid(
            owner,
            format!("duplicate {kind} id {}", id.id()),
        ));
    }
    if id.id() > last.id() {
        return Err(ModelError::invalid(
            owner,
            format!("{kind} id {id} is above the last {kind} id {last}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{Property, PropertyFlags, PropertyType};
    use crate::relation::Relation;

    fn sample() -> Model {
        let mut model = Model::new();
        model.entities.push(Entity {
            id: IdUid::new(1, 11),
            last_property_id: IdUid::new(2, 13),
            name: "Event".into(),
            properties: vec![
                Property {
                    id: IdUid::new(1, 12),
                    name: "id".into(),
                    property_type: PropertyType::Long,
                    flags: PropertyFlags::ID,
                    index_id: None,
                },
                Property {
                    id: IdUid::new(2, 13),
                    name: "device".into(),
                    property_type: PropertyType::String,
                    flags: PropertyFlags::INDEXED,
                    index_id: Some(IdUid::new(1, 14)),
                },
            ],
            relations: vec![Relation::new(IdUid::new(1, 15), "related", IdUid::new(1, 11)).unwrap()],
        });
        model.last_entity_id = IdUid::new(1, 11);
        model.last_index_id = IdUid::new(1, 14);
        model.last_relation_id = IdUid::new(1, 15);
        model
    }

    #[test]
    fn empty_model_is_valid() {
        assert!(Model::new().validate().is_ok());
    }

    #[test]
    fn sample_is_valid() {
        let model = sample();
        model.validate().unwrap();
        assert_eq!(model.all_uids().len(), 5);
        assert!(model.entity("Event").is_some());
        assert!(model.entity_by_id(1).is_some());
    }

    #[test]
    fn entity_above_counter() {
        let mut model = sample();
        model.last_entity_id = IdUid::UNSET;
        assert!(model.validate().is_err());
    }

    #[test]
    fn retired_uid_may_not_be_live() {
        let mut model = sample();
        model.retired_property_uids.push(13);
        let err = model.validate().unwrap_err();
        assert!(matches!(err, ModelError::DuplicateUid { uid: 13, .. }));
    }

    #[test]
    fn duplicate_entity_names() {
        let mut model = sample();
        let mut copy = model.entities[0].clone();
        copy.id = IdUid::new(2, 21);
        copy.relations.clear();
        for (i, property) in copy.properties.iter_mut().enumerate() {
            property.id = IdUid::new(property.id.id(), 30 + i as u64);
            property.index_id = property.index_id.map(|_| IdUid::new(2, 40));
        }
        model.entities.push(copy);
        model.last_entity_id = IdUid::new(2, 21);
        model.last_index_id = IdUid::new(2, 40);
        let err = model.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate entity 'Event'"));
    }

    #[test]
    fn dangling_relation_target() {
        let mut model = sample();
        model.entities[0].relations =
            vec![Relation::new(IdUid::new(1, 15), "related", IdUid::new(9, 99)).unwrap()];
        let err = model.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn newer_parser_required() {
        let mut model = sample();
        model.model_version_parser_minimum = MODEL_VERSION + 1;
        assert!(matches!(
            model.validate(),
            Err(ModelError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn json_roundtrip_and_unknown_fields() {
        let model = sample();
        let json = serde_json::to_string_pretty(&model).unwrap();
        assert!(json.contains("\"lastEntityId\": \"1:11\""));
        let back: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);

        let minimal: Model =
            serde_json::from_str(r#"{"entities": [], "futureField": true}"#).unwrap();
        assert!(minimal.validate().is_ok());
        assert_eq!(minimal.version, 1);
    }
}
