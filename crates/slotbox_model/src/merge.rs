//! Merging a declared schema into the previous model snapshot.
//!
//! A run has two phases. Planning matches every declared element to a
//! previous one (by pinned UID, then by name) and decides what is retired.
//! Allocation then builds the new model: matched elements keep their
//! identity, new ones get IDs from their collection's counter and freshly
//! minted UIDs. Nothing is minted until planning has succeeded.

use crate::config::{IdPolicy, MergeConfig};
use crate::declared::{DeclaredEntity, DeclaredModel};
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::id::IdUid;
use crate::model::{Model, MODEL_VERSION, MODEL_VERSION_PARSER_MINIMUM};
use crate::property::Property;
use crate::relation::Relation;
use crate::uid::UidMinter;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info};

/// Kind of an identity-carrying element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// An entity.
    Entity,
    /// A property.
    Property,
    /// A property index.
    Index,
    /// A standalone relation.
    Relation,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Entity => "entity",
            Self::Property => "property",
            Self::Index => "index",
            Self::Relation => "relation",
        })
    }
}

/// One change made by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A new element got an identity.
    Added {
        /// Element kind.
        kind: ElementKind,
        /// Qualified name, e.g. `Event.date`.
        name: String,
        /// Assigned identity.
        id: IdUid,
    },
    /// A matched element changed its name.
    Renamed {
        /// Element kind.
        kind: ElementKind,
        /// Previous qualified name.
        from: String,
        /// New qualified name.
        to: String,
        /// Kept identity.
        id: IdUid,
    },
    /// A previous element was dropped and its UID retired.
    Retired {
        /// Element kind.
        kind: ElementKind,
        /// Qualified name.
        name: String,
        /// Retired UID.
        uid: u64,
    },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { kind, name, id } => write!(f, "added {kind} {name} ({id})"),
            Self::Renamed { kind, from, to, id } => {
                write!(f, "renamed {kind} {from} to {to} ({id})")
            }
            Self::Retired { kind, name, uid } => write!(f, "retired {kind} {name} (uid {uid})"),
        }
    }
}

/// Changes made by a merge, in the order they were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Applied changes.
    pub changes: Vec<Change>,
}

impl MergeReport {
    /// Returns true if the merge changed no identity.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes of the given kind that added an element.
    #[must_use]
    pub fn added(&self, kind: ElementKind) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, Change::Added { kind: k, .. } if *k == kind))
            .count()
    }

    /// Number of changes of the given kind that retired an element.
    #[must_use]
    pub fn retired(&self, kind: ElementKind) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, Change::Retired { kind: k, .. } if *k == kind))
            .count()
    }

    fn push(&mut self, change: Change) {
        info!("{change}");
        self.changes.push(change);
    }
}

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged, validated model.
    pub model: Model,
    /// What changed.
    pub report: MergeReport,
}

/// Identity of a previous element as seen by the matcher.
#[derive(Debug, Clone, Copy)]
struct Candidate<'p> {
    uid: u64,
    name: &'p str,
}

/// A declared element waiting to be matched.
struct Wanted<'d> {
    name: &'d str,
    uid: Option<u64>,
    label: String,
}

/// Matches declared elements of one collection against previous ones.
///
/// Candidates live in an arena in previous-model order; both indexes are
/// rebuilt for every collection and every run.
struct Matcher<'p> {
    kind: ElementKind,
    arena: Vec<Candidate<'p>>,
    by_uid: HashMap<u64, usize>,
    by_name: HashMap<&'p str, usize>,
    claimed: Vec<bool>,
}

impl<'p> Matcher<'p> {
    fn new(kind: ElementKind, candidates: impl IntoIterator<Item = Candidate<'p>>) -> Self {
        let arena: Vec<Candidate<'p>> = candidates.into_iter().collect();
        let by_uid = arena.iter().enumerate().map(|(i, c)| (c.uid, i)).collect();
        let by_name = arena.iter().enumerate().map(|(i, c)| (c.name, i)).collect();
        let claimed = vec![false; arena.len()];
        Self {
            kind,
            arena,
            by_uid,
            by_name,
            claimed,
        }
    }

    /// Returns, for each wanted element, the arena slot it continues.
    ///
    /// Pinned UIDs are resolved first so that a name match can never steal
    /// a candidate that another declaration pinned.
    fn resolve(&mut self, wanted: &[Wanted<'_>], retired: &[u64]) -> ModelResult<Vec<Option<usize>>> {
        let mut matches = vec![None; wanted.len()];
        let mut pinned: HashMap<u64, &str> = HashMap::new();

        for (i, w) in wanted.iter().enumerate() {
            let Some(uid) = w.uid else { continue };
            if let Some(first) = pinned.insert(uid, w.label.as_str()) {
                return Err(ModelError::DuplicateUid {
                    uid,
                    first: first.to_string(),
                    second: w.label.clone(),
                });
            }
            match self.by_uid.get(&uid) {
                Some(&slot) => {
                    self.claimed[slot] = true;
                    matches[i] = Some(slot);
                }
                None if retired.contains(&uid) => {
                    return Err(ModelError::RetiredUid {
                        element: w.label.clone(),
                        uid,
                    });
                }
                None => {
                    return Err(ModelError::UnknownUid {
                        element: w.label.clone(),
                        uid,
                    });
                }
            }
        }

        for (i, w) in wanted.iter().enumerate() {
            if w.uid.is_some() {
                continue;
            }
            let Some(&slot) = self.by_name.get(w.name) else {
                continue;
            };
            if self.claimed[slot] {
                let candidate = self.arena[slot];
                return Err(ModelError::ambiguous(
                    w.label.clone(),
                    format!(
                        "name matches {} '{}' whose uid {} is pinned by another declaration",
                        self.kind, candidate.name, candidate.uid
                    ),
                ));
            }
            self.claimed[slot] = true;
            matches[i] = Some(slot);
        }

        Ok(matches)
    }

    fn unclaimed(&self) -> impl Iterator<Item = usize> + '_ {
        self.claimed
            .iter()
            .enumerate()
            .filter(|(_, claimed)| !**claimed)
            .map(|(i, _)| i)
    }
}

/// Hands out IDs within one collection.
#[derive(Debug)]
struct IdAllocator {
    policy: IdPolicy,
    last: IdUid,
    used: BTreeSet<u32>,
}

impl IdAllocator {
    fn new(policy: IdPolicy, last: IdUid, used: impl IntoIterator<Item = u32>) -> Self {
        Self {
            policy,
            last,
            used: used.into_iter().collect(),
        }
    }

    fn allocate(&mut self, uid: u64) -> IdUid {
        let id = match self.policy {
            IdPolicy::Monotonic => self.last.id().saturating_add(1),
            IdPolicy::ReuseRetired => {
                let mut id = 1;
                while self.used.contains(&id) {
                    id += 1;
                }
                id
            }
        };
        self.used.insert(id);
        let assigned = IdUid::new(id, uid);
        if id > self.last.id() {
            self.last = assigned;
        }
        assigned
    }

    fn last(&self) -> IdUid {
        self.last
    }
}

#[derive(Debug)]
struct EntityPlan {
    previous: Option<usize>,
    properties: Vec<Option<usize>>,
    retired_properties: Vec<usize>,
    relations: Vec<Option<usize>>,
    retired_relations: Vec<usize>,
}

#[derive(Debug)]
struct Plan {
    entities: Vec<EntityPlan>,
    retired_entities: Vec<usize>,
}

impl Plan {
    fn build(previous: &Model, declared: &DeclaredModel) -> ModelResult<Self> {
        let wanted: Vec<Wanted<'_>> = declared
            .entities
            .iter()
            .map(|e| Wanted {
                name: &e.name,
                uid: e.uid,
                label: format!("entity '{}'", e.name),
            })
            .collect();
        let mut matcher = Matcher::new(
            ElementKind::Entity,
            previous.entities.iter().map(|e| Candidate {
                uid: e.id.uid(),
                name: &e.name,
            }),
        );
        let matched = matcher.resolve(&wanted, &previous.retired_entity_uids)?;
        let retired_entities = matcher.unclaimed().collect();

        let mut entities = Vec::with_capacity(declared.entities.len());
        for (entity, matched) in declared.entities.iter().zip(&matched) {
            let prev = matched.map(|i| &previous.entities[i]);
            entities.push(plan_entity(previous, entity, prev, *matched)?);
        }

        let plan = Self {
            entities,
            retired_entities,
        };
        plan.check_relation_targets(previous, declared)?;
        Ok(plan)
    }

    /// A matched relation must keep pointing at the same entity identity.
    fn check_relation_targets(&self, previous: &Model, declared: &DeclaredModel) -> ModelResult<()> {
        for (entity, plan) in declared.entities.iter().zip(&self.entities) {
            let Some(prev_entity) = plan.previous.map(|i| &previous.entities[i]) else {
                continue;
            };
            for (relation, matched) in entity.relations.iter().zip(&plan.relations) {
                let Some(prev_relation) = matched.map(|i| &prev_entity.relations[i]) else {
                    continue;
                };
                let target_uid = declared
                    .entities
                    .iter()
                    .position(|e| e.name == relation.target)
                    .and_then(|t| self.entities[t].previous)
                    .map(|p| previous.entities[p].id.uid());
                if target_uid != Some(prev_relation.target_id().uid()) {
                    return Err(ModelError::incompatible(
                        format!("entity '{}' > relation '{}'", entity.name, relation.name),
                        format!(
                            "target changed to '{}'; rename the relation to start a new one",
                            relation.target
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn plan_entity(
    previous: &Model,
    entity: &DeclaredEntity,
    prev: Option<&Entity>,
    index: Option<usize>,
) -> ModelResult<EntityPlan> {
    let context = format!("entity '{}'", entity.name);

    let wanted: Vec<Wanted<'_>> = entity
        .properties
        .iter()
        .map(|p| Wanted {
            name: &p.name,
            uid: p.uid,
            label: format!("{context} > property '{}'", p.name),
        })
        .collect();
    let mut properties = Matcher::new(
        ElementKind::Property,
        prev.into_iter().flat_map(|e| {
            e.properties.iter().map(|p| Candidate {
                uid: p.id.uid(),
                name: &p.name,
            })
        }),
    );
    let mut matched_properties = properties.resolve(&wanted, &previous.retired_property_uids)?;
    let mut retired_properties: Vec<usize> = properties.unclaimed().collect();

    if let Some(prev) = prev {
        for (declared, matched) in entity.properties.iter().zip(matched_properties.iter_mut()) {
            let Some(slot) = *matched else { continue };
            if declared.reset {
                retired_properties.push(slot);
                *matched = None;
                continue;
            }
            let old = &prev.properties[slot];
            if old.property_type != declared.property_type {
                return Err(ModelError::incompatible(
                    format!("{context} > property '{}'", declared.name),
                    format!(
                        "type changed from {} to {}; mark the property for reset to drop its data",
                        old.property_type, declared.property_type
                    ),
                ));
            }
        }
        retired_properties.sort_unstable();
    }

    let wanted: Vec<Wanted<'_>> = entity
        .relations
        .iter()
        .map(|r| Wanted {
            name: &r.name,
            uid: r.uid,
            label: format!("{context} > relation '{}'", r.name),
        })
        .collect();
    let mut relations = Matcher::new(
        ElementKind::Relation,
        prev.into_iter().flat_map(|e| {
            e.relations.iter().map(|r| Candidate {
                uid: r.id().uid(),
                name: r.name(),
            })
        }),
    );
    let matched_relations = relations.resolve(&wanted, &previous.retired_relation_uids)?;
    let retired_relations = relations.unclaimed().collect();

    Ok(EntityPlan {
        previous: index,
        properties: matched_properties,
        retired_properties,
        relations: matched_relations,
        retired_relations,
    })
}

/// Merges declared schemas into model snapshots.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merges `declared` into `previous`.
    ///
    /// Neither input is modified. On error no partial model is produced.
    pub fn merge(&self, previous: &Model, declared: &DeclaredModel) -> ModelResult<MergeOutcome> {
        previous.validate()?;
        declared.validate()?;

        let plan = Plan::build(previous, declared)?;
        let outcome = self.allocate(previous, declared, &plan)?;
        outcome.model.validate()?;

        debug!(
            "Merged {} entities with {} changes",
            outcome.model.entities.len(),
            outcome.report.changes.len()
        );
        Ok(outcome)
    }

    fn allocate(
        &self,
        previous: &Model,
        declared: &DeclaredModel,
        plan: &Plan,
    ) -> ModelResult<MergeOutcome> {
        let policy = self.config.id_policy;
        let mut report = MergeReport::default();
        let mut minter = UidMinter::new(self.config.uid_seed);
        minter.reserve(previous.all_uids());

        let mut model = Model::new();
        model.notes = previous.notes.clone();
        model.model_version = MODEL_VERSION;
        model.model_version_parser_minimum = MODEL_VERSION_PARSER_MINIMUM;
        model.version = self.config.model_version.unwrap_or(previous.version);
        model.retired_entity_uids = previous.retired_entity_uids.clone();
        model.retired_index_uids = previous.retired_index_uids.clone();
        model.retired_property_uids = previous.retired_property_uids.clone();
        model.retired_relation_uids = previous.retired_relation_uids.clone();

        let kept = |slot: Option<usize>| slot.map(|i| &previous.entities[i]);

        // IDs retired by this run stay taken until the next one.
        let mut entity_ids = IdAllocator::new(
            policy,
            previous.last_entity_id,
            plan.entities
                .iter()
                .filter_map(|e| kept(e.previous))
                .map(|e| e.id.id())
                .chain(plan.retired_entities.iter().map(|&i| previous.entities[i].id.id())),
        );
        let mut index_ids = IdAllocator::new(
            policy,
            previous.last_index_id,
            kept_indexes(previous, declared, plan),
        );
        let mut relation_ids = IdAllocator::new(
            policy,
            previous.last_relation_id,
            plan.entities.iter().flat_map(|e| {
                let prev = kept(e.previous);
                e.relations
                    .iter()
                    .filter_map(move |r| r.zip(prev))
                    .chain(e.retired_relations.iter().copied().zip(prev))
                    .map(|(r, prev)| prev.relations[r].id().id())
            }),
        );

        let entity_identities: Vec<IdUid> = declared
            .entities
            .iter()
            .zip(&plan.entities)
            .map(|(entity, entity_plan)| match kept(entity_plan.previous) {
                Some(prev) => {
                    if prev.name != entity.name {
                        report.push(Change::Renamed {
                            kind: ElementKind::Entity,
                            from: prev.name.clone(),
                            to: entity.name.clone(),
                            id: prev.id,
                        });
                    }
                    prev.id
                }
                None => {
                    let id = entity_ids.allocate(minter.mint());
                    report.push(Change::Added {
                        kind: ElementKind::Entity,
                        name: entity.name.clone(),
                        id,
                    });
                    id
                }
            })
            .collect();

        for ((entity, entity_plan), entity_id) in declared
            .entities
            .iter()
            .zip(&plan.entities)
            .zip(&entity_identities)
        {
            let prev = kept(entity_plan.previous);
            let mut property_ids = IdAllocator::new(
                policy,
                prev.map_or(IdUid::UNSET, |e| e.last_property_id),
                entity_plan
                    .properties
                    .iter()
                    .filter_map(|p| p.zip(prev))
                    .chain(entity_plan.retired_properties.iter().copied().zip(prev))
                    .map(|(p, prev)| prev.properties[p].id.id()),
            );

            let mut properties = Vec::with_capacity(entity.properties.len());
            for (declared_property, matched) in entity.properties.iter().zip(&entity_plan.properties) {
                let qualified = format!("{}.{}", entity.name, declared_property.name);
                let old = matched.zip(prev).map(|(p, prev)| &prev.properties[p]);
                let id = match old {
                    Some(old) => {
                        if old.name != declared_property.name {
                            report.push(Change::Renamed {
                                kind: ElementKind::Property,
                                from: format!("{}.{}", entity.name, old.name),
                                to: qualified.clone(),
                                id: old.id,
                            });
                        }
                        old.id
                    }
                    None => {
                        let id = property_ids.allocate(minter.mint());
                        report.push(Change::Added {
                            kind: ElementKind::Property,
                            name: qualified.clone(),
                            id,
                        });
                        id
                    }
                };

                let old_index = old.and_then(|p| p.index_id);
                let index_id = match (declared_property.flags.needs_index(), old_index) {
                    (true, Some(index_id)) => Some(index_id),
                    (true, None) => {
                        let index_id = index_ids.allocate(minter.mint());
                        report.push(Change::Added {
                            kind: ElementKind::Index,
                            name: qualified.clone(),
                            id: index_id,
                        });
                        Some(index_id)
                    }
                    (false, Some(index_id)) => {
                        retire_index(&mut model, &mut report, &qualified, index_id);
                        None
                    }
                    (false, None) => None,
                };

                properties.push(Property {
                    id,
                    name: declared_property.name.clone(),
                    property_type: declared_property.property_type,
                    flags: declared_property.flags,
                    index_id,
                });
            }

            if let Some(prev) = prev {
                for &slot in &entity_plan.retired_properties {
                    retire_property(&mut model, &mut report, &prev.name, &prev.properties[slot]);
                }
            }

            let mut relations = Vec::with_capacity(entity.relations.len());
            for (declared_relation, matched) in entity.relations.iter().zip(&entity_plan.relations) {
                let qualified = format!("{}.{}", entity.name, declared_relation.name);
                let target = declared
                    .entities
                    .iter()
                    .position(|e| e.name == declared_relation.target)
                    .map_or(IdUid::UNSET, |t| entity_identities[t]);
                let id = match matched.zip(prev).map(|(r, prev)| &prev.relations[r]) {
                    Some(old) => {
                        if old.name() != declared_relation.name {
                            report.push(Change::Renamed {
                                kind: ElementKind::Relation,
                                from: format!("{}.{}", entity.name, old.name()),
                                to: qualified.clone(),
                                id: old.id(),
                            });
                        }
                        old.id()
                    }
                    None => {
                        let id = relation_ids.allocate(minter.mint());
                        report.push(Change::Added {
                            kind: ElementKind::Relation,
                            name: qualified.clone(),
                            id,
                        });
                        id
                    }
                };
                relations.push(Relation::new(id, declared_relation.name.clone(), target)?);
            }

            if let Some(prev) = prev {
                for &slot in &entity_plan.retired_relations {
                    let relation = &prev.relations[slot];
                    retire_relation(&mut model, &mut report, &prev.name, relation);
                }
            }

            model.entities.push(Entity {
                id: *entity_id,
                last_property_id: property_ids.last(),
                name: entity.name.clone(),
                properties,
                relations,
            });
        }

        for &slot in &plan.retired_entities {
            let entity = &previous.entities[slot];
            for property in &entity.properties {
                retire_property(&mut model, &mut report, &entity.name, property);
            }
            for relation in &entity.relations {
                retire_relation(&mut model, &mut report, &entity.name, relation);
            }
            model.retired_entity_uids.push(entity.id.uid());
            report.push(Change::Retired {
                kind: ElementKind::Entity,
                name: entity.name.clone(),
                uid: entity.id.uid(),
            });
        }

        model.last_entity_id = entity_ids.last();
        model.last_index_id = index_ids.last();
        model.last_relation_id = relation_ids.last();

        Ok(MergeOutcome { model, report })
    }
}

/// Index IDs that survive the merge.
fn kept_indexes(previous: &Model, declared: &DeclaredModel, plan: &Plan) -> Vec<u32> {
    let mut ids = Vec::new();
    for (entity, entity_plan) in declared.entities.iter().zip(&plan.entities) {
        let Some(prev) = entity_plan.previous.map(|i| &previous.entities[i]) else {
            continue;
        };
        for (property, matched) in entity.properties.iter().zip(&entity_plan.properties) {
            let old_index = matched.and_then(|p| prev.properties[p].index_id);
            if let (true, Some(index_id)) = (property.flags.needs_index(), old_index) {
                ids.push(index_id.id());
            }
        }
    }
    ids
}

fn retire_property(model: &mut Model, report: &mut MergeReport, entity: &str, property: &Property) {
    let name = format!("{entity}.{}", property.name);
    if let Some(index_id) = property.index_id {
        retire_index(model, report, &name, index_id);
    }
    model.retired_property_uids.push(property.id.uid());
    report.push(Change::Retired {
        kind: ElementKind::Property,
        name,
        uid: property.id.uid(),
    });
}

fn retire_index(model: &mut Model, report: &mut MergeReport, name: &str, index_id: IdUid) {
    model.retired_index_uids.push(index_id.uid());
    report.push(Change::Retired {
        kind: ElementKind::Index,
        name: name.to_string(),
        uid: index_id.uid(),
    });
}

fn retire_relation(model: &mut Model, report: &mut MergeReport, entity: &str, relation: &Relation) {
    model.retired_relation_uids.push(relation.id().uid());
    report.push(Change::Retired {
        kind: ElementKind::Relation,
        name: format!("{entity}.{}", relation.name()),
        uid: relation.id().uid(),
    });
}
