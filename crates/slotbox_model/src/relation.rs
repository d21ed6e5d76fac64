//! Standalone relations between entities.

use crate::error::{ModelError, ModelResult};
use crate::id::IdUid;
use serde::{Deserialize, Serialize};

/// A named link from its owning entity to a target entity.
///
/// Relations are immutable: the merge engine builds new ones on every run
/// instead of editing old ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    id: IdUid,
    name: String,
    target_id: IdUid,
}

impl Relation {
    /// Creates a validated relation.
    ///
    /// Fails without producing a value if the identity or the name is
    /// invalid.
    pub fn new(id: IdUid, name: impl Into<String>, target_id: IdUid) -> ModelResult<Self> {
        let relation = Self {
            id,
            name: name.into(),
            target_id,
        };
        relation.validate()?;
        Ok(relation)
    }

    /// Relation ID and UID.
    #[must_use]
    pub fn id(&self) -> IdUid {
        self.id
    }

    /// Relation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the target entity.
    #[must_use]
    pub fn target_id(&self) -> IdUid {
        self.target_id
    }

    /// Performs initial validation of loaded data so that it doesn't have to
    /// be checked in each function.
    ///
    /// Whether the target exists is checked by the model.
    pub fn validate(&self) -> ModelResult<()> {
        self.id
            .validate()
            .map_err(|e| e.within(format!("relation '{}'", self.name)))?;

        if self.name.is_empty() {
            return Err(ModelError::invalid("relation", "name is undefined"));
        }

        Ok(())
    }
}
