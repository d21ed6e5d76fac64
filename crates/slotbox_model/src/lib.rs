//! # SlotBox Model
//!
//! Schema identity for SlotBox.
//!
//! Every entity, property, index and relation carries an [`IdUid`]: a dense
//! ID scoped to its collection plus a UID that is unique across the whole
//! history of the schema. The [`MergeEngine`] reconciles a
//! [`DeclaredModel`] (what the source says) with the previous [`Model`]
//! snapshot so that identities survive renames and removed elements are
//! retired instead of reused.
//!
//! ```rust,ignore
//! use slotbox_model::{DeclaredModel, MergeEngine, ModelFile};
//!
//! let file = ModelFile::new("slotbox-model.json");
//! let (model, report) = file.generate(&MergeEngine::default(), &declared)?;
//! let binary = model.to_binary();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binary;
mod config;
mod declared;
mod entity;
mod error;
mod id;
mod merge;
mod model;
mod property;
mod relation;
mod snapshot;
mod uid;

pub use config::{IdPolicy, MergeConfig};
pub use declared::{DeclaredEntity, DeclaredModel, DeclaredProperty, DeclaredRelation};
pub use entity::Entity;
pub use error::{ModelError, ModelResult};
pub use id::IdUid;
pub use merge::{Change, ElementKind, MergeEngine, MergeOutcome, MergeReport};
pub use model::{Model, MODEL_VERSION, MODEL_VERSION_PARSER_MINIMUM};
pub use property::{Property, PropertyFlags, PropertyType};
pub use relation::Relation;
pub use snapshot::ModelFile;
pub use uid::{UidMinter, MAX_UID};
