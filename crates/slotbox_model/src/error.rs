//! Error types for the schema model.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while validating, merging or persisting a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An element violates an identity or naming invariant.
    #[error("invalid {element}: {reason}")]
    Invalid {
        /// Path of the offending element, outermost first.
        element: String,
        /// The violated invariant.
        reason: String,
    },

    /// A declared element could be matched to more than one previous element.
    #[error("ambiguous {element}: {reason}")]
    Ambiguous {
        /// The declared element.
        element: String,
        /// Why the match is ambiguous.
        reason: String,
    },

    /// The same UID is used by two elements, or pinned twice.
    #[error("uid {uid} is used by both {first} and {second}")]
    DuplicateUid {
        /// The colliding UID.
        uid: u64,
        /// First owner.
        first: String,
        /// Second owner.
        second: String,
    },

    /// A pinned UID does not exist in the previous model.
    #[error("{element} pins uid {uid}, which is not in the model")]
    UnknownUid {
        /// The declared element.
        element: String,
        /// The pinned UID.
        uid: u64,
    },

    /// A pinned UID belongs to a retired element.
    #[error("{element} pins uid {uid}, which was retired and can not be reused")]
    RetiredUid {
        /// The declared element.
        element: String,
        /// The pinned UID.
        uid: u64,
    },

    /// A matched element changed in a way existing data can not follow.
    #[error("incompatible change to {element}: {reason}")]
    Incompatible {
        /// The declared element.
        element: String,
        /// What changed.
        reason: String,
    },

    /// A textual `id:uid` pair could not be parsed.
    #[error("malformed id/uid {value:?}: {reason}")]
    MalformedIdUid {
        /// The input text.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The snapshot requires a newer parser.
    #[error("model snapshot requires parser version {required}, this build supports {supported}")]
    UnsupportedVersion {
        /// Minimum parser version recorded in the snapshot.
        required: u32,
        /// Version supported by this build.
        supported: u32,
    },

    /// Snapshot JSON could not be read or written.
    #[error("snapshot format error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ModelError {
    /// Creates an invalid element error.
    pub fn invalid(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            element: element.into(),
            reason: reason.into(),
        }
    }

    /// Creates an ambiguous match error.
    pub fn ambiguous(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Ambiguous {
            element: element.into(),
            reason: reason.into(),
        }
    }

    /// Creates an incompatible change error.
    pub fn incompatible(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Incompatible {
            element: element.into(),
            reason: reason.into(),
        }
    }

    /// Prefixes the element path of a validation error with `outer`.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn within(self, outer: impl fmt::Display) -> Self {
        match self {
            Self::Invalid { element, reason } => Self::Invalid {
                element: format!("{outer} > {element}"),
                reason,
            },
            other => other,
        }
    }

    /// Returns true for validation errors.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_builds_a_path() {
        let err = ModelError::invalid("id", "uid is undefined")
            .within("property 'date'")
            .within("entity 'Event'");
        assert_eq!(
            err.to_string(),
            "invalid entity 'Event' > property 'date' > id: uid is undefined"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn within_leaves_other_errors_alone() {
        let err = ModelError::UnknownUid {
            element: "entity 'Event'".into(),
            uid: 7,
        }
        .within("model");
        assert!(matches!(err, ModelError::UnknownUid { uid: 7, .. }));
    }
}
