//! Error types for SlotBox core.

use slotbox_model::{ModelError, PropertyType};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// An error reported by the storage engine, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine error {code}: {message}")]
pub struct EngineError {
    /// Engine error code.
    pub code: i32,
    /// Engine error message.
    pub message: String,
}

impl EngineError {
    /// The call is not allowed in the current state.
    pub const ILLEGAL_STATE: i32 = 10001;
    /// An argument is out of range or refers to nothing.
    pub const ILLEGAL_ARGUMENT: i32 = 10002;
    /// A handle does not exist, or was already released.
    pub const UNKNOWN_HANDLE: i32 = 10003;
    /// The model or a query does not fit the stored schema.
    pub const SCHEMA: i32 = 10501;
    /// A condition does not fit the type of its property.
    pub const PROPERTY_TYPE_MISMATCH: i32 = 10502;

    /// Creates an engine error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(Self::ILLEGAL_STATE, message)
    }

    /// Creates an illegal argument error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(Self::ILLEGAL_ARGUMENT, message)
    }

    /// Creates an unknown handle error.
    pub fn unknown_handle(kind: &str, id: impl fmt::Display) -> Self {
        Self::new(Self::UNKNOWN_HANDLE, format!("unknown {kind} {id}"))
    }
}

/// Errors that can occur in SlotBox core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error returned by the storage engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Schema model error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A builder, query or cursor was used after it was released.
    #[error("{resource} was already released")]
    Released {
        /// The released resource.
        resource: &'static str,
    },

    /// A cursor of another entity was passed in.
    #[error("cursor belongs to entity {actual}, expected entity {expected}")]
    WrongCursor {
        /// Entity the operation works on.
        expected: u32,
        /// Entity of the cursor.
        actual: u32,
    },

    /// A write was attempted through a read cursor.
    #[error("cursor is read-only")]
    ReadOnlyCursor,

    /// The entity is not part of the model.
    #[error("entity not found in model: {name}")]
    EntityNotFound {
        /// Name of the entity.
        name: String,
    },

    /// A property reference does not resolve within its entity.
    #[error("entity '{entity}' has no property {property}")]
    PropertyNotFound {
        /// Entity name.
        entity: String,
        /// The unresolved reference: a name, or `#id`.
        property: String,
    },

    /// A value or condition does not fit the type of its property.
    #[error("{operation} does not apply to property '{property}' of type {property_type}")]
    TypeMismatch {
        /// What was attempted.
        operation: String,
        /// Property name.
        property: String,
        /// Property type.
        property_type: PropertyType,
    },

    /// A stored record could not be decoded.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// What is wrong with the record.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a released resource error.
    #[must_use]
    pub const fn released(resource: &'static str) -> Self {
        Self::Released { resource }
    }

    /// Creates an entity not found error.
    pub fn entity_not_found(name: impl Into<String>) -> Self {
        Self::EntityNotFound { name: name.into() }
    }

    /// Creates a property not found error.
    pub fn property_not_found(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self::PropertyNotFound {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        operation: impl Into<String>,
        property: impl Into<String>,
        property_type: PropertyType,
    ) -> Self {
        Self::TypeMismatch {
            operation: operation.into(),
            property: property.into(),
            property_type,
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the engine error code, if the engine reported this error.
    #[must_use]
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Self::Engine(e) => Some(e.code),
            _ => None,
        }
    }

    /// Returns true for use-after-release and wrong-cursor errors.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::Released { .. } | Self::WrongCursor { .. } | Self::ReadOnlyCursor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_pass_through_verbatim() {
        let err: CoreError = EngineError::new(42, "disk on fire").into();
        assert_eq!(err.to_string(), "engine error 42: disk on fire");
        assert_eq!(err.engine_code(), Some(42));
        assert!(!err.is_misuse());
    }

    #[test]
    fn misuse() {
        assert!(CoreError::released("query").is_misuse());
        assert_eq!(
            CoreError::released("query builder").to_string(),
            "query builder was already released"
        );
    }
}
