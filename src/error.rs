//! Error types for riskgraph.
//!
//! All errors are strongly typed using thiserror. Validation problems are
//! detected before any storage call is issued; execution problems depend on
//! the current stored state; storage problems come from the engine below and
//! are passed through unchanged.

use thiserror::Error;

use crate::id::EntityId;
use crate::storage::StorageError;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid identifier: '{value}'")]
    InvalidIdentifier {
        value: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    FieldTooLong {
        field: String,
        max_length: usize,
    },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidFieldValue {
        field: String,
        reason: String,
    },

    #[error("Field '{field}' cannot be edited directly")]
    ImmutableField {
        field: String,
    },

    #[error("Unknown entity type: {name}")]
    UnknownEntityType {
        name: String,
    },

    #[error("Unknown resolver field: {name}")]
    UnknownField {
        name: String,
    },

    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        argument: String,
        reason: String,
    },
}

impl ValidationError {
    /// Shorthand for an `InvalidIdentifier` error.
    #[must_use]
    pub fn invalid_identifier(value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
        }
    }

    pub(crate) fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}

/// Execution errors that depend on the stored state.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{entity_type} already exists: {id}")]
    DuplicateEntity {
        entity_type: String,
        id: EntityId,
    },

    #[error("Entity not found: {id}")]
    EntityNotFound {
        id: EntityId,
    },

    #[error("Field '{field}' is not a reference field of {entity_type}")]
    UnsupportedField {
        entity_type: String,
        field: String,
    },

    #[error("Field '{field}' expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },
}

/// Top-level error type for riskgraph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl GraphError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this error reports a malformed identifier.
    #[must_use]
    pub const fn is_invalid_identifier(&self) -> bool {
        matches!(
            self,
            Self::Validation(ValidationError::InvalidIdentifier { .. })
        )
    }

    /// Returns true if this error reports a missing entity.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::EntityNotFound { .. }))
    }

    /// Returns true if this error reports a duplicate create.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::DuplicateEntity { .. }))
    }

    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(e) => match e {
                ValidationError::InvalidIdentifier { .. } => "InvalidIdentifier",
                ValidationError::MissingField { .. } => "MissingField",
                ValidationError::FieldTooLong { .. } => "FieldTooLong",
                ValidationError::InvalidFieldValue { .. } => "InvalidFieldValue",
                ValidationError::ImmutableField { .. } => "ImmutableField",
                ValidationError::UnknownEntityType { .. } => "UnknownEntityType",
                ValidationError::UnknownField { .. } => "UnknownField",
                ValidationError::InvalidArgument { .. } => "InvalidArgument",
            },
            Self::Execution(e) => match e {
                ExecutionError::DuplicateEntity { .. } => "DuplicateEntity",
                ExecutionError::EntityNotFound { .. } => "EntityNotFound",
                ExecutionError::UnsupportedField { .. } => "UnsupportedField",
                ExecutionError::TypeMismatch { .. } => "TypeMismatch",
            },
            Self::Storage(_) => "StorageEngineError",
            Self::Config { .. } => "ConfigError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Returns true if retrying the same request could succeed.
    ///
    /// Nothing in this layer retries on its own; the flag is for callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => matches!(e, StorageError::BackendError(_)),
            Self::Validation(_)
            | Self::Execution(_)
            | Self::Config { .. }
            | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for riskgraph operations.
pub type GraphResult<T> = Result<T, GraphError>;
