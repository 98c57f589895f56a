//! Error types for the Cellbox engine.

use crate::{EntityTypeName, RecordId};
use thiserror::Error;

/// Broad category of an [`Error`], used by adapters to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Reserved name, illegal charset, limit exceeded, unknown nested type.
    Schema,
    /// Value does not conform to a declared field type.
    Type,
    /// Version tag mismatch or malformed precondition.
    Precondition,
    /// Unknown record, entity type or navigation property.
    NotFound,
    /// Duplicate key, duplicate link or multiplicity violation.
    Conflict,
    /// Unparsable query option or option outside its bound.
    Query,
    /// Backend fault; potentially retryable by the caller.
    Internal,
}

/// All possible errors from the Cellbox engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Schema violations
    #[error("invalid {what} name: '{name}'")]
    InvalidName { what: &'static str, name: String },

    #[error("reserved field in request body: {0}")]
    ReservedField(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("object value for undeclared field: {0}")]
    UndeclaredObject(String),

    #[error("undeclared field '{field}' in complex type {complex_type}")]
    UndeclaredComplexField { complex_type: String, field: String },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("too many fields: {actual} exceeds limit of {limit}")]
    TooManyFields { limit: usize, actual: usize },

    #[error("record limit of {limit} reached for entity type {entity_type}")]
    RecordLimit {
        entity_type: EntityTypeName,
        limit: usize,
    },

    #[error("link limit of {limit} reached for record {id}")]
    LinkLimit { id: RecordId, limit: usize },

    #[error("unknown complex type: {0}")]
    UnknownComplexType(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    // Type violations
    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("invalid value for field '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    // Precondition failures
    #[error("precondition failed: expected {expected}, current {actual}")]
    PreconditionFailed { expected: String, actual: String },

    #[error("malformed precondition: {0}")]
    MalformedPrecondition(String),

    // Not found
    #[error("entity type not found: {0}")]
    EntityTypeNotFound(EntityTypeName),

    #[error("record not found: {entity_type}('{id}')")]
    RecordNotFound {
        entity_type: EntityTypeName,
        id: RecordId,
    },

    #[error("navigation property not found: {0}")]
    NavigationNotFound(String),

    #[error("link not found: {0}")]
    LinkNotFound(String),

    // Conflicts
    #[error("record already exists: {entity_type}('{id}')")]
    RecordAlreadyExists {
        entity_type: EntityTypeName,
        id: RecordId,
    },

    #[error("link already exists: {0}")]
    LinkAlreadyExists(String),

    #[error("multiplicity violation: {0}")]
    Multiplicity(String),

    #[error("record {0} still has links and cannot be deleted")]
    LinkedRecord(RecordId),

    // Query errors
    #[error("invalid {option}: {message}")]
    QuerySyntax {
        option: &'static str,
        message: String,
    },

    #[error("{option} out of bounds: {message}")]
    QueryLimit {
        option: &'static str,
        message: String,
    },

    // Internal faults
    #[error("backend unavailable: {0}")]
    Backend(String),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidName { .. }
            | Error::ReservedField(_)
            | Error::InvalidPayload(_)
            | Error::UndeclaredObject(_)
            | Error::UndeclaredComplexField { .. }
            | Error::MissingRequiredField(_)
            | Error::TooManyFields { .. }
            | Error::RecordLimit { .. }
            | Error::LinkLimit { .. }
            | Error::UnknownComplexType(_)
            | Error::InvalidCatalog(_) => ErrorKind::Schema,
            Error::TypeMismatch { .. } | Error::InvalidValue { .. } => ErrorKind::Type,
            Error::PreconditionFailed { .. } | Error::MalformedPrecondition(_) => {
                ErrorKind::Precondition
            }
            Error::EntityTypeNotFound(_)
            | Error::RecordNotFound { .. }
            | Error::NavigationNotFound(_)
            | Error::LinkNotFound(_) => ErrorKind::NotFound,
            Error::RecordAlreadyExists { .. }
            | Error::LinkAlreadyExists(_)
            | Error::Multiplicity(_)
            | Error::LinkedRecord(_) => ErrorKind::Conflict,
            Error::QuerySyntax { .. } | Error::QueryLimit { .. } => ErrorKind::Query,
            Error::Backend(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn syntax(option: &'static str, message: impl Into<String>) -> Self {
        Error::QuerySyntax {
            option,
            message: message.into(),
        }
    }

    pub(crate) fn limit(option: &'static str, message: impl Into<String>) -> Self {
        Error::QueryLimit {
            option,
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(
        field: impl Into<String>,
        expected: impl std::fmt::Display,
        got: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch {
            field: field.into(),
            expected: expected.to_string(),
            got: got.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
