//! Error types for ORM operations

use thiserror::Error;

/// Boxed error raised by a [`QueryRunner`](crate::runner::QueryRunner) implementation.
pub type ExecutionSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while classifying, rendering, mapping or persisting entities
#[derive(Debug, Error)]
pub enum OrmError {
    /// The entity declaration is inconsistent (e.g. a field is both transient and a column)
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// The declaration uses a feature that is deliberately not implemented yet
    #[error("Not yet implemented: {0}")]
    NotYetImplemented(String),

    /// A relation lookup asked for a type that is not part of the relation graph
    #[error("Type not in relation graph: {0}")]
    TypeNotInRelation(String),

    /// A result row could not be turned into an entity
    #[error("Failed to map row to {target}: {source}")]
    RowMapping {
        target: String,
        #[source]
        source: Box<OrmError>,
    },

    /// A value could not be converted into the declared field type
    #[error("Value conversion error: {0}")]
    ValueConversion(String),

    /// An operation needed an identifier but the entity has none
    #[error("Missing identifier: {0}")]
    MissingIdentifier(String),

    /// The SQL runner failed; the source is passed through untouched
    #[error("Execution error: {0}")]
    Execution(#[source] ExecutionSource),
}

impl OrmError {
    pub fn invalid_entity(msg: impl Into<String>) -> Self {
        Self::InvalidEntity(msg.into())
    }

    pub fn not_yet_implemented(msg: impl Into<String>) -> Self {
        Self::NotYetImplemented(msg.into())
    }

    pub fn type_not_in_relation(msg: impl Into<String>) -> Self {
        Self::TypeNotInRelation(msg.into())
    }

    pub fn value_conversion(msg: impl Into<String>) -> Self {
        Self::ValueConversion(msg.into())
    }

    pub fn missing_identifier(msg: impl Into<String>) -> Self {
        Self::MissingIdentifier(msg.into())
    }

    pub fn execution(source: impl Into<ExecutionSource>) -> Self {
        Self::Execution(source.into())
    }

    /// Wrap an error raised while building an instance of `target`
    pub fn row_mapping(target: impl Into<String>, source: OrmError) -> Self {
        Self::RowMapping {
            target: target.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;
