//! Typed errors for metadata, options, backends and configuration.

use std::fmt;
use thiserror::Error;

/// Errors raised while building entity metadata. Cached with the failed type, so they must be Clone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("{entity}: storage name '{name}' is used by more than one field")]
    DuplicateStorageName { entity: String, name: String },
    #[error("{entity}: field '{field}' is declared more than once")]
    DuplicateField { entity: String, field: String },
    #[error("{entity}: more than one field carries the {role} role")]
    DuplicateRole { entity: String, role: &'static str },
    #[error("{entity}: no primary key declared")]
    MissingPrimaryKey { entity: String },
    #[error("{entity}: '{name}' is not a valid identifier")]
    InvalidIdentifier { entity: String, name: String },
    #[error("{entity}: field '{field}': {reason}")]
    InvalidField { entity: String, field: String, reason: String },
    #[error("{entity}: relationship '{field}': {reason}")]
    InvalidRelationship { entity: String, field: String, reason: String },
}

/// Errors from the document layer: rendered documents the store cannot interpret, or driver failures.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("duplicate key {key} in '{collection}'")]
    DuplicateKey { collection: String, key: String },
    #[cfg(feature = "mongodb")]
    #[error("mongodb: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[cfg(feature = "mongodb")]
    #[error("bson: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("database: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("document store: {0}")]
    Document(#[from] DocumentError),
}

/// Raised by an `EntityCheck` hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct CheckError {
    pub field: String,
    pub message: String,
}

impl CheckError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        CheckError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The verb that was running when a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Get,
    Count,
    Update,
    Delete,
    Restore,
    Relation,
    CreateTable,
    Drop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Insert => "insert",
            Operation::Get => "get",
            Operation::Count => "count",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Restore => "restore",
            Operation::Relation => "relation",
            Operation::CreateTable => "create table",
            Operation::Drop => "drop",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("option conflict: {0}")]
    OptionConflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{entity}: check failed: {source}")]
    Check {
        entity: String,
        #[source]
        source: CheckError,
    },
    #[error("{entity}: field '{field}': {message}")]
    Marshal {
        entity: String,
        field: String,
        message: String,
    },
    #[error("{entity}: {operation} failed: {source}")]
    Backend {
        entity: String,
        operation: Operation,
        #[source]
        source: BackendError,
    },
    #[error("{entity}: record {id} not found")]
    NotFound { entity: String, id: String },
    #[error("connect: {0}")]
    Connect(#[source] BackendError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl AccessError {
    /// Wraps a backend failure with the entity and verb it happened in.
    pub fn backend(entity: &str, operation: Operation) -> impl FnOnce(BackendError) -> AccessError + '_ {
        move |source| AccessError::Backend {
            entity: entity.to_string(),
            operation,
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}
