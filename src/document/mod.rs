//! Document-store execution strategy: filter / update documents over a pluggable store.

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod render;

pub use memory::MemoryDocumentStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDocumentStore;

use crate::error::DocumentError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

pub type Document = Map<String, Value>;

/// Name of the collection holding auto-increment counters.
pub const COUNTERS_COLLECTION: &str = "counters";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    /// Keys to return; empty returns whole documents.
    pub projection: Vec<String>,
    /// (key, 1 ascending | -1 descending)
    pub sort: Vec<(String, i32)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Minimal document database surface. Filters and updates use MongoDB operator syntax.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// `key` names the primary key; a second document with the same value fails with `DuplicateKey`.
    async fn insert_one(&self, collection: &str, key: &str, document: Document) -> Result<(), DocumentError>;

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, DocumentError>;

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, DocumentError>;

    /// Applies `update` to every match; returns the number of matched documents.
    async fn update_many(&self, collection: &str, filter: &Document, update: &Document) -> Result<u64, DocumentError>;

    async fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64, DocumentError>;

    /// Atomically increments and returns the counter stored under `name` in the counters collection.
    async fn next_sequence(&self, name: &str) -> Result<i64, DocumentError>;

    /// Moves the counter up to `value` if it is behind, so later sequences skip a key written directly.
    async fn raise_sequence(&self, name: &str, value: i64) -> Result<(), DocumentError>;

    async fn drop_collection(&self, collection: &str) -> Result<(), DocumentError>;
}

/// Parses a storage default expression as a document literal: JSON first, then SQL-style quoted text.
pub fn default_literal(expr: &str) -> Value {
    let trimmed = expr.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return v;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        return Value::String(trimmed[1..trimmed.len() - 1].replace("''", "'"));
    }
    Value::String(trimmed.to_string())
}
