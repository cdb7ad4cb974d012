//! Entity access: metadata-driven persistence over SQL databases and document stores.

pub mod accessor;
pub mod case;
pub mod config;
pub mod document;
pub mod error;
pub mod intent;
pub mod migration;
pub mod model;
pub mod options;
pub mod service;
pub mod session;
pub mod sql;
pub mod state;

pub use config::{DbConfig, DbType};
pub use document::{DocumentStore, MemoryDocumentStore};
#[cfg(feature = "mongodb")]
pub use document::MongoDocumentStore;
pub use error::{AccessError, BackendError, CheckError, ConfigError, DocumentError, MetadataError, Operation};
pub use migration::{create_table_statements, create_table_statements_for};
pub use model::{metadata_of, Entity, EntityKey, EntityMetadata, FieldKind, ModelBuilder, OnDelete};
pub use options::{Condition, Direction, Operator, OrderBy, QueryOption, QueryOptions};
pub use service::{EntityCheck, MetadataCheck};
pub use session::{Session, SessionScope};
pub use sql::{Dialect, SqlPool};
pub use state::{DataAccess, Strategy};
