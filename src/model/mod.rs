//! Entity metadata model: declaration, validation, cached registry.

pub mod builder;
pub mod key;
pub mod registry;
pub mod types;
pub mod validator;
pub mod value;

pub use builder::{Entity, FieldDecl, ModelBuilder};
pub use key::EntityKey;
pub use registry::{metadata_of, EntityModel};
pub use types::{
    Constraints, EntityMetadata, EntityRef, FieldDescriptor, FieldKind, KeyStrategy, OnDelete, RelationKind,
    RelationshipDescriptor, Role,
};
pub use value::{format_timestamp, FieldValue};
