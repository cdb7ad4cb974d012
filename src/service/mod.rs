//! CRUD verbs, relationship maintenance and validation hooks.

mod crud;
pub mod relations;
pub mod validation;

pub use relations::RelationshipManager;
pub use validation::{EntityCheck, MetadataCheck};
