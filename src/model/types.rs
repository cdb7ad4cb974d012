//! Resolved entity metadata: fields, roles, relationships. Immutable once built.

use crate::error::MetadataError;
use crate::model::builder::Entity;
use crate::model::registry::erased_metadata;
use std::fmt;
use std::sync::Arc;

/// Storage-independent value kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Integer,
    Long,
    Double,
    Text,
    Uuid,
    Timestamp,
    Date,
    /// Arbitrary JSON; arrays of keys for to-many relationships.
    Json,
}

impl FieldKind {
    pub fn is_key_kind(self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Long | FieldKind::Uuid | FieldKind::Text)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Long | FieldKind::Double)
    }
}

/// Lifecycle role of a field. Role-tagged fields other than the primary key are engine-populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    None,
    PrimaryKey,
    SoftDelete,
    CreatedAt,
    UpdatedAt,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::None => "none",
            Role::PrimaryKey => "primary-key",
            Role::SoftDelete => "soft-delete",
            Role::CreatedAt => "created-at",
            Role::UpdatedAt => "updated-at",
        }
    }

    pub fn is_lifecycle(self) -> bool {
        matches!(self, Role::SoftDelete | Role::CreatedAt | Role::UpdatedAt)
    }
}

/// How a primary key gets its value on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Database identity column, or a counter document on document stores.
    AutoIncrement,
    /// Random v4 UUID generated by the engine.
    Uuid,
    /// Caller supplies the key.
    Provided,
}

/// What happens to referencing rows when a mirrored target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    /// Null the scalar reference, pull the key out of key lists.
    #[default]
    SetNull,
    /// Delete the referencing rows too: soft when the triggering delete was soft and they have a flag.
    Cascade,
    Ignore,
}

/// Lazily resolved reference to another entity type's metadata.
#[derive(Clone, Copy)]
pub struct EntityRef {
    type_name: &'static str,
    resolve: fn() -> Result<Arc<EntityMetadata>, MetadataError>,
}

impl EntityRef {
    pub fn of<U: Entity>() -> Self {
        EntityRef {
            type_name: crate::case::short_type_name(std::any::type_name::<U>()),
            resolve: erased_metadata::<U>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn metadata(&self) -> Result<Arc<EntityMetadata>, MetadataError> {
        (self.resolve)()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({})", self.type_name)
    }
}

#[derive(Debug, Clone)]
pub enum RelationKind {
    /// Scalar key of the target stored on this entity.
    ToOne { target: EntityRef },
    /// Array of target keys stored on this entity, with set semantics.
    ToManyOwned { target: EntityRef },
    /// Never stored; computed from `source_field` on the `source` entity.
    ToManyMirrored {
        source: EntityRef,
        source_field: String,
        on_delete: OnDelete,
    },
}

#[derive(Debug, Clone)]
pub struct RelationshipDescriptor {
    /// Index of the field in `EntityMetadata::fields`.
    pub field: usize,
    pub kind: RelationKind,
}

impl RelationshipDescriptor {
    pub fn is_owned_array(&self) -> bool {
        matches!(self.kind, RelationKind::ToManyOwned { .. })
    }

    pub fn is_mirrored(&self) -> bool {
        matches!(self.kind, RelationKind::ToManyMirrored { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub max_length: Option<u32>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub unique: bool,
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Logical name, as seen by callers and serde.
    pub name: String,
    /// None when the field has no storage representation (transient, mirrored).
    pub storage_name: Option<String>,
    pub kind: FieldKind,
    pub nullable: bool,
    /// Storage-level default expression, passed through to DDL verbatim.
    pub default_value: Option<String>,
    pub creatable: bool,
    pub updatable: bool,
    /// False for fields only read when all columns are requested.
    pub read_by_default: bool,
    pub role: Role,
    pub key_strategy: Option<KeyStrategy>,
    pub constraints: Constraints,
    pub comment: Option<String>,
}

impl FieldDescriptor {
    pub fn column(&self) -> Option<&str> {
        self.storage_name.as_deref()
    }

    pub fn is_stored(&self) -> bool {
        self.storage_name.is_some()
    }

    /// Writable by callers, ignoring force flags.
    pub fn is_editable(&self) -> bool {
        self.is_stored() && self.role == Role::None
    }
}

#[derive(Debug)]
pub struct EntityMetadata {
    pub type_name: &'static str,
    pub table_name: String,
    pub fields: Vec<FieldDescriptor>,
    pub primary_key: usize,
    pub soft_delete: Option<usize>,
    pub created_at: Option<usize>,
    pub updated_at: Option<usize>,
    pub relationships: Vec<RelationshipDescriptor>,
}

impl EntityMetadata {
    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key]
    }

    pub fn soft_delete_field(&self) -> Option<&FieldDescriptor> {
        self.soft_delete.map(|i| &self.fields[i])
    }

    pub fn created_at_field(&self) -> Option<&FieldDescriptor> {
        self.created_at.map(|i| &self.fields[i])
    }

    pub fn updated_at_field(&self) -> Option<&FieldDescriptor> {
        self.updated_at.map(|i| &self.fields[i])
    }

    /// Field index by logical name, falling back to storage name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| self.fields.iter().position(|f| f.column() == Some(name)))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    pub fn relationship(&self, field: usize) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.field == field)
    }
}
