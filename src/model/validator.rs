//! Turns a `ModelBuilder` into validated metadata plus accessors.

use crate::accessor::Accessor;
use crate::case::{is_identifier, short_type_name, to_snake_case};
use crate::error::MetadataError;
use crate::model::builder::{Entity, ModelBuilder, RelationDecl};
use crate::model::registry::EntityModel;
use crate::model::types::*;
use crate::model::value::infer_kind;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn role_default_kind(role: Role) -> Option<FieldKind> {
    match role {
        Role::SoftDelete => Some(FieldKind::Bool),
        Role::CreatedAt | Role::UpdatedAt => Some(FieldKind::Timestamp),
        Role::None | Role::PrimaryKey => None,
    }
}

fn default_key_strategy(kind: FieldKind) -> KeyStrategy {
    match kind {
        FieldKind::Integer | FieldKind::Long => KeyStrategy::AutoIncrement,
        FieldKind::Uuid => KeyStrategy::Uuid,
        _ => KeyStrategy::Provided,
    }
}

pub(crate) fn resolve<T: Entity>(builder: ModelBuilder<T>) -> Result<EntityModel<T>, MetadataError> {
    let type_name = short_type_name(std::any::type_name::<T>());
    let entity = type_name.to_string();
    let table_name = builder.table.unwrap_or_else(|| to_snake_case(type_name));
    if !is_identifier(&table_name) {
        return Err(MetadataError::InvalidIdentifier {
            entity,
            name: table_name,
        });
    }
    // Kind / nullability fallback for fields without a typed binding.
    let sample: Map<String, Value> = match serde_json::to_value(T::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let mut fields = Vec::with_capacity(builder.fields.len());
    let mut accessors = Vec::with_capacity(builder.fields.len());
    let mut relationships = Vec::new();
    let mut names = HashSet::new();
    let mut storage_names = HashSet::new();
    let mut primary_key = None;
    let mut soft_delete = None;
    let mut created_at = None;
    let mut updated_at = None;

    for (idx, decl) in builder.fields.into_iter().enumerate() {
        let invalid = |reason: &str| MetadataError::InvalidField {
            entity: entity.clone(),
            field: decl.name.clone(),
            reason: reason.to_string(),
        };
        let invalid_relation = |reason: &str| MetadataError::InvalidRelationship {
            entity: entity.clone(),
            field: decl.name.clone(),
            reason: reason.to_string(),
        };
        if !names.insert(decl.name.clone()) {
            return Err(MetadataError::DuplicateField {
                entity,
                field: decl.name,
            });
        }
        if decl.roles_declared > 1 {
            return Err(invalid("more than one role declared"));
        }
        let role = decl.role;

        let bound = decl.binding.as_ref().map(|b| (b.kind, b.nullable));
        let sampled = sample.get(&decl.name);
        let kind = decl
            .kind
            .or(bound.map(|b| b.0))
            .or(role_default_kind(role))
            .or(sampled.map(infer_kind))
            .unwrap_or(FieldKind::Json);
        let mut nullable = decl
            .nullable
            .or(bound.map(|b| b.1))
            .or(sampled.map(Value::is_null))
            .unwrap_or(true);

        let mirrored = matches!(decl.relation, Some(RelationDecl::Mirrored { .. }));
        let storage_name = if decl.transient || mirrored {
            if decl.column.is_some() {
                return Err(invalid("field without storage cannot declare a column"));
            }
            if role != Role::None {
                return Err(invalid("field without storage cannot carry a role"));
            }
            None
        } else {
            let name = decl.column.clone().unwrap_or_else(|| to_snake_case(&decl.name));
            if !is_identifier(&name) {
                return Err(MetadataError::InvalidIdentifier { entity, name });
            }
            if !storage_names.insert(name.clone()) {
                return Err(MetadataError::DuplicateStorageName { entity, name });
            }
            Some(name)
        };

        let mut creatable = decl.creatable;
        let mut updatable = decl.updatable;
        let mut key_strategy = None;
        if decl.key_strategy.is_some() && role != Role::PrimaryKey {
            return Err(invalid("key strategy on a field that is not the primary key"));
        }
        let duplicate_role = |slot: &Option<usize>| -> Result<(), MetadataError> {
            if slot.is_some() {
                return Err(MetadataError::DuplicateRole {
                    entity: entity.clone(),
                    role: role.label(),
                });
            }
            Ok(())
        };
        match role {
            Role::PrimaryKey => {
                duplicate_role(&primary_key)?;
                if !kind.is_key_kind() {
                    return Err(invalid("primary key must be an integer, uuid or text field"));
                }
                let strategy = decl.key_strategy.unwrap_or_else(|| default_key_strategy(kind));
                match strategy {
                    KeyStrategy::AutoIncrement if !matches!(kind, FieldKind::Integer | FieldKind::Long) => {
                        return Err(invalid("auto-increment requires an integer key"));
                    }
                    KeyStrategy::Uuid if kind != FieldKind::Uuid => {
                        return Err(invalid("generated uuid requires a uuid key"));
                    }
                    _ => {}
                }
                key_strategy = Some(strategy);
                updatable = false;
                nullable = false;
                primary_key = Some(idx);
            }
            Role::SoftDelete => {
                duplicate_role(&soft_delete)?;
                if kind != FieldKind::Bool {
                    return Err(invalid("soft-delete flag must be boolean"));
                }
                soft_delete = Some(idx);
            }
            Role::CreatedAt | Role::UpdatedAt => {
                let slot = if role == Role::CreatedAt { &mut created_at } else { &mut updated_at };
                duplicate_role(&*slot)?;
                if kind != FieldKind::Timestamp {
                    return Err(invalid("lifecycle timestamp must be a timestamp field"));
                }
                *slot = Some(idx);
            }
            Role::None => {}
        }
        if role.is_lifecycle() {
            creatable = false;
            updatable = false;
            nullable = false;
        }

        if decl.on_delete != OnDelete::default() && !mirrored {
            return Err(invalid_relation("on-delete policy only applies to mirrored fields"));
        }
        match &decl.relation {
            Some(RelationDecl::ToOne(target)) => {
                if !kind.is_key_kind() {
                    return Err(invalid_relation("to-one reference must hold a key"));
                }
                relationships.push(RelationshipDescriptor {
                    field: idx,
                    kind: RelationKind::ToOne { target: *target },
                });
            }
            Some(RelationDecl::ToManyOwned(target)) => {
                if kind != FieldKind::Json {
                    return Err(invalid_relation("to-many reference must be a list of keys"));
                }
                relationships.push(RelationshipDescriptor {
                    field: idx,
                    kind: RelationKind::ToManyOwned { target: *target },
                });
            }
            Some(RelationDecl::Mirrored { source, source_field }) => {
                creatable = false;
                updatable = false;
                relationships.push(RelationshipDescriptor {
                    field: idx,
                    kind: RelationKind::ToManyMirrored {
                        source: *source,
                        source_field: source_field.clone(),
                        on_delete: decl.on_delete,
                    },
                });
            }
            None => {}
        }

        let accessor = match decl.binding {
            Some(binding) if decl.kind.map_or(true, |k| k == binding.kind) => Accessor::direct(&decl.name, binding),
            Some(binding) => {
                tracing::warn!(
                    entity = %entity,
                    field = %decl.name,
                    declared = ?decl.kind,
                    bound = ?binding.kind,
                    "typed accessor conflicts with declared kind, using serde accessor"
                );
                Accessor::universal(&decl.name)
            }
            None => {
                tracing::debug!(entity = %entity, field = %decl.name, "no typed accessor, using serde accessor");
                Accessor::universal(&decl.name)
            }
        };
        accessors.push(accessor);

        fields.push(FieldDescriptor {
            name: decl.name,
            storage_name,
            kind,
            nullable,
            default_value: decl.default_value,
            creatable,
            updatable,
            read_by_default: decl.read_by_default,
            role,
            key_strategy,
            constraints: decl.constraints,
            comment: decl.comment,
        });
    }

    let primary_key = primary_key.ok_or_else(|| MetadataError::MissingPrimaryKey { entity: entity.clone() })?;
    let metadata = EntityMetadata {
        type_name,
        table_name,
        fields,
        primary_key,
        soft_delete,
        created_at,
        updated_at,
        relationships,
    };
    tracing::debug!(
        entity = %entity,
        table = %metadata.table_name,
        fields = metadata.fields.len(),
        "entity metadata built"
    );
    Ok(EntityModel::new(Arc::new(metadata), accessors))
}
