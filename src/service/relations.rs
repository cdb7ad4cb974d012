//! Relationship maintenance: mirrored reads, owned key lists, on-delete fan-out.

use crate::error::{AccessError, Operation};
use crate::intent::{ArrayIntent, ArrayOp, Column, DeleteIntent, Filter, ReadIntent, UpdateIntent};
use crate::model::value::{format_timestamp, now};
use crate::model::{EntityMetadata, FieldKind, OnDelete, RelationKind};
use crate::options::{Direction, QueryOptions, ResolvedOptions};
use crate::session::Session;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Works on behalf of one session; failures after a primary write are logged by the caller's verb.
pub struct RelationshipManager<'a> {
    session: &'a Session,
}

/// Where a mirrored field's keys live: the source entity and its referencing column.
struct SourceSide {
    meta: Arc<EntityMetadata>,
    options: ResolvedOptions,
    column: Column,
    owned: bool,
}

fn source_side(meta: &EntityMetadata, field: usize) -> Result<Option<(SourceSide, OnDelete)>, AccessError> {
    let Some(RelationKind::ToManyMirrored {
        source,
        source_field,
        on_delete,
    }) = meta.relationship(field).map(|r| &r.kind)
    else {
        return Ok(None);
    };
    let source_meta = source.metadata()?;
    let options = ResolvedOptions::resolve(&source_meta, &QueryOptions::new())?;
    let invalid = |reason: &str| {
        AccessError::InvalidInput(format!(
            "{}.{}: source {}.{} {}",
            meta.type_name,
            meta.fields[field].name,
            source_meta.type_name,
            source_field,
            reason
        ))
    };
    let idx = source_meta.field_index(source_field).ok_or_else(|| invalid("does not exist"))?;
    let column = options.column(idx).ok_or_else(|| invalid("has no storage"))?;
    let owned = match source_meta.relationship(idx).map(|r| &r.kind) {
        Some(RelationKind::ToOne { .. }) => false,
        Some(RelationKind::ToManyOwned { .. }) => true,
        _ => return Err(invalid("is not a to-one or to-many reference")),
    };
    Ok(Some((
        SourceSide {
            meta: source_meta,
            options,
            column,
            owned,
        },
        *on_delete,
    )))
}

impl SourceSide {
    /// Rows referencing any of `keys`.
    fn references_any(&self, keys: &[Value], key_kind: FieldKind) -> Filter {
        if self.owned {
            Filter::Or(keys.iter().map(|k| self.references(k, key_kind)).collect())
        } else {
            Filter::In {
                column: self.column.name.clone(),
                kind: self.column.kind,
                values: keys.to_vec(),
                negated: false,
            }
        }
    }

    fn references(&self, key: &Value, key_kind: FieldKind) -> Filter {
        if self.owned {
            Filter::Contains {
                column: self.column.name.clone(),
                element: key_kind,
                value: key.clone(),
            }
        } else {
            Filter::eq(&self.column, key.clone())
        }
    }

    fn touch(&self) -> Option<(Column, Value)> {
        let idx = self.meta.updated_at?;
        let column = self.options.column(idx)?;
        Some((column, Value::String(format_timestamp(&now()))))
    }
}

impl<'a> RelationshipManager<'a> {
    pub fn new(session: &'a Session) -> Self {
        RelationshipManager { session }
    }

    /// Keys of the live source rows pointing at `key` through the mirrored `field`.
    pub async fn mirrored_keys(&self, meta: &EntityMetadata, field: usize, key: &Value) -> Result<Vec<Value>, AccessError> {
        let Some((side, _)) = source_side(meta, field)? else {
            return Ok(Vec::new());
        };
        let key_column = side.options.key_column();
        let filter = Filter::all(
            side.options
                .not_deleted()
                .into_iter()
                .chain(Some(side.references(key, meta.primary_key().kind)))
                .collect(),
        );
        let intent = ReadIntent {
            table: side.options.table().to_string(),
            columns: vec![key_column.clone()],
            filter,
            order: vec![(key_column.name.clone(), Direction::Asc)],
            limit: None,
            offset: None,
        };
        let records = self.session.read_records(side.meta.type_name, Operation::Relation, &intent).await?;
        Ok(records
            .into_iter()
            .filter_map(|mut r| r.remove(&key_column.name))
            .collect())
    }

    /// Applies each mirrored field's on-delete policy for the deleted `keys`.
    /// Failures are logged per relationship; the primary delete already happened.
    /// `hard` tells whether the rows were removed physically.
    pub fn on_delete<'b>(
        &'b self,
        meta: &'b EntityMetadata,
        keys: &'b [Value],
        hard: bool,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'b>> {
        // boxed: cascades recurse into the referencing entity
        Box::pin(async move {
            if keys.is_empty() {
                return;
            }
            for rel in meta.relationships.iter().filter(|r| r.is_mirrored()) {
                if let Err(e) = self.apply_policy(meta, rel.field, keys, hard).await {
                    tracing::error!(
                        entity = %meta.type_name,
                        field = %meta.fields[rel.field].name,
                        error = %e,
                        "on-delete maintenance failed"
                    );
                }
            }
        })
    }

    async fn apply_policy(&self, meta: &EntityMetadata, field: usize, keys: &[Value], hard: bool) -> Result<(), AccessError> {
        let Some((side, policy)) = source_side(meta, field)? else {
            return Ok(());
        };
        let key_kind = meta.primary_key().kind;
        match policy {
            OnDelete::Ignore => Ok(()),
            OnDelete::SetNull => self.nullify(&side, keys, key_kind).await,
            OnDelete::Cascade => self.cascade(&side, keys, key_kind, hard).await,
        }
    }

    async fn cascade(&self, side: &SourceSide, keys: &[Value], key_kind: FieldKind, hard: bool) -> Result<(), AccessError> {
        let entity = side.meta.type_name;
        let flag = if hard {
            None
        } else {
            side.meta.soft_delete.and_then(|idx| side.options.column(idx))
        };
        let live = if flag.is_some() { side.options.not_deleted() } else { None };
        let key_column = side.options.key_column();
        let intent = ReadIntent {
            table: side.options.table().to_string(),
            columns: vec![key_column.clone()],
            filter: Filter::all(live.into_iter().chain(Some(side.references_any(keys, key_kind))).collect()),
            order: Vec::new(),
            limit: None,
            offset: None,
        };
        let doomed: Vec<Value> = self
            .session
            .read_records(entity, Operation::Relation, &intent)
            .await?
            .into_iter()
            .filter_map(|mut r| r.remove(&key_column.name))
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }
        let filter = Some(Filter::In {
            column: key_column.name.clone(),
            kind: key_column.kind,
            values: doomed.clone(),
            negated: false,
        });
        let physical = flag.is_none();
        let n = match flag {
            Some(flag) => {
                let mut set = vec![(flag, Value::Bool(true))];
                set.extend(side.touch());
                let intent = UpdateIntent {
                    table: side.options.table().to_string(),
                    filter,
                    set,
                };
                self.session.update_records(entity, Operation::Delete, &intent).await?
            }
            None => {
                let intent = DeleteIntent {
                    table: side.options.table().to_string(),
                    filter,
                };
                self.session.delete_records(entity, &intent).await?
            }
        };
        tracing::debug!(entity = %entity, rows = n, hard = physical, "referencing rows deleted");
        self.on_delete(&side.meta, &doomed, physical).await;
        Ok(())
    }

    async fn nullify(&self, side: &SourceSide, keys: &[Value], key_kind: FieldKind) -> Result<(), AccessError> {
        let entity = side.meta.type_name;
        if side.owned {
            for key in keys {
                let intent = ArrayIntent {
                    table: side.options.table().to_string(),
                    filter: side.references(key, key_kind),
                    column: side.column.clone(),
                    element: key_kind,
                    op: ArrayOp::Remove(vec![key.clone()]),
                    touch: side.touch(),
                };
                let n = self.session.update_array(entity, &intent).await?;
                tracing::debug!(entity = %entity, key = %key, rows = n, "key pulled from references");
            }
        } else {
            let mut set = vec![(side.column.clone(), Value::Null)];
            set.extend(side.touch());
            let intent = UpdateIntent {
                table: side.options.table().to_string(),
                filter: Some(side.references_any(keys, key_kind)),
                set,
            };
            let n = self.session.update_records(entity, Operation::Relation, &intent).await?;
            tracing::debug!(entity = %entity, rows = n, "references set to null");
        }
        Ok(())
    }

    /// Adds or removes keys on an owned key list of the rows matching `filter`.
    pub async fn modify_owned(
        &self,
        options: &ResolvedOptions,
        field: usize,
        filter: Filter,
        op: ArrayOp,
    ) -> Result<u64, AccessError> {
        let meta = options.metadata();
        let element = options.owned_element_kind(field)?.ok_or_else(|| {
            AccessError::InvalidInput(format!(
                "{}: field '{}' is not a to-many key list",
                meta.type_name, meta.fields[field].name
            ))
        })?;
        let column = options.column(field).ok_or_else(|| {
            AccessError::InvalidInput(format!("{}: field '{}' has no storage", meta.type_name, meta.fields[field].name))
        })?;
        let touch = meta
            .updated_at
            .and_then(|idx| options.column(idx))
            .map(|c| (c, Value::String(format_timestamp(&now()))));
        let intent = ArrayIntent {
            table: options.table().to_string(),
            filter,
            column,
            element,
            op,
            touch,
        };
        self.session.update_array(meta.type_name, &intent).await
    }
}
