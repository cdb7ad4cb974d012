//! Generic CRUD verbs on a session, shared by both execution strategies.

use crate::document::default_literal;
use crate::error::{AccessError, Operation};
use crate::intent::{ArrayOp, Column, DeleteIntent, Filter, InsertIntent, ReadIntent, UpdateIntent};
use crate::migration::create_table_statements;
use crate::model::value::{format_timestamp, now};
use crate::model::{metadata_of, Entity, EntityKey, EntityMetadata, EntityModel, KeyStrategy, Role};
use crate::options::{Operator, QueryOption, QueryOptions, ResolvedOptions};
use crate::service::relations::RelationshipManager;
use crate::session::Session;
use crate::sql::executor::Record;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Metadata, accessors and resolved options for one call.
struct Call<T> {
    model: Arc<EntityModel<T>>,
    options: ResolvedOptions,
}

impl<T: Entity> Call<T> {
    fn new(options: &QueryOptions) -> Result<Self, AccessError> {
        let model = metadata_of::<T>()?;
        let options = ResolvedOptions::resolve(model.metadata(), options)?;
        Ok(Call { model, options })
    }

    fn meta(&self) -> &EntityMetadata {
        self.model.metadata()
    }

    fn entity(&self) -> &'static str {
        self.model.metadata().type_name
    }

    fn key(&self, id: &EntityKey) -> Result<Value, AccessError> {
        id.for_field(self.entity(), self.meta().primary_key())
    }

    fn require_condition(&self, verb: &str) -> Result<(), AccessError> {
        if self.options.has_condition() {
            Ok(())
        } else {
            Err(AccessError::InvalidInput(format!(
                "{}: {} requires at least one condition",
                self.entity(),
                verb
            )))
        }
    }

    fn timestamp(&self, idx: Option<usize>) -> Option<(Column, Value)> {
        let column = self.options.column(idx?)?;
        Some((column, Value::String(format_timestamp(&now()))))
    }

    fn check_all(&self, values: &Map<String, Value>) -> Result<(), AccessError> {
        for hook in self.options.checks() {
            hook.check_all(self.meta(), values).map_err(|source| AccessError::Check {
                entity: self.entity().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    fn check(&self, values: &Map<String, Value>, fields: &[String]) -> Result<(), AccessError> {
        for hook in self.options.checks() {
            hook.check(self.meta(), values, fields).map_err(|source| AccessError::Check {
                entity: self.entity().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    fn soft_delete_column(&self) -> Option<Column> {
        self.options.column(self.meta().soft_delete?)
    }

    fn has_delete_fan_out(&self) -> bool {
        self.meta().relationships.iter().any(|r| r.is_mirrored())
    }
}

/// Generated key fields left at their default: null, zero, empty, nil uuid.
fn is_unset(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == &Uuid::nil().to_string(),
        _ => false,
    }
}

fn key_list(v: &Value) -> Vec<Value> {
    v.as_array().cloned().unwrap_or_default()
}

/// Order-preserving dedup of an owned key list.
fn dedup_keys(v: Value) -> Value {
    match v {
        Value::Array(items) => {
            let mut out: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !out.contains(&item) {
                    out.push(item);
                }
            }
            Value::Array(out)
        }
        other => other,
    }
}

impl Session {
    fn relations(&self) -> RelationshipManager<'_> {
        RelationshipManager::new(self)
    }

    /// Inserts `item` and returns it as stored: generated key, timestamps, defaults.
    pub async fn insert<T: Entity>(&self, item: &T, options: &QueryOptions) -> Result<T, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let meta = call.meta();
        let entity = call.entity();
        let opts = &call.options;
        let is_document = self.strategy().is_document();
        let stamp = Value::String(format_timestamp(&now()));

        let mut values: Vec<(Column, Value)> = Vec::new();
        let mut logical = Map::new();
        // explicit value written into an auto-increment key
        let mut advance = None;
        for (idx, field) in meta.fields.iter().enumerate() {
            let Some(column) = opts.column(idx) else { continue };
            let value = match field.role {
                Role::PrimaryKey => {
                    let provided = call.model.read(item, idx)?;
                    match field.key_strategy.unwrap_or(KeyStrategy::Provided) {
                        // zero is a valid caller key
                        KeyStrategy::Provided if provided.is_null() || provided.as_str() == Some("") => {
                            return Err(AccessError::InvalidInput(format!(
                                "{}: primary key '{}' must be provided",
                                entity, field.name
                            )));
                        }
                        KeyStrategy::Provided => provided,
                        strategy if !is_unset(&provided) => {
                            if !opts.direct_key() {
                                return Err(AccessError::InvalidInput(format!(
                                    "{}: primary key '{}' is generated; pass the direct primary key option to set it",
                                    entity, field.name
                                )));
                            }
                            if strategy == KeyStrategy::AutoIncrement {
                                advance = provided.as_i64();
                            }
                            provided
                        }
                        KeyStrategy::Uuid => Value::String(Uuid::new_v4().to_string()),
                        KeyStrategy::AutoIncrement if is_document => {
                            Value::from(self.next_sequence(entity, opts.table()).await?)
                        }
                        // identity column
                        KeyStrategy::AutoIncrement => continue,
                    }
                }
                Role::SoftDelete => Value::Bool(false),
                Role::CreatedAt | Role::UpdatedAt => stamp.clone(),
                Role::None => {
                    if !field.creatable && !opts.force_write() {
                        continue;
                    }
                    let mut v = call.model.read(item, idx)?;
                    if meta.relationship(idx).map_or(false, |r| r.is_owned_array()) {
                        v = dedup_keys(v);
                    }
                    match (&field.default_value, v.is_null()) {
                        (Some(default), true) if is_document => default_literal(default),
                        // left to the column default
                        (Some(_), true) => continue,
                        _ => v,
                    }
                }
            };
            logical.insert(field.name.clone(), value.clone());
            values.push((column, value));
        }
        call.check_all(&logical)?;

        let intent = InsertIntent {
            table: opts.table().to_string(),
            values,
            key: opts.key_column(),
        };
        let key = self.insert_record(entity, &intent).await?;
        tracing::debug!(entity = %entity, key = %key, "inserted");
        if let Some(n) = advance {
            self.advance_key(entity, &intent.table, &intent.key.name, n).await?;
        }

        let readback = options.storage_only().with(QueryOption::ReadAllColumn);
        self.get_by_id::<T>(&EntityKey::from(key.clone()), &readback)
            .await?
            .ok_or_else(|| AccessError::NotFound {
                entity: entity.to_string(),
                id: key.to_string(),
            })
    }

    /// Sequential inserts inside one scope.
    pub async fn insert_multiple<T: Entity>(&self, items: &[T], options: &QueryOptions) -> Result<Vec<T>, AccessError> {
        let _scope = self.scope();
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.insert(item, options).await?);
        }
        Ok(out)
    }

    async fn load<T: Entity>(&self, call: &Call<T>, intent: &ReadIntent) -> Result<Vec<T>, AccessError> {
        let records = self.read_records(call.entity(), Operation::Get, intent).await?;
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.materialize(call, &intent.columns, record).await?);
        }
        Ok(out)
    }

    async fn materialize<T: Entity>(&self, call: &Call<T>, columns: &[Column], mut record: Record) -> Result<T, AccessError> {
        let mut item = T::default();
        let key_name = call.options.key_column().name;
        let key = record.get(&key_name).cloned().unwrap_or(Value::Null);
        for column in columns {
            let value = record.remove(&column.name).unwrap_or(Value::Null);
            call.model.write(&mut item, column.field, value)?;
        }
        for field in call.options.mirrored_reads() {
            let keys = self.relations().mirrored_keys(call.meta(), field, &key).await?;
            call.model.write(&mut item, field, Value::Array(keys))?;
        }
        Ok(item)
    }

    fn read_intent<T: Entity>(&self, call: &Call<T>, filter: Option<Filter>) -> ReadIntent {
        ReadIntent {
            table: call.options.table().to_string(),
            columns: call.options.projection(),
            filter,
            order: call.options.order(),
            limit: call.options.limit(),
            offset: call.options.offset(),
        }
    }

    /// The live record with this key, also subject to any conditions in `options`.
    pub async fn get_by_id<T: Entity>(&self, id: &EntityKey, options: &QueryOptions) -> Result<Option<T>, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let key = call.key(id)?;
        let filter = Filter::all(
            Some(call.options.key_filter(key))
                .into_iter()
                .chain(call.options.effective_filter())
                .collect(),
        );
        let mut intent = self.read_intent(&call, filter);
        intent.limit = Some(1);
        intent.offset = None;
        Ok(self.load(&call, &intent).await?.into_iter().next())
    }

    /// First record matching the options' conditions and ordering.
    pub async fn get_where<T: Entity>(&self, options: &QueryOptions) -> Result<Option<T>, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let mut intent = self.read_intent(&call, call.options.effective_filter());
        intent.limit = Some(1);
        Ok(self.load(&call, &intent).await?.into_iter().next())
    }

    /// All records matching the options, ordered and paged.
    pub async fn gets<T: Entity>(&self, options: &QueryOptions) -> Result<Vec<T>, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let intent = self.read_intent(&call, call.options.effective_filter());
        self.load(&call, &intent).await
    }

    pub async fn count<T: Entity>(&self, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        self.count_records(call.entity(), call.options.table(), call.options.effective_filter().as_ref())
            .await
    }

    /// Like `count`, but at least one condition must be given.
    pub async fn count_where<T: Entity>(&self, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        call.require_condition("count_where")?;
        self.count_records(call.entity(), call.options.table(), call.options.effective_filter().as_ref())
            .await
    }

    /// Writes the editable fields of `item` to the live record with this key. Returns matched records.
    pub async fn update_by_id<T: Entity>(&self, id: &EntityKey, item: &T, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let key = call.key(id)?;
        let fields = self.write_candidates(&call);
        let values = call.model.values(item, &fields)?;
        let filter = Some(call.options.key_filter(key));
        self.apply_update(&call, values, filter).await
    }

    /// Updates only the fields named in `patch` (logical or storage names).
    pub async fn update_by_id_with_json<T: Entity>(
        &self,
        id: &EntityKey,
        patch: &Value,
        options: &QueryOptions,
    ) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let key = call.key(id)?;
        let Value::Object(patch) = patch else {
            return Err(AccessError::InvalidInput(format!("{}: update patch must be a JSON object", call.entity())));
        };
        let mut values = Map::new();
        for (name, value) in patch {
            let idx = call.meta().field_index(name).ok_or_else(|| {
                AccessError::InvalidInput(format!("{}: unknown field '{}' in update patch", call.entity(), name))
            })?;
            values.insert(call.meta().fields[idx].name.clone(), value.clone());
        }
        self.apply_update(&call, values, Some(call.options.key_filter(key))).await
    }

    /// Writes the editable fields of `item` to every live record matching the options' conditions.
    pub async fn update_where<T: Entity>(&self, item: &T, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        call.require_condition("update_where")?;
        let fields = self.write_candidates(&call);
        let values = call.model.values(item, &fields)?;
        self.apply_update(&call, values, None).await
    }

    /// Editable stored fields, narrowed by include / omit.
    fn write_candidates<T: Entity>(&self, call: &Call<T>) -> Vec<usize> {
        (0..call.meta().fields.len())
            .filter(|&idx| call.meta().fields[idx].is_editable() && call.options.selects(idx))
            .collect()
    }

    /// `values` is keyed by logical name. Lifecycle and key fields are never written here.
    /// Owned key lists change through add / remove of the difference to what is stored.
    async fn apply_update<T: Entity>(
        &self,
        call: &Call<T>,
        values: Map<String, Value>,
        key_filter: Option<Filter>,
    ) -> Result<u64, AccessError> {
        let meta = call.meta();
        let entity = call.entity();
        let mut set = Vec::new();
        let mut lists = Vec::new();
        let mut written = Map::new();
        for (name, value) in values {
            let Some(idx) = meta.field_index(&name) else { continue };
            let field = &meta.fields[idx];
            if !field.is_editable() || !call.options.selects(idx) {
                continue;
            }
            if !field.updatable && !call.options.force_write() {
                tracing::debug!(entity = %entity, field = %field.name, "read-only field dropped from update");
                continue;
            }
            let Some(column) = call.options.column(idx) else { continue };
            if meta.relationship(idx).map_or(false, |r| r.is_owned_array()) {
                let value = dedup_keys(value);
                lists.push((idx, column, key_list(&value)));
                written.insert(field.name.clone(), value);
            } else {
                set.push((column, value.clone()));
                written.insert(field.name.clone(), value);
            }
        }
        if written.is_empty() {
            return Ok(0);
        }
        let modified: Vec<String> = written.keys().cloned().collect();
        call.check(&written, &modified)?;

        let filter = Filter::all(key_filter.into_iter().chain(call.options.effective_filter()).collect());
        let stored = if lists.is_empty() {
            Vec::new()
        } else {
            self.stored_lists(call, filter.clone(), &lists).await?
        };
        let mut n = stored.len() as u64;
        if !set.is_empty() || stored.is_empty() {
            set.extend(call.timestamp(meta.updated_at));
            let intent = UpdateIntent {
                table: call.options.table().to_string(),
                filter,
                set,
            };
            n = self.update_records(entity, Operation::Update, &intent).await?;
        }
        for (key, current) in stored {
            for ((idx, _, wanted), have) in lists.iter().zip(current) {
                let removed: Vec<Value> = have.iter().filter(|v| !wanted.contains(v)).cloned().collect();
                let added: Vec<Value> = wanted.iter().filter(|v| !have.contains(v)).cloned().collect();
                for op in [ArrayOp::Remove(removed), ArrayOp::Add(added)] {
                    if op.is_empty() {
                        continue;
                    }
                    self.relations()
                        .modify_owned(&call.options, *idx, call.options.key_filter(key.clone()), op)
                        .await?;
                }
            }
        }
        tracing::debug!(entity = %entity, fields = ?modified, rows = n, "updated");
        Ok(n)
    }

    /// Key and current owned lists of each record matching `filter`, lists in the order of `lists`.
    async fn stored_lists<T: Entity>(
        &self,
        call: &Call<T>,
        filter: Option<Filter>,
        lists: &[(usize, Column, Vec<Value>)],
    ) -> Result<Vec<(Value, Vec<Vec<Value>>)>, AccessError> {
        let key = call.options.key_column();
        let mut columns = vec![key.clone()];
        columns.extend(lists.iter().map(|(_, column, _)| column.clone()));
        let intent = ReadIntent {
            table: call.options.table().to_string(),
            columns,
            filter,
            order: Vec::new(),
            limit: None,
            offset: None,
        };
        let records = self.read_records(call.entity(), Operation::Update, &intent).await?;
        Ok(records
            .into_iter()
            .filter_map(|mut r| {
                let id = r.remove(&key.name)?;
                let current = lists
                    .iter()
                    .map(|(_, column, _)| r.get(&column.name).map(key_list).unwrap_or_default())
                    .collect();
                Some((id, current))
            })
            .collect())
    }

    /// Soft delete when the entity has a soft-delete field, hard delete otherwise.
    pub async fn delete_by_id<T: Entity>(&self, id: &EntityKey, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let key = call.key(id)?;
        self.remove(&call, Some(call.options.key_filter(key)), false).await
    }

    pub async fn delete_where<T: Entity>(&self, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        call.require_condition("delete_where")?;
        self.remove(&call, None, false).await
    }

    /// Physically removes the record, soft-deleted or not.
    pub async fn delete_hard_by_id<T: Entity>(&self, id: &EntityKey, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let key = call.key(id)?;
        self.remove(&call, Some(call.options.key_filter(key)), true).await
    }

    pub async fn delete_hard_where<T: Entity>(&self, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        call.require_condition("delete_hard_where")?;
        self.remove(&call, None, true).await
    }

    async fn remove<T: Entity>(&self, call: &Call<T>, key_filter: Option<Filter>, hard: bool) -> Result<u64, AccessError> {
        let entity = call.entity();
        let soft = if hard { None } else { call.soft_delete_column() };
        let physical = soft.is_none();
        let scope = if soft.is_some() {
            call.options.effective_filter()
        } else {
            call.options.condition()
        };
        let filter = Filter::all(key_filter.into_iter().chain(scope).collect());

        let keys = if call.has_delete_fan_out() {
            self.matching_keys(call, filter.clone()).await?
        } else {
            Vec::new()
        };

        let n = match soft {
            Some(flag) => {
                let mut set = vec![(flag, Value::Bool(true))];
                set.extend(call.timestamp(call.meta().updated_at));
                let intent = UpdateIntent {
                    table: call.options.table().to_string(),
                    filter,
                    set,
                };
                self.update_records(entity, Operation::Delete, &intent).await?
            }
            None => {
                let intent = DeleteIntent {
                    table: call.options.table().to_string(),
                    filter,
                };
                self.delete_records(entity, &intent).await?
            }
        };
        tracing::debug!(entity = %entity, rows = n, soft = !physical, "deleted");
        self.relations().on_delete(call.meta(), &keys, physical).await;
        Ok(n)
    }

    async fn matching_keys<T: Entity>(&self, call: &Call<T>, filter: Option<Filter>) -> Result<Vec<Value>, AccessError> {
        let key = call.options.key_column();
        let intent = ReadIntent {
            table: call.options.table().to_string(),
            columns: vec![key.clone()],
            filter,
            order: Vec::new(),
            limit: None,
            offset: None,
        };
        let records = self.read_records(call.entity(), Operation::Delete, &intent).await?;
        Ok(records.into_iter().filter_map(|mut r| r.remove(&key.name)).collect())
    }

    /// Clears the soft-delete flag of the record with this key.
    pub async fn restore_by_id<T: Entity>(&self, id: &EntityKey, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let key = call.key(id)?;
        self.restore(&call, Some(call.options.key_filter(key))).await
    }

    pub async fn restore_where<T: Entity>(&self, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        call.require_condition("restore_where")?;
        self.restore(&call, None).await
    }

    async fn restore<T: Entity>(&self, call: &Call<T>, key_filter: Option<Filter>) -> Result<u64, AccessError> {
        let entity = call.entity();
        let flag = call
            .soft_delete_column()
            .ok_or_else(|| AccessError::InvalidInput(format!("{}: no soft-delete field to restore", entity)))?;
        let deleted = Filter::Compare {
            column: flag.name.clone(),
            kind: flag.kind,
            op: Operator::Eq,
            value: Value::Bool(true),
        };
        let filter = Filter::all(
            key_filter
                .into_iter()
                .chain(Some(deleted))
                .chain(call.options.condition())
                .collect(),
        );
        let mut set = vec![(flag, Value::Bool(false))];
        set.extend(call.timestamp(call.meta().updated_at));
        let intent = UpdateIntent {
            table: call.options.table().to_string(),
            filter,
            set,
        };
        let n = self.update_records(entity, Operation::Restore, &intent).await?;
        tracing::debug!(entity = %entity, rows = n, "restored");
        Ok(n)
    }

    /// Adds keys to the to-many key list `field` of the live record `id`.
    pub async fn add_link<T: Entity>(
        &self,
        id: &EntityKey,
        field: &str,
        keys: &[EntityKey],
        options: &QueryOptions,
    ) -> Result<u64, AccessError> {
        self.link::<T>(id, field, keys, options, true).await
    }

    pub async fn remove_link<T: Entity>(
        &self,
        id: &EntityKey,
        field: &str,
        keys: &[EntityKey],
        options: &QueryOptions,
    ) -> Result<u64, AccessError> {
        self.link::<T>(id, field, keys, options, false).await
    }

    async fn link<T: Entity>(
        &self,
        id: &EntityKey,
        field: &str,
        keys: &[EntityKey],
        options: &QueryOptions,
        adding: bool,
    ) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let key = call.key(id)?;
        let entity = call.entity();
        let idx = call
            .meta()
            .field_index(field)
            .ok_or_else(|| AccessError::InvalidInput(format!("{}: unknown field '{}'", entity, field)))?;
        let target = match call.meta().relationship(idx).map(|r| &r.kind) {
            Some(crate::model::RelationKind::ToManyOwned { target }) => target.metadata()?,
            _ => {
                return Err(AccessError::InvalidInput(format!(
                    "{}: field '{}' is not a to-many key list",
                    entity, field
                )))
            }
        };
        let mut values = Vec::with_capacity(keys.len());
        for k in keys {
            let v = k.for_field(target.type_name, target.primary_key())?;
            if !values.contains(&v) {
                values.push(v);
            }
        }
        if values.is_empty() {
            return Ok(0);
        }
        let filter = Filter::all(
            Some(call.options.key_filter(key))
                .into_iter()
                .chain(call.options.effective_filter())
                .collect(),
        )
        .unwrap_or(Filter::And(Vec::new()));
        let op = if adding { ArrayOp::Add(values) } else { ArrayOp::Remove(values) };
        self.relations().modify_owned(&call.options, idx, filter, op).await
    }

    /// Creates the entity's table when missing. Document stores create collections on write.
    pub async fn create_table<T: Entity>(&self, options: &QueryOptions) -> Result<(), AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        let Some(dialect) = self.strategy().dialect() else {
            if call.options.create_drop() {
                self.drop_storage(call.entity(), call.options.table()).await?;
            }
            return Ok(());
        };
        let statements = create_table_statements(call.meta(), &call.options, dialect);
        self.execute_ddl(call.entity(), &statements).await?;
        tracing::info!(entity = %call.entity(), table = %call.options.table(), "table ready");
        Ok(())
    }

    pub async fn drop_table<T: Entity>(&self, options: &QueryOptions) -> Result<(), AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        self.drop_storage(call.entity(), call.options.table()).await
    }

    /// Physically removes every record of the entity.
    pub async fn clean_all<T: Entity>(&self, options: &QueryOptions) -> Result<u64, AccessError> {
        let _scope = self.scope();
        let call = Call::<T>::new(options)?;
        self.clear_storage(call.entity(), call.options.table()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_keys() {
        assert!(is_unset(&json!(0)));
        assert!(is_unset(&json!("")));
        assert!(is_unset(&json!("00000000-0000-0000-0000-000000000000")));
        assert!(!is_unset(&json!(7)));
        assert!(!is_unset(&json!("a")));
    }

    #[test]
    fn owned_keys_are_deduplicated_in_order() {
        assert_eq!(dedup_keys(json!([3, 1, 3, 2, 1])), json!([3, 1, 2]));
        assert_eq!(dedup_keys(Value::Null), Value::Null);
    }
}
