//! Unit of work: at most one backend connection, held while any scope is open.

use crate::document::render;
use crate::error::{AccessError, BackendError, Operation};
use crate::intent::{ArrayIntent, DeleteIntent, Filter, InsertIntent, ReadIntent, UpdateIntent};
use crate::model::FieldKind;
use crate::sql::builder;
use crate::sql::executor::Record;
use crate::sql::{Dialect, SqlConnection, SqlPool};
use crate::state::{DataAccess, Strategy};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

#[derive(Default)]
struct ConnectionSlot {
    depth: AtomicUsize,
    conn: Mutex<Option<SqlConnection>>,
}

/// Clones share the same unit of work.
#[derive(Clone)]
pub struct Session {
    access: DataAccess,
    slot: Arc<ConnectionSlot>,
}

/// Keeps the session's connection while alive. Scopes nest; the outermost one releases it.
#[must_use = "the connection is released when the scope is dropped"]
pub struct SessionScope {
    slot: Arc<ConnectionSlot>,
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        if self.slot.depth.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        match self.slot.conn.try_lock() {
            Ok(mut conn) => {
                if conn.take().is_some() {
                    tracing::debug!("session connection released");
                }
            }
            Err(_) => tracing::warn!("session connection busy at scope end, kept until next release"),
        }
    }
}

fn fail<'a, E: Into<BackendError>>(entity: &'a str, op: Operation) -> impl Fn(E) -> AccessError + 'a {
    move |e| AccessError::backend(entity, op)(e.into())
}

impl Session {
    pub(crate) fn new(access: DataAccess) -> Self {
        Session {
            access,
            slot: Arc::new(ConnectionSlot::default()),
        }
    }

    pub fn access(&self) -> &DataAccess {
        &self.access
    }

    pub fn strategy(&self) -> &Strategy {
        self.access.strategy()
    }

    pub fn scope(&self) -> SessionScope {
        self.slot.depth.fetch_add(1, Ordering::AcqRel);
        SessionScope {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Nesting depth of open scopes.
    pub fn depth(&self) -> usize {
        self.slot.depth.load(Ordering::Acquire)
    }

    /// True while a connection is held.
    pub async fn is_connected(&self) -> bool {
        self.slot.conn.lock().await.is_some()
    }

    async fn connection(&self, pool: &SqlPool) -> Result<MappedMutexGuard<'_, SqlConnection>, sqlx::Error> {
        let mut guard = self.slot.conn.lock().await;
        if guard.is_none() {
            *guard = Some(pool.acquire().await?);
            tracing::debug!(dialect = ?pool.dialect(), "session connection acquired");
        }
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| sqlx::Error::PoolClosed)
    }

    pub(crate) async fn read_records(&self, entity: &str, op: Operation, intent: &ReadIntent) -> Result<Vec<Record>, AccessError> {
        match self.strategy() {
            Strategy::Relational(pool) => {
                let q = builder::select(intent, pool.dialect())?;
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                conn.fetch(&q, &intent.columns).await.map_err(fail(entity, op))
            }
            Strategy::Document(store) => store
                .find(&intent.table, &render::find_query(intent))
                .await
                .map_err(fail(entity, op)),
        }
    }

    pub(crate) async fn count_records(&self, entity: &str, table: &str, filter: Option<&Filter>) -> Result<u64, AccessError> {
        let op = Operation::Count;
        match self.strategy() {
            Strategy::Relational(pool) => {
                let q = builder::count(table, filter, pool.dialect())?;
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                let n = conn.fetch_value(&q, FieldKind::Long).await.map_err(fail(entity, op))?;
                Ok(n.as_u64().unwrap_or(0))
            }
            Strategy::Document(store) => store
                .count(table, &render::filter(filter))
                .await
                .map_err(fail(entity, op)),
        }
    }

    /// Returns the stored key: generated by the database, or the one in the intent.
    pub(crate) async fn insert_record(&self, entity: &str, intent: &InsertIntent) -> Result<Value, AccessError> {
        let op = Operation::Insert;
        match self.strategy() {
            Strategy::Relational(pool) => {
                let q = builder::insert(intent)?;
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                conn.fetch_value(&q, intent.key.kind).await.map_err(fail(entity, op))
            }
            Strategy::Document(store) => {
                store
                    .insert_one(&intent.table, &intent.key.name, render::insert_document(intent))
                    .await
                    .map_err(fail(entity, op))?;
                Ok(intent
                    .values
                    .iter()
                    .find(|(c, _)| c.field == intent.key.field)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Null))
            }
        }
    }

    /// Number of matched rows / documents. An empty set touches nothing.
    pub(crate) async fn update_records(&self, entity: &str, op: Operation, intent: &UpdateIntent) -> Result<u64, AccessError> {
        if intent.set.is_empty() {
            return Ok(0);
        }
        match self.strategy() {
            Strategy::Relational(pool) => {
                let q = builder::update(intent, pool.dialect())?;
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                conn.execute(&q).await.map_err(fail(entity, op))
            }
            Strategy::Document(store) => store
                .update_many(
                    &intent.table,
                    &render::filter(intent.filter.as_ref()),
                    &render::update_document(&intent.set),
                )
                .await
                .map_err(fail(entity, op)),
        }
    }

    pub(crate) async fn delete_records(&self, entity: &str, intent: &DeleteIntent) -> Result<u64, AccessError> {
        let op = Operation::Delete;
        match self.strategy() {
            Strategy::Relational(pool) => {
                let q = builder::delete(intent, pool.dialect())?;
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                conn.execute(&q).await.map_err(fail(entity, op))
            }
            Strategy::Document(store) => store
                .delete_many(&intent.table, &render::filter(intent.filter.as_ref()))
                .await
                .map_err(fail(entity, op)),
        }
    }

    /// Set-semantics array mutation; returns the number of matched rows.
    pub(crate) async fn update_array(&self, entity: &str, intent: &ArrayIntent) -> Result<u64, AccessError> {
        let op = Operation::Relation;
        match self.strategy() {
            Strategy::Relational(pool) => {
                let statements = builder::array_update(intent, pool.dialect())?;
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                let mut n = 0;
                for q in &statements {
                    n = n.max(conn.execute(q).await.map_err(fail(entity, op))?);
                }
                Ok(n)
            }
            Strategy::Document(store) => store
                .update_many(
                    &intent.table,
                    &render::filter(Some(&intent.filter)),
                    &render::array_update_document(intent),
                )
                .await
                .map_err(fail(entity, op)),
        }
    }

    /// Next value of the named counter kept by the document store.
    pub(crate) async fn next_sequence(&self, entity: &str, name: &str) -> Result<i64, AccessError> {
        match self.strategy() {
            Strategy::Document(store) => store
                .next_sequence(name)
                .await
                .map_err(fail(entity, Operation::Insert)),
            Strategy::Relational(_) => Err(AccessError::Unsupported(format!(
                "{}: sequences on a relational backend are generated by the database",
                entity
            ))),
        }
    }

    /// After a key was written explicitly into a generated key column, keeps the generator ahead of it.
    /// SQLite `AUTOINCREMENT` already tracks the largest key.
    pub(crate) async fn advance_key(&self, entity: &str, table: &str, column: &str, value: i64) -> Result<(), AccessError> {
        let op = Operation::Insert;
        match self.strategy() {
            Strategy::Document(store) => store.raise_sequence(table, value).await.map_err(fail(entity, op)),
            Strategy::Relational(pool) if pool.dialect() == Dialect::Postgres => {
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                conn.execute_raw(&builder::advance_identity(table, column, value))
                    .await
                    .map_err(fail(entity, op))?;
                Ok(())
            }
            Strategy::Relational(_) => Ok(()),
        }
    }

    /// DDL statements, run in order. No-op on document stores.
    pub(crate) async fn execute_ddl(&self, entity: &str, statements: &[String]) -> Result<(), AccessError> {
        let op = Operation::CreateTable;
        if let Strategy::Relational(pool) = self.strategy() {
            let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
            for sql in statements {
                conn.execute_raw(sql).await.map_err(fail(entity, op))?;
            }
        }
        Ok(())
    }

    pub(crate) async fn drop_storage(&self, entity: &str, table: &str) -> Result<(), AccessError> {
        let op = Operation::Drop;
        match self.strategy() {
            Strategy::Relational(pool) => {
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                conn.execute_raw(&builder::drop_table(table))
                    .await
                    .map_err(fail(entity, op))?;
            }
            Strategy::Document(store) => store.drop_collection(table).await.map_err(fail(entity, op))?,
        }
        Ok(())
    }

    pub(crate) async fn clear_storage(&self, entity: &str, table: &str) -> Result<u64, AccessError> {
        let op = Operation::Delete;
        match self.strategy() {
            Strategy::Relational(pool) => {
                let mut conn = self.connection(pool).await.map_err(fail(entity, op))?;
                conn.execute_raw(&builder::clear_table(table))
                    .await
                    .map_err(fail(entity, op))
            }
            Strategy::Document(store) => store
                .delete_many(table, &Default::default())
                .await
                .map_err(fail(entity, op)),
        }
    }
}
