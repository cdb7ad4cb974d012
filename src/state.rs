//! Shared handle on the selected backend. The strategy is chosen once per connection.

use crate::config::{DbConfig, DbType};
use crate::document::{DocumentStore, MemoryDocumentStore};
use crate::error::{AccessError, BackendError};
use crate::session::Session;
use crate::sql::{Dialect, SqlPool};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub enum Strategy {
    /// SQL text with bound parameters.
    Relational(SqlPool),
    /// Filter and update documents.
    Document(Arc<dyn DocumentStore>),
}

impl Strategy {
    pub fn dialect(&self) -> Option<Dialect> {
        match self {
            Strategy::Relational(pool) => Some(pool.dialect()),
            Strategy::Document(_) => None,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Strategy::Document(_))
    }
}

#[derive(Clone, Debug)]
pub struct DataAccess {
    strategy: Strategy,
}

fn connect_error(e: sqlx::Error) -> AccessError {
    AccessError::Connect(BackendError::Sql(e))
}

impl DataAccess {
    pub fn relational(pool: SqlPool) -> Self {
        DataAccess {
            strategy: Strategy::Relational(pool),
        }
    }

    pub fn document(store: Arc<dyn DocumentStore>) -> Self {
        DataAccess {
            strategy: Strategy::Document(store),
        }
    }

    /// Fresh in-process document store.
    pub fn memory() -> Self {
        Self::document(Arc::new(MemoryDocumentStore::new()))
    }

    /// In-memory SQLite database on a single pinned connection.
    pub async fn sqlite_memory() -> Result<Self, AccessError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(connect_error)?;
        Ok(Self::relational(SqlPool::Sqlite(pool)))
    }

    pub async fn connect(config: &DbConfig) -> Result<Self, AccessError> {
        let url = config.url()?;
        let access = match config.db_type {
            DbType::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&url)
                    .await
                    .map_err(connect_error)?;
                Self::relational(SqlPool::Postgres(pool))
            }
            // Every connection to `:memory:` opens its own database.
            DbType::Sqlite if url.contains(":memory:") => Self::sqlite_memory().await?,
            DbType::Sqlite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&url)
                    .await
                    .map_err(connect_error)?;
                Self::relational(SqlPool::Sqlite(pool))
            }
            DbType::Memory => Self::memory(),
            #[cfg(feature = "mongodb")]
            DbType::Mongo => {
                let database = config.database.as_deref().unwrap_or("app");
                let store = crate::document::MongoDocumentStore::connect(&url, database)
                    .await
                    .map_err(|e| AccessError::Connect(BackendError::Document(e)))?;
                Self::document(Arc::new(store))
            }
            #[cfg(not(feature = "mongodb"))]
            DbType::Mongo => {
                return Err(AccessError::Unsupported(
                    "mongo backend requires the `mongodb` feature".into(),
                ))
            }
        };
        tracing::info!(backend = %config.db_type, "data access ready");
        Ok(access)
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// New unit of work. Its connection is acquired on first use.
    pub fn session(&self) -> Session {
        Session::new(self.clone())
    }
}
