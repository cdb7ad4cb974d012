//! Runs rendered statements on a pooled connection and decodes rows by field kind.

use crate::intent::Column;
use crate::model::value::{format_date, format_timestamp};
use crate::model::FieldKind;
use crate::sql::builder::QueryBuf;
use crate::sql::params::{bind_pg, bind_sqlite};
use crate::sql::Dialect;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::Row;

/// One stored row / document: storage name -> value.
pub type Record = Map<String, Value>;

#[derive(Clone, Debug)]
pub enum SqlPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl SqlPool {
    pub fn dialect(&self) -> Dialect {
        match self {
            SqlPool::Postgres(_) => Dialect::Postgres,
            SqlPool::Sqlite(_) => Dialect::Sqlite,
        }
    }

    pub async fn acquire(&self) -> Result<SqlConnection, sqlx::Error> {
        Ok(match self {
            SqlPool::Postgres(pool) => SqlConnection::Postgres(pool.acquire().await?),
            SqlPool::Sqlite(pool) => SqlConnection::Sqlite(pool.acquire().await?),
        })
    }
}

pub enum SqlConnection {
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

impl SqlConnection {
    /// SELECT; each row is decoded column by column following `columns`.
    pub async fn fetch(&mut self, q: &QueryBuf, columns: &[Column]) -> Result<Vec<Record>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        match self {
            SqlConnection::Postgres(conn) => {
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = bind_pg(query, p.clone());
                }
                let rows = query.fetch_all(&mut **conn).await?;
                rows.iter().map(|row| record(row, columns, decode_pg)).collect()
            }
            SqlConnection::Sqlite(conn) => {
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = bind_sqlite(query, p.clone());
                }
                let rows = query.fetch_all(&mut **conn).await?;
                rows.iter().map(|row| record(row, columns, decode_sqlite)).collect()
            }
        }
    }

    /// First column of the single returned row (COUNT, RETURNING key).
    pub async fn fetch_value(&mut self, q: &QueryBuf, kind: FieldKind) -> Result<Value, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        match self {
            SqlConnection::Postgres(conn) => {
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = bind_pg(query, p.clone());
                }
                let row = query.fetch_one(&mut **conn).await?;
                decode_pg(&row, 0, kind)
            }
            SqlConnection::Sqlite(conn) => {
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = bind_sqlite(query, p.clone());
                }
                let row = query.fetch_one(&mut **conn).await?;
                decode_sqlite(&row, 0, kind)
            }
        }
    }

    /// Statement without result rows; returns affected row count.
    pub async fn execute(&mut self, q: &QueryBuf) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        match self {
            SqlConnection::Postgres(conn) => {
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = bind_pg(query, p.clone());
                }
                Ok(query.execute(&mut **conn).await?.rows_affected())
            }
            SqlConnection::Sqlite(conn) => {
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = bind_sqlite(query, p.clone());
                }
                Ok(query.execute(&mut **conn).await?.rows_affected())
            }
        }
    }

    /// Unparameterized statement (DDL).
    pub async fn execute_raw(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %sql, "query");
        match self {
            SqlConnection::Postgres(conn) => Ok(sqlx::query(sql).execute(&mut **conn).await?.rows_affected()),
            SqlConnection::Sqlite(conn) => Ok(sqlx::query(sql).execute(&mut **conn).await?.rows_affected()),
        }
    }
}

fn record<R>(row: &R, columns: &[Column], decode: fn(&R, usize, FieldKind) -> Result<Value, sqlx::Error>) -> Result<Record, sqlx::Error> {
    let mut map = Map::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        map.insert(column.name.clone(), decode(row, idx, column.kind)?);
    }
    Ok(map)
}

fn decode_pg(row: &PgRow, idx: usize, kind: FieldKind) -> Result<Value, sqlx::Error> {
    Ok(match kind {
        FieldKind::Bool => row.try_get::<Option<bool>, _>(idx)?.map_or(Value::Null, Value::Bool),
        FieldKind::Integer => row.try_get::<Option<i32>, _>(idx)?.map_or(Value::Null, Value::from),
        FieldKind::Long => row.try_get::<Option<i64>, _>(idx)?.map_or(Value::Null, Value::from),
        FieldKind::Double => row
            .try_get::<Option<f64>, _>(idx)?
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
        FieldKind::Text => row.try_get::<Option<String>, _>(idx)?.map_or(Value::Null, Value::String),
        FieldKind::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(idx)?
            .map_or(Value::Null, |u| Value::String(u.to_string())),
        FieldKind::Timestamp => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map_or(Value::Null, |t| Value::String(format_timestamp(&t))),
        FieldKind::Date => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map_or(Value::Null, |d| Value::String(format_date(&d))),
        FieldKind::Json => row.try_get::<Option<Value>, _>(idx)?.unwrap_or(Value::Null),
    })
}

/// SQLite stores uuid, timestamp, date and json as text.
fn decode_sqlite(row: &SqliteRow, idx: usize, kind: FieldKind) -> Result<Value, sqlx::Error> {
    Ok(match kind {
        FieldKind::Bool => row.try_get::<Option<bool>, _>(idx)?.map_or(Value::Null, Value::Bool),
        FieldKind::Integer | FieldKind::Long => row.try_get::<Option<i64>, _>(idx)?.map_or(Value::Null, Value::from),
        FieldKind::Double => row
            .try_get::<Option<f64>, _>(idx)?
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
        FieldKind::Text | FieldKind::Uuid | FieldKind::Timestamp | FieldKind::Date => {
            row.try_get::<Option<String>, _>(idx)?.map_or(Value::Null, Value::String)
        }
        FieldKind::Json => match row.try_get::<Option<String>, _>(idx)? {
            Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            None => Value::Null,
        },
    })
}
