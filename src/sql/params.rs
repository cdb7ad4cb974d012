//! Convert serde_json::Value to typed values that sqlx can bind, per field kind and dialect.

use crate::model::value::{format_date, format_timestamp, parse_timestamp};
use crate::model::FieldKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    /// Typed null, so Postgres can infer the parameter type.
    Null(FieldKind),
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(Value),
}

impl BindValue {
    pub fn from_json(v: &Value, kind: FieldKind) -> Result<Self, String> {
        if v.is_null() {
            return Ok(BindValue::Null(kind));
        }
        let wrong = || format!("value {} does not fit a {:?} column", v, kind);
        Ok(match kind {
            FieldKind::Bool => match v {
                Value::Bool(b) => BindValue::Bool(*b),
                Value::Number(n) if n.as_i64() == Some(0) => BindValue::Bool(false),
                Value::Number(n) if n.as_i64() == Some(1) => BindValue::Bool(true),
                _ => return Err(wrong()),
            },
            FieldKind::Integer => BindValue::I32(
                v.as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(wrong)?,
            ),
            FieldKind::Long => BindValue::I64(v.as_i64().ok_or_else(wrong)?),
            FieldKind::Double => BindValue::F64(v.as_f64().ok_or_else(wrong)?),
            FieldKind::Text => BindValue::String(v.as_str().ok_or_else(wrong)?.to_string()),
            FieldKind::Uuid => BindValue::Uuid(
                v.as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(wrong)?,
            ),
            FieldKind::Timestamp => BindValue::Timestamp(parse_timestamp(v.as_str().ok_or_else(wrong)?)?),
            FieldKind::Date => BindValue::Date(
                v.as_str()
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                    .ok_or_else(wrong)?,
            ),
            FieldKind::Json => BindValue::Json(v.clone()),
        })
    }
}

pub fn bind_pg<'q>(query: Query<'q, Postgres, PgArguments>, value: BindValue) -> Query<'q, Postgres, PgArguments> {
    match value {
        BindValue::Null(kind) => match kind {
            FieldKind::Bool => query.bind(None::<bool>),
            FieldKind::Integer => query.bind(None::<i32>),
            FieldKind::Long => query.bind(None::<i64>),
            FieldKind::Double => query.bind(None::<f64>),
            FieldKind::Text => query.bind(None::<String>),
            FieldKind::Uuid => query.bind(None::<Uuid>),
            FieldKind::Timestamp => query.bind(None::<DateTime<Utc>>),
            FieldKind::Date => query.bind(None::<NaiveDate>),
            FieldKind::Json => query.bind(None::<Value>),
        },
        BindValue::Bool(b) => query.bind(b),
        BindValue::I32(n) => query.bind(n),
        BindValue::I64(n) => query.bind(n),
        BindValue::F64(n) => query.bind(n),
        BindValue::String(s) => query.bind(s),
        BindValue::Uuid(u) => query.bind(u),
        BindValue::Timestamp(t) => query.bind(t),
        BindValue::Date(d) => query.bind(d),
        BindValue::Json(v) => query.bind(v),
    }
}

/// SQLite has no native uuid, timestamp or json storage: those are bound as text.
pub fn bind_sqlite<'q>(query: Query<'q, Sqlite, SqliteArguments<'q>>, value: BindValue) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        BindValue::Null(kind) => match kind {
            FieldKind::Bool => query.bind(None::<bool>),
            FieldKind::Integer | FieldKind::Long => query.bind(None::<i64>),
            FieldKind::Double => query.bind(None::<f64>),
            _ => query.bind(None::<String>),
        },
        BindValue::Bool(b) => query.bind(b),
        BindValue::I32(n) => query.bind(i64::from(n)),
        BindValue::I64(n) => query.bind(n),
        BindValue::F64(n) => query.bind(n),
        BindValue::String(s) => query.bind(s),
        BindValue::Uuid(u) => query.bind(u.to_string()),
        BindValue::Timestamp(t) => query.bind(format_timestamp(&t)),
        BindValue::Date(d) => query.bind(format_date(&d)),
        BindValue::Json(v) => query.bind(v.to_string()),
    }
}
