//! Typed field values and their JSON representation.

use crate::model::types::FieldKind;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Timestamp text used wherever a backend has no native timestamp type.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}

/// Current time at the precision every backend can store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Rust types that can back a field through a direct typed accessor.
pub trait FieldValue: Sized {
    const KIND: FieldKind;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {}, got {}", expected, got)
}

impl FieldValue for i64 {
    const KIND: FieldKind = FieldKind::Long;

    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(0),
            v => v.as_i64().ok_or_else(|| mismatch("integer", &v)),
        }
    }
}

impl FieldValue for i32 {
    const KIND: FieldKind = FieldKind::Integer;

    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(0),
            v => v
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| mismatch("32-bit integer", &v)),
        }
    }
}

impl FieldValue for f64 {
    const KIND: FieldKind = FieldKind::Double;

    fn to_value(&self) -> Value {
        serde_json::Number::from_f64(*self).map_or(Value::Null, Value::Number)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(0.0),
            v => v.as_f64().ok_or_else(|| mismatch("number", &v)),
        }
    }
}

impl FieldValue for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(b),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
            v => Err(mismatch("boolean", &v)),
        }
    }
}

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s),
            v => Err(mismatch("string", &v)),
        }
    }
}

impl FieldValue for Uuid {
    const KIND: FieldKind = FieldKind::Uuid;

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Uuid::parse_str(&s).map_err(|e| format!("invalid uuid '{}': {}", s, e)),
            v => Err(mismatch("uuid string", &v)),
        }
    }
}

impl FieldValue for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_value(&self) -> Value {
        Value::String(format_timestamp(self))
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(s) => parse_timestamp(&s),
            v => Err(mismatch("timestamp string", &v)),
        }
    }
}

impl FieldValue for NaiveDate {
    const KIND: FieldKind = FieldKind::Date;

    fn to_value(&self) -> Value {
        Value::String(format_date(self))
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{}': {}", s, e)),
            v => Err(mismatch("date string", &v)),
        }
    }
}

impl FieldValue for Value {
    const KIND: FieldKind = FieldKind::Json;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const KIND: FieldKind = V::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            v => V::from_value(v).map(Some),
        }
    }
}

/// Arrays are stored as JSON; used for to-many-owned key lists.
impl<V: FieldValue> FieldValue for Vec<V> {
    const KIND: FieldKind = FieldKind::Json;

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items.into_iter().map(V::from_value).collect(),
            v => Err(mismatch("array", &v)),
        }
    }
}

/// Kind implied by a serialized sample value, for fields without a typed binding.
pub fn infer_kind(sample: &Value) -> FieldKind {
    match sample {
        Value::Bool(_) => FieldKind::Bool,
        Value::Number(n) if n.is_i64() || n.is_u64() => FieldKind::Long,
        Value::Number(_) => FieldKind::Double,
        Value::String(_) => FieldKind::Text,
        Value::Null | Value::Array(_) | Value::Object(_) => FieldKind::Json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_maps_null_both_ways() {
        assert_eq!(Option::<i64>::None.to_value(), Value::Null);
        assert_eq!(Option::<i64>::from_value(Value::Null), Ok(None));
        assert_eq!(Option::<i64>::from_value(json!(7)), Ok(Some(7)));
        assert!(<Option<i64> as FieldValue>::NULLABLE);
        assert_eq!(<Option<Uuid> as FieldValue>::KIND, FieldKind::Uuid);
    }

    #[test]
    fn timestamps_use_microsecond_utc_text() {
        let ts = parse_timestamp("2024-03-01T10:20:30.123456Z").unwrap();
        assert_eq!(ts.to_value(), json!("2024-03-01T10:20:30.123456Z"));
        let offset = parse_timestamp("2024-03-01T12:20:30+02:00").unwrap();
        assert_eq!(format_timestamp(&offset), "2024-03-01T10:20:30.000000Z");
    }

    #[test]
    fn sqlite_integers_decode_as_booleans() {
        assert_eq!(bool::from_value(json!(1)), Ok(true));
        assert_eq!(bool::from_value(json!(0)), Ok(false));
        assert!(bool::from_value(json!("yes")).is_err());
    }

    #[test]
    fn vectors_are_json_arrays() {
        let v = vec![1i64, 2, 3];
        assert_eq!(v.to_value(), json!([1, 2, 3]));
        assert_eq!(Vec::<i64>::from_value(Value::Null), Ok(vec![]));
        assert_eq!(<Vec<i64> as FieldValue>::KIND, FieldKind::Json);
    }

    #[test]
    fn i32_rejects_out_of_range() {
        assert!(i32::from_value(json!(i64::MAX)).is_err());
        assert_eq!(i32::from_value(json!(-4)), Ok(-4));
    }

    #[test]
    fn kind_inference() {
        assert_eq!(infer_kind(&json!(1)), FieldKind::Long);
        assert_eq!(infer_kind(&json!(1.5)), FieldKind::Double);
        assert_eq!(infer_kind(&json!("x")), FieldKind::Text);
        assert_eq!(infer_kind(&json!([])), FieldKind::Json);
    }
}
