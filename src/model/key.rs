use crate::error::AccessError;
use crate::model::types::{FieldDescriptor, FieldKind};
use serde_json::Value;
use uuid::Uuid;

/// Primary key value passed to the `*_by_id` verbs.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKey(Value);

impl EntityKey {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Normalizes the key to the primary key field's kind.
    pub(crate) fn for_field(&self, entity: &str, field: &FieldDescriptor) -> Result<Value, AccessError> {
        let invalid = || {
            AccessError::InvalidInput(format!(
                "{}: key {} does not fit primary key '{}' ({:?})",
                entity, self.0, field.name, field.kind
            ))
        };
        match field.kind {
            FieldKind::Long | FieldKind::Integer => self.0.as_i64().map(Value::from).ok_or_else(invalid),
            FieldKind::Uuid => self
                .0
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(|u| Value::String(u.to_string()))
                .ok_or_else(invalid),
            FieldKind::Text => self.0.as_str().map(|s| Value::String(s.to_string())).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(v: i64) -> Self {
        EntityKey(Value::from(v))
    }
}

impl From<i32> for EntityKey {
    fn from(v: i32) -> Self {
        EntityKey(Value::from(v))
    }
}

impl From<Uuid> for EntityKey {
    fn from(v: Uuid) -> Self {
        EntityKey(Value::String(v.to_string()))
    }
}

impl From<String> for EntityKey {
    fn from(v: String) -> Self {
        EntityKey(Value::String(v))
    }
}

impl From<&str> for EntityKey {
    fn from(v: &str) -> Self {
        EntityKey(Value::String(v.to_string()))
    }
}

impl From<Value> for EntityKey {
    fn from(v: Value) -> Self {
        EntityKey(v)
    }
}

impl From<&Value> for EntityKey {
    fn from(v: &Value) -> Self {
        EntityKey(v.clone())
    }
}
