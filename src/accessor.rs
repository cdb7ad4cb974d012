//! Per-field read/write of entity instances: typed closures when declared, serde otherwise.

use crate::model::builder::{Entity, Getter, Setter, TypedBinding};
use serde_json::Value;

enum Binding<T> {
    Direct { get: Getter<T>, set: Setter<T> },
    /// Round-trips the whole instance through `serde_json::Value`.
    Universal,
}

pub struct Accessor<T> {
    field: String,
    binding: Binding<T>,
}

impl<T: Entity> Accessor<T> {
    pub(crate) fn direct(field: &str, binding: TypedBinding<T>) -> Self {
        Accessor {
            field: field.to_string(),
            binding: Binding::Direct {
                get: binding.get,
                set: binding.set,
            },
        }
    }

    pub(crate) fn universal(field: &str) -> Self {
        Accessor {
            field: field.to_string(),
            binding: Binding::Universal,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.binding, Binding::Direct { .. })
    }

    pub fn get(&self, instance: &T) -> Result<Value, String> {
        match &self.binding {
            Binding::Direct { get, .. } => Ok(get(instance)),
            Binding::Universal => {
                let value = serde_json::to_value(instance).map_err(|e| e.to_string())?;
                match value {
                    Value::Object(mut map) => Ok(map.remove(&self.field).unwrap_or(Value::Null)),
                    other => Err(format!("entity serialized to {} instead of an object", other)),
                }
            }
        }
    }

    pub fn set(&self, instance: &mut T, value: Value) -> Result<(), String> {
        match &self.binding {
            Binding::Direct { set, .. } => set(instance, value),
            Binding::Universal => {
                let mut map = match serde_json::to_value(&*instance).map_err(|e| e.to_string())? {
                    Value::Object(map) => map,
                    other => return Err(format!("entity serialized to {} instead of an object", other)),
                };
                map.insert(self.field.clone(), value);
                *instance = serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?;
                Ok(())
            }
        }
    }
}
