//! Validation hooks run before writes, and the metadata-driven default hook.

use crate::error::CheckError;
use crate::model::{EntityMetadata, FieldDescriptor, FieldKind, Role};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

/// Hook supplied through `QueryOption::Check`.
///
/// `values` maps logical field names to the values about to be written.
pub trait EntityCheck: Send + Sync + fmt::Debug {
    /// Runs before an update with the list of modified fields.
    fn check(&self, metadata: &EntityMetadata, values: &Map<String, Value>, fields: &[String]) -> Result<(), CheckError>;

    /// Runs before an insert with every field.
    fn check_all(&self, metadata: &EntityMetadata, values: &Map<String, Value>) -> Result<(), CheckError> {
        let fields: Vec<String> = metadata.fields.iter().map(|f| f.name.clone()).collect();
        self.check(metadata, values, &fields)
    }
}

/// Enforces the constraints declared on the fields: nullability, max length, min / max, pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataCheck;

impl EntityCheck for MetadataCheck {
    fn check(&self, metadata: &EntityMetadata, values: &Map<String, Value>, fields: &[String]) -> Result<(), CheckError> {
        for name in fields {
            let Some(field) = metadata.field(name) else { continue };
            if field.role != Role::None || !field.is_stored() {
                continue;
            }
            validate_field(field, values.get(name).unwrap_or(&Value::Null))?;
        }
        Ok(())
    }
}

fn validate_field(field: &FieldDescriptor, v: &Value) -> Result<(), CheckError> {
    let name = field.name.as_str();
    if v.is_null() {
        if !field.nullable && field.default_value.is_none() {
            return Err(CheckError::new(name, "is required"));
        }
        return Ok(());
    }
    let rules = &field.constraints;
    if let Some(max) = rules.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(CheckError::new(name, format!("must be at most {} characters", max)));
            }
        }
    }
    if let Some(ref pattern) = rules.pattern {
        let re = Regex::new(pattern).map_err(|_| CheckError::new(name, "invalid pattern"))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(CheckError::new(name, "does not match required pattern"));
            }
        }
    }
    if let Some(min) = rules.min {
        if let Some(n) = numeric(field.kind, v) {
            if n < min {
                return Err(CheckError::new(name, format!("must be at least {}", min)));
            }
        }
    }
    if let Some(max) = rules.max {
        if let Some(n) = numeric(field.kind, v) {
            if n > max {
                return Err(CheckError::new(name, format!("must be at most {}", max)));
            }
        }
    }
    Ok(())
}

/// Numeric value for range checks; text length for text fields.
fn numeric(kind: FieldKind, v: &Value) -> Option<f64> {
    match kind {
        FieldKind::Text => v.as_str().map(|s| s.chars().count() as f64),
        _ => v.as_f64(),
    }
}
