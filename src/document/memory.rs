//! In-process document store interpreting the rendered filter / update documents.

use crate::document::{Document, DocumentStore, FindQuery, COUNTERS_COLLECTION};
use crate::error::DocumentError;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw documents of a collection, in insertion order.
    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn malformed(msg: impl Into<String>) -> DocumentError {
    DocumentError::Malformed(msg.into())
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort order: missing and null first, then by value.
fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
    }
}

/// Equality; an array field also matches when one element is equal.
fn eq_or_contains(actual: Option<&Value>, expected: &Value) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    if values_equal(actual, expected) {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|i| values_equal(i, expected)),
        _ => false,
    }
}

fn as_array(v: &Value) -> Result<&Vec<Value>, DocumentError> {
    v.as_array().ok_or_else(|| malformed(format!("expected array, got {}", v)))
}

fn as_object(v: &Value) -> Result<&Document, DocumentError> {
    v.as_object().ok_or_else(|| malformed(format!("expected object, got {}", v)))
}

pub(crate) fn matches(doc: &Document, filter: &Document) -> Result<bool, DocumentError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for c in as_array(cond)? {
                    if !matches(doc, as_object(c)?)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for c in as_array(cond)? {
                    if matches(doc, as_object(c)?)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => return Err(DocumentError::UnsupportedOperator(op.to_string())),
            field => field_matches(doc.get(field), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn field_matches(actual: Option<&Value>, cond: &Value) -> Result<bool, DocumentError> {
    let ops = match cond {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => ops,
        literal => return Ok(eq_or_contains(actual, literal)),
    };
    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => eq_or_contains(actual, arg),
            "$ne" => !eq_or_contains(actual, arg),
            "$gt" => actual.and_then(|a| compare(a, arg)) == Some(Ordering::Greater),
            "$gte" => matches!(actual.and_then(|a| compare(a, arg)), Some(Ordering::Greater | Ordering::Equal)),
            "$lt" => actual.and_then(|a| compare(a, arg)) == Some(Ordering::Less),
            "$lte" => matches!(actual.and_then(|a| compare(a, arg)), Some(Ordering::Less | Ordering::Equal)),
            "$in" => as_array(arg)?.iter().any(|v| eq_or_contains(actual, v)),
            "$nin" => !as_array(arg)?.iter().any(|v| eq_or_contains(actual, v)),
            "$exists" => actual.is_some() == arg.as_bool().unwrap_or(true),
            other => return Err(DocumentError::UnsupportedOperator(other.to_string())),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `{"$each": [..]}` / `{"$in": [..]}` argument, or a single value.
fn operand_list(v: &Value, wrapper: &str) -> Result<Vec<Value>, DocumentError> {
    match v.as_object().and_then(|o| o.get(wrapper)) {
        Some(list) => Ok(as_array(list)?.clone()),
        None => Ok(vec![v.clone()]),
    }
}

fn array_slot<'a>(doc: &'a mut Document, key: &str) -> Result<&'a mut Vec<Value>, DocumentError> {
    let slot = doc.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        other => Err(malformed(format!("'{}' is not an array: {}", key, other))),
    }
}

pub(crate) fn apply_update(doc: &mut Document, update: &Document) -> Result<(), DocumentError> {
    for (op, arg) in update {
        let fields = as_object(arg)?;
        match op.as_str() {
            "$set" => {
                for (k, v) in fields {
                    doc.insert(k.clone(), v.clone());
                }
            }
            "$unset" => {
                for k in fields.keys() {
                    doc.remove(k);
                }
            }
            "$inc" => {
                for (k, v) in fields {
                    let by = v.as_i64().ok_or_else(|| malformed(format!("$inc by {}", v)))?;
                    let current = doc.get(k).and_then(Value::as_i64).unwrap_or(0);
                    doc.insert(k.clone(), Value::from(current + by));
                }
            }
            "$addToSet" => {
                for (k, v) in fields {
                    let values = operand_list(v, "$each")?;
                    let items = array_slot(doc, k)?;
                    for value in values {
                        if !items.iter().any(|i| values_equal(i, &value)) {
                            items.push(value);
                        }
                    }
                }
            }
            "$pull" => {
                for (k, v) in fields {
                    let values = operand_list(v, "$in")?;
                    if let Some(Value::Array(items)) = doc.get_mut(k) {
                        items.retain(|i| !values.iter().any(|r| values_equal(i, r)));
                    }
                }
            }
            other => return Err(DocumentError::UnsupportedOperator(other.to_string())),
        }
    }
    Ok(())
}

fn project(doc: &Document, keys: &[String]) -> Document {
    if keys.is_empty() {
        return doc.clone();
    }
    keys.iter()
        .filter_map(|k| doc.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_one(&self, collection: &str, key: &str, document: Document) -> Result<(), DocumentError> {
        tracing::debug!(collection = %collection, document = ?document, "insert");
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let docs = map.entry(collection.to_string()).or_default();
        if let Some(id) = document.get(key).filter(|v| !v.is_null()) {
            if docs.iter().any(|d| d.get(key).map_or(false, |v| values_equal(v, id))) {
                return Err(DocumentError::DuplicateKey {
                    collection: collection.to_string(),
                    key: id.to_string(),
                });
            }
        }
        docs.push(document);
        Ok(())
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, DocumentError> {
        tracing::debug!(collection = %collection, filter = ?query.filter, "find");
        let map = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let Some(docs) = map.get(collection) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for doc in docs {
            if matches(doc, &query.filter)? {
                found.push(doc);
            }
        }
        sort_documents(&mut found, &query.sort);
        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |n| n as usize);
        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| project(d, &query.projection))
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, DocumentError> {
        let map = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let mut n = 0;
        for doc in map.get(collection).map(Vec::as_slice).unwrap_or_default() {
            if matches(doc, filter)? {
                n += 1;
            }
        }
        Ok(n)
    }

    async fn update_many(&self, collection: &str, filter: &Document, update: &Document) -> Result<u64, DocumentError> {
        tracing::debug!(collection = %collection, filter = ?filter, update = ?update, "update");
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let Some(docs) = map.get_mut(collection) else {
            return Ok(0);
        };
        // Applied to copies first so a malformed update leaves the collection untouched.
        let mut changed = Vec::new();
        for (idx, doc) in docs.iter().enumerate() {
            if matches(doc, filter)? {
                let mut copy = doc.clone();
                apply_update(&mut copy, update)?;
                changed.push((idx, copy));
            }
        }
        let n = changed.len() as u64;
        for (idx, doc) in changed {
            docs[idx] = doc;
        }
        Ok(n)
    }

    async fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64, DocumentError> {
        tracing::debug!(collection = %collection, filter = ?filter, "delete");
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let Some(docs) = map.get_mut(collection) else {
            return Ok(0);
        };
        let mut keep = Vec::with_capacity(docs.len());
        for doc in docs.iter() {
            keep.push(!matches(doc, filter)?);
        }
        let before = docs.len();
        let mut flags = keep.into_iter();
        docs.retain(|_| flags.next().unwrap_or(true));
        Ok((before - docs.len()) as u64)
    }

    async fn next_sequence(&self, name: &str) -> Result<i64, DocumentError> {
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let counter = counter(&mut map, name);
        let next = counter.get("seq").and_then(Value::as_i64).unwrap_or(0) + 1;
        counter.insert("seq".into(), Value::from(next));
        Ok(next)
    }

    async fn raise_sequence(&self, name: &str, value: i64) -> Result<(), DocumentError> {
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let counter = counter(&mut map, name);
        let current = counter.get("seq").and_then(Value::as_i64).unwrap_or(0);
        counter.insert("seq".into(), Value::from(current.max(value)));
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), DocumentError> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(collection);
        Ok(())
    }
}

/// Counter document `{_id: name, seq}`, created at zero.
fn counter<'a>(map: &'a mut HashMap<String, Vec<Document>>, name: &str) -> &'a mut Document {
    let counters = map.entry(COUNTERS_COLLECTION.to_string()).or_default();
    let id = Value::String(name.to_string());
    let pos = match counters.iter().position(|d| d.get("_id") == Some(&id)) {
        Some(pos) => pos,
        None => {
            let mut doc = Document::new();
            doc.insert("_id".into(), id);
            doc.insert("seq".into(), Value::from(0));
            counters.push(doc);
            counters.len() - 1
        }
    };
    &mut counters[pos]
}

fn sort_documents(docs: &mut [&Document], sort: &[(String, i32)]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (key, dir) in sort {
            let ord = sort_order(a.get(key), b.get(key));
            let ord = if *dir < 0 { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
