//! Renders statement intents as MongoDB-style filter and update documents.

use crate::document::{Document, FindQuery};
use crate::intent::{ArrayIntent, ArrayOp, Column, Filter, InsertIntent, ReadIntent};
use crate::model::value::{format_timestamp, parse_timestamp};
use crate::model::FieldKind;
use crate::options::{Direction, Operator};
use serde_json::{json, Value};

/// Stored form of a value: canonical timestamp text, lowercase uuids.
fn normalize(v: &Value, kind: FieldKind) -> Value {
    match (kind, v) {
        (FieldKind::Timestamp, Value::String(s)) => match parse_timestamp(s) {
            Ok(ts) => Value::String(format_timestamp(&ts)),
            Err(_) => v.clone(),
        },
        (FieldKind::Uuid, Value::String(s)) => Value::String(s.to_lowercase()),
        _ => v.clone(),
    }
}

fn single(key: &str, value: Value) -> Document {
    let mut d = Document::new();
    d.insert(key.to_string(), value);
    d
}

pub fn filter(f: Option<&Filter>) -> Document {
    f.map(filter_doc).unwrap_or_default()
}

fn filter_doc(f: &Filter) -> Document {
    match f {
        // SQL `<>` and `NOT IN` never match NULL; `$ne` / `$nin` would match null and missing keys.
        Filter::Compare {
            column,
            kind,
            op: Operator::Ne,
            value,
        } => single(column, json!({ "$nin": [normalize(value, *kind), null] })),
        Filter::Compare { column, kind, op, value } => {
            single(column, json!({ op.document(): normalize(value, *kind) }))
        }
        Filter::In {
            column,
            kind,
            values,
            negated,
        } => {
            let mut values: Vec<Value> = values.iter().map(|v| normalize(v, *kind)).collect();
            let op = if *negated {
                if !values.is_empty() {
                    values.push(Value::Null);
                }
                "$nin"
            } else {
                "$in"
            };
            single(column, json!({ op: values }))
        }
        Filter::Null { column, negated: false } => single(column, Value::Null),
        Filter::Null { column, negated: true } => single(column, json!({ "$ne": null })),
        // $eq on an array field matches any element.
        Filter::Contains { column, element, value } => single(column, json!({ "$eq": normalize(value, *element) })),
        Filter::NotDeleted { column } => single(
            "$or",
            json!([{ column.as_str(): false }, { column.as_str(): { "$exists": false } }]),
        ),
        Filter::And(items) if items.is_empty() => Document::new(),
        Filter::And(items) => single(
            "$and",
            Value::Array(items.iter().map(|i| Value::Object(filter_doc(i))).collect()),
        ),
        Filter::Or(items) => single(
            "$or",
            Value::Array(items.iter().map(|i| Value::Object(filter_doc(i))).collect()),
        ),
    }
}

pub fn find_query(intent: &ReadIntent) -> FindQuery {
    FindQuery {
        filter: filter(intent.filter.as_ref()),
        projection: intent.columns.iter().map(|c| c.name.clone()).collect(),
        sort: intent
            .order
            .iter()
            .map(|(col, dir)| (col.clone(), if *dir == Direction::Asc { 1 } else { -1 }))
            .collect(),
        skip: intent.offset,
        limit: intent.limit,
    }
}

/// Nulls are left out: an absent key reads as null.
pub fn insert_document(intent: &InsertIntent) -> Document {
    intent
        .values
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(c, v)| (c.name.clone(), normalize(v, c.kind)))
        .collect()
}

/// `$set` for values, `$unset` for nulls.
pub fn update_document(set: &[(Column, Value)]) -> Document {
    let mut to_set = Document::new();
    let mut to_unset = Document::new();
    for (column, value) in set {
        if value.is_null() {
            to_unset.insert(column.name.clone(), Value::String(String::new()));
        } else {
            to_set.insert(column.name.clone(), normalize(value, column.kind));
        }
    }
    let mut update = Document::new();
    if !to_set.is_empty() {
        update.insert("$set".into(), Value::Object(to_set));
    }
    if !to_unset.is_empty() {
        update.insert("$unset".into(), Value::Object(to_unset));
    }
    update
}

/// `$addToSet` / `$pull` on the key list, plus the updated-at `$set`.
pub fn array_update_document(intent: &ArrayIntent) -> Document {
    let column = intent.column.name.as_str();
    let mut update = match &intent.op {
        ArrayOp::Add(values) => {
            let values: Vec<Value> = values.iter().map(|v| normalize(v, intent.element)).collect();
            single("$addToSet", json!({ column: { "$each": values } }))
        }
        ArrayOp::Remove(values) => {
            let values: Vec<Value> = values.iter().map(|v| normalize(v, intent.element)).collect();
            single("$pull", json!({ column: { "$in": values } }))
        }
    };
    if let Some((ts_column, ts)) = &intent.touch {
        update.insert("$set".into(), json!({ ts_column.name.as_str(): normalize(ts, ts_column.kind) }));
    }
    update
}
