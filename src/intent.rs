//! Backend-agnostic statements. Both execution strategies render these.

use crate::model::FieldKind;
use crate::options::{Direction, Operator};
use serde_json::Value;

/// A stored field as addressed by one statement (storage name after renames).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Index into `EntityMetadata::fields`.
    pub field: usize,
    pub name: String,
    pub kind: FieldKind,
}

/// Predicate over storage names.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        kind: FieldKind,
        op: Operator,
        value: Value,
    },
    In {
        column: String,
        kind: FieldKind,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    /// Array column holds `value`.
    Contains {
        column: String,
        element: FieldKind,
        value: Value,
    },
    /// Soft-delete flag is false (or absent, on document stores).
    NotDeleted {
        column: String,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &Column, value: Value) -> Self {
        Filter::Compare {
            column: column.name.clone(),
            kind: column.kind,
            op: Operator::Eq,
            value,
        }
    }

    /// AND of the given filters; None when there is nothing to filter on.
    pub fn all(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadIntent {
    pub table: String,
    pub columns: Vec<Column>,
    pub filter: Option<Filter>,
    pub order: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct InsertIntent {
    pub table: String,
    pub values: Vec<(Column, Value)>,
    pub key: Column,
}

/// A null value clears the field (SQL NULL, `$unset`).
#[derive(Debug, Clone)]
pub struct UpdateIntent {
    pub table: String,
    pub filter: Option<Filter>,
    pub set: Vec<(Column, Value)>,
}

#[derive(Debug, Clone)]
pub struct DeleteIntent {
    pub table: String,
    pub filter: Option<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOp {
    /// Appended when not already present.
    Add(Vec<Value>),
    Remove(Vec<Value>),
}

impl ArrayOp {
    pub fn is_empty(&self) -> bool {
        match self {
            ArrayOp::Add(keys) | ArrayOp::Remove(keys) => keys.is_empty(),
        }
    }
}

/// Set-semantics mutation of an array-of-keys column.
#[derive(Debug, Clone)]
pub struct ArrayIntent {
    pub table: String,
    pub filter: Filter,
    pub column: Column,
    pub element: FieldKind,
    pub op: ArrayOp,
    /// Updated-at column and timestamp written alongside.
    pub touch: Option<(Column, Value)>,
}
