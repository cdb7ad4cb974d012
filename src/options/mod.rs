//! Query options passed to every verb.

pub mod condition;
pub mod resolved;

pub use condition::{Condition, Operator};
pub use resolved::ResolvedOptions;

use crate::service::validation::EntityCheck;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueryOption {
    /// Several conditions are AND-merged.
    Condition(Condition),
    OrderBy(Vec<OrderBy>),
    /// Several limits: the smallest wins.
    Limit(u64),
    Offset(u64),
    /// Fields left out of reads and updates. Insert always writes the whole record.
    FilterOmit(Vec<String>),
    /// Only these fields are read or updated. Insert always writes the whole record.
    FilterValue(Vec<String>),
    RenameColumn { field: String, column: String },
    OverrideTableName(String),
    /// Drops the implicit not-deleted filter.
    AccessDeletedItems,
    /// Also reads fields declared as not read by default.
    ReadAllColumn,
    /// Lets writes touch fields that are not creatable / updatable.
    ForceReadOnlyWrite,
    /// Lets insert store a caller-provided value in a generated key.
    DirectPrimaryKey,
    /// `create_table` drops the table first.
    CreateDropTable,
    /// Validation hook run before insert and update.
    Check(Arc<dyn EntityCheck>),
}

impl QueryOption {
    pub fn condition(c: Condition) -> Self {
        QueryOption::Condition(c)
    }

    pub fn order_by(items: impl IntoIterator<Item = OrderBy>) -> Self {
        QueryOption::OrderBy(items.into_iter().collect())
    }

    pub fn omit<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        QueryOption::FilterOmit(fields.into_iter().map(Into::into).collect())
    }

    pub fn include<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        QueryOption::FilterValue(fields.into_iter().map(Into::into).collect())
    }

    pub fn rename(field: &str, column: &str) -> Self {
        QueryOption::RenameColumn {
            field: field.to_string(),
            column: column.to_string(),
        }
    }

    pub fn table(name: &str) -> Self {
        QueryOption::OverrideTableName(name.to_string())
    }

    pub fn check(hook: impl EntityCheck + 'static) -> Self {
        QueryOption::Check(Arc::new(hook))
    }
}

/// Ordered option list. Verbs never mutate the caller's set.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    options: Vec<QueryOption>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, option: QueryOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn add(&mut self, option: QueryOption) {
        self.options.push(option);
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryOption> {
        self.options.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn has_condition(&self) -> bool {
        self.options.iter().any(|o| matches!(o, QueryOption::Condition(_)))
    }

    /// Options that keep addressing the same storage: table override and column renames.
    pub(crate) fn storage_only(&self) -> QueryOptions {
        self.options
            .iter()
            .filter(|o| matches!(o, QueryOption::OverrideTableName(_) | QueryOption::RenameColumn { .. }))
            .cloned()
            .collect()
    }
}

impl FromIterator<QueryOption> for QueryOptions {
    fn from_iter<I: IntoIterator<Item = QueryOption>>(iter: I) -> Self {
        QueryOptions {
            options: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<QueryOption>> for QueryOptions {
    fn from(options: Vec<QueryOption>) -> Self {
        QueryOptions { options }
    }
}

impl From<QueryOption> for QueryOptions {
    fn from(option: QueryOption) -> Self {
        QueryOptions { options: vec![option] }
    }
}
