//! Resolves a `QueryOptions` set against one entity: effective table, columns, filter, projection.

use crate::case::is_identifier;
use crate::error::AccessError;
use crate::intent::{Column, Filter};
use crate::model::{EntityMetadata, FieldKind, RelationKind};
use crate::options::{Condition, Direction, Operator, QueryOption, QueryOptions};
use crate::service::validation::EntityCheck;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct ResolvedOptions {
    meta: Arc<EntityMetadata>,
    table: String,
    renames: HashMap<usize, String>,
    include_deleted: bool,
    read_all: bool,
    force_write: bool,
    direct_key: bool,
    create_drop: bool,
    condition: Option<Filter>,
    has_condition: bool,
    order: Vec<(usize, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
    omit: HashSet<usize>,
    include: Option<HashSet<usize>>,
    checks: Vec<Arc<dyn EntityCheck>>,
}

fn conflict(msg: String) -> AccessError {
    AccessError::OptionConflict(msg)
}

impl ResolvedOptions {
    pub fn resolve(meta: &Arc<EntityMetadata>, options: &QueryOptions) -> Result<Self, AccessError> {
        let entity = meta.type_name;
        let mut table: Option<String> = None;
        let mut renames: HashMap<usize, String> = HashMap::new();
        let mut out = ResolvedOptions {
            meta: Arc::clone(meta),
            table: meta.table_name.clone(),
            renames: HashMap::new(),
            include_deleted: false,
            read_all: false,
            force_write: false,
            direct_key: false,
            create_drop: false,
            condition: None,
            has_condition: false,
            order: Vec::new(),
            limit: None,
            offset: None,
            omit: HashSet::new(),
            include: None,
            checks: Vec::new(),
        };
        let stored_field = |name: &str, what: &str| -> Result<usize, AccessError> {
            match meta.field_index(name) {
                Some(idx) if meta.fields[idx].is_stored() => Ok(idx),
                Some(_) => Err(conflict(format!("{}: {} on field '{}' without storage", entity, what, name))),
                None => Err(conflict(format!("{}: {} on unknown field '{}'", entity, what, name))),
            }
        };
        let known_field = |name: &str, what: &str| -> Result<usize, AccessError> {
            meta.field_index(name)
                .ok_or_else(|| conflict(format!("{}: {} on unknown field '{}'", entity, what, name)))
        };

        let mut conditions = Vec::new();
        for option in options.iter() {
            match option {
                QueryOption::Condition(c) => conditions.push(c),
                QueryOption::OrderBy(items) => {
                    for item in items {
                        out.order.push((stored_field(&item.field, "ordering")?, item.direction));
                    }
                }
                QueryOption::Limit(n) => out.limit = Some(out.limit.map_or(*n, |l| l.min(*n))),
                QueryOption::Offset(n) => match out.offset {
                    Some(prev) if prev != *n => {
                        return Err(conflict(format!("{}: offsets {} and {} both given", entity, prev, n)));
                    }
                    _ => out.offset = Some(*n),
                },
                QueryOption::FilterOmit(names) => {
                    for name in names {
                        out.omit.insert(known_field(name, "omit")?);
                    }
                }
                QueryOption::FilterValue(names) => {
                    let include = out.include.get_or_insert_with(HashSet::new);
                    for name in names {
                        include.insert(known_field(name, "include")?);
                    }
                }
                QueryOption::RenameColumn { field, column } => {
                    let idx = stored_field(field, "rename")?;
                    if !is_identifier(column) {
                        return Err(conflict(format!("{}: '{}' is not a valid column name", entity, column)));
                    }
                    match renames.get(&idx) {
                        Some(prev) if prev != column => {
                            return Err(conflict(format!(
                                "{}: field '{}' renamed to both '{}' and '{}'",
                                entity, field, prev, column
                            )));
                        }
                        _ => {
                            renames.insert(idx, column.clone());
                        }
                    }
                }
                QueryOption::OverrideTableName(name) => {
                    if !is_identifier(name) {
                        return Err(conflict(format!("{}: '{}' is not a valid table name", entity, name)));
                    }
                    match &table {
                        Some(prev) if prev != name => {
                            return Err(conflict(format!(
                                "{}: table overridden as both '{}' and '{}'",
                                entity, prev, name
                            )));
                        }
                        _ => table = Some(name.clone()),
                    }
                }
                QueryOption::AccessDeletedItems => out.include_deleted = true,
                QueryOption::ReadAllColumn => out.read_all = true,
                QueryOption::ForceReadOnlyWrite => out.force_write = true,
                QueryOption::DirectPrimaryKey => out.direct_key = true,
                QueryOption::CreateDropTable => out.create_drop = true,
                QueryOption::Check(hook) => out.checks.push(Arc::clone(hook)),
            }
        }

        let mut seen = HashSet::new();
        for (idx, field) in meta.fields.iter().enumerate() {
            let Some(default) = field.column() else { continue };
            let name = renames.get(&idx).map(String::as_str).unwrap_or(default);
            if !seen.insert(name) {
                return Err(conflict(format!("{}: column '{}' addressed by two fields", entity, name)));
            }
        }
        if let Some(t) = table {
            out.table = t;
        }
        out.renames = renames;

        let mut filters = Vec::new();
        for c in conditions {
            if let Some(f) = out.translate(c)? {
                filters.push(f);
            }
        }
        out.has_condition = !filters.is_empty();
        out.condition = Filter::all(filters);
        Ok(out)
    }

    fn translate(&self, condition: &Condition) -> Result<Option<Filter>, AccessError> {
        let entity = self.meta.type_name;
        Ok(Some(match condition {
            Condition::Compare { field, op, value } => {
                let column = self.condition_column(field)?;
                if let Some(element) = self.owned_element_kind(column.field)? {
                    if *op != Operator::Eq {
                        return Err(conflict(format!("{}: only equality applies to list field '{}'", entity, field)));
                    }
                    Filter::Contains {
                        column: column.name,
                        element,
                        value: value.clone(),
                    }
                } else if value.is_null() {
                    match op {
                        Operator::Eq => Filter::Null {
                            column: column.name,
                            negated: false,
                        },
                        Operator::Ne => Filter::Null {
                            column: column.name,
                            negated: true,
                        },
                        _ => return Err(conflict(format!("{}: null compared with {} on '{}'", entity, op, field))),
                    }
                } else {
                    Filter::Compare {
                        column: column.name,
                        kind: column.kind,
                        op: *op,
                        value: value.clone(),
                    }
                }
            }
            Condition::In { field, values } | Condition::NotIn { field, values } => {
                let column = self.condition_column(field)?;
                Filter::In {
                    column: column.name,
                    kind: column.kind,
                    values: values.clone(),
                    negated: matches!(condition, Condition::NotIn { .. }),
                }
            }
            Condition::IsNull(field) | Condition::IsNotNull(field) => Filter::Null {
                column: self.condition_column(field)?.name,
                negated: matches!(condition, Condition::IsNotNull(_)),
            },
            Condition::And(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(f) = self.translate(item)? {
                        out.push(f);
                    }
                }
                match Filter::all(out) {
                    Some(f) => f,
                    None => return Ok(None),
                }
            }
            Condition::Or(items) => {
                if items.is_empty() {
                    return Err(conflict(format!("{}: empty OR condition", entity)));
                }
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.translate(item)? {
                        Some(f) => out.push(f),
                        // An always-true branch makes the whole OR true.
                        None => return Ok(None),
                    }
                }
                if out.len() == 1 {
                    out.remove(0)
                } else {
                    Filter::Or(out)
                }
            }
        }))
    }

    fn condition_column(&self, field: &str) -> Result<Column, AccessError> {
        let entity = self.meta.type_name;
        let idx = self
            .meta
            .field_index(field)
            .ok_or_else(|| conflict(format!("{}: condition on unknown field '{}'", entity, field)))?;
        self.column(idx)
            .ok_or_else(|| conflict(format!("{}: condition on field '{}' without storage", entity, field)))
    }

    /// Key kind of the target when `field` is a to-many-owned list.
    pub(crate) fn owned_element_kind(&self, field: usize) -> Result<Option<FieldKind>, AccessError> {
        match self.meta.relationship(field).map(|r| &r.kind) {
            Some(RelationKind::ToManyOwned { target }) => Ok(Some(target.metadata()?.primary_key().kind)),
            _ => Ok(None),
        }
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.meta
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Storage address of a field for this call; None when it has no storage.
    pub fn column(&self, field: usize) -> Option<Column> {
        let descriptor = &self.meta.fields[field];
        let default = descriptor.column()?;
        Some(Column {
            field,
            name: self.renames.get(&field).cloned().unwrap_or_else(|| default.to_string()),
            kind: descriptor.kind,
        })
    }

    pub fn key_column(&self) -> Column {
        let pk = self.meta.primary_key;
        Column {
            field: pk,
            name: self
                .renames
                .get(&pk)
                .cloned()
                .or_else(|| self.meta.fields[pk].storage_name.clone())
                .unwrap_or_default(),
            kind: self.meta.fields[pk].kind,
        }
    }

    pub fn key_filter(&self, key: Value) -> Filter {
        Filter::eq(&self.key_column(), key)
    }

    pub fn not_deleted(&self) -> Option<Filter> {
        if self.include_deleted {
            return None;
        }
        let idx = self.meta.soft_delete?;
        self.column(idx).map(|c| Filter::NotDeleted { column: c.name })
    }

    /// Caller conditions AND the implicit not-deleted filter.
    pub fn effective_filter(&self) -> Option<Filter> {
        Filter::all(self.not_deleted().into_iter().chain(self.condition.clone()).collect())
    }

    /// Caller conditions only.
    pub fn condition(&self) -> Option<Filter> {
        self.condition.clone()
    }

    pub fn has_condition(&self) -> bool {
        self.has_condition
    }

    /// Omit / include filtering shared by reads and writes.
    pub fn selects(&self, field: usize) -> bool {
        !self.omit.contains(&field) && self.include.as_ref().map_or(true, |set| set.contains(&field))
    }

    fn readable(&self, field: usize) -> bool {
        self.selects(field) && (self.meta.fields[field].read_by_default || self.read_all)
    }

    /// Stored columns to read. The primary key is always part of it.
    pub fn projection(&self) -> Vec<Column> {
        (0..self.meta.fields.len())
            .filter(|&idx| idx == self.meta.primary_key || self.readable(idx))
            .filter_map(|idx| self.column(idx))
            .collect()
    }

    /// Mirrored fields to compute after reading.
    pub fn mirrored_reads(&self) -> Vec<usize> {
        self.meta
            .relationships
            .iter()
            .filter(|r| r.is_mirrored() && self.readable(r.field))
            .map(|r| r.field)
            .collect()
    }

    /// Ordering by column name; primary key ascending when none is given.
    pub fn order(&self) -> Vec<(String, Direction)> {
        if self.order.is_empty() {
            return vec![(self.key_column().name, Direction::Asc)];
        }
        self.order
            .iter()
            .filter_map(|(idx, dir)| self.column(*idx).map(|c| (c.name, *dir)))
            .collect()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn include_deleted(&self) -> bool {
        self.include_deleted
    }

    pub fn read_all(&self) -> bool {
        self.read_all
    }

    pub fn force_write(&self) -> bool {
        self.force_write
    }

    pub fn direct_key(&self) -> bool {
        self.direct_key
    }

    pub fn create_drop(&self) -> bool {
        self.create_drop
    }

    pub fn checks(&self) -> &[Arc<dyn EntityCheck>] {
        &self.checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{metadata_of, Entity, ModelBuilder};
    use crate::options::OrderBy;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Account {
        id: i64,
        login: String,
        secret: Option<String>,
        deleted: bool,
    }

    impl Entity for Account {
        fn describe(m: &mut ModelBuilder<Self>) {
            m.field("id").primary_key().bind(|a| &a.id, |a| &mut a.id);
            m.field("login").bind(|a| &a.login, |a| &mut a.login);
            m.field("secret").not_read().bind(|a| &a.secret, |a| &mut a.secret);
            m.field("deleted").soft_delete().bind(|a| &a.deleted, |a| &mut a.deleted);
        }
    }

    fn resolve(options: QueryOptions) -> Result<ResolvedOptions, AccessError> {
        let model = metadata_of::<Account>().unwrap();
        ResolvedOptions::resolve(model.metadata(), &options)
    }

    fn names(cols: Vec<Column>) -> Vec<String> {
        cols.into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn implicit_not_deleted_filter() {
        let r = resolve(QueryOptions::new()).unwrap();
        assert_eq!(
            r.effective_filter(),
            Some(Filter::NotDeleted {
                column: "deleted".into()
            })
        );
        let r = resolve(QueryOptions::new().with(QueryOption::AccessDeletedItems)).unwrap();
        assert_eq!(r.effective_filter(), None);
    }

    #[test]
    fn conditions_are_and_merged_with_the_implicit_filter() {
        let r = resolve(
            QueryOptions::new()
                .with(QueryOption::condition(Condition::eq("login", "a")))
                .with(QueryOption::condition(Condition::gt("id", 3))),
        )
        .unwrap();
        match r.effective_filter() {
            Some(Filter::And(items)) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0], Filter::NotDeleted { .. }));
                assert!(matches!(items[1], Filter::And(ref inner) if inner.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn projection_honours_omit_include_and_read_all() {
        assert_eq!(names(resolve(QueryOptions::new()).unwrap().projection()), ["id", "login", "deleted"]);
        assert_eq!(
            names(resolve(QueryOptions::new().with(QueryOption::ReadAllColumn)).unwrap().projection()),
            ["id", "login", "secret", "deleted"]
        );
        assert_eq!(
            names(resolve(QueryOptions::new().with(QueryOption::omit(["login"]))).unwrap().projection()),
            ["id", "deleted"]
        );
        // the key survives an include list that leaves it out
        assert_eq!(
            names(resolve(QueryOptions::new().with(QueryOption::include(["login"]))).unwrap().projection()),
            ["id", "login"]
        );
    }

    #[test]
    fn rename_and_table_override() {
        let r = resolve(
            QueryOptions::new()
                .with(QueryOption::rename("login", "user_name"))
                .with(QueryOption::table("account_archive"))
                .with(QueryOption::condition(Condition::eq("login", "x"))),
        )
        .unwrap();
        assert_eq!(r.table(), "account_archive");
        assert_eq!(r.condition(), Some(Filter::Compare {
            column: "user_name".into(),
            kind: FieldKind::Text,
            op: Operator::Eq,
            value: json!("x"),
        }));
    }

    #[test]
    fn conflicting_options_are_rejected() {
        let twice = QueryOptions::new()
            .with(QueryOption::table("a"))
            .with(QueryOption::table("b"));
        assert!(matches!(resolve(twice), Err(AccessError::OptionConflict(_))));

        let renamed = QueryOptions::new()
            .with(QueryOption::rename("login", "x"))
            .with(QueryOption::rename("login", "y"));
        assert!(matches!(resolve(renamed), Err(AccessError::OptionConflict(_))));

        let clash = QueryOptions::new().with(QueryOption::rename("login", "id"));
        assert!(matches!(resolve(clash), Err(AccessError::OptionConflict(_))));

        let unknown = QueryOptions::new().with(QueryOption::condition(Condition::eq("nope", 1)));
        assert!(matches!(resolve(unknown), Err(AccessError::OptionConflict(_))));

        let injected = QueryOptions::new().with(QueryOption::table("x; DROP TABLE y"));
        assert!(matches!(resolve(injected), Err(AccessError::OptionConflict(_))));
    }

    #[test]
    fn smallest_limit_wins_and_default_order_is_key() {
        let r = resolve(
            QueryOptions::new()
                .with(QueryOption::Limit(10))
                .with(QueryOption::Limit(3)),
        )
        .unwrap();
        assert_eq!(r.limit(), Some(3));
        assert_eq!(r.order(), vec![("id".to_string(), Direction::Asc)]);
        let r = resolve(QueryOptions::new().with(QueryOption::order_by([OrderBy::desc("login")]))).unwrap();
        assert_eq!(r.order(), vec![("login".to_string(), Direction::Desc)]);
    }

    #[test]
    fn null_comparisons_become_null_checks() {
        let r = resolve(QueryOptions::new().with(QueryOption::condition(Condition::ne("secret", Value::Null)))).unwrap();
        assert_eq!(
            r.condition(),
            Some(Filter::Null {
                column: "secret".into(),
                negated: true
            })
        );
    }
}
