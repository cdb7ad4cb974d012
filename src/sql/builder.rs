//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from statement intents.

use crate::error::AccessError;
use crate::intent::{ArrayIntent, ArrayOp, Column, DeleteIntent, Filter, InsertIntent, ReadIntent, UpdateIntent};
use crate::model::FieldKind;
use crate::options::Direction;
use crate::sql::params::BindValue;
use crate::sql::{quoted, Dialect};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: &Value, kind: FieldKind) -> Result<String, AccessError> {
        let bind = BindValue::from_json(v, kind).map_err(AccessError::InvalidInput)?;
        self.params.push(bind);
        Ok(format!("${}", self.params.len()))
    }

    /// Placeholder for a JSON array element. Postgres compares jsonb, SQLite compares json_each values.
    fn push_element(&mut self, v: &Value, element: FieldKind, dialect: Dialect) -> Result<String, AccessError> {
        match dialect {
            Dialect::Postgres => Ok(format!(
                "{}::jsonb",
                self.push_param(&normalize_element(v, element), FieldKind::Json)?
            )),
            Dialect::Sqlite => {
                let kind = if element == FieldKind::Uuid { FieldKind::Text } else { element };
                self.push_param(&normalize_element(v, element), kind)
            }
        }
    }
}

/// Uuid elements are stored as lowercase text inside JSON arrays.
fn normalize_element(v: &Value, element: FieldKind) -> Value {
    match (element, v) {
        (FieldKind::Uuid, Value::String(s)) => Value::String(s.to_lowercase()),
        _ => v.clone(),
    }
}

fn render_filter(f: &Filter, q: &mut QueryBuf, dialect: Dialect) -> Result<String, AccessError> {
    Ok(match f {
        Filter::Compare { column, kind, op, value } => {
            let ph = q.push_param(value, *kind)?;
            format!("{} {} {}", quoted(column), op.sql(), ph)
        }
        Filter::In {
            column,
            kind,
            values,
            negated,
        } => {
            if values.is_empty() {
                return Ok(if *negated { "1 = 1" } else { "1 = 0" }.to_string());
            }
            let mut phs = Vec::with_capacity(values.len());
            for v in values {
                phs.push(q.push_param(v, *kind)?);
            }
            let not = if *negated { "NOT " } else { "" };
            format!("{} {}IN ({})", quoted(column), not, phs.join(", "))
        }
        Filter::Null { column, negated } => {
            format!("{} IS {}NULL", quoted(column), if *negated { "NOT " } else { "" })
        }
        Filter::Contains { column, element, value } => {
            let ph = q.push_element(value, *element, dialect)?;
            match dialect {
                Dialect::Postgres => format!("{} @> jsonb_build_array({})", quoted(column), ph),
                Dialect::Sqlite => format!(
                    "EXISTS (SELECT 1 FROM json_each(COALESCE({}, '[]')) WHERE value = {})",
                    quoted(column),
                    ph
                ),
            }
        }
        Filter::NotDeleted { column } => format!("{} = FALSE", quoted(column)),
        Filter::And(items) | Filter::Or(items) => {
            if items.is_empty() {
                return Ok(if matches!(f, Filter::And(_)) { "1 = 1" } else { "1 = 0" }.to_string());
            }
            let joiner = if matches!(f, Filter::And(_)) { " AND " } else { " OR " };
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(render_filter(item, q, dialect)?);
            }
            format!("({})", parts.join(joiner))
        }
    })
}

fn where_clause(filter: Option<&Filter>, q: &mut QueryBuf, dialect: Dialect) -> Result<String, AccessError> {
    match filter {
        Some(f) => Ok(format!(" WHERE {}", render_filter(f, q, dialect)?)),
        None => Ok(String::new()),
    }
}

fn column_list(columns: &[Column]) -> String {
    columns.iter().map(|c| quoted(&c.name)).collect::<Vec<_>>().join(", ")
}

/// SELECT projection with filter, ordering and paging.
pub fn select(intent: &ReadIntent, dialect: Dialect) -> Result<QueryBuf, AccessError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(intent.filter.as_ref(), &mut q, dialect)?;
    let order_sql = if intent.order.is_empty() {
        String::new()
    } else {
        let items: Vec<String> = intent
            .order
            .iter()
            .map(|(col, dir)| {
                let dir = match dir {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{} {}", quoted(col), dir)
            })
            .collect();
        format!(" ORDER BY {}", items.join(", "))
    };
    let limit_sql = match (intent.limit, intent.offset, dialect) {
        (Some(n), _, _) => format!(" LIMIT {}", n),
        // SQLite only accepts OFFSET after a LIMIT.
        (None, Some(_), Dialect::Sqlite) => " LIMIT -1".to_string(),
        (None, _, _) => String::new(),
    };
    let offset_sql = intent.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        column_list(&intent.columns),
        quoted(&intent.table),
        where_sql,
        order_sql,
        limit_sql,
        offset_sql
    );
    Ok(q)
}

pub fn count(table: &str, filter: Option<&Filter>, dialect: Dialect) -> Result<QueryBuf, AccessError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(filter, &mut q, dialect)?;
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(table), where_sql);
    Ok(q)
}

/// INSERT returning the primary key.
pub fn insert(intent: &InsertIntent) -> Result<QueryBuf, AccessError> {
    let mut q = QueryBuf::new();
    let table = quoted(&intent.table);
    let returning = quoted(&intent.key.name);
    if intent.values.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning);
        return Ok(q);
    }
    let mut cols = Vec::with_capacity(intent.values.len());
    let mut placeholders = Vec::with_capacity(intent.values.len());
    for (column, value) in &intent.values {
        cols.push(quoted(&column.name));
        placeholders.push(q.push_param(value, column.kind)?);
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        cols.join(", "),
        placeholders.join(", "),
        returning
    );
    Ok(q)
}

pub fn update(intent: &UpdateIntent, dialect: Dialect) -> Result<QueryBuf, AccessError> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::with_capacity(intent.set.len());
    for (column, value) in &intent.set {
        let ph = q.push_param(value, column.kind)?;
        sets.push(format!("{} = {}", quoted(&column.name), ph));
    }
    let where_sql = where_clause(intent.filter.as_ref(), &mut q, dialect)?;
    q.sql = format!("UPDATE {} SET {}{}", quoted(&intent.table), sets.join(", "), where_sql);
    Ok(q)
}

pub fn delete(intent: &DeleteIntent, dialect: Dialect) -> Result<QueryBuf, AccessError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(intent.filter.as_ref(), &mut q, dialect)?;
    q.sql = format!("DELETE FROM {}{}", quoted(&intent.table), where_sql);
    Ok(q)
}

/// One UPDATE per element; each statement adds or removes a single key atomically.
pub fn array_update(intent: &ArrayIntent, dialect: Dialect) -> Result<Vec<QueryBuf>, AccessError> {
    let (values, adding) = match &intent.op {
        ArrayOp::Add(v) => (v, true),
        ArrayOp::Remove(v) => (v, false),
    };
    let col = quoted(&intent.column.name);
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let mut q = QueryBuf::new();
        let expr = match (dialect, adding) {
            (Dialect::Postgres, true) => {
                let present = q.push_element(value, intent.element, dialect)?;
                let appended = q.push_element(value, intent.element, dialect)?;
                format!(
                    "CASE WHEN COALESCE({c}, '[]'::jsonb) @> jsonb_build_array({p}) THEN {c} \
                     ELSE COALESCE({c}, '[]'::jsonb) || jsonb_build_array({a}) END",
                    c = col,
                    p = present,
                    a = appended
                )
            }
            (Dialect::Postgres, false) => {
                let ph = q.push_element(value, intent.element, dialect)?;
                format!(
                    "COALESCE((SELECT jsonb_agg(e) FROM jsonb_array_elements(COALESCE({c}, '[]'::jsonb)) AS e WHERE e <> {p}), '[]'::jsonb)",
                    c = col,
                    p = ph
                )
            }
            (Dialect::Sqlite, true) => {
                let present = q.push_element(value, intent.element, dialect)?;
                let appended = q.push_element(value, intent.element, dialect)?;
                format!(
                    "CASE WHEN EXISTS (SELECT 1 FROM json_each(COALESCE({c}, '[]')) WHERE value = {p}) THEN {c} \
                     ELSE json_insert(COALESCE({c}, '[]'), '$[#]', {a}) END",
                    c = col,
                    p = present,
                    a = appended
                )
            }
            (Dialect::Sqlite, false) => {
                let ph = q.push_element(value, intent.element, dialect)?;
                format!(
                    "(SELECT json_group_array(value) FROM json_each(COALESCE({c}, '[]')) WHERE value IS NOT {p})",
                    c = col,
                    p = ph
                )
            }
        };
        let mut sets = vec![format!("{} = {}", col, expr)];
        if let Some((column, ts)) = &intent.touch {
            let ph = q.push_param(ts, column.kind)?;
            sets.push(format!("{} = {}", quoted(&column.name), ph));
        }
        let where_sql = where_clause(Some(&intent.filter), &mut q, dialect)?;
        q.sql = format!("UPDATE {} SET {}{}", quoted(&intent.table), sets.join(", "), where_sql);
        out.push(q);
    }
    Ok(out)
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quoted(table))
}

pub fn clear_table(table: &str) -> String {
    format!("DELETE FROM {}", quoted(table))
}

/// Postgres: moves the identity sequence behind `column` to at least `value`.
pub fn advance_identity(table: &str, column: &str, value: i64) -> String {
    let sequence = format!("pg_get_serial_sequence('{}', '{}')", quoted(table), column);
    format!("SELECT setval({0}, GREATEST(nextval({0}), {1}))", sequence, value)
}
