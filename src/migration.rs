//! One-shot DDL for an entity: CREATE TABLE plus column comments, per dialect.
//! Additive only; an existing table is left untouched.

use crate::error::AccessError;
use crate::model::{metadata_of, Entity, EntityMetadata, FieldDescriptor, FieldKind, KeyStrategy, Role};
use crate::options::{QueryOptions, ResolvedOptions};
use crate::sql::builder::drop_table;
use crate::sql::{quoted, Dialect};

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn type_str(field: &FieldDescriptor, dialect: Dialect, table: &str, column: &str) -> String {
    match dialect {
        Dialect::Postgres => match field.kind {
            FieldKind::Bool => "BOOLEAN".into(),
            FieldKind::Integer => "INTEGER".into(),
            FieldKind::Long => "BIGINT".into(),
            FieldKind::Double => "DOUBLE PRECISION".into(),
            FieldKind::Text => match field.constraints.max_length {
                Some(n) => format!("VARCHAR({})", n),
                None => "TEXT".into(),
            },
            FieldKind::Uuid => "UUID".into(),
            FieldKind::Timestamp => "TIMESTAMPTZ".into(),
            FieldKind::Date => "DATE".into(),
            FieldKind::Json => "JSONB".into(),
        },
        Dialect::Sqlite => {
            if field.constraints.max_length.is_some() {
                tracing::warn!(table = %table, column = %column, "sqlite: length limit not enforced, dropped");
            }
            match field.kind {
                FieldKind::Bool => "BOOLEAN".into(),
                FieldKind::Integer | FieldKind::Long => "INTEGER".into(),
                FieldKind::Double => "REAL".into(),
                FieldKind::Text | FieldKind::Uuid | FieldKind::Timestamp | FieldKind::Date | FieldKind::Json => {
                    "TEXT".into()
                }
            }
        }
    }
}

fn checks(field: &FieldDescriptor, dialect: Dialect, table: &str, column: &str) -> Vec<String> {
    let col = quoted(column);
    let measured = if field.kind == FieldKind::Text {
        format!("length({})", col)
    } else {
        col.clone()
    };
    let mut out = Vec::new();
    if field.kind.is_numeric() || field.kind == FieldKind::Text {
        if let Some(min) = field.constraints.min {
            out.push(format!("CHECK ({} >= {})", measured, min));
        }
        if let Some(max) = field.constraints.max {
            out.push(format!("CHECK ({} <= {})", measured, max));
        }
    }
    if let Some(pattern) = &field.constraints.pattern {
        match dialect {
            Dialect::Postgres => out.push(format!("CHECK ({} ~ {})", col, literal(pattern))),
            Dialect::Sqlite => {
                tracing::warn!(table = %table, column = %column, "sqlite: pattern constraint not supported, dropped")
            }
        }
    }
    out
}

fn column_def(field: &FieldDescriptor, column: &str, table: &str, dialect: Dialect) -> String {
    if field.role == Role::PrimaryKey && field.key_strategy == Some(KeyStrategy::AutoIncrement) {
        return match dialect {
            // INTEGER or BIGINT, matching how the key is decoded
            Dialect::Postgres => format!(
                "{} {} GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY",
                quoted(column),
                type_str(field, dialect, table, column)
            ),
            Dialect::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quoted(column)),
        };
    }
    let mut def = format!("{} {}", quoted(column), type_str(field, dialect, table, column));
    match field.role {
        Role::PrimaryKey => def.push_str(" PRIMARY KEY"),
        Role::SoftDelete => def.push_str(match dialect {
            Dialect::Postgres => " NOT NULL DEFAULT FALSE",
            Dialect::Sqlite => " NOT NULL DEFAULT 0",
        }),
        _ => {
            if !field.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = &field.default_value {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            if field.constraints.unique {
                def.push_str(" UNIQUE");
            }
            for check in checks(field, dialect, table, column) {
                def.push(' ');
                def.push_str(&check);
            }
        }
    }
    def
}

/// CREATE TABLE (preceded by DROP TABLE when create-drop is requested) and column comments.
pub fn create_table_statements(meta: &EntityMetadata, options: &ResolvedOptions, dialect: Dialect) -> Vec<String> {
    let table = options.table();
    let mut defs = Vec::new();
    let mut comments = Vec::new();
    for (idx, field) in meta.fields.iter().enumerate() {
        let Some(column) = options.column(idx) else { continue };
        defs.push(column_def(field, &column.name, table, dialect));
        if let Some(comment) = &field.comment {
            match dialect {
                Dialect::Postgres => comments.push(format!(
                    "COMMENT ON COLUMN {}.{} IS {}",
                    quoted(table),
                    quoted(&column.name),
                    literal(comment)
                )),
                Dialect::Sqlite => tracing::debug!(table = %table, column = %column.name, "sqlite: column comment dropped"),
            }
        }
    }
    let mut out = Vec::with_capacity(comments.len() + 2);
    if options.create_drop() {
        out.push(drop_table(table));
    }
    out.push(format!("CREATE TABLE IF NOT EXISTS {} ({})", quoted(table), defs.join(", ")));
    out.extend(comments);
    out
}

/// Statements for `T` under the given options (table override, renames, create-drop).
pub fn create_table_statements_for<T: Entity>(options: &QueryOptions, dialect: Dialect) -> Result<Vec<String>, AccessError> {
    let model = metadata_of::<T>()?;
    let resolved = ResolvedOptions::resolve(model.metadata(), options)?;
    Ok(create_table_statements(model.metadata(), &resolved, dialect))
}
