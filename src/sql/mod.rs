//! Relational execution strategy: statement rendering, typed binds, execution.

pub mod builder;
pub mod executor;
pub mod params;

pub use builder::QueryBuf;
pub use executor::{SqlConnection, SqlPool};
pub use params::BindValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// Quote identifier (safe: identifiers come from validated metadata or options).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
