//! Backend selection from the environment (`DB_*`, `DATABASE_URL`).

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Postgres,
    Sqlite,
    Mongo,
    Memory,
}

impl FromStr for DbType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DbType::Postgres),
            "sqlite" => Ok(DbType::Sqlite),
            "mongo" | "mongodb" => Ok(DbType::Mongo),
            "memory" => Ok(DbType::Memory),
            _ => Err(ConfigError::Invalid {
                var: "DB_TYPE",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DbType::Postgres => "postgres",
            DbType::Sqlite => "sqlite",
            DbType::Mongo => "mongo",
            DbType::Memory => "memory",
        })
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Connection settings. `url`, when set, wins over the individual parts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbConfig {
    pub db_type: DbType,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Database name; for SQLite the file path, absent for an in-memory database.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DbConfig {
    pub fn new(db_type: DbType) -> Self {
        DbConfig {
            db_type,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            url: None,
            max_connections: default_max_connections(),
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads `.env` from the working directory (if any) into the environment, then reads it.
    /// Variables already set in the process take precedence.
    pub fn from_dotenv() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "env file ignored"),
        }
        Self::from_env()
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let db_type: DbType = get("DB_TYPE").ok_or(ConfigError::Missing("DB_TYPE"))?.parse()?;
        let port = match get("DB_PORT") {
            Some(v) => Some(v.trim().parse().map_err(|_| ConfigError::Invalid { var: "DB_PORT", value: v })?),
            None => None,
        };
        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var: "DB_MAX_CONNECTIONS", value: v })?,
            None => default_max_connections(),
        };
        Ok(DbConfig {
            db_type,
            host: get("DB_HOST"),
            port,
            user: get("DB_USER"),
            password: get("DB_PASSWORD"),
            database: get("DB_DATABASE"),
            url: get("DATABASE_URL"),
            max_connections,
        })
    }

    /// Connection URL for the selected backend.
    pub fn url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        let host = self.host.as_deref().unwrap_or("localhost");
        let credentials = match (&self.user, &self.password) {
            (Some(u), Some(p)) => format!("{}:{}@", u, p),
            (Some(u), None) => format!("{}@", u),
            _ => String::new(),
        };
        match self.db_type {
            DbType::Postgres => {
                let database = self.database.as_deref().ok_or(ConfigError::Missing("DB_DATABASE"))?;
                Ok(format!(
                    "postgres://{}{}:{}/{}",
                    credentials,
                    host,
                    self.port.unwrap_or(5432),
                    database
                ))
            }
            DbType::Mongo => Ok(format!("mongodb://{}{}:{}", credentials, host, self.port.unwrap_or(27017))),
            DbType::Sqlite => Ok(match &self.database {
                Some(path) => format!("sqlite://{}?mode=rwc", path),
                None => "sqlite::memory:".to_string(),
            }),
            DbType::Memory => Ok("memory".to_string()),
        }
    }
}
