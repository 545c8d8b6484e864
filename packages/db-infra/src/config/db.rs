//! Database connection settings.

use std::env;
use std::time::Duration;

use crate::error::DbInfraError;

/// Database engine, derived from the connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Postgres,
    SqliteFile,
    SqliteMemory,
}

impl DbKind {
    pub fn from_url(url: &str) -> Result<Self, DbInfraError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DbKind::Postgres)
        } else if url.starts_with("sqlite::memory:") {
            Ok(DbKind::SqliteMemory)
        } else if url.starts_with("sqlite:") {
            Ok(DbKind::SqliteFile)
        } else {
            Err(DbInfraError::Config {
                message: format!("unsupported database URL scheme in '{url}'"),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbSettings {
    pub url: String,
    pub kind: DbKind,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    /// Connection attempts before giving up (Postgres only).
    pub connect_attempts: u32,
    pub retry_interval: Duration,
}

impl DbSettings {
    pub fn from_url(url: impl Into<String>) -> Result<Self, DbInfraError> {
        let url = url.into();
        let kind = DbKind::from_url(&url)?;

        // A second pool connection to sqlite::memory: would see a different database.
        let max_connections = match kind {
            DbKind::SqliteMemory => 1,
            _ => 10,
        };

        Ok(Self {
            url,
            kind,
            max_connections,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            connect_attempts: 5,
            retry_interval: Duration::from_millis(500),
        })
    }

    /// Read `DATABASE_URL` (required) and `DB_MAX_CONNECTIONS` (optional).
    pub fn from_env() -> Result<Self, DbInfraError> {
        let url = env::var("DATABASE_URL").map_err(|_| DbInfraError::Config {
            message: "DATABASE_URL must be set".to_string(),
        })?;
        let mut settings = Self::from_url(url)?;

        if let Ok(raw) = env::var("DB_MAX_CONNECTIONS") {
            settings.max_connections = raw.parse::<u32>().map_err(|_| DbInfraError::Config {
                message: format!("DB_MAX_CONNECTIONS must be a positive integer, got '{raw}'"),
            })?;
        }

        Ok(settings)
    }
}
