//! Connection-related data models.
//!
//! This module defines the database type and the connection configuration
//! handed to the accessor.

use crate::config::{DatabaseConfig, PoolOptions};
use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Dialect-specific guidance appended to the system prompt.
    pub fn prompt_notes(&self) -> &'static str {
        match self {
            Self::PostgreSQL => {
                "Quote mixed-case identifiers with double quotes. Use LIMIT for row caps and ILIKE for case-insensitive matching."
            }
            Self::MySQL => {
                "Quote identifiers with backticks when needed. Use LIMIT for row caps. Date functions follow MySQL syntax."
            }
            Self::SQLite => {
                "Quote identifiers with double quotes when needed. Use LIMIT for row caps. Dates are stored as ISO-8601 text; use date() and strftime()."
            }
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for the single database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    /// Database name extracted from connection URL.
    pub database: Option<String>,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    pub fn new(
        connection_string: impl Into<String>,
        database: Option<String>,
        pool_options: PoolOptions,
    ) -> Result<Self, ConnectionConfigError> {
        let connection_string = connection_string.into();

        let db_type = DatabaseType::from_connection_string(&connection_string).ok_or_else(|| {
            ConnectionConfigError::UnknownDatabaseType(mask_password(&connection_string))
        })?;

        Ok(Self {
            db_type,
            connection_string,
            database,
            pool_options,
        })
    }

    /// Build from a parsed `--database-url`.
    pub fn from_database_config(config: DatabaseConfig) -> Result<Self, ConnectionConfigError> {
        Self::new(config.connection_string, config.database, config.pool_options)
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        mask_password(&self.connection_string)
    }
}

fn mask_password(connection_string: &str) -> String {
    if let Some(at_pos) = connection_string.find('@') {
        let userinfo = &connection_string[..at_pos];
        if let Some(colon_pos) = userinfo.rfind(':') {
            // Skip the scheme separator when there is no password.
            if !userinfo[colon_pos..].starts_with("://") {
                let prefix = &connection_string[..colon_pos + 1];
                let suffix = &connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
    }
    connection_string.to_string()
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),
}
