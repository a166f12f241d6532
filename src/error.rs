//! Error types for the NLQ server.
//!
//! All failures inside the agent pipeline are expressed as [`AgentError`].
//! The HTTP layer never forwards these messages to clients; they exist for
//! server-side logs and for the agent repair loop, which feeds recoverable
//! errors back to the language model as observations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Language model error: {message}")]
    Llm { message: String },

    #[error("Agent error: {message}")]
    Agent { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AgentError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a language model error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create an agent orchestration error.
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Whether the agent may report this error to the model and ask for a corrected statement.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Database { .. } | Self::Permission { .. } | Self::InvalidInput { .. }
        )
    }

    /// Text handed back to the model as the observation for a failed step.
    pub fn observation(&self) -> String {
        match self {
            Self::Database {
                message,
                sql_state: Some(code),
                ..
            } => format!("Error: {} (SQLSTATE: {})", message, code),
            other => format!("Error: {}", other),
        }
    }
}

/// Convert sqlx errors to AgentError.
impl From<sqlx::Error> for AgentError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => AgentError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                AgentError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced columns",
                )
            }
            sqlx::Error::RowNotFound => AgentError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => AgentError::connection(
                "Timed out waiting for a pooled connection",
                "Raise acquire_timeout or max_connections in the database URL",
            ),
            sqlx::Error::PoolClosed => {
                AgentError::connection("Connection pool is closed", "Restart the service")
            }
            sqlx::Error::Io(io_err) => AgentError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => AgentError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => AgentError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => AgentError::database(
                format!("Column not found: {}", col),
                None,
                "Use only columns listed in the view metadata",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                AgentError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                AgentError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => AgentError::internal("Database worker crashed"),
            _ => AgentError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::llm(format!("Request timed out: {}", err))
        } else {
            AgentError::llm(format!("HTTP request failed: {}", err))
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = AgentError::database(
            "Syntax error",
            Some("42601".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(AgentError::llm("boom").suggestion(), None);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(AgentError::database("bad column", None, "fix it").is_recoverable());
        assert!(AgentError::permission("DELETE", "read-only").is_recoverable());
        assert!(AgentError::invalid_input("parse error").is_recoverable());
        assert!(!AgentError::timeout("query", 30).is_recoverable());
        assert!(!AgentError::connection("down", "retry").is_recoverable());
        assert!(!AgentError::llm("rate limited").is_recoverable());
    }

    #[test]
    fn test_observation_includes_sql_state() {
        let err = AgentError::database("syntax error", Some("42601".to_string()), "check");
        assert_eq!(err.observation(), "Error: syntax error (SQLSTATE: 42601)");
    }

    #[test]
    fn test_pool_timeout_reports_no_fixed_duration() {
        let err = AgentError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AgentError::Connection { .. }), "{:?}", err);
        assert!(!err.to_string().contains("30"));
        assert_eq!(
            err.suggestion(),
            Some("Raise acquire_timeout or max_connections in the database URL")
        );
    }

    #[test]
    fn test_observation_for_permission() {
        let err = AgentError::permission("DELETE", "Only SELECT queries are allowed");
        assert!(err.observation().starts_with("Error: Permission denied: DELETE"));
    }
}
