//! Data models for the NLQ server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod view;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{ColumnMetadata, QueryRequest, QueryResponse, QueryResult};
pub use view::{ColumnGroup, ColumnKind, VIEW_COLUMNS, ViewColumn, ViewDefinition};
