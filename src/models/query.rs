//! Query-related data models.
//!
//! This module defines the HTTP request/response bodies and the result of an
//! executed SQL statement.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body of `POST /query/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(alias = "question")]
    pub userinput: String,
}

impl QueryRequest {
    pub fn new(userinput: impl Into<String>) -> Self {
        Self {
            userinput: userinput.into(),
        }
    }
}

/// Body returned by `POST /query/` on success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            truncated: false,
            execution_time_ms,
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_accepts_question_alias() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"question": "top 5 vendors"}"#).unwrap();
        assert_eq!(req.userinput, "top 5 vendors");

        let req: QueryRequest = serde_json::from_str(r#"{"userinput": "hi"}"#).unwrap();
        assert_eq!(req.userinput, "hi");
    }

    #[test]
    fn test_query_request_requires_field() {
        assert!(serde_json::from_str::<QueryRequest>("{}").is_err());
    }

    #[test]
    fn test_query_response_shape() {
        let body = serde_json::to_value(QueryResponse {
            response: "ok".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"response": "ok"}));
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::empty(10);
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
    }
}
