//! Shared fixtures: a SQLite copy of the view and a scripted language model.

#![allow(dead_code)]

use async_trait::async_trait;
use nlq_server::agent::{AgentSettings, SqlAgent};
use nlq_server::config::PoolOptions;
use nlq_server::db::{DatabaseAccessor, QueryExecutor};
use nlq_server::error::{AgentError, AgentResult};
use nlq_server::llm::{ChatMessage, LanguageModel};
use nlq_server::models::{ConnectionConfig, ViewDefinition};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const VIEW_NAME: &str = "po_invoices";

/// (Vendor, Vendor_ID, Vessel_Name, INVOICE_AMOUNT, port_name)
pub const SAMPLE_ROWS: &[(&str, i64, &str, f64, &str)] = &[
    ("Acme-Marine, Ltd.", 1, "MV Aurora", 1200.5, "Rotterdam"),
    ("Northwind Shipping", 2, "MV Borealis", 980.0, "Singapore"),
    ("Blue Ocean Supply", 3, "MV Aurora", 450.25, "Hamburg"),
    ("Acme-Marine, Ltd.", 1, "MV Celeste", 310.0, "Rotterdam"),
];

/// Replies a fixed script and records every conversation it was shown.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Content of the last message of the n-th call.
    pub fn last_message(&self, call: usize) -> String {
        self.calls.lock().unwrap()[call]
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::llm("script exhausted"))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Fenced SQL reply.
pub fn sql_reply(sql: &str) -> String {
    format!("```sql\n{}\n```", sql)
}

/// Create a SQLite file holding the sample rows.
pub async fn create_test_database() -> NamedTempFile {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let options = SqliteConnectOptions::from_str(&format!(
        "sqlite:{}",
        temp_file.path().display()
    ))
    .unwrap()
    .create_if_missing(true);
    let writer = SqlitePool::connect_with(options)
        .await
        .expect("Failed to open test database");

    sqlx::query(&format!(
        "CREATE TABLE {} (Vendor TEXT, Vendor_ID INTEGER, Vessel_Name TEXT, INVOICE_AMOUNT REAL, port_name TEXT)",
        VIEW_NAME
    ))
    .execute(&writer)
    .await
    .expect("Failed to create test table");

    insert_with(&writer, SAMPLE_ROWS).await;

    writer.close().await;
    temp_file
}

/// Append rows to a database made by [`create_test_database`].
pub async fn insert_rows(path: &str, rows: &[(&str, i64, &str, f64, &str)]) {
    let writer = SqlitePool::connect(&format!("sqlite:{}", path))
        .await
        .expect("Failed to open test database");
    insert_with(&writer, rows).await;
    writer.close().await;
}

async fn insert_with(writer: &SqlitePool, rows: &[(&str, i64, &str, f64, &str)]) {
    for (vendor, vendor_id, vessel, amount, port) in rows {
        sqlx::query(&format!(
            "INSERT INTO {} (Vendor, Vendor_ID, Vessel_Name, INVOICE_AMOUNT, port_name) VALUES (?, ?, ?, ?, ?)",
            VIEW_NAME
        ))
        .bind(*vendor)
        .bind(*vendor_id)
        .bind(*vessel)
        .bind(*amount)
        .bind(*port)
        .execute(writer)
        .await
        .expect("Failed to insert sample row");
    }
}

pub fn accessor_for(path: &str) -> Arc<DatabaseAccessor> {
    let config = ConnectionConfig::new(format!("sqlite:{}", path), None, PoolOptions::default())
        .expect("Failed to create config");
    Arc::new(DatabaseAccessor::new(config))
}

pub fn test_executor() -> QueryExecutor {
    QueryExecutor::new(Duration::from_secs(5), 5000)
}

pub fn test_view() -> ViewDefinition {
    ViewDefinition::new(None, VIEW_NAME)
}

pub fn build_agent(
    accessor: Arc<DatabaseAccessor>,
    model: Arc<ScriptedModel>,
    settings: AgentSettings,
) -> SqlAgent {
    SqlAgent::new(accessor, test_executor(), model, test_view(), settings)
}

/// Row count read through a separate connection.
pub async fn count_rows(path: &str) -> i64 {
    let pool = SqlitePool::connect(&format!("sqlite:{}", path)).await.unwrap();
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", VIEW_NAME))
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    count
}
