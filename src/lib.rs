//! NLQ Server Library
//!
//! Answers natural-language questions about purchase orders and invoices by
//! letting a language model write SQL against a single reporting view. Every
//! generated statement is guarded and rewritten before it reaches the
//! database (SQLite, PostgreSQL, MySQL).

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod policy;
pub mod transport;

pub use agent::{AgentSettings, SqlAgent};
pub use config::Config;
pub use error::AgentError;
