//! Query execution engine.
//!
//! Statements reaching this module have already passed the SQL guard. The
//! executor adds two runtime bounds on top of the statement's own LIMIT:
//! - Row limits (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//!
//! The database-specific implementations live in the `mysql`, `postgres` and
//! `sqlite` submodules.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{AgentError, AgentResult};
use crate::models::QueryResult;
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    query_timeout: Duration,
    max_rows: u32,
}

impl QueryExecutor {
    pub fn new(query_timeout: Duration, max_rows: u32) -> Self {
        Self {
            query_timeout,
            max_rows: max_rows.max(1),
        }
    }

    /// Execute a SELECT statement, fetching at most `row_limit` rows.
    pub async fn execute_query(
        &self,
        pool: &DbPool,
        sql: &str,
        row_limit: u32,
    ) -> AgentResult<QueryResult> {
        let start = Instant::now();
        // Clamp limit so limit=0 does not mark every result as truncated
        let row_limit = row_limit.clamp(1, self.max_rows);

        debug!(
            sql = %sql,
            limit = row_limit,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        match pool {
            DbPool::MySql(p) => {
                let rows = mysql::fetch_rows(p, sql, row_limit, self.query_timeout).await?;
                process_rows(rows, row_limit, start)
            }
            DbPool::Postgres(p) => {
                let rows = postgres::fetch_rows(p, sql, row_limit, self.query_timeout).await?;
                process_rows(rows, row_limit, start)
            }
            DbPool::SQLite(p) => {
                let rows = sqlite::fetch_rows(p, sql, row_limit, self.query_timeout).await?;
                process_rows(rows, row_limit, start)
            }
        }
    }

    /// Run `SELECT 1` under the query timeout.
    pub async fn ping(&self, pool: &DbPool) -> AgentResult<()> {
        let result = match pool {
            DbPool::MySql(p) => {
                timeout(self.query_timeout, sqlx::query("SELECT 1").execute(p))
                    .await
                    .map(|r| r.map(|_| ()))
            }
            DbPool::Postgres(p) => {
                timeout(self.query_timeout, sqlx::query("SELECT 1").execute(p))
                    .await
                    .map(|r| r.map(|_| ()))
            }
            DbPool::SQLite(p) => {
                timeout(self.query_timeout, sqlx::query("SELECT 1").execute(p))
                    .await
                    .map(|r| r.map(|_| ()))
            }
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AgentError::from(e)),
            Err(_) => Err(timeout_error("keep-alive ping", self.query_timeout)),
        }
    }
}

/// Process rows from any database type into a QueryResult.
fn process_rows<R: RowToJson>(
    rows: Vec<R>,
    row_limit: u32,
    start: Instant,
) -> AgentResult<QueryResult> {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    let Some(first) = rows.first() else {
        return Ok(QueryResult::empty(execution_time_ms));
    };

    let columns = first.get_column_metadata();
    let total_rows = rows.len();
    let truncated = total_rows > row_limit as usize;

    let json_rows: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .take(row_limit as usize)
        .map(|r| r.to_json_map())
        .collect();

    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    Ok(QueryResult {
        columns,
        rows: json_rows,
        truncated,
        execution_time_ms,
    })
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> AgentResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(AgentError::from)?);
    }
    Ok(rows)
}

fn timeout_error(operation: &str, timeout: Duration) -> AgentError {
    AgentError::timeout(operation, timeout.as_secs())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Statements are sent unprepared: generated SQL is run once, so a prepared
// statement would only add a round trip.

mod mysql {
    use super::*;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        row_limit: u32,
        query_timeout: Duration,
    ) -> AgentResult<Vec<MySqlRow>> {
        use sqlx::Executor;
        let fetch_limit = row_limit as usize + 1;
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        row_limit: u32,
        query_timeout: Duration,
    ) -> AgentResult<Vec<PgRow>> {
        use sqlx::Executor;
        let fetch_limit = row_limit as usize + 1;
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        row_limit: u32,
        query_timeout: Duration,
    ) -> AgentResult<Vec<SqliteRow>> {
        use sqlx::Executor;
        let fetch_limit = row_limit as usize + 1;
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_settings() {
        let executor = QueryExecutor::new(Duration::from_secs(60), 500);
        assert_eq!(executor.query_timeout, Duration::from_secs(60));
        assert_eq!(executor.max_rows, 500);
    }

    #[test]
    fn test_executor_max_rows_at_least_one() {
        let executor = QueryExecutor::new(Duration::from_secs(30), 0);
        assert_eq!(executor.max_rows, 1);
    }

    #[test]
    fn test_timeout_error_reports_seconds() {
        let err = timeout_error("query execution", Duration::from_secs(30));
        assert!(err.to_string().contains("exceeded 30s"));
    }
}
