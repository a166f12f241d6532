//! SQL agent: turns a question into a guarded query and a written answer.
//!
//! One call to [`SqlAgent::answer`] runs the whole pipeline:
//!
//! 1. classify the question and short-circuit greetings, structure inquiries
//!    and off-topic questions with fixed replies;
//! 2. resolve the row limit;
//! 3. ask the model for a statement, guard it, execute it, and on a
//!    recoverable failure feed the error back for another attempt;
//! 4. retry an empty result once with approximate text matches;
//! 5. ask the model to phrase the answer from the rendered rows.

pub mod conversation;
pub mod format;
pub mod prompt;
pub mod reply;

pub use conversation::Conversation;
pub use format::{TRUNCATION_NOTE, format_as_markdown};
pub use reply::{AgentReply, UNANSWERABLE_MARKER, parse_reply};

use crate::config::{
    Config, DEFAULT_FUZZY_THRESHOLD, DEFAULT_MAX_AGENT_STEPS, DEFAULT_MAX_ROW_LIMIT,
    DEFAULT_ROW_LIMIT,
};
use crate::db::{DatabaseAccessor, DbPool, QueryExecutor};
use crate::error::{AgentError, AgentResult};
use crate::llm::LanguageModel;
use crate::models::{QueryResult, ViewDefinition};
use crate::policy::fuzzy::MAX_CANDIDATES;
use crate::policy::{
    FALLBACK_MESSAGE, GuardContext, GuardedQuery, IntentClassifier, LiteralOverrides, RowLimit,
    best_match, candidate_query, guard_sql, normalize_text, resolve_row_limit,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tunables of the agent loop.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub default_row_limit: u32,
    pub max_row_limit: u32,
    pub max_agent_steps: u32,
    pub fuzzy_threshold: f64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_row_limit: DEFAULT_ROW_LIMIT,
            max_row_limit: DEFAULT_MAX_ROW_LIMIT,
            max_agent_steps: DEFAULT_MAX_AGENT_STEPS,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_row_limit: config.default_row_limit,
            max_row_limit: config.max_row_limit,
            max_agent_steps: config.max_agent_steps.max(1),
            fuzzy_threshold: config.fuzzy_threshold,
        }
    }
}

/// A statement that executed, with the limit it ran under.
struct Execution {
    sql: String,
    result: QueryResult,
    limit: u32,
}

pub struct SqlAgent {
    accessor: Arc<DatabaseAccessor>,
    executor: QueryExecutor,
    llm: Arc<dyn LanguageModel>,
    view: ViewDefinition,
    classifier: IntentClassifier,
    settings: AgentSettings,
}

impl SqlAgent {
    pub fn new(
        accessor: Arc<DatabaseAccessor>,
        executor: QueryExecutor,
        llm: Arc<dyn LanguageModel>,
        view: ViewDefinition,
        settings: AgentSettings,
    ) -> Self {
        let classifier = IntentClassifier::new(&view);
        Self {
            accessor,
            executor,
            llm,
            view,
            classifier,
            settings,
        }
    }

    /// Answer one question.
    ///
    /// Errors that are not recoverable, and running out of attempts, are
    /// returned to the caller; the HTTP layer turns them into a 500.
    pub async fn answer(&self, question: &str) -> AgentResult<String> {
        let normalized = normalize_text(question);
        let intent = self.classifier.classify(&normalized);
        if let Some(reply) = intent.fixed_response() {
            info!(intent = ?intent, "Answered with fixed reply");
            return Ok(reply.to_string());
        }

        let row_limit = resolve_row_limit(
            &normalized,
            self.settings.default_row_limit,
            self.settings.max_row_limit,
        );
        debug!(limit = row_limit.value, source = ?row_limit.source, "Resolved row limit");

        let pool = self.accessor.get_instance().await?;
        let ctx = GuardContext {
            view: &self.view,
            db_type: pool.db_type(),
            row_limit,
        };
        let mut conversation = Conversation::new(
            prompt::system_prompt(&self.view, ctx.db_type, row_limit),
            question,
        );

        for step in 1..=self.settings.max_agent_steps {
            let reply = self.llm.complete(conversation.messages()).await?;

            let sql = match parse_reply(&reply) {
                AgentReply::Unanswerable => {
                    info!(step, "Model reported the question as unanswerable");
                    return Ok(FALLBACK_MESSAGE.to_string());
                }
                AgentReply::Message(text) => {
                    info!(step, "Model replied without a statement");
                    return Ok(text);
                }
                AgentReply::Sql(sql) => sql,
            };

            match self.run_statement(&pool, &sql, &ctx).await {
                Ok(execution) => {
                    return self
                        .finish(question, &reply, execution, row_limit, conversation)
                        .await;
                }
                Err(err) if err.is_recoverable() => {
                    warn!(step, error = %err, "Statement rejected, asking for a correction");
                    conversation.record_attempt(&reply, prompt::observation(&sql, &err.observation()));
                }
                Err(err) => return Err(err),
            }
        }

        Err(AgentError::agent(format!(
            "No valid statement after {} attempts",
            conversation.attempts()
        )))
    }

    /// Guard and execute one generated statement, retrying an empty result
    /// with approximate text matches.
    async fn run_statement(
        &self,
        pool: &DbPool,
        sql: &str,
        ctx: &GuardContext<'_>,
    ) -> AgentResult<Execution> {
        let guarded = guard_sql(sql, ctx, &LiteralOverrides::new())?;
        debug!(sql = %guarded.sql, limit = guarded.limit, "Executing guarded statement");
        let result = self
            .executor
            .execute_query(pool, &guarded.sql, guarded.limit)
            .await?;

        if !result.is_empty() {
            info!(rows = result.row_count(), elapsed_ms = result.execution_time_ms, "Query executed");
            return Ok(Execution {
                sql: guarded.sql,
                result,
                limit: guarded.limit,
            });
        }

        let overrides = self.approximate_overrides(pool, &guarded).await;
        if overrides.is_empty() {
            info!("Query returned no rows");
            return Ok(Execution {
                sql: guarded.sql,
                result,
                limit: guarded.limit,
            });
        }

        let retried = guard_sql(sql, ctx, &overrides)?;
        debug!(sql = %retried.sql, "Retrying with approximate matches");
        let result = self
            .executor
            .execute_query(pool, &retried.sql, retried.limit)
            .await?;
        info!(rows = result.row_count(), "Approximate retry executed");
        Ok(Execution {
            sql: retried.sql,
            result,
            limit: retried.limit,
        })
    }

    /// Replacement literals for the exact text predicates of an empty query.
    ///
    /// A column whose candidates cannot be fetched is skipped.
    async fn approximate_overrides(&self, pool: &DbPool, guarded: &GuardedQuery) -> LiteralOverrides {
        let mut overrides = LiteralOverrides::new();
        let mut candidates: HashMap<String, Vec<String>> = HashMap::new();

        for predicate in guarded.predicates.iter().filter(|p| p.is_exact()) {
            let key = (predicate.column.to_lowercase(), predicate.literal.clone());
            if overrides.contains_key(&key) {
                continue;
            }

            if !candidates.contains_key(&key.0) {
                let query = candidate_query(&predicate.column_sql, &guarded.relation_sql);
                match self
                    .executor
                    .execute_query(pool, &query, MAX_CANDIDATES as u32)
                    .await
                {
                    Ok(result) => {
                        let values = result
                            .rows
                            .iter()
                            .filter_map(|row| row.values().next()?.as_str().map(str::to_string))
                            .collect();
                        candidates.insert(key.0.clone(), values);
                    }
                    Err(err) => {
                        warn!(column = %predicate.column, error = %err, "Failed to fetch candidate values");
                        continue;
                    }
                }
            }

            let Some(values) = candidates.get(&key.0) else {
                continue;
            };
            if let Some(found) = best_match(
                &predicate.literal,
                values,
                self.settings.fuzzy_threshold,
                pool.db_type(),
            ) {
                info!(
                    column = %predicate.column,
                    from = %predicate.literal,
                    to = %found.value,
                    score = found.score,
                    "Approximate match"
                );
                overrides.insert(key, found.value);
            }
        }

        overrides
    }

    async fn finish(
        &self,
        question: &str,
        reply: &str,
        execution: Execution,
        row_limit: RowLimit,
        mut conversation: Conversation,
    ) -> AgentResult<String> {
        let Execution { sql, result, limit } = execution;
        if result.is_empty() {
            return Ok(FALLBACK_MESSAGE.to_string());
        }

        let truncated = result.truncated
            || (!row_limit.is_explicit() && result.row_count() >= limit as usize);
        let table = format_as_markdown(&result);
        let note = truncated.then_some(TRUNCATION_NOTE);
        debug!(sql = %sql, truncated, "Requesting final answer");

        conversation.record_result(reply, prompt::answer_prompt(question, &table, note));
        let answer = self.llm.complete(conversation.messages()).await?;
        Ok(answer.trim().to_string())
    }
}

impl std::fmt::Debug for SqlAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlAgent")
            .field("view", &self.view.qualified_name())
            .field("model", &self.llm.model_name())
            .field("settings", &self.settings)
            .finish()
    }
}
