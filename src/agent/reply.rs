//! Interpretation of the model's reply to the SQL-generation prompt.

use regex::Regex;
use std::sync::LazyLock;

/// Marker the model returns when the view cannot answer the question.
pub const UNANSWERABLE_MARKER: &str = "UNANSWERABLE";

static SQL_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```[ \t]*(?:sql|postgresql|postgres|mysql|sqlite)?[ \t]*\r?\n?(.*?)```")
        .expect("valid fence pattern")
});

static BARE_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:select|with)\b").expect("valid query pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    /// A statement to guard and execute
    Sql(String),
    Unanswerable,
    /// Anything else, typically a clarifying question, returned to the user as-is
    Message(String),
}

pub fn parse_reply(text: &str) -> AgentReply {
    let trimmed = text.trim();

    let first_line = trimmed.lines().next().unwrap_or_default().trim();
    if first_line.trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .eq_ignore_ascii_case(UNANSWERABLE_MARKER)
    {
        return AgentReply::Unanswerable;
    }

    if let Some(sql) = SQL_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|sql| !sql.is_empty())
    {
        return AgentReply::Sql(sql.to_string());
    }

    if BARE_QUERY.is_match(trimmed) {
        return AgentReply::Sql(trimmed.to_string());
    }

    AgentReply::Message(trimmed.to_string())
}
