//! Prompt text for the SQL agent.

use super::reply::UNANSWERABLE_MARKER;
use crate::models::{DatabaseType, ViewDefinition};
use crate::policy::{FALLBACK_MESSAGE, RowLimit};

/// System block: role, responsibilities, construction rules and metadata.
pub fn system_prompt(view: &ViewDefinition, db_type: DatabaseType, row_limit: RowLimit) -> String {
    let limit_rule = if row_limit.is_explicit() {
        format!(
            "The user asked for {n} results: apply **LIMIT {n}**.",
            n = row_limit.value
        )
    } else {
        format!(
            "Apply **LIMIT {n}** unless the question asks for fewer results; never return more than {n} rows.",
            n = row_limit.value
        )
    };

    format!(
        r#"You are an SQL database assistant answering questions from the `{view}` view{schema}.

### Responsibilities
1. Give precise answers based strictly on this view.
2. Produce consistent results for similar questions.

### Reply protocol
- Reply with exactly one read-only SQL statement inside a ```sql code block, and nothing else.
- If the view cannot answer the question, reply with the single word {marker}.
- If the question is ambiguous and no reasonable interpretation exists, reply with a short clarifying question in plain text.

### SQL construction
1. Use the **{dialect}** dialect.
2. Select specific columns relevant to the question; avoid `SELECT *`.
3. {limit_rule}
4. Order results by relevant columns, e.g. the most recent dates first.
5. Compare text columns with plain `=`, `IN` or `LIKE` against the value as the user wrote it; case and punctuation differences are handled for you.
6. Count unique vendors by **Vendor_ID**.
7. Use **INVOICE_AMOUNT** for invoice value and **po_quantity** times **po_unit_price** for purchase order value.
8. Only SELECT statements are executed. Never write INSERT, UPDATE, DELETE or DDL.
9. {dialect_notes}

### View metadata
{metadata}"#,
        view = view.name(),
        schema = view
            .schema()
            .map(|s| format!(" in the `{}` schema (reference it as `{}`)", s, view.qualified_name()))
            .unwrap_or_default(),
        marker = UNANSWERABLE_MARKER,
        dialect = db_type.display_name(),
        limit_rule = limit_rule,
        dialect_notes = db_type.prompt_notes(),
        metadata = view.metadata_markdown(),
    )
}

/// The user's turn.
pub fn user_prompt(question: &str) -> String {
    format!("Now answer this query: {}", question)
}

/// Trailing instruction block placed after the question.
pub fn trailing_instructions() -> String {
    format!(
        r#"If asked about unavailable data, reply with {marker}.

### Additional guidelines
1. Validate the statement against the user's intent; prefer relevance and accuracy.
2. Combine filters with AND / OR for precise results and aggregate large datasets with SUM(), AVG() and GROUP BY.
3. When the question is ambiguous, make the most reasonable assumption based on the metadata."#,
        marker = UNANSWERABLE_MARKER
    )
}

/// Observation for a step that failed validation or execution.
pub fn observation(sql: &str, error: &str) -> String {
    format!(
        "The statement\n```sql\n{}\n```\nfailed: {}\nReply with a corrected statement.",
        sql, error
    )
}

/// Instruction for the final answer, given the rendered result.
pub fn answer_prompt(question: &str, table: &str, truncation_note: Option<&str>) -> String {
    let mut prompt = format!(
        "The query returned:\n\n{}\n\nAnswer the question \"{}\" using only this result.\n\
         - Be professional, concise and courteous; avoid database jargon.\n\
         - Present tabular data as a Markdown table with column headers.\n\
         - Do not mention SQL, tables or column names.\n\
         - If the result does not answer the question, reply exactly: {}",
        table, question, FALLBACK_MESSAGE
    );
    if let Some(note) = truncation_note {
        prompt.push_str("\n- ");
        prompt.push_str(note);
    }
    prompt
}
