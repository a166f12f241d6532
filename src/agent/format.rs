//! Markdown rendering of query results for the answer prompt.

use crate::models::QueryResult;
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Appended to the result block when rows were cut off at the limit.
pub const TRUNCATION_NOTE: &str = "The result is too large to display in full. Summarize what is shown and suggest that the user refine the query or add filters, for example to see only the top ten results.";

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Cell text safe to place between pipes.
fn cell(value: &JsonValue) -> String {
    format_value(value)
        .replace('|', "\\|")
        .replace(['\r', '\n'], " ")
}

/// Render a result as a padded Markdown table followed by a row count.
pub fn format_as_markdown(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|col| cell(row.get(&col.name).unwrap_or(&JsonValue::Null)))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = result
        .columns
        .iter()
        .map(|c| c.name.width().max(3))
        .collect();
    for row in &cells {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.width());
        }
    }

    let pad = |text: &str, width: usize| {
        let fill = width.saturating_sub(text.width());
        format!("| {}{} ", text, " ".repeat(fill))
    };

    let mut output = String::new();
    for (col, w) in result.columns.iter().zip(&widths) {
        output.push_str(&pad(&col.name, *w));
    }
    output.push_str("|\n");
    for w in &widths {
        output.push_str(&format!("|{}", "-".repeat(w + 2)));
    }
    output.push_str("|\n");

    for row in &cells {
        for (value, w) in row.iter().zip(&widths) {
            output.push_str(&pad(value, *w));
        }
        output.push_str("|\n");
    }

    let row_count = result.row_count();
    let row_text = if row_count == 1 { "row" } else { "rows" };
    output.push_str(&format!("\n*{} {}*", row_count, row_text));
    if result.truncated {
        output.push_str(" (truncated)");
    }

    output
}
