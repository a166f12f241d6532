//! Canonical form for free text.
//!
//! The canonical form is: lowercase, every character of [`PUNCTUATION`] and
//! every whitespace character replaced by a space, runs of spaces collapsed,
//! leading and trailing spaces removed. [`normalize_text`] produces it in Rust
//! and [`normalized_column_sql`] produces the same transformation as a SQL
//! expression, so a column and a literal can be compared on equal terms.
//!
//! SQLite's `lower()` folds ASCII letters only, so literals compared on SQLite
//! go through [`normalize_literal`], which folds the way the engine does.

use crate::models::DatabaseType;

/// Characters treated as equivalent to a space.
pub const PUNCTUATION: [char; 11] = ['-', '_', ',', '.', '/', '(', ')', ':', ';', '\'', '"'];

/// Case folding and whitespace set applied by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Folding {
    Unicode,
    Ascii,
}

impl Folding {
    fn for_engine(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::SQLite => Folding::Ascii,
            DatabaseType::PostgreSQL | DatabaseType::MySQL => Folding::Unicode,
        }
    }

    fn is_space(self, ch: char) -> bool {
        match self {
            Folding::Unicode => ch.is_whitespace(),
            Folding::Ascii => matches!(ch, '\t' | '\n' | '\x0b' | '\x0c' | '\r' | ' '),
        }
    }
}

/// Bring free text into canonical form.
///
/// ```
/// use nlq_server::policy::normalize_text;
///
/// assert_eq!(normalize_text("  Vendor-Name, Inc. "), "vendor name inc");
/// ```
pub fn normalize_text(input: &str) -> String {
    collapse(input, Folding::Unicode, false)
}

/// Canonical form of a literal compared against a column on `db_type`.
pub fn normalize_literal(input: &str, db_type: DatabaseType) -> String {
    collapse(input, Folding::for_engine(db_type), false)
}

/// Canonical form for a LIKE pattern: `%` and `_` stay wildcards, and spaces
/// next to a `%` are dropped.
pub fn normalize_like_pattern(pattern: &str, db_type: DatabaseType) -> String {
    let collapsed = collapse(pattern, Folding::for_engine(db_type), true);
    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(collapsed.len());
    for (i, &ch) in chars.iter().enumerate() {
        if ch == ' ' {
            let prev_wild = i > 0 && chars[i - 1] == '%';
            let next_wild = chars.get(i + 1) == Some(&'%');
            if prev_wild || next_wild {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn collapse(input: &str, folding: Folding, keep_underscore: bool) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    let mut push = |ch: char| {
        let separator = folding.is_space(ch)
            || (PUNCTUATION.contains(&ch) && !(keep_underscore && ch == '_'));
        if separator {
            pending_space = !out.is_empty();
            return;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    };
    for ch in input.chars() {
        match folding {
            Folding::Unicode => ch.to_lowercase().for_each(&mut push),
            Folding::Ascii => push(ch.to_ascii_lowercase()),
        }
    }
    out
}

/// SQL expression computing the canonical form of `column_sql` on `db_type`.
pub fn normalized_column_sql(column_sql: &str, db_type: DatabaseType) -> String {
    match db_type {
        DatabaseType::PostgreSQL => format!(
            "btrim(regexp_replace(lower({}), '[-_,./():;''\"[:space:]]+', ' ', 'g'))",
            column_sql
        ),
        DatabaseType::MySQL => format!(
            "TRIM(REGEXP_REPLACE(LOWER({}), '[-_,./():;''\"[:space:]]+', ' '))",
            column_sql
        ),
        DatabaseType::SQLite => sqlite_normalized_column(column_sql),
    }
}

/// SQLite has no regex replacement built in, so separators are replaced one by one.
fn sqlite_normalized_column(column_sql: &str) -> String {
    let mut expr = format!("lower({})", column_sql);
    for ch in PUNCTUATION {
        let literal = if ch == '\'' {
            "''''".to_string()
        } else {
            format!("'{}'", ch)
        };
        expr = format!("replace({}, {}, ' ')", expr, literal);
    }
    for code in [9, 10, 11, 12, 13] {
        expr = format!("replace({}, char({}), ' ')", expr, code);
    }
    // Every space becomes char(1, 2); dropping each char(2, 1) pair leaves one
    // marker per run, which turns back into a single space. Stored values must
    // not contain char(1) or char(2).
    expr = format!(
        "replace(replace(replace({}, ' ', char(1, 2)), char(2, 1), ''), char(1, 2), ' ')",
        expr
    );
    format!("trim({})", expr)
}

/// Render `value` as a string literal for `db_type`.
pub fn sql_string_literal(value: &str, db_type: DatabaseType) -> String {
    let escaped = value.replace('\'', "''");
    let escaped = match db_type {
        // MySQL treats backslash as an escape character inside literals.
        DatabaseType::MySQL => escaped.replace('\\', "\\\\"),
        _ => escaped,
    };
    format!("'{}'", escaped)
}
