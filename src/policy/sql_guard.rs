//! Read-only guard and rewriter for generated SQL.
//!
//! Every statement the language model produces passes through [`guard_sql`]
//! before it reaches the database. The guard:
//!
//! - parses with the dialect of the connected engine and accepts exactly one
//!   statement, which must be a query;
//! - accepts only relations that are the configured view or a CTE declared in
//!   the statement;
//! - rewrites comparisons between text columns and string literals so both
//!   sides are compared in canonical form (see [`super::normalize`]);
//! - enforces the row limit on the outermost query.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) so formatting tricks cannot
//! slip a write past the checks.

use super::limit::RowLimit;
use super::normalize::{
    normalize_like_pattern, normalize_literal, normalized_column_sql, sql_string_literal,
};
use crate::error::{AgentError, AgentResult};
use crate::models::{DatabaseType, ViewDefinition};
use sqlparser::ast::{
    BinaryOperator, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, LimitClause,
    ObjectName, ObjectNamePart, Query, SetExpr, Statement, Value, ValueWithSpan, Visit, Visitor,
    visit_expressions_mut,
};
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use tracing::debug;

/// Category of a parsed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementType {
    /// SELECT, including set operations and CTEs
    Select,
    /// SHOW, DESCRIBE, EXPLAIN
    Metadata,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    DmlWrite,
    /// CREATE, DROP, ALTER, TRUNCATE, COMMENT
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT, RELEASE
    Transaction,
    /// CALL, EXECUTE, PREPARE
    ProcedureCall,
    /// GRANT, REVOKE, SET, LOCK, VACUUM, PRAGMA, ATTACH
    Administrative,
    Unknown,
}

mod error_messages {
    pub const METADATA: &str =
        "Metadata statements are not allowed. Answer the question with a SELECT on the view.";
    pub const DML_WRITE: &str =
        "Write operations are not allowed. Only SELECT queries on the view may be run.";
    pub const DDL: &str = "Schema modifications are not allowed. Only SELECT queries may be run.";
    pub const TRANSACTION: &str = "Transaction control is not allowed.";
    pub const PROCEDURE: &str = "Procedure calls are not allowed.";
    pub const ADMINISTRATIVE: &str = "Administrative operations are not allowed.";
    pub const UNKNOWN: &str = "Unrecognized SQL statement. Only SELECT queries are allowed.";
    pub const PARSE_ERROR: &str = "Failed to parse SQL statement.";
    pub const MULTIPLE: &str = "Exactly one SQL statement is allowed per step.";
    pub const FOREIGN_RELATION: &str =
        "Only the purchase-order/invoice view (and CTEs defined in the query) may be read.";
    pub const SELECT_INTO: &str = "SELECT INTO creates a table and is not allowed.";
    pub const LOCKING: &str = "Row locking clauses are not allowed.";
    pub const FUNCTION: &str =
        "This function is not allowed. Use standard scalar, aggregate or window functions.";
}

/// Scalar, aggregate and window functions accepted in any dialect. Anything
/// else, including every schema-qualified call, is rejected.
const ALLOWED_FUNCTIONS: &[&str] = &[
    // aggregates
    "count", "sum", "avg", "min", "max", "stddev", "stddev_pop", "stddev_samp", "variance",
    "var_pop", "var_samp", "string_agg", "group_concat", "array_agg", "bool_and", "bool_or",
    "every", "percentile_cont", "percentile_disc", "mode", "total",
    // window
    "row_number", "rank", "dense_rank", "percent_rank", "cume_dist", "ntile", "lag", "lead",
    "first_value", "last_value", "nth_value",
    // text
    "lower", "upper", "length", "char_length", "character_length", "octet_length", "trim",
    "ltrim", "rtrim", "btrim", "substr", "substring", "left", "right", "replace",
    "regexp_replace", "concat", "concat_ws", "position", "strpos", "instr", "locate", "lpad",
    "rpad", "initcap", "reverse", "split_part", "format", "ucase", "lcase",
    // null handling and conditionals
    "coalesce", "nullif", "ifnull", "iif", "if", "greatest", "least",
    // numeric
    "abs", "round", "ceil", "ceiling", "floor", "trunc", "truncate", "mod", "power", "pow",
    "sqrt", "sign", "div", "to_char", "to_number",
    // date and time
    "now", "current_date", "current_time", "current_timestamp", "localtime", "localtimestamp",
    "date", "datetime", "time", "julianday", "strftime", "unixepoch", "date_trunc",
    "date_part", "extract", "age", "make_date", "to_date", "to_timestamp", "date_add",
    "date_sub", "adddate", "subdate", "datediff", "date_format", "str_to_date", "curdate",
    "curtime", "year", "month", "day", "dayofmonth", "dayofweek", "dayname", "monthname",
    "week", "quarter", "last_day", "timestampdiff", "timestampadd", "to_days",
];

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Inputs of a guard run.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub view: &'a ViewDefinition,
    pub db_type: DatabaseType,
    pub row_limit: RowLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    Eq,
    NotEq,
    In,
    Like,
}

/// A text comparison the guard rewrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPredicate {
    /// Catalogue name of the column
    pub column: String,
    /// Unqualified column reference as written in the statement
    pub column_sql: String,
    /// Canonical literal before any override
    pub literal: String,
    pub kind: PredicateKind,
}

impl TextPredicate {
    /// Equality-style predicates, the ones an approximate match can repair.
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, PredicateKind::Eq | PredicateKind::In)
    }
}

/// Replacement literals keyed by `(lowercase column name, canonical literal)`.
pub type LiteralOverrides = HashMap<(String, String), String>;

/// A statement that passed the guard.
#[derive(Debug, Clone)]
pub struct GuardedQuery {
    /// Rewritten SQL ready for execution
    pub sql: String,
    pub predicates: Vec<TextPredicate>,
    /// The view reference as written, or the qualified view name
    pub relation_sql: String,
    /// Row limit in effect on the outermost query
    pub limit: u32,
}

/// Check and rewrite one generated statement.
///
/// Returns `AgentError::Permission` for anything that is not a single
/// read-only query over the view and `AgentError::InvalidInput` when the text
/// does not parse. Both are recoverable: the agent reports them back to the
/// model.
pub fn guard_sql(
    sql: &str,
    ctx: &GuardContext<'_>,
    overrides: &LiteralOverrides,
) -> AgentResult<GuardedQuery> {
    let dialect = get_dialect(ctx.db_type);

    let mut statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        AgentError::invalid_input(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    if statements.is_empty() {
        return Err(AgentError::invalid_input("Empty SQL statement"));
    }
    if statements.len() > 1 {
        return Err(AgentError::permission(
            "MULTIPLE STATEMENTS",
            error_messages::MULTIPLE,
        ));
    }
    let mut statement = statements.remove(0);

    validate_statement(&statement)?;

    let mut checker = ReadScopeChecker::new(ctx.view);
    if let ControlFlow::Break(err) = statement.visit(&mut checker) {
        return Err(err);
    }
    let relation_sql = checker
        .relation_sql
        .unwrap_or_else(|| ctx.view.qualified_name());

    let mut rewriter = TextRewriter {
        view: ctx.view,
        db_type: ctx.db_type,
        dialect: dialect.as_ref(),
        overrides,
        predicates: Vec::new(),
    };
    if let ControlFlow::Break(err) =
        visit_expressions_mut(&mut statement, |expr| rewriter.rewrite(expr))
    {
        return Err(err);
    }
    let predicates = rewriter.predicates;

    let limit = match &mut statement {
        Statement::Query(query) => enforce_limit(query, ctx.row_limit, dialect.as_ref())?,
        other => {
            let (_, operation) = classify_statement(other);
            return Err(AgentError::permission(operation, error_messages::UNKNOWN));
        }
    };

    let sql = statement.to_string();
    debug!(sql = %sql, predicates = predicates.len(), limit, "Guarded statement");

    Ok(GuardedQuery {
        sql,
        predicates,
        relation_sql,
        limit,
    })
}

fn validate_statement(stmt: &Statement) -> AgentResult<()> {
    let (stmt_type, operation_name) = classify_statement(stmt);

    let reason = match stmt_type {
        SqlStatementType::Select => return Ok(()),
        SqlStatementType::Metadata => error_messages::METADATA,
        SqlStatementType::DmlWrite => error_messages::DML_WRITE,
        SqlStatementType::Ddl => error_messages::DDL,
        SqlStatementType::Transaction => error_messages::TRANSACTION,
        SqlStatementType::ProcedureCall => error_messages::PROCEDURE,
        SqlStatementType::Administrative => error_messages::ADMINISTRATIVE,
        SqlStatementType::Unknown => error_messages::UNKNOWN,
    };
    Err(AgentError::permission(operation_name, reason))
}

/// Classify a parsed statement into a statement type.
fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    match stmt {
        Statement::Query(_) => (SqlStatementType::Select, "SELECT"),

        Statement::ShowTables { .. } => (SqlStatementType::Metadata, "SHOW TABLES"),
        Statement::ShowColumns { .. } => (SqlStatementType::Metadata, "SHOW COLUMNS"),
        Statement::ShowDatabases { .. } => (SqlStatementType::Metadata, "SHOW DATABASES"),
        Statement::ShowSchemas { .. } => (SqlStatementType::Metadata, "SHOW SCHEMAS"),
        Statement::ShowCreate { .. } => (SqlStatementType::Metadata, "SHOW CREATE"),
        Statement::ShowVariable { .. } => (SqlStatementType::Metadata, "SHOW VARIABLE"),
        Statement::ShowVariables { .. } => (SqlStatementType::Metadata, "SHOW VARIABLES"),
        Statement::ExplainTable { .. } => (SqlStatementType::Metadata, "DESCRIBE"),
        Statement::Explain { .. } => (SqlStatementType::Metadata, "EXPLAIN"),

        Statement::Insert(_) => (SqlStatementType::DmlWrite, "INSERT"),
        Statement::Update { .. } => (SqlStatementType::DmlWrite, "UPDATE"),
        Statement::Delete(_) => (SqlStatementType::DmlWrite, "DELETE"),
        Statement::Merge { .. } => (SqlStatementType::DmlWrite, "MERGE"),
        Statement::Copy { .. } => (SqlStatementType::DmlWrite, "COPY"),

        Statement::CreateTable { .. } => (SqlStatementType::Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (SqlStatementType::Ddl, "CREATE VIEW"),
        Statement::CreateIndex(_) => (SqlStatementType::Ddl, "CREATE INDEX"),
        Statement::CreateSchema { .. } => (SqlStatementType::Ddl, "CREATE SCHEMA"),
        Statement::CreateDatabase { .. } => (SqlStatementType::Ddl, "CREATE DATABASE"),
        Statement::CreateFunction { .. } => (SqlStatementType::Ddl, "CREATE FUNCTION"),
        Statement::CreateProcedure { .. } => (SqlStatementType::Ddl, "CREATE PROCEDURE"),
        Statement::CreateTrigger { .. } => (SqlStatementType::Ddl, "CREATE TRIGGER"),
        Statement::CreateRole { .. } => (SqlStatementType::Ddl, "CREATE ROLE"),
        Statement::CreateVirtualTable { .. } => (SqlStatementType::Ddl, "CREATE VIRTUAL TABLE"),
        Statement::AlterTable { .. } => (SqlStatementType::Ddl, "ALTER TABLE"),
        Statement::AlterView { .. } => (SqlStatementType::Ddl, "ALTER VIEW"),
        Statement::AlterIndex { .. } => (SqlStatementType::Ddl, "ALTER INDEX"),
        Statement::AlterRole { .. } => (SqlStatementType::Ddl, "ALTER ROLE"),
        Statement::Drop { .. } => (SqlStatementType::Ddl, "DROP"),
        Statement::DropFunction { .. } => (SqlStatementType::Ddl, "DROP FUNCTION"),
        Statement::DropProcedure { .. } => (SqlStatementType::Ddl, "DROP PROCEDURE"),
        Statement::DropTrigger { .. } => (SqlStatementType::Ddl, "DROP TRIGGER"),
        Statement::Truncate { .. } => (SqlStatementType::Ddl, "TRUNCATE"),
        Statement::Comment { .. } => (SqlStatementType::Ddl, "COMMENT"),

        Statement::StartTransaction { .. } => (SqlStatementType::Transaction, "BEGIN"),
        Statement::Commit { .. } => (SqlStatementType::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (SqlStatementType::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } => (SqlStatementType::Transaction, "SAVEPOINT"),
        Statement::ReleaseSavepoint { .. } => (SqlStatementType::Transaction, "RELEASE SAVEPOINT"),

        Statement::Call { .. } => (SqlStatementType::ProcedureCall, "CALL"),
        Statement::Execute { .. } => (SqlStatementType::ProcedureCall, "EXECUTE"),
        Statement::Prepare { .. } => (SqlStatementType::ProcedureCall, "PREPARE"),
        Statement::Deallocate { .. } => (SqlStatementType::ProcedureCall, "DEALLOCATE"),

        Statement::Grant { .. } => (SqlStatementType::Administrative, "GRANT"),
        Statement::Revoke { .. } => (SqlStatementType::Administrative, "REVOKE"),
        Statement::Set(_) => (SqlStatementType::Administrative, "SET"),
        Statement::Use(_) => (SqlStatementType::Administrative, "USE"),
        Statement::Kill { .. } => (SqlStatementType::Administrative, "KILL"),
        Statement::Vacuum { .. } => (SqlStatementType::Administrative, "VACUUM"),
        Statement::Analyze { .. } => (SqlStatementType::Administrative, "ANALYZE"),
        Statement::Discard { .. } => (SqlStatementType::Administrative, "DISCARD"),
        Statement::LockTables { .. } => (SqlStatementType::Administrative, "LOCK"),
        Statement::UnlockTables => (SqlStatementType::Administrative, "UNLOCK"),
        Statement::Flush { .. } => (SqlStatementType::Administrative, "FLUSH"),
        Statement::Pragma { .. } => (SqlStatementType::Administrative, "PRAGMA"),
        Statement::Load { .. } => (SqlStatementType::Administrative, "LOAD"),
        Statement::AttachDatabase { .. } => (SqlStatementType::Administrative, "ATTACH"),
        Statement::LISTEN { .. } => (SqlStatementType::Administrative, "LISTEN"),
        Statement::NOTIFY { .. } => (SqlStatementType::Administrative, "NOTIFY"),

        _ => (SqlStatementType::Unknown, "Unknown"),
    }
}

/// Plain identifier parts of an object name, or `None` when a part is not a
/// plain identifier.
fn identifier_parts(name: &ObjectName) -> Option<Vec<&str>> {
    name.0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => Some(ident.value.as_str()),
            #[allow(unreachable_patterns)]
            _ => None,
        })
        .collect()
}

fn last_identifier(name: &ObjectName) -> Option<&str> {
    identifier_parts(name).and_then(|parts| parts.last().copied())
}

fn has_select_into(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_some(),
        SetExpr::SetOperation { left, right, .. } => {
            has_select_into(left) || has_select_into(right)
        }
        SetExpr::Query(query) => has_select_into(&query.body),
        _ => false,
    }
}

/// Walks the statement and rejects anything outside the read scope.
struct ReadScopeChecker<'a> {
    view: &'a ViewDefinition,
    /// Lowercased CTE names seen so far
    ctes: HashSet<String>,
    relation_sql: Option<String>,
}

impl<'a> ReadScopeChecker<'a> {
    fn new(view: &'a ViewDefinition) -> Self {
        Self {
            view,
            ctes: HashSet::new(),
            relation_sql: None,
        }
    }
}

impl Visitor for ReadScopeChecker<'_> {
    type Break = AgentError;

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.ctes.insert(cte.alias.name.value.to_lowercase());
            }
        }
        if !query.locks.is_empty() {
            return ControlFlow::Break(AgentError::permission(
                "SELECT ... FOR UPDATE",
                error_messages::LOCKING,
            ));
        }
        if has_select_into(&query.body) {
            return ControlFlow::Break(AgentError::permission(
                "SELECT INTO",
                error_messages::SELECT_INTO,
            ));
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if let Some(parts) = identifier_parts(relation) {
            if parts.len() == 1 && self.ctes.contains(&parts[0].to_lowercase()) {
                return ControlFlow::Continue(());
            }
            if self.view.matches_relation(&parts) {
                if self.relation_sql.is_none() {
                    self.relation_sql = Some(relation.to_string());
                }
                return ControlFlow::Continue(());
            }
        }
        ControlFlow::Break(AgentError::permission(
            format!("READ {}", relation),
            error_messages::FOREIGN_RELATION,
        ))
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if let Expr::Function(function) = expr {
            let allowed = match identifier_parts(&function.name).as_deref() {
                Some([name]) => ALLOWED_FUNCTIONS.contains(&name.to_lowercase().as_str()),
                _ => false,
            };
            if !allowed {
                return ControlFlow::Break(AgentError::permission(
                    function.name.to_string().to_uppercase(),
                    error_messages::FUNCTION,
                ));
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        if matches!(statement, Statement::Query(_)) {
            return ControlFlow::Continue(());
        }
        let (_, operation) = classify_statement(statement);
        ControlFlow::Break(AgentError::permission(operation, error_messages::UNKNOWN))
    }
}

/// A view text column referenced in a comparison.
struct TextColumn {
    name: &'static str,
    /// Reference as written, qualifier included
    sql: String,
    /// Last identifier as written
    ident: String,
}

/// Strip a single-argument `LOWER(..)`/`UPPER(..)` or parentheses.
fn unwrap_case_fold(expr: &Expr) -> &Expr {
    match expr {
        Expr::Nested(inner) => unwrap_case_fold(inner),
        Expr::Function(function) => {
            let is_case_fn = last_identifier(&function.name)
                .is_some_and(|n| n.eq_ignore_ascii_case("lower") || n.eq_ignore_ascii_case("upper"));
            if !is_case_fn {
                return expr;
            }
            match &function.args {
                FunctionArguments::List(list) if list.args.len() == 1 => match &list.args[0] {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(inner)) => unwrap_case_fold(inner),
                    _ => expr,
                },
                _ => expr,
            }
        }
        _ => expr,
    }
}

fn string_literal(expr: &Expr) -> Option<&str> {
    match unwrap_case_fold(expr) {
        Expr::Value(ValueWithSpan {
            value: Value::SingleQuotedString(s) | Value::DoubleQuotedString(s),
            ..
        }) => Some(s.as_str()),
        _ => None,
    }
}

/// Rewrites text comparisons into canonical form, bottom-up.
struct TextRewriter<'a> {
    view: &'a ViewDefinition,
    db_type: DatabaseType,
    dialect: &'a dyn Dialect,
    overrides: &'a LiteralOverrides,
    predicates: Vec<TextPredicate>,
}

impl TextRewriter<'_> {
    fn rewrite(&mut self, expr: &mut Expr) -> ControlFlow<AgentError> {
        match self.replacement(expr) {
            Ok(Some(replacement)) => {
                *expr = Expr::Nested(Box::new(replacement));
                ControlFlow::Continue(())
            }
            Ok(None) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(err),
        }
    }

    fn replacement(&mut self, expr: &Expr) -> AgentResult<Option<Expr>> {
        match expr {
            Expr::BinaryOp { left, op, right }
                if matches!(op, BinaryOperator::Eq | BinaryOperator::NotEq) =>
            {
                let pair = match (self.text_column(left), string_literal(right)) {
                    (Some(column), Some(literal)) => Some((column, literal)),
                    _ => match (self.text_column(right), string_literal(left)) {
                        (Some(column), Some(literal)) => Some((column, literal)),
                        _ => None,
                    },
                };
                let Some((column, literal)) = pair else {
                    return Ok(None);
                };
                let (kind, sql_op) = if *op == BinaryOperator::Eq {
                    (PredicateKind::Eq, "=")
                } else {
                    (PredicateKind::NotEq, "<>")
                };
                let literal = self.literal(&column, literal, kind);
                let sql = format!("{} {} {}", self.normalized(&column), sql_op, literal);
                self.parse(&sql).map(Some)
            }
            Expr::InList {
                expr: inner,
                list,
                negated,
            } => {
                let Some(column) = self.text_column(inner) else {
                    return Ok(None);
                };
                let literals: Option<Vec<&str>> = list.iter().map(string_literal).collect();
                let Some(literals) = literals.filter(|l| !l.is_empty()) else {
                    return Ok(None);
                };
                let rendered: Vec<String> = literals
                    .into_iter()
                    .map(|literal| self.literal(&column, literal, PredicateKind::In))
                    .collect();
                let sql = format!(
                    "{} {}IN ({})",
                    self.normalized(&column),
                    if *negated { "NOT " } else { "" },
                    rendered.join(", ")
                );
                self.parse(&sql).map(Some)
            }
            Expr::Like {
                negated,
                expr: inner,
                pattern,
                escape_char,
                ..
            }
            | Expr::ILike {
                negated,
                expr: inner,
                pattern,
                escape_char,
                ..
            } => {
                if escape_char.is_some() {
                    return Ok(None);
                }
                let (Some(column), Some(pattern)) = (self.text_column(inner), string_literal(pattern))
                else {
                    return Ok(None);
                };
                let operator = if self.db_type == DatabaseType::PostgreSQL {
                    "ILIKE"
                } else {
                    "LIKE"
                };
                let literal = self.literal(&column, pattern, PredicateKind::Like);
                let sql = format!(
                    "{} {}{} {}",
                    self.normalized(&column),
                    if *negated { "NOT " } else { "" },
                    operator,
                    literal
                );
                self.parse(&sql).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn text_column(&self, expr: &Expr) -> Option<TextColumn> {
        let expr = unwrap_case_fold(expr);
        let ident = match expr {
            Expr::Identifier(ident) => ident,
            Expr::CompoundIdentifier(idents) => idents.last()?,
            _ => return None,
        };
        let column = self.view.column(&ident.value)?;
        if !self.view.is_text_column(column.name) {
            return None;
        }
        Some(TextColumn {
            name: column.name,
            sql: expr.to_string(),
            ident: ident.to_string(),
        })
    }

    /// Canonical literal rendered for the dialect, recording the predicate.
    fn literal(&mut self, column: &TextColumn, raw: &str, kind: PredicateKind) -> String {
        let canonical = match kind {
            PredicateKind::Like => normalize_like_pattern(raw, self.db_type),
            _ => normalize_literal(raw, self.db_type),
        };
        let key = (column.name.to_lowercase(), canonical.clone());
        let effective = self
            .overrides
            .get(&key)
            .cloned()
            .unwrap_or_else(|| canonical.clone());
        self.predicates.push(TextPredicate {
            column: column.name.to_string(),
            column_sql: column.ident.clone(),
            literal: canonical,
            kind,
        });
        sql_string_literal(&effective, self.db_type)
    }

    fn normalized(&self, column: &TextColumn) -> String {
        normalized_column_sql(&column.sql, self.db_type)
    }

    fn parse(&self, sql: &str) -> AgentResult<Expr> {
        parse_snippet(self.dialect, sql)
    }
}

fn parse_snippet(dialect: &dyn Dialect, sql: &str) -> AgentResult<Expr> {
    Parser::new(dialect)
        .try_with_sql(sql)
        .and_then(|mut parser| parser.parse_expr())
        .map_err(|e| AgentError::internal(format!("Failed to build expression `{}`: {}", sql, e)))
}

fn numeric_literal(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(ValueWithSpan {
            value: Value::Number(n, _),
            ..
        }) => n.parse().ok(),
        _ => None,
    }
}

/// Row count requested by the statement's own LIMIT or FETCH clause.
fn existing_limit(query: &Query) -> Option<u64> {
    if let Some(fetch) = &query.fetch {
        if fetch.percent {
            return None;
        }
        return fetch.quantity.as_ref().and_then(numeric_literal);
    }
    match &query.limit_clause {
        Some(LimitClause::LimitOffset {
            limit: Some(limit), ..
        }) => numeric_literal(limit),
        Some(LimitClause::OffsetCommaLimit { limit, .. }) => numeric_literal(limit),
        _ => None,
    }
}

/// Set the LIMIT of the outermost query and return it.
///
/// A limit stated by the user always wins. Otherwise the statement's own
/// limit is kept when it is smaller than the default cap.
fn enforce_limit(query: &mut Query, row_limit: RowLimit, dialect: &dyn Dialect) -> AgentResult<u32> {
    let target = if row_limit.is_explicit() {
        row_limit.value
    } else {
        match existing_limit(query) {
            Some(n) if n >= 1 && n < u64::from(row_limit.value) => n as u32,
            _ => row_limit.value,
        }
    };

    let limit_expr = parse_snippet(dialect, &target.to_string())?;
    query.fetch = None;
    match query.limit_clause.as_mut() {
        Some(LimitClause::LimitOffset { limit, .. }) => *limit = Some(limit_expr),
        Some(LimitClause::OffsetCommaLimit { limit, .. }) => *limit = limit_expr,
        None => {
            query.limit_clause = Some(LimitClause::LimitOffset {
                limit: Some(limit_expr),
                offset: None,
                limit_by: Vec::new(),
            })
        }
    }
    Ok(target)
}
