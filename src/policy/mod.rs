//! Query policy: the deterministic rules applied around every model call.
//!
//! - Canonical text form for comparisons
//! - Intent classification of incoming questions
//! - Row-limit resolution
//! - Read-only SQL guard with normalization rewrite
//! - Approximate-match fallback for empty results

pub mod fuzzy;
pub mod intent;
pub mod limit;
pub mod normalize;
pub mod sql_guard;

pub use fuzzy::{FuzzyMatch, best_match, candidate_query, similarity};
pub use intent::{
    FALLBACK_MESSAGE, GREETING_MESSAGE, Intent, IntentClassifier, STRUCTURE_REFUSAL_MESSAGE,
};
pub use limit::{LimitSource, RowLimit, resolve_row_limit};
pub use normalize::{
    normalize_like_pattern, normalize_literal, normalize_text, normalized_column_sql,
};
pub use sql_guard::{
    GuardContext, GuardedQuery, LiteralOverrides, PredicateKind, TextPredicate, guard_sql,
};
