//! Approximate matching of text literals against stored values.

use super::normalize::{normalize_literal, normalize_text};
use crate::models::DatabaseType;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Upper bound on candidate values fetched per column.
pub const MAX_CANDIDATES: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Matched stored value in the engine's canonical form
    pub value: String,
    pub score: f64,
}

/// Similarity between two canonical strings in `[0.0, 1.0]`.
///
/// Jaro-Winkler with a bonus of up to 0.1 when one string contains the other,
/// or normalized Levenshtein, whichever is higher.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }

    let jw = jaro_winkler(a, b);
    let substring_bonus = if a.contains(b) || b.contains(a) {
        let len_a = a.chars().count() as f64;
        let len_b = b.chars().count() as f64;
        (1.0 - (len_a - len_b).abs() / len_a.max(len_b)) * 0.1
    } else {
        0.0
    };

    (jw + substring_bonus).min(1.0).max(normalized_levenshtein(a, b))
}

/// Best candidate for `target` scoring at least `threshold`.
///
/// `target` is a literal in the canonical form of `db_type`. Candidates are
/// brought into the same form, and scores compare the fully case-folded forms.
/// A candidate equal to the target is skipped: it would not change the query.
/// Ties go to the candidate with the smaller edit distance.
pub fn best_match<I, S>(
    target: &str,
    candidates: I,
    threshold: f64,
    db_type: DatabaseType,
) -> Option<FuzzyMatch>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let folded_target = normalize_text(target);
    let mut best: Option<(FuzzyMatch, f64)> = None;
    for candidate in candidates {
        let value = normalize_literal(candidate.as_ref(), db_type);
        if value.is_empty() || value == target {
            continue;
        }
        let folded = normalize_text(&value);
        let score = similarity(&folded_target, &folded);
        if score < threshold {
            continue;
        }
        let edit = normalized_levenshtein(&folded_target, &folded);
        let better = best
            .as_ref()
            .is_none_or(|(b, b_edit)| score > b.score || (score == b.score && edit > *b_edit));
        if better {
            best = Some((FuzzyMatch { value, score }, edit));
        }
    }
    best.map(|(m, _)| m)
}

/// Statement fetching distinct non-null values of a column.
pub fn candidate_query(column_sql: &str, relation_sql: &str) -> String {
    format!(
        "SELECT DISTINCT {col} FROM {rel} WHERE {col} IS NOT NULL LIMIT {limit}",
        col = column_sql,
        rel = relation_sql,
        limit = MAX_CANDIDATES
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("acme marine", "acme marine"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        let s = similarity("acme", "zzzz");
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn test_typo_scores_high() {
        assert!(similarity("acme marine", "acme marin") > 0.9);
        assert!(similarity("singapore", "singapur") > 0.85);
    }

    #[test]
    fn test_substring_bonus() {
        let plain = jaro_winkler("acme", "acme marine services");
        assert!(similarity("acme", "acme marine services") > plain);
    }

    #[test]
    fn test_best_match_picks_highest() {
        let candidates = ["Acme Marine Ltd.", "Acme Marine", "Blue Ocean Supplies"];
        let m = best_match("acme marin", candidates, 0.82, DatabaseType::PostgreSQL).unwrap();
        assert_eq!(m.value, "acme marine");
    }

    #[test]
    fn test_best_match_respects_threshold() {
        assert!(best_match("acme", ["Blue Ocean Supplies"], 0.82, DatabaseType::MySQL).is_none());
    }

    #[test]
    fn test_best_match_skips_identical() {
        assert!(best_match("acme marine", ["ACME-Marine"], 0.5, DatabaseType::SQLite).is_none());
    }

    #[test]
    fn test_best_match_returns_engine_form() {
        // SQLite keeps non-ASCII capitals, so the stored spelling is the override.
        let m = best_match("müller schiff", ["MÜLLER SCHIFF"], 0.82, DatabaseType::SQLite).unwrap();
        assert_eq!(m.value, "mÜller schiff");
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn test_candidate_query() {
        assert_eq!(
            candidate_query("\"Vendor\"", "Common.Vw"),
            "SELECT DISTINCT \"Vendor\" FROM Common.Vw WHERE \"Vendor\" IS NOT NULL LIMIT 5000"
        );
    }
}
