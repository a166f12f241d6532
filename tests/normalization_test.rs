//! Randomized checks of the canonical text form.
//!
//! The Rust-side and SQL-side normalizations must agree, otherwise a rewritten
//! comparison could never match.

use nlq_server::models::DatabaseType;
use nlq_server::policy::normalize::{PUNCTUATION, sql_string_literal};
use nlq_server::policy::{
    normalize_like_pattern, normalize_literal, normalize_text, normalized_column_sql,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sqlx::sqlite::SqlitePool;

const WORDS: &[&str] = &[
    "Acme", "MARINE", "ltd", "Inc", "Northwind", "shipping", "Co", "GmbH", "A/S", "S.A", "o'brien",
    "blue", "OCEAN", "supply", "rotterdam", "x", "MÜLLER", "Schiffahrt", "ÅLESUND", "Ørsted",
    "société", "ΝΑΥΤΙΛΙΑ", "İzmir",
];

/// Random text of words joined by separators, sometimes long runs of them.
fn random_text(rng: &mut StdRng) -> String {
    let separators: Vec<char> = PUNCTUATION
        .iter()
        .copied()
        .chain([' ', '\t', '\n', '\r'])
        .collect();
    let mut out = String::new();
    if rng.gen_bool(0.3) {
        out.push(*separators.choose(rng).unwrap());
    }
    for i in 0..rng.gen_range(1..6) {
        if i > 0 {
            let run = if rng.gen_bool(0.1) { rng.gen_range(17..60) } else { rng.gen_range(1..4) };
            for _ in 0..run {
                out.push(*separators.choose(rng).unwrap());
            }
        }
        out.push_str(WORDS.choose(rng).unwrap());
    }
    if rng.gen_bool(0.3) {
        out.push(*separators.choose(rng).unwrap());
    }
    out
}

#[test]
fn test_normalization_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..2000 {
        let text = random_text(&mut rng);
        let once = normalize_text(&text);
        assert_eq!(normalize_text(&once), once, "input: {:?}", text);
        assert!(!once.starts_with(' ') && !once.ends_with(' '));
        assert!(!once.contains("  "));
    }
}

#[test]
fn test_like_pattern_normalization_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..1000 {
        let pattern = format!("%{}%", random_text(&mut rng));
        let once = normalize_like_pattern(&pattern, DatabaseType::PostgreSQL);
        assert_eq!(
            normalize_like_pattern(&once, DatabaseType::PostgreSQL),
            once,
            "input: {:?}",
            pattern
        );
        assert!(once.starts_with('%') && once.ends_with('%'));
    }
}

#[test]
fn test_spelling_variants_share_canonical_form() {
    let expected = normalize_text("Vendor-Name, Inc.");
    for variant in [
        "vendor name inc",
        "VENDOR   NAME INC",
        "Vendor_Name Inc",
        " vendor/name (inc) ",
        "vendor;name:inc",
    ] {
        assert_eq!(normalize_text(variant), expected, "variant: {:?}", variant);
    }
}

#[tokio::test]
async fn test_sqlite_expression_agrees_with_rust() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..300 {
        let text = random_text(&mut rng);
        let literal = sql_string_literal(&text, DatabaseType::SQLite);
        let sql = format!(
            "SELECT {}",
            normalized_column_sql(&literal, DatabaseType::SQLite)
        );
        let from_sql: String = sqlx::query_scalar(&sql).fetch_one(&pool).await.unwrap();
        assert_eq!(
            from_sql,
            normalize_literal(&text, DatabaseType::SQLite),
            "input: {:?}",
            text
        );
    }
}

#[tokio::test]
async fn test_sqlite_collapses_long_space_runs() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let text = format!("acme{}marine{}ltd", " ".repeat(40), " -".repeat(25));
    let literal = sql_string_literal(&text, DatabaseType::SQLite);
    let sql = format!("SELECT {}", normalized_column_sql(&literal, DatabaseType::SQLite));
    let from_sql: String = sqlx::query_scalar(&sql).fetch_one(&pool).await.unwrap();
    assert_eq!(from_sql, "acme marine ltd");
}
