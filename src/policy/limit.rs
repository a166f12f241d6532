//! Row-limit resolution for a question.
//!
//! A question asks for a specific number of results when it says so in words
//! ("top 5 vendors", "first ten invoices", "20 rows", "limit 15"). Anything
//! else gets the default cap. Time spans ("last 3 months") and years
//! ("show 2023 invoices") are not row limits.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    Default,
    /// Stated in the question
    Explicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLimit {
    pub value: u32,
    pub source: LimitSource,
}

impl RowLimit {
    pub fn default_cap(value: u32) -> Self {
        Self {
            value: value.max(1),
            source: LimitSource::Default,
        }
    }

    pub fn explicit(value: u32) -> Self {
        Self {
            value: value.max(1),
            source: LimitSource::Explicit,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.source == LimitSource::Explicit
    }
}

const NUMBER: &str = r"(\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty)";

static KEYWORD_THEN_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(top|first|last|latest|recent|highest|lowest|largest|smallest|biggest|bottom|limit|show|list|display|fetch|get|give me)\s+{}\b(?:\s+(\w+))?",
        NUMBER
    ))
    .expect("valid limit pattern")
});

static NUMBER_THEN_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b{}\s+(?:rows?|records?|results?|entries|entry|lines?)\b",
        NUMBER
    ))
    .expect("valid limit pattern")
});

const TIME_UNITS: &[&str] = &[
    "second", "seconds", "minute", "minutes", "hour", "hours", "day", "days", "week", "weeks",
    "fortnight", "fortnights", "month", "months", "quarter", "quarters", "year", "years", "yr",
    "yrs",
];

fn parse_number(token: &str) -> Option<u64> {
    if let Ok(n) = token.parse::<u64>() {
        return Some(n);
    }
    let n = match token {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        _ => return None,
    };
    Some(n)
}

/// Keywords that only introduce a listing; a year after them stays a year.
const LISTING_VERBS: &[&str] = &["show", "list", "display", "fetch", "get", "give me"];

/// Nouns that make a preceding year-like number a row count.
const ROW_NOUNS: &[&str] = &[
    "invoice", "vendor", "supplier", "order", "po", "purchase", "item", "vessel", "ship", "port",
    "grn", "receipt", "payment", "requisition", "transaction", "line", "entry", "entries",
    "record", "row", "result", "value", "amount",
];

fn is_row_noun(word: &str) -> bool {
    ROW_NOUNS.contains(&word) || word.strip_suffix('s').is_some_and(|w| ROW_NOUNS.contains(&w))
}

fn looks_like_year(n: u64) -> bool {
    (1900..=2100).contains(&n)
}

/// Find a row count stated in `normalized_question`.
pub fn explicit_limit(normalized_question: &str) -> Option<u64> {
    // "20 rows" is unambiguous, years included.
    if let Some(caps) = NUMBER_THEN_UNIT.captures(normalized_question) {
        if let Some(n) = caps.get(1).and_then(|m| parse_number(m.as_str())) {
            return Some(n);
        }
    }

    for caps in KEYWORD_THEN_NUMBER.captures_iter(normalized_question) {
        let Some(n) = caps.get(2).and_then(|m| parse_number(m.as_str())) else {
            continue;
        };
        let keyword = caps.get(1).map_or("", |m| m.as_str());
        let next = caps.get(3).map(|m| m.as_str());
        if next.is_some_and(|w| TIME_UNITS.contains(&w)) {
            continue;
        }
        // "top 2000 invoices" is a count, "show 2023 invoices" is a year.
        let counted = !LISTING_VERBS.contains(&keyword) && next.is_some_and(is_row_noun);
        if looks_like_year(n) && !counted {
            continue;
        }
        return Some(n);
    }
    None
}

/// Resolve the row limit for a normalized question, clamped to `[1, max]`.
pub fn resolve_row_limit(normalized_question: &str, default: u32, max: u32) -> RowLimit {
    let max = max.max(1);
    match explicit_limit(normalized_question) {
        Some(n) => RowLimit::explicit(n.clamp(1, max as u64) as u32),
        None => RowLimit::default_cap(default.min(max)),
    }
}
