//! Deterministic intent policy applied before any LLM call.

use crate::models::ViewDefinition;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const GREETING_MESSAGE: &str = "Hello! How can I assist you today?";

pub const STRUCTURE_REFUSAL_MESSAGE: &str = "I can answer questions from this database but cannot provide information about its structure or column names. Let me assist you with the data instead.";

pub const FALLBACK_MESSAGE: &str =
    "I'm unable to provide an answer for that. This information is not available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    SchemaInquiry,
    Unrelated,
    Data,
}

impl Intent {
    /// Fixed reply for intents answered without touching the database.
    pub fn fixed_response(&self) -> Option<&'static str> {
        match self {
            Intent::Greeting => Some(GREETING_MESSAGE),
            Intent::SchemaInquiry => Some(STRUCTURE_REFUSAL_MESSAGE),
            Intent::Unrelated => Some(FALLBACK_MESSAGE),
            Intent::Data => None,
        }
    }
}

const GREETING_ANCHORS: &[&str] = &[
    "hi", "hii", "hello", "hey", "heya", "howdy", "hola", "greetings", "morning", "afternoon",
    "evening", "thanks", "thank", "thx", "yo", "sup",
];

const GREETING_FILLER: &[&str] = &[
    "good", "there", "how", "are", "you", "u", "doing", "what", "s", "up", "all", "everyone",
    "team", "dear", "sir", "madam", "ok", "okay", "very", "so", "much", "a", "lot", "again",
];

/// Phrases that ask about the structure of the data rather than its content.
static SCHEMA_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:what|which|list|show|give|tell)(?: me| us)?(?: all| the| of| your| its| available)* (?:columns|column names|fields|field names|tables|table names)|how many (?:columns|fields|tables)|columns (?:are|does|do|exist) |column names?|field names?|table names?|schemas?|table structure|database structure|db structure|structure of (?:the |this |your )?(?:table|view|database|data)|table design|data types? (?:of|for)|metadata|ddl|describe (?:the |this |your )?(?:table|view|database)|view definition|primary keys?|foreign keys?)\b",
    )
    .expect("valid schema pattern")
});

/// Topics with no overlap with purchasing data.
static OFF_TOPIC_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:weather|forecast|raining|jokes?|poems?|songs?|recipes?|movies?|football|soccer|cricket|world cup|elections?|horoscope|bitcoin|crypto|stock market|capital of|meaning of life|who are you|what are you|your name|what time is it)\b",
    )
    .expect("valid off-topic pattern")
});

/// Words that place a question in the purchasing domain.
const DOMAIN_WORDS: &[&str] = &[
    "vessel", "ship", "fleet", "invoice", "inv", "bill", "po", "purchase", "order", "ordered",
    "requisition", "approval", "approve", "approved", "approver", "grn", "goods", "receipt",
    "received", "delivery", "delivered", "port", "vendor", "supplier", "currency", "amount",
    "cost", "price", "spend", "spent", "paid", "payment", "pay", "bank", "iban", "swift",
    "account", "item", "quantity", "qty", "budget", "usd", "dollar", "euro", "outstanding",
    "pending", "due", "overdue", "tax", "discount", "freight", "procurement", "spare", "store",
    "unit", "value", "total",
];

/// Column-name fragments too generic to mark a question as in-domain.
const COLUMN_STOPWORDS: &[&str] = &[
    "id", "name", "code", "date", "no", "type", "status", "object", "number", "hd", "sp", "is",
    "by", "of", "to", "at", "on", "in", "for", "and", "the", "flag", "remarks", "year", "days",
    "list", "send", "office", "group", "normal", "rate", "closed", "entity", "lead", "partial",
    "created", "converted", "effective", "reference", "registration", "title", "adv", "exg",
];

/// Classifies normalized questions. The view's vocabulary keeps domain
/// questions that touch an off-topic word with the model.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    vocabulary: HashSet<String>,
}

impl IntentClassifier {
    pub fn new(view: &ViewDefinition) -> Self {
        let mut vocabulary: HashSet<String> = DOMAIN_WORDS.iter().map(|w| w.to_string()).collect();
        for column in view.columns() {
            for part in column.name.split('_') {
                let part = part.to_lowercase();
                if part.len() > 2 && !COLUMN_STOPWORDS.contains(&part.as_str()) {
                    vocabulary.insert(singular(&part));
                }
            }
        }
        Self { vocabulary }
    }

    /// Classify a question already in canonical form.
    ///
    /// Only greetings, structure inquiries and clearly off-topic questions are
    /// answered locally. Everything else goes to the model, which has its own
    /// way of declining.
    pub fn classify(&self, normalized: &str) -> Intent {
        let tokens: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Intent::Unrelated;
        }
        if is_greeting(&tokens) {
            return Intent::Greeting;
        }
        if SCHEMA_PHRASES.is_match(normalized) {
            return Intent::SchemaInquiry;
        }
        if OFF_TOPIC_PHRASES.is_match(normalized) && !self.mentions_domain(&tokens) {
            return Intent::Unrelated;
        }
        Intent::Data
    }

    fn mentions_domain(&self, tokens: &[&str]) -> bool {
        tokens
            .iter()
            .any(|t| self.vocabulary.contains(*t) || self.vocabulary.contains(&singular(t)))
    }
}

fn is_greeting(tokens: &[&str]) -> bool {
    let mut anchored = false;
    for token in tokens {
        if GREETING_ANCHORS.contains(token) {
            anchored = true;
        } else if !GREETING_FILLER.contains(token) {
            return false;
        }
    }
    anchored
}

fn singular(word: &str) -> String {
    if word.len() > 3 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{}y", stem);
        }
        if let Some(stem) = word.strip_suffix('s') {
            if !stem.ends_with('s') {
                return stem.to_string();
            }
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::normalize_text;

    fn classify(question: &str) -> Intent {
        let view = ViewDefinition::new(Some("Common"), "Vw_Ai_Tbl_PO_PurchaseOrders_Invoices_Details");
        IntentClassifier::new(&view).classify(&normalize_text(question))
    }

    #[test]
    fn test_greetings() {
        assert_eq!(classify("Hi"), Intent::Greeting);
        assert_eq!(classify("Hello there!"), Intent::Greeting);
        assert_eq!(classify("good morning"), Intent::Greeting);
        assert_eq!(classify("Hey, how are you?"), Intent::Greeting);
        assert_eq!(classify("thanks a lot"), Intent::Greeting);
    }

    #[test]
    fn test_greeting_with_question_is_not_a_greeting() {
        assert_eq!(classify("hi, show me invoices for vessel Alpha"), Intent::Data);
    }

    #[test]
    fn test_schema_inquiries() {
        assert_eq!(classify("What columns are in the table?"), Intent::SchemaInquiry);
        assert_eq!(classify("Describe the table"), Intent::SchemaInquiry);
        assert_eq!(classify("show me the database schema"), Intent::SchemaInquiry);
        assert_eq!(classify("which tables do you have"), Intent::SchemaInquiry);
        assert_eq!(classify("what is the data type of the vendor field"), Intent::SchemaInquiry);
        assert_eq!(classify("list the columns"), Intent::SchemaInquiry);
        assert_eq!(classify("What columns does the table have?"), Intent::SchemaInquiry);
        assert_eq!(classify("give me the table names"), Intent::SchemaInquiry);
    }

    #[test]
    fn test_unrelated() {
        assert_eq!(classify("What's the weather today?"), Intent::Unrelated);
        assert_eq!(classify("Who won the world cup?"), Intent::Unrelated);
        assert_eq!(classify("tell me a joke"), Intent::Unrelated);
        assert_eq!(classify(""), Intent::Unrelated);
    }

    #[test]
    fn test_off_topic_word_in_domain_question_is_data() {
        assert_eq!(classify("invoices delayed by weather at Rotterdam port"), Intent::Data);
    }

    #[test]
    fn test_data_questions() {
        assert_eq!(classify("show me the top 5 vendors"), Intent::Data);
        assert_eq!(classify("Total invoice amount per vessel in 2023"), Intent::Data);
        assert_eq!(classify("Which GRNs are still pending?"), Intent::Data);
        assert_eq!(classify("list purchase orders delivered to Singapore port"), Intent::Data);
    }

    #[test]
    fn test_questions_without_domain_words_are_data() {
        assert_eq!(classify("What did we buy from Maersk last month?"), Intent::Data);
        assert_eq!(classify("most expensive thing we bought"), Intent::Data);
    }

    #[test]
    fn test_column_mentions_in_data_questions_are_data() {
        assert_eq!(
            classify("which column of spending is highest for vessel aurora"),
            Intent::Data
        );
        assert_eq!(
            classify("show me all entries where the remarks column mentions delay"),
            Intent::Data
        );
    }

    #[test]
    fn test_column_vocabulary_counts() {
        // "unloccode" only appears as a column name fragment
        assert_eq!(classify("weather at unloccodes used last month"), Intent::Data);
    }

    #[test]
    fn test_fixed_responses() {
        assert_eq!(Intent::Greeting.fixed_response(), Some(GREETING_MESSAGE));
        assert_eq!(Intent::SchemaInquiry.fixed_response(), Some(STRUCTURE_REFUSAL_MESSAGE));
        assert_eq!(Intent::Unrelated.fixed_response(), Some(FALLBACK_MESSAGE));
        assert_eq!(Intent::Data.fixed_response(), None);
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("invoices"), "invoice");
        assert_eq!(singular("grns"), "grn");
        assert_eq!(singular("address"), "address");
        assert_eq!(singular("quantities"), "quantity");
        assert_eq!(singular("po"), "po");
    }
}
