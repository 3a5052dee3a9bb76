//! Query planning: turn a raw request into the aggregator's [`Query`].
//!
//! Two paths:
//!
//! 1. **Structured**: the caller supplies keywords and/or categories. They are
//!    lower-cased, trimmed and empty entries dropped; unknown category names are
//!    ignored with a warning.
//! 2. **Free text**: keywords are the significant tokens of the text (stop-words
//!    and generic topic words removed) and categories are inferred from a fixed
//!    trigger table. No trigger means "all categories".
//!
//! Planning never fails. Unintelligible input degrades to the broadest query.

use crate::models::{Category, Query};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Upper bound on keywords derived from free text.
const MAX_DERIVED_KEYWORDS: usize = 5;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}\-\.']*").expect("static regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "been", "by", "can", "could",
        "did", "do", "does", "find", "for", "from", "get", "give", "has", "have", "headlines", "how",
        "i", "in", "into", "is", "it", "its", "just", "last", "latest", "let", "me", "more", "most",
        "my", "new", "news", "newest", "now", "of", "on", "or", "our", "please", "recent", "recently",
        "show", "some", "stories", "story", "tell", "that", "the", "their", "there", "these", "this",
        "to", "today", "todays", "top", "update", "updates", "us", "was", "we", "week", "what",
        "whats", "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Words that pick a category but say nothing about article content.
static TOPIC_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "tech", "technology", "crypto", "cryptocurrency", "cryptocurrencies", "finance", "financial",
        "ai", "general", "world",
    ]
    .into_iter()
    .collect()
});

/// Single-token triggers.
const CATEGORY_TRIGGERS: &[(&str, Category)] = &[
    ("tech", Category::Technology),
    ("technology", Category::Technology),
    ("gadget", Category::Technology),
    ("gadgets", Category::Technology),
    ("software", Category::Technology),
    ("hardware", Category::Technology),
    ("smartphone", Category::Technology),
    ("apple", Category::Technology),
    ("crypto", Category::Crypto),
    ("cryptocurrency", Category::Crypto),
    ("cryptocurrencies", Category::Crypto),
    ("bitcoin", Category::Crypto),
    ("btc", Category::Crypto),
    ("ethereum", Category::Crypto),
    ("eth", Category::Crypto),
    ("blockchain", Category::Crypto),
    ("defi", Category::Crypto),
    ("web3", Category::Crypto),
    ("nft", Category::Crypto),
    ("solana", Category::Crypto),
    ("finance", Category::Finance),
    ("financial", Category::Finance),
    ("stock", Category::Finance),
    ("stocks", Category::Finance),
    ("market", Category::Finance),
    ("markets", Category::Finance),
    ("trading", Category::Finance),
    ("investment", Category::Finance),
    ("investing", Category::Finance),
    ("economy", Category::Finance),
    ("inflation", Category::Finance),
    ("ai", Category::Ai),
    ("llm", Category::Ai),
    ("llms", Category::Ai),
    ("gpt", Category::Ai),
    ("chatgpt", Category::Ai),
    ("openai", Category::Ai),
    ("model", Category::Ai),
    ("models", Category::Ai),
    ("world", Category::General),
    ("politics", Category::General),
    ("election", Category::General),
];

/// Multi-word triggers, matched against the normalized text.
const PHRASE_TRIGGERS: &[(&str, Category)] = &[
    ("artificial intelligence", Category::Ai),
    ("machine learning", Category::Ai),
    ("deep learning", Category::Ai),
    ("stock market", Category::Finance),
];

/// Caps applied to every planned query.
#[derive(Debug, Clone, Copy)]
pub struct PlannerLimits {
    pub default_max_results: usize,
    pub hard_max_results: usize,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            default_max_results: 10,
            hard_max_results: 50,
        }
    }
}

/// Build a [`Query`] from free text and/or explicit structured fields.
///
/// Explicit keywords or categories (even empty lists) select the structured
/// path; otherwise both are derived from `raw_text`.
pub fn plan(
    raw_text: &str,
    explicit_categories: Option<&[String]>,
    explicit_keywords: Option<&[String]>,
    max_results: Option<usize>,
    limits: PlannerLimits,
) -> Query {
    let (keywords, categories) = if explicit_categories.is_some() || explicit_keywords.is_some() {
        (
            normalize_keywords(explicit_keywords.unwrap_or_default()),
            parse_categories(explicit_categories.unwrap_or_default()),
        )
    } else {
        (extract_keywords(raw_text), infer_categories(raw_text))
    };

    let max_results = clamp_max_results(max_results, limits);
    debug!(?keywords, ?categories, max_results, "Planned query");

    Query {
        keywords,
        categories,
        max_results,
    }
}

fn clamp_max_results(requested: Option<usize>, limits: PlannerLimits) -> usize {
    let hard = limits.hard_max_results.max(1);
    requested
        .unwrap_or(limits.default_max_results)
        .clamp(1, hard)
}

/// Lower-case, trim and drop empty entries from caller-supplied keywords.
pub fn normalize_keywords(raw: &[String]) -> BTreeSet<String> {
    raw.iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn parse_categories(raw: &[String]) -> BTreeSet<Category> {
    raw.iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .filter_map(|c| match c.parse::<Category>() {
            Ok(cat) => Some(cat),
            Err(e) => {
                warn!(error = %e, "Ignoring unknown category");
                None
            }
        })
        .collect()
}

fn tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', '-'])
                .trim_end_matches("'s")
                .trim_end_matches('\'')
                .replace('\'', "")
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Significant tokens of `text`, in order of first appearance, at most five.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let mut seen = HashSet::new();
    tokens(text)
        .into_iter()
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOP_WORDS.contains(t.as_str()) && !TOPIC_WORDS.contains(t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .take(MAX_DERIVED_KEYWORDS)
        .collect()
}

/// Categories whose trigger words or phrases occur in `text`.
pub fn infer_categories(text: &str) -> BTreeSet<Category> {
    let toks = tokens(text);
    let mut out: BTreeSet<Category> = CATEGORY_TRIGGERS
        .iter()
        .filter(|(word, _)| toks.iter().any(|t| t == word))
        .map(|(_, cat)| *cat)
        .collect();

    let normalized = toks.join(" ");
    out.extend(
        PHRASE_TRIGGERS
            .iter()
            .filter(|(phrase, _)| normalized.contains(phrase))
            .map(|(_, cat)| *cat),
    );
    out
}
