//! Data models shared by the fetchers, the aggregator and the event sequencer.
//!
//! - [`Article`]: one normalized news item, whatever feed it came from
//! - [`SourceSpec`]: static descriptor of one fetchable feed
//! - [`Query`]: the structured query the aggregator consumes
//! - [`FetchOutcome`]: what one source fetch produced
//!
//! Everything here except `SourceSpec` is created per request and dropped
//! when the request finishes.

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A normalized news article.
///
/// `url` is the identity of an article within one result set; see
/// [`canonical_url`] for the form used when deduplicating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl Article {
    /// Canonical form of this article's URL, used as the dedup key.
    pub fn dedup_key(&self) -> String {
        canonical_url(&self.url)
    }

    /// Case-insensitive substring match of any keyword against title or description.
    ///
    /// Keywords are expected to be lower-cased already (the planner does this).
    pub fn matches_any(&self, keywords: &BTreeSet<String>) -> bool {
        if keywords.is_empty() {
            return true;
        }
        let title = self.title.to_lowercase();
        let description = self.description.to_lowercase();
        keywords
            .iter()
            .any(|kw| title.contains(kw.as_str()) || description.contains(kw.as_str()))
    }
}

/// Reduce a URL to `scheme://host[:port]/path`, dropping query and fragment.
///
/// Hosts are lower-cased by the URL parser. Inputs that do not parse as an
/// absolute URL fall back to the raw text with everything after `?` or `#` cut.
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(url) if url.has_host() => {
            let mut out = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
            if let Some(port) = url.port() {
                out.push(':');
                out.push_str(&port.to_string());
            }
            out.push_str(url.path());
            out
        }
        _ => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// The fixed set of source categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technology,
    Crypto,
    Finance,
    Ai,
    General,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::General,
        Category::Technology,
        Category::Crypto,
        Category::Finance,
        Category::Ai,
    ];

    /// Lower-case wire name, as used in config files and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::Crypto => "crypto",
            Category::Finance => "finance",
            Category::Ai => "ai",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technology" | "tech" => Ok(Category::Technology),
            "crypto" | "cryptocurrency" => Ok(Category::Crypto),
            "finance" | "financial" => Ok(Category::Finance),
            "ai" | "artificial intelligence" => Ok(Category::Ai),
            "general" => Ok(Category::General),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// How a source's payload is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// RSS 2.0, RSS 1.0 (RDF) or Atom.
    SyndicationFeed,
    /// NewsAPI-style JSON search endpoint.
    SearchApi,
}

impl SourceKind {
    /// Same spelling as the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SyndicationFeed => "syndication-feed",
            SourceKind::SearchApi => "search-api",
        }
    }
}

/// Static descriptor of one feed. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub endpoint: String,
    pub category: Category,
    pub kind: SourceKind,
    /// Credential for search-API sources; never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl SourceSpec {
    pub fn feed(name: &str, endpoint: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            category,
            kind: SourceKind::SyndicationFeed,
            api_key: None,
        }
    }
}

/// Structured query produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    /// Lower-cased keywords; empty means no keyword filter.
    pub keywords: BTreeSet<String>,
    /// Categories to search; empty means all of them.
    pub categories: BTreeSet<Category>,
    pub max_results: usize,
}

impl Query {
    pub fn selects(&self, category: Category) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }
}

/// Result of fetching one source.
pub type FetchOutcome = Result<Vec<Article>, FetchError>;
