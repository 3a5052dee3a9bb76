//! Process configuration and the source registry.
//!
//! Settings come from an optional YAML file; every field has a default so an
//! empty or missing file yields a working configuration. The binary applies
//! CLI/env overrides on top (see [`crate::cli`]).
//!
//! The registry is built once at startup into an immutable [`SourceRegistry`]
//! and handed to the aggregator; nothing reads it as global state.

use crate::error::ConfigError;
use crate::models::{Category, SourceKind, SourceSpec};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const DEFAULT_NEWS_API_ENDPOINT: &str = "https://newsapi.org/v2/everything";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub agent_name: String,
    pub agent_description: String,
    pub host: String,
    pub port: u16,

    /// Result cap used when a request does not name one.
    pub default_max_results: usize,
    /// Hard ceiling for any requested result cap.
    pub hard_max_results: usize,
    /// Default per-request deadline.
    pub request_timeout_secs: u64,
    /// Items taken from a single feed before merging.
    pub max_items_per_source: usize,
    /// Bound on concurrently running source fetches.
    pub max_concurrent_fetches: usize,
    pub fetch_retries: usize,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,

    pub enable_rss: bool,
    pub enable_news_api: bool,
    pub news_api_key: Option<String>,
    pub news_api_endpoint: String,

    /// Explicit registry. When `None` the built-in feed list is used.
    pub sources: Option<Vec<SourceSpec>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_name: "Daily Digest".to_string(),
            agent_description: "News aggregator that streams what it finds as it finds it".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            default_max_results: 10,
            hard_max_results: 50,
            request_timeout_secs: 20,
            max_items_per_source: 25,
            max_concurrent_fetches: 16,
            fetch_retries: 1,
            retry_base_delay_ms: 400,
            user_agent: format!("news_digest/{}", env!("CARGO_PKG_VERSION")),
            enable_rss: true,
            enable_news_api: true,
            news_api_key: None,
            news_api_endpoint: DEFAULT_NEWS_API_ENDPOINT.to_string(),
            sources: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or defaults when `path` is `None`.
    #[instrument(level = "info", skip_all)]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.display().to_string(),
                    source,
                })?;
                let s = Self::from_yaml(&text)?;
                info!(path = %p.display(), "Loaded configuration");
                s
            }
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_results == 0 || self.hard_max_results == 0 {
            return Err(ConfigError::Invalid("result caps must be positive".into()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid("max_concurrent_fetches must be positive".into()));
        }
        if let Some(sources) = &self.sources {
            if let Some(bad) = sources.iter().find(|s| s.name.trim().is_empty() || s.endpoint.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "source entry needs both name and endpoint (got name={:?})",
                    bad.name
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Build the immutable registry from these settings.
    pub fn registry(&self) -> SourceRegistry {
        let specs = match &self.sources {
            Some(explicit) => explicit
                .iter()
                .cloned()
                .map(|mut s| {
                    if s.kind == SourceKind::SearchApi && s.api_key.is_none() {
                        s.api_key = self.news_api_key.clone();
                    }
                    s
                })
                .collect(),
            None => self.builtin_sources(),
        };
        SourceRegistry::new(specs)
    }

    fn builtin_sources(&self) -> Vec<SourceSpec> {
        let mut specs = Vec::new();
        if self.enable_rss {
            specs.extend(
                BUILTIN_FEEDS
                    .iter()
                    .map(|(name, endpoint, category)| SourceSpec::feed(name, endpoint, *category)),
            );
        }
        if self.enable_news_api {
            match &self.news_api_key {
                Some(key) if !key.trim().is_empty() => {
                    specs.extend(Category::ALL.iter().map(|category| SourceSpec {
                        name: format!("NewsAPI ({category})"),
                        endpoint: self.news_api_endpoint.clone(),
                        category: *category,
                        kind: SourceKind::SearchApi,
                        api_key: Some(key.clone()),
                    }));
                }
                _ => warn!("News API enabled but no key configured; skipping search sources"),
            }
        }
        specs
    }
}

/// Immutable, cheaply clonable list of sources in registry order.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    specs: Arc<[SourceSpec]>,
}

impl SourceRegistry {
    pub fn new(specs: Vec<SourceSpec>) -> Self {
        Self {
            specs: specs.into(),
        }
    }

    pub fn specs(&self) -> &[SourceSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Categories that have at least one configured source, in a stable order.
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.specs.iter().any(|s| s.category == *c))
            .collect()
    }
}

const BUILTIN_FEEDS: &[(&str, &str, Category)] = &[
    ("TechCrunch", "https://techcrunch.com/feed/", Category::Technology),
    ("The Verge", "https://www.theverge.com/rss/index.xml", Category::Technology),
    ("Wired", "https://www.wired.com/feed/rss", Category::Technology),
    ("Ars Technica", "https://arstechnica.com/feed/", Category::Technology),
    ("Engadget", "https://www.engadget.com/rss.xml", Category::Technology),
    ("ZDNet", "https://www.zdnet.com/news/rss.xml", Category::Technology),
    ("Techmeme", "https://www.techmeme.com/feed.xml", Category::Technology),
    ("Cointelegraph", "https://cointelegraph.com/rss", Category::Crypto),
    ("CryptoPotato", "https://cryptopotato.com/feed/", Category::Crypto),
    ("U.Today", "https://u.today/rss.php", Category::Crypto),
    ("Decrypt", "https://decrypt.co/feed", Category::Crypto),
    ("BeInCrypto", "https://beincrypto.com/feed/", Category::Crypto),
    ("CryptoSlate", "https://cryptoslate.com/feed/", Category::Crypto),
    ("Cryptonews", "https://cryptonews.com/news/feed/", Category::Crypto),
    ("Crypto Briefing", "https://cryptobriefing.com/feed/", Category::Crypto),
    ("AMBCrypto", "https://ambcrypto.com/feed/", Category::Crypto),
    ("Forbes Crypto", "https://www.forbes.com/crypto-blockchain/feed/", Category::Crypto),
    ("Yahoo Finance", "https://finance.yahoo.com/news/rssindex", Category::Finance),
    ("CNBC", "https://www.cnbc.com/id/100003114/device/rss/rss.html", Category::Finance),
    ("Bloomberg Markets", "https://feeds.bloomberg.com/markets/news.rss", Category::Finance),
    ("MarketWatch", "https://www.marketwatch.com/rss/", Category::Finance),
    ("Investing.com", "https://www.investing.com/rss/news.rss", Category::Finance),
    ("AI News", "https://www.artificialintelligence-news.com/feed/", Category::Ai),
    ("TechCrunch AI", "https://techcrunch.com/category/artificial-intelligence/feed/", Category::Ai),
    ("Wired AI", "https://www.wired.com/feed/tag/ai/latest/rss", Category::Ai),
    ("VentureBeat", "https://venturebeat.com/feed/", Category::Ai),
    ("MarkTechPost", "https://www.marktechpost.com/feed/", Category::Ai),
    ("Unite.AI", "https://www.unite.ai/feed/", Category::Ai),
    ("MIT Technology Review", "https://www.technologyreview.com/feed/", Category::Ai),
    ("Ars Technica AI", "https://arstechnica.com/tag/artificial-intelligence/feed/", Category::Ai),
    ("New York Times", "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml", Category::General),
    ("BBC News", "https://feeds.bbci.co.uk/news/rss.xml", Category::General),
    ("The Guardian", "https://www.theguardian.com/world/rss", Category::General),
    ("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml", Category::General),
];
