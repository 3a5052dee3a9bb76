//! Source fetching: one network request against one feed, parsed into articles.
//!
//! Each configured [`SourceSpec`] has a [`SourceKind`], and each kind has its own
//! parse function:
//!
//! | Kind | Module | Payload |
//! |------|--------|---------|
//! | `syndication-feed` | [`feed`] | RSS 2.0, RSS 1.0 (RDF), Atom |
//! | `search-api` | [`search_api`] | NewsAPI `everything` JSON |
//!
//! [`HttpFetcher`] is the production [`SourceFetcher`]. It never returns an
//! error past its own boundary: every failure becomes a [`FetchError`] inside the
//! [`FetchOutcome`].
//!
//! Items without a title or URL are dropped during parsing; every other field is
//! best effort.

pub mod feed;
pub mod search_api;

use crate::error::FetchError;
use crate::models::{Article, FetchOutcome, SourceKind, SourceSpec};
use crate::utils::{collapse_whitespace, first_image_src, html_to_text};
use chrono::{DateTime, Utc};
use rand::{Rng, rng};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, instrument, warn};

/// Capability of turning one [`SourceSpec`] into a [`FetchOutcome`] before a deadline.
///
/// Implementations must not panic or return early with an error; failures are
/// reported through the outcome.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, spec: &SourceSpec, deadline: Instant) -> impl Future<Output = FetchOutcome> + Send;
}

/// Knobs for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Items kept from one source, in payload order.
    pub max_items: usize,
    /// Extra attempts after a transient failure.
    pub max_retries: usize,
    /// First backoff delay; doubles per attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("news_digest/{}", env!("CARGO_PKG_VERSION")),
            max_items: 25,
            max_retries: 1,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Fetches sources over HTTP with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, config })
    }

    async fn fetch_with_retry(&self, spec: &SourceSpec, deadline: Instant) -> FetchOutcome {
        let mut attempt = 0usize;
        loop {
            match self.fetch_once(spec, deadline).await {
                Ok(articles) => return Ok(articles),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.config.base_delay, self.config.max_delay, attempt);
                    if Instant::now() + delay >= deadline {
                        debug!(error = %e, "No time left to retry");
                        return Err(e);
                    }
                    warn!(attempt, ?delay, error = %e, "Fetch attempt failed; backing off");
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, spec: &SourceSpec, deadline: Instant) -> FetchOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(FetchError::Timeout);
        }

        let request = match spec.kind {
            SourceKind::SyndicationFeed => self.client.get(&spec.endpoint),
            SourceKind::SearchApi => search_api::request(&self.client, spec, self.config.max_items)?,
        };

        let response = request.timeout(remaining).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "Downloaded source payload");

        match spec.kind {
            SourceKind::SyndicationFeed => feed::parse(&body, spec, self.config.max_items),
            SourceKind::SearchApi => search_api::parse(&body, spec, self.config.max_items),
        }
    }
}

impl SourceFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(source = %spec.name, kind = ?spec.kind))]
    async fn fetch(&self, spec: &SourceSpec, deadline: Instant) -> FetchOutcome {
        let t0 = Instant::now();
        let outcome = match timeout_at(deadline, self.fetch_with_retry(spec, deadline)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout),
        };
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &outcome {
            Ok(articles) => info!(count = articles.len(), elapsed_ms, "Fetched source"),
            Err(e) => warn!(error = %e, elapsed_ms, "Source fetch failed"),
        }
        outcome
    }
}

/// `min(base * 2^(attempt-1), max)` plus up to 250ms of jitter.
fn backoff_delay(base: Duration, max: Duration, attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    let delay = base.saturating_mul(1 << shift).min(max);
    let jitter_ms: u64 = rng().random_range(0..=250);
    delay + Duration::from_millis(jitter_ms)
}

/// Fields pulled out of one feed item or API record before normalization.
#[derive(Debug, Default)]
pub(crate) struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// HTML or plain text summary.
    pub summary: Option<String>,
    /// Full HTML body, used only for image lookup.
    pub content_html: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub image_url: Option<String>,
}

impl RawItem {
    /// Normalize into an [`Article`], or `None` when title or URL is missing.
    pub fn into_article(self, spec: &SourceSpec) -> Option<Article> {
        let title = self.title.map(|t| html_to_text(&t)).filter(|t| !t.is_empty())?;
        let url = self
            .link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())?;

        let image_url = self
            .image_url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| self.content_html.as_deref().and_then(first_image_src))
            .or_else(|| self.summary.as_deref().and_then(first_image_src));

        let description = self.summary.as_deref().map(html_to_text).unwrap_or_default();
        let author = self
            .author
            .map(|a| collapse_whitespace(&a))
            .filter(|a| !a.is_empty());

        Some(Article {
            title,
            description,
            url,
            source: spec.name.clone(),
            published_at: self.published,
            author,
            image_url,
            category: Some(spec.category),
        })
    }
}

/// Parse the date formats seen in feeds: RFC 2822, RFC 3339, and bare
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC).
pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
