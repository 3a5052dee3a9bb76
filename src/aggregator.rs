//! Multi-source aggregation: fan out, fan in, merge.
//!
//! 1. Select candidate sources by category (all sources when the query names none)
//! 2. Fetch every candidate concurrently, bounded by one shared deadline
//! 3. Concatenate successes in registry order, dedup by canonical URL (first wins)
//! 4. Keep articles matching any keyword (all when there are none)
//! 5. Sort newest first, undated last in input order
//! 6. Truncate to `max_results`
//!
//! A fetch still running at the deadline counts as [`FetchError::Timeout`].
//! Completion order of the fetches never reaches the output: outcomes are put
//! back in registry order before merging. Dropping the future returned by
//! [`Aggregator::aggregate`] drops every in-flight fetch with it.

use crate::config::SourceRegistry;
use crate::error::{AggregateError, FetchError, SourceFailure};
use crate::models::{Article, FetchOutcome, Query, SourceSpec};
use crate::sources::SourceFetcher;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::time::{Instant, timeout_at};
use tracing::{info, instrument, warn};

/// Fans queries out over a fixed registry using one [`SourceFetcher`].
#[derive(Debug)]
pub struct Aggregator<F> {
    registry: SourceRegistry,
    fetcher: Arc<F>,
    max_concurrency: usize,
}

impl<F: SourceFetcher> Aggregator<F> {
    /// Create an aggregator over `registry`.
    ///
    /// # Arguments
    /// * `registry` - Sources to choose candidates from, in merge order.
    /// * `fetcher` - Performs one fetch per candidate.
    /// * `max_concurrency` - Fetches in flight at once; values below 1 are raised to 1.
    pub fn new(registry: SourceRegistry, fetcher: F, max_concurrency: usize) -> Self {
        Self {
            registry,
            fetcher: Arc::new(fetcher),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Sources the query would fetch, in registry order.
    pub fn candidates<'a>(&'a self, query: &'a Query) -> impl Iterator<Item = &'a SourceSpec> + 'a {
        self.registry
            .specs()
            .iter()
            .filter(move |spec| query.selects(spec.category))
    }

    /// Run the full pipeline for one query.
    ///
    /// Fails only when there was at least one candidate and every candidate
    /// failed. No candidates at all yields an empty list.
    #[instrument(level = "info", skip_all, fields(keywords = ?query.keywords, categories = ?query.categories))]
    pub async fn aggregate(&self, query: &Query, deadline: Instant) -> Result<Vec<Article>, AggregateError> {
        let candidates: Vec<SourceSpec> = self.candidates(query).cloned().collect();
        if candidates.is_empty() {
            info!("No configured source matches the query");
            return Ok(Vec::new());
        }
        info!(candidates = candidates.len(), "Fetching sources");

        let fetcher = Arc::clone(&self.fetcher);
        let mut settled: Vec<(usize, FetchOutcome)> = stream::iter(candidates.iter().cloned().enumerate())
            .map(move |(i, spec)| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    let outcome = timeout_at(deadline, fetcher.fetch(&spec, deadline))
                        .await
                        .unwrap_or(Err(FetchError::Timeout));
                    (i, outcome)
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        settled.sort_by_key(|(i, _)| *i);

        let outcomes: Vec<(&SourceSpec, FetchOutcome)> = settled
            .into_iter()
            .map(|(i, outcome)| (&candidates[i], outcome))
            .collect();

        let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
        info!(succeeded = outcomes.len() - failed, failed, "Sources settled");

        if failed == outcomes.len() {
            let failures = outcomes
                .into_iter()
                .filter_map(|(spec, o)| {
                    o.err().map(|cause| SourceFailure {
                        source: spec.name.clone(),
                        cause,
                    })
                })
                .collect();
            let err = AggregateError::AllSourcesFailed { failures };
            warn!(error = %err, "Aggregation failed");
            return Err(err);
        }

        let articles = merge(outcomes.into_iter().map(|(_, o)| o), query);
        info!(count = articles.len(), "Aggregation complete");
        Ok(articles)
    }
}

/// Deterministic merge of outcomes given in registry order.
///
/// Failed outcomes are skipped. The result depends only on the outcomes and
/// the query.
pub fn merge<I>(outcomes: I, query: &Query) -> Vec<Article>
where
    I: IntoIterator<Item = FetchOutcome>,
{
    let combined = outcomes.into_iter().filter_map(Result::ok).flatten();
    let mut articles: Vec<Article> = dedup(combined)
        .into_iter()
        .filter(|a| a.matches_any(&query.keywords))
        .collect();
    sort_newest_first(&mut articles);
    articles.truncate(query.max_results);
    articles
}

/// Drop articles whose canonical URL was already seen; the first occurrence wins.
pub fn dedup<I>(articles: I) -> Vec<Article>
where
    I: IntoIterator<Item = Article>,
{
    articles.into_iter().unique_by(Article::dedup_key).collect()
}

/// Newest first; undated articles after all dated ones, keeping their input order.
pub fn sort_newest_first(articles: &mut [Article]) {
    // Stable sort: `None` keys end up last and ties keep input order.
    articles.sort_by_key(|a| (a.published_at.is_none(), a.published_at.map(Reverse)));
}
