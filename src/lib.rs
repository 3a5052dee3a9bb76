//! # News Digest
//!
//! A news agent that answers a request by fanning out to many news feeds at
//! once, merging what comes back into one ranked digest, and narrating its
//! progress as a stream of events.
//!
//! ## Architecture
//!
//! 1. **Planning** ([`planner`]): free text or an explicit query becomes a [`models::Query`]
//! 2. **Fetching** ([`sources`]): each candidate feed is fetched and parsed independently
//! 3. **Aggregation** ([`aggregator`]): outcomes are merged, deduplicated, filtered, ranked and capped
//! 4. **Sequencing** ([`sequencer`]): the pipeline is exposed as an ordered event stream
//!    or as a single response
//!
//! [`server`] and [`cli`] are thin transports over [`sequencer::NewsAgent`].

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod planner;
pub mod render;
pub mod sequencer;
pub mod server;
pub mod sources;
pub mod utils;

use aggregator::Aggregator;
use config::Settings;
use planner::PlannerLimits;
use sequencer::{AgentProfile, NewsAgent};
use sources::{FetchConfig, HttpFetcher};
use tracing::warn;

/// Wire up the production agent described by `settings`.
pub fn build_agent(settings: &Settings) -> Result<NewsAgent<HttpFetcher>, reqwest::Error> {
    let fetcher = HttpFetcher::new(FetchConfig {
        user_agent: settings.user_agent.clone(),
        max_items: settings.max_items_per_source,
        max_retries: settings.fetch_retries,
        base_delay: settings.retry_base_delay(),
        ..FetchConfig::default()
    })?;
    let registry = settings.registry();
    if registry.is_empty() {
        warn!("No news sources configured; every query will come back empty");
    }
    let aggregator = Aggregator::new(registry, fetcher, settings.max_concurrent_fetches);
    let profile = AgentProfile {
        name: settings.agent_name.clone(),
        description: settings.agent_description.clone(),
        limits: PlannerLimits {
            default_max_results: settings.default_max_results,
            hard_max_results: settings.hard_max_results,
        },
        request_timeout: settings.request_timeout(),
    };
    Ok(NewsAgent::new(aggregator, profile))
}
