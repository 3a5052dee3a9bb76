//! Event sequencing for one end-to-end query.
//!
//! A request moves through a fixed set of stages, each announced by one event:
//!
//! ```text
//! thinking -> searching -> analyzing -> content* -> data -> complete
//!     \           \            (aggregation failed)
//!      `-----------`--------------------------------> error
//! ```
//!
//! [`NewsAgent::handle_query_stream`] exposes the stages as a lazy stream. A
//! stage runs only when the consumer asks for the next event, so a slow
//! consumer holds production back, and nothing is buffered ahead of it.
//! Dropping the stream drops whatever stage is running, including every
//! in-flight source fetch, and no further events are produced.
//!
//! [`NewsAgent::handle_query`] folds the same stream into one response.

use crate::aggregator::Aggregator;
use crate::error::SourceFailure;
use crate::models::{Article, Category, Query};
use crate::planner::{self, PlannerLimits};
use crate::render;
use crate::sources::SourceFetcher;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Longest free-text message planned, in characters. Advertised in
/// [`AgentCapabilities`].
pub const MAX_CONTEXT_LENGTH: usize = 8000;

/// A query as received from a client.
///
/// `message` is free text. Supplying `categories` or `keywords` skips free-text
/// planning. `stream` is a client preference; it defaults to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            message: String::new(),
            categories: None,
            keywords: None,
            max_results: None,
            stream: default_stream(),
        }
    }
}

impl QueryRequest {
    /// A free-text request with every other field at its default.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// One emitted event. Serializes as `{"type": .., "timestamp": .., ..payload}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Thinking { content: String },
    Searching { content: String },
    Analyzing { content: String },
    Content { content: String },
    Data { data: DigestData },
    Complete,
    Error {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        failures: Vec<SourceFailure>,
    },
}

impl Event {
    fn now(payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Wire name of the event kind, also used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::Thinking { .. } => "thinking",
            EventPayload::Searching { .. } => "searching",
            EventPayload::Analyzing { .. } => "analyzing",
            EventPayload::Content { .. } => "content",
            EventPayload::Data { .. } => "data",
            EventPayload::Complete => "complete",
            EventPayload::Error { .. } => "error",
        }
    }

    /// `complete` or `error`: nothing follows this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self.payload, EventPayload::Complete | EventPayload::Error { .. })
    }
}

/// Structured result carried by the `data` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestData {
    pub articles: Vec<Article>,
    pub categories: Vec<Category>,
    pub keywords: Vec<String>,
    pub total_results: usize,
}

/// Result of the non-streaming contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResponse {
    pub articles: Vec<Article>,
    /// Rendered Markdown reply: every content chunk, concatenated.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_cause: Option<String>,
}

/// What the agent advertises about itself.
#[derive(Debug, Clone, Serialize)]
pub struct AgentCapabilities {
    pub name: String,
    pub description: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub supported_languages: Vec<String>,
    pub max_context_length: usize,
    pub streaming_supported: bool,
}

/// Name, description and per-request limits of an agent.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub limits: PlannerLimits,
    pub request_timeout: Duration,
}

/// Entry point for queries. Cheap to clone; clones share the aggregator.
pub struct NewsAgent<F> {
    aggregator: Arc<Aggregator<F>>,
    profile: Arc<AgentProfile>,
}

impl<F> Clone for NewsAgent<F> {
    fn clone(&self) -> Self {
        Self {
            aggregator: Arc::clone(&self.aggregator),
            profile: Arc::clone(&self.profile),
        }
    }
}

enum Stage {
    Start(QueryRequest),
    Plan(QueryRequest),
    Fetch(Query),
    Render {
        query: Query,
        articles: Vec<Article>,
        chunks: VecDeque<String>,
    },
    Complete,
    Done,
}

impl<F: SourceFetcher + 'static> NewsAgent<F> {
    pub fn new(aggregator: Aggregator<F>, profile: AgentProfile) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            profile: Arc::new(profile),
        }
    }

    pub fn aggregator(&self) -> &Aggregator<F> {
        &self.aggregator
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Deadline for a request starting now, from the configured timeout.
    pub fn default_deadline(&self) -> Instant {
        Instant::now() + self.profile.request_timeout
    }

    /// Categories that at least one configured source serves.
    pub fn categories(&self) -> Vec<Category> {
        self.aggregator.registry().categories()
    }

    pub fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            name: self.profile.name.clone(),
            description: self.profile.description.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: [
                "news_aggregation",
                "multi_source_search",
                "category_filtering",
                "keyword_filtering",
                "real_time_updates",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            supported_languages: vec!["en".to_string()],
            max_context_length: MAX_CONTEXT_LENGTH,
            streaming_supported: true,
        }
    }

    /// Run `request` as a lazy, finite event stream ending in `complete` or `error`.
    pub fn handle_query_stream(
        &self,
        request: QueryRequest,
        deadline: Instant,
    ) -> impl Stream<Item = Event> + Send + use<F> {
        let agent = self.clone();
        stream::unfold(Stage::Start(request), move |stage| {
            let agent = agent.clone();
            async move { agent.advance(stage, deadline).await }
        })
    }

    /// Run `request` to completion and return the final result in one piece.
    pub async fn handle_query(&self, request: QueryRequest, deadline: Instant) -> QueryResponse {
        self.handle_query_stream(request, deadline)
            .fold(QueryResponse::default(), |mut resp, event| async move {
                match event.payload {
                    EventPayload::Content { content } => resp.message.push_str(&content),
                    EventPayload::Data { data } => resp.articles = data.articles,
                    EventPayload::Error { content, .. } => resp.error_cause = Some(content),
                    _ => {}
                }
                resp
            })
            .await
    }

    async fn advance(&self, stage: Stage, deadline: Instant) -> Option<(Event, Stage)> {
        let step = match stage {
            Stage::Start(request) => (
                EventPayload::Thinking {
                    content: "Analyzing your request and identifying news topics...".to_string(),
                },
                Stage::Plan(request),
            ),
            Stage::Plan(request) => {
                let message = clip_message(&request.message);
                let query = planner::plan(
                    message,
                    request.categories.as_deref(),
                    request.keywords.as_deref(),
                    request.max_results,
                    self.profile.limits,
                );
                info!(
                    keywords = ?query.keywords,
                    categories = ?query.categories,
                    max_results = query.max_results,
                    "Planned query"
                );
                (
                    EventPayload::Searching {
                        content: searching_message(&query),
                    },
                    Stage::Fetch(query),
                )
            }
            Stage::Fetch(query) => match self.aggregator.aggregate(&query, deadline).await {
                Ok(articles) => {
                    let chunks = render::digest_chunks(&articles, Utc::now()).into();
                    (
                        EventPayload::Analyzing {
                            content: format!(
                                "Found {} articles. Analyzing relevance and preparing summary...",
                                articles.len()
                            ),
                        },
                        Stage::Render {
                            query,
                            articles,
                            chunks,
                        },
                    )
                }
                Err(e) => {
                    warn!(error = %e, "Query failed");
                    (
                        EventPayload::Error {
                            content: e.to_string(),
                            failures: e.failures().to_vec(),
                        },
                        Stage::Done,
                    )
                }
            },
            Stage::Render {
                query,
                articles,
                mut chunks,
            } => match chunks.pop_front() {
                Some(content) => (
                    EventPayload::Content { content },
                    Stage::Render {
                        query,
                        articles,
                        chunks,
                    },
                ),
                None => {
                    let total_results = articles.len();
                    (
                        EventPayload::Data {
                            data: DigestData {
                                articles,
                                categories: query.categories.into_iter().collect(),
                                keywords: query.keywords.into_iter().collect(),
                                total_results,
                            },
                        },
                        Stage::Complete,
                    )
                }
            },
            Stage::Complete => (EventPayload::Complete, Stage::Done),
            Stage::Done => return None,
        };
        Some((Event::now(step.0), step.1))
    }
}

/// At most [`MAX_CONTEXT_LENGTH`] characters of `message`.
fn clip_message(message: &str) -> &str {
    match message.char_indices().nth(MAX_CONTEXT_LENGTH) {
        Some((cut, _)) => &message[..cut],
        None => message,
    }
}

/// "Searching for news about: crypto, finance (keywords: bitcoin)".
fn searching_message(query: &Query) -> String {
    let categories = if query.categories.is_empty() {
        "all categories".to_string()
    } else {
        query.categories.iter().join(", ")
    };
    let mut out = format!("Searching for news about: {categories}");
    if !query.keywords.is_empty() {
        out.push_str(&format!(" (keywords: {})", query.keywords.iter().join(", ")));
    }
    out
}
