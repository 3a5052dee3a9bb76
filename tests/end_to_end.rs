use chrono::{TimeZone, Utc};
use futures::StreamExt;
use news_digest::aggregator::Aggregator;
use news_digest::config::SourceRegistry;
use news_digest::models::{Article, Category, FetchOutcome, SourceSpec};
use news_digest::planner::PlannerLimits;
use news_digest::sequencer::{AgentProfile, Event, EventPayload, NewsAgent, QueryRequest};
use news_digest::sources::SourceFetcher;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Serves canned articles per source name and records which sources were asked for.
#[derive(Default)]
struct RecordingFetcher {
    canned: HashMap<String, Vec<Article>>,
    calls: Mutex<Vec<String>>,
}

impl SourceFetcher for RecordingFetcher {
    async fn fetch(&self, spec: &SourceSpec, _deadline: Instant) -> FetchOutcome {
        self.calls.lock().unwrap().push(spec.name.clone());
        Ok(self.canned.get(&spec.name).cloned().unwrap_or_default())
    }
}

fn article(source: &str, title: &str, url: &str, day: u32) -> Article {
    Article {
        title: title.to_string(),
        description: String::new(),
        url: url.to_string(),
        source: source.to_string(),
        published_at: Some(Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap()),
        author: None,
        image_url: None,
        category: None,
    }
}

fn agent() -> NewsAgent<RecordingFetcher> {
    let registry = SourceRegistry::new(vec![
        SourceSpec::feed("TechCrunch", "https://techcrunch.com/feed/", Category::Technology),
        SourceSpec::feed("CoinDesk", "https://www.coindesk.com/arc/outboundfeeds/rss/", Category::Crypto),
    ]);
    let fetcher = RecordingFetcher {
        canned: HashMap::from([
            (
                "TechCrunch".to_string(),
                vec![article("TechCrunch", "Bitcoin miners buy GPUs", "https://techcrunch.com/1", 5)],
            ),
            (
                "CoinDesk".to_string(),
                vec![
                    article("CoinDesk", "Bitcoin ETF sees inflows", "https://coindesk.com/a", 1),
                    article("CoinDesk", "Ether upgrade ships", "https://coindesk.com/b", 2),
                    article("CoinDesk", "Bitcoin tops $70k", "https://coindesk.com/c", 3),
                ],
            ),
        ]),
        calls: Mutex::default(),
    };
    NewsAgent::new(
        Aggregator::new(registry, fetcher, 8),
        AgentProfile {
            name: "Daily Digest".into(),
            description: "integration".into(),
            limits: PlannerLimits::default(),
            request_timeout: Duration::from_secs(5),
        },
    )
}

#[tokio::test]
async fn bitcoin_query_only_fetches_crypto_sources() {
    let agent = agent();
    let resp = agent
        .handle_query(QueryRequest::text("latest bitcoin news"), agent.default_deadline())
        .await;

    assert_eq!(resp.error_cause, None);
    let titles: Vec<_> = resp.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, ["Bitcoin tops $70k", "Bitcoin ETF sees inflows"]);
    assert_eq!(*agent.aggregator().fetcher().calls.lock().unwrap(), ["CoinDesk"]);
}

#[tokio::test]
async fn bitcoin_query_streams_two_content_chunks_then_data() {
    let agent = agent();
    let events: Vec<Event> = agent
        .handle_query_stream(QueryRequest::text("latest bitcoin news"), agent.default_deadline())
        .collect()
        .await;

    let kinds: Vec<_> = events.iter().map(Event::kind).collect();
    assert_eq!(
        kinds,
        ["thinking", "searching", "analyzing", "content", "content", "content", "data", "complete"]
    );

    // Intro chunk first, then one chunk per article in result order.
    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Content { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert!(chunks[0].contains("Found **2**"));
    assert!(chunks[1].contains("Bitcoin tops $70k"));
    assert!(chunks[2].contains("Bitcoin ETF sees inflows"));

    match &events[6].payload {
        EventPayload::Data { data } => {
            assert_eq!(data.total_results, 2);
            assert_eq!(data.articles.len(), 2);
        }
        other => panic!("expected data event, got {other:?}"),
    }
    assert_eq!(*agent.aggregator().fetcher().calls.lock().unwrap(), ["CoinDesk"]);
}

#[tokio::test]
async fn explicit_query_bypasses_planning() {
    let agent = agent();
    let request = QueryRequest {
        message: "this text is ignored".into(),
        categories: Some(vec!["technology".into()]),
        keywords: None,
        max_results: Some(1),
        ..QueryRequest::default()
    };
    let resp = agent.handle_query(request, agent.default_deadline()).await;
    assert_eq!(resp.articles.len(), 1);
    assert_eq!(resp.articles[0].source, "TechCrunch");
}

#[tokio::test]
async fn broad_query_fetches_every_source_and_ranks_by_recency() {
    let agent = agent();
    let resp = agent
        .handle_query(QueryRequest::text("show me the news"), agent.default_deadline())
        .await;
    let days: Vec<_> = resp
        .articles
        .iter()
        .filter_map(|a| a.published_at)
        .map(|d| d.format("%d").to_string())
        .collect();
    assert_eq!(days, ["05", "03", "02", "01"]);
}
