//! HTTP transport for a [`NewsAgent`].
//!
//! | Route | Method | Body | Reply |
//! |-------|--------|------|-------|
//! | `/` | GET | | service info |
//! | `/health` | GET | | liveness |
//! | `/capabilities` | GET | | [`AgentCapabilities`] |
//! | `/v1/categories` | GET | | categories served by the registry |
//! | `/v1/chat` | POST | [`QueryRequest`] | [`QueryResponse`] |
//! | `/v1/chat/stream` | POST | [`QueryRequest`] | SSE, one event per stage, named by kind; [`QueryResponse`] when `stream` is false |
//! | `/v1/query/news` | POST | [`NewsQuery`] | articles, no narration |
//!
//! A client that disconnects from `/v1/chat/stream` drops the event stream and
//! with it every fetch still in flight.

use crate::error::SourceFailure;
use crate::models::{Article, Category};
use crate::planner;
use crate::sequencer::{AgentCapabilities, NewsAgent, QueryRequest, QueryResponse};
use crate::sources::SourceFetcher;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::error::Error;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Build the router around `agent`.
pub fn router<F: SourceFetcher + 'static>(agent: NewsAgent<F>) -> Router {
    Router::new()
        .route("/", get(root::<F>))
        .route("/health", get(health::<F>))
        .route("/capabilities", get(capabilities::<F>))
        .route("/v1/categories", get(categories::<F>))
        .route("/v1/chat", post(chat::<F>))
        .route("/v1/chat/stream", post(chat_stream::<F>))
        .route("/v1/query/news", post(query_news::<F>))
        .layer(CorsLayer::very_permissive())
        .with_state(agent)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve<F: SourceFetcher + 'static>(agent: NewsAgent<F>, addr: SocketAddr) -> Result<(), Box<dyn Error>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, agent = %agent.profile().name, "Listening");
    axum::serve(listener, router(agent))
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await?;
    Ok(())
}

/// Resolve once `signal` fires. A signal that cannot be installed never fires,
/// so the server keeps running instead of shutting down straight away.
async fn shutdown_on(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        error!(error = %e, "Could not install shutdown signal handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn root<F: SourceFetcher + 'static>(State(agent): State<NewsAgent<F>>) -> Json<Value> {
    let profile = agent.profile();
    Json(json!({
        "name": profile.name,
        "description": profile.description,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "capabilities": "/capabilities",
            "categories": "/v1/categories",
            "chat": "/v1/chat (POST)",
            "chat_stream": "/v1/chat/stream (POST)",
            "query_news": "/v1/query/news (POST)",
            "health": "/health",
        },
    }))
}

async fn health<F: SourceFetcher + 'static>(State(agent): State<NewsAgent<F>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "agent": agent.profile().name,
        "timestamp": Utc::now(),
    }))
}

async fn capabilities<F: SourceFetcher + 'static>(State(agent): State<NewsAgent<F>>) -> Json<AgentCapabilities> {
    Json(agent.capabilities())
}

async fn categories<F: SourceFetcher + 'static>(State(agent): State<NewsAgent<F>>) -> Json<Value> {
    Json(json!({
        "categories": agent.categories(),
        "description": "Available news categories for filtering",
    }))
}

async fn chat<F: SourceFetcher + 'static>(
    State(agent): State<NewsAgent<F>>,
    Json(request): Json<QueryRequest>,
) -> Json<QueryResponse> {
    let deadline = agent.default_deadline();
    Json(agent.handle_query(request, deadline).await)
}

async fn chat_stream<F: SourceFetcher + 'static>(
    State(agent): State<NewsAgent<F>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    let deadline = agent.default_deadline();
    if !request.stream {
        return Json(agent.handle_query(request, deadline).await).into_response();
    }
    Sse::new(sse_events(agent, request, deadline))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn sse_events<F: SourceFetcher + 'static>(
    agent: NewsAgent<F>,
    request: QueryRequest,
    deadline: tokio::time::Instant,
) -> impl Stream<Item = Result<SseEvent, axum::Error>> + Send + 'static {
    agent
        .handle_query_stream(request, deadline)
        .map(|event| SseEvent::default().event(event.kind()).json_data(&event))
}

/// Structured query for `/v1/query/news`.
#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
struct NewsQueryReply {
    articles: Vec<Article>,
    total: usize,
    keywords: Vec<String>,
    categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
struct ErrorReply {
    error: String,
    failures: Vec<SourceFailure>,
}

async fn query_news<F: SourceFetcher + 'static>(
    State(agent): State<NewsAgent<F>>,
    Json(body): Json<NewsQuery>,
) -> Result<Json<NewsQueryReply>, (StatusCode, Json<ErrorReply>)> {
    let query = planner::plan(
        "",
        Some(body.categories.as_slice()),
        Some(body.keywords.as_slice()),
        body.max_results,
        agent.profile().limits,
    );
    match agent.aggregator().aggregate(&query, agent.default_deadline()).await {
        Ok(articles) => Ok(Json(NewsQueryReply {
            total: articles.len(),
            articles,
            keywords: query.keywords.into_iter().collect(),
            categories: query.categories.into_iter().collect(),
        })),
        Err(e) => {
            warn!(error = %e, "News query failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorReply {
                    error: e.to_string(),
                    failures: e.failures().to_vec(),
                }),
            ))
        }
    }
}
