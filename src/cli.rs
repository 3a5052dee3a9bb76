//! Command-line interface definitions for News Digest.
//!
//! Global options can come from flags or environment variables and are laid
//! over the YAML settings by [`Cli::apply_overrides`].

use crate::config::Settings;
use crate::sequencer::QueryRequest;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the News Digest agent.
///
/// # Examples
///
/// ```sh
/// # Serve the HTTP API on port 8080
/// news_digest serve --port 8080
///
/// # One-off query, printed as JSON lines as events arrive
/// news_digest ask "latest bitcoin news" --stream
///
/// # Structured query, no free-text planning
/// news_digest ask "" --category crypto --keyword ethereum --max-results 5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true, env = "NEWS_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Per-request deadline in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// NewsAPI key; enables search-API sources
    #[arg(long, global = true, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one query and print the result
    Ask {
        /// Free-text request
        text: String,
        /// Print every event as a JSON line instead of the final reply
        #[arg(short, long)]
        stream: bool,
        /// Restrict to a category (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Require a keyword (repeatable)
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },
    /// List the configured sources
    Sources,
}

impl Cli {
    /// Lay flag/env values over `settings`.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(secs) = self.timeout_secs {
            settings.request_timeout_secs = secs;
        }
        if let Some(key) = &self.news_api_key {
            settings.news_api_key = Some(key.clone());
        }
        if let Command::Serve { host, port } = &self.command {
            if let Some(host) = host {
                settings.host = host.clone();
            }
            if let Some(port) = port {
                settings.port = *port;
            }
        }
    }
}

/// Turn `ask` arguments into a request. Explicit categories or keywords skip
/// free-text planning.
pub fn ask_request(
    text: &str,
    stream: bool,
    categories: &[String],
    keywords: &[String],
    max_results: Option<usize>,
) -> QueryRequest {
    QueryRequest {
        message: text.to_string(),
        categories: (!categories.is_empty()).then(|| categories.to_vec()),
        keywords: (!keywords.is_empty()).then(|| keywords.to_vec()),
        max_results,
        stream,
    }
}
