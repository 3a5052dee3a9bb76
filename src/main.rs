//! # News Digest
//!
//! Binary entry point: loads settings, builds the agent, and runs one of the
//! subcommands.
//!
//! ## Usage
//!
//! ```sh
//! news_digest serve
//! news_digest ask "what's new in ai" --stream
//! news_digest sources
//! ```

use clap::Parser;
use futures::StreamExt;
use news_digest::cli::{Cli, Command, ask_request};
use news_digest::config::Settings;
use news_digest::sequencer::EventPayload;
use news_digest::{build_agent, server};
use std::error::Error;
use std::io::Write;
use std::net::SocketAddr;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args.command, ?args.config, "Parsed CLI arguments");

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply_overrides(&mut settings);
    settings.validate()?;

    let agent = build_agent(&settings)?;
    info!(
        sources = agent.aggregator().registry().len(),
        timeout_secs = settings.request_timeout_secs,
        "Agent ready"
    );

    match args.command {
        Command::Serve { .. } => {
            let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
            server::serve(agent, addr).await?;
        }
        Command::Ask {
            text,
            stream,
            categories,
            keywords,
            max_results,
        } => {
            let request = ask_request(&text, stream, &categories, &keywords, max_results);
            let deadline = agent.default_deadline();
            let mut stdout = std::io::stdout().lock();
            if request.stream {
                let mut events = Box::pin(agent.handle_query_stream(request, deadline));
                while let Some(event) = events.next().await {
                    writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
                    stdout.flush()?;
                    if event.is_terminal() {
                        if let EventPayload::Error { content, .. } = event.payload {
                            return Err(content.into());
                        }
                        break;
                    }
                }
            } else {
                let response = agent.handle_query(request, deadline).await;
                if let Some(cause) = response.error_cause {
                    return Err(cause.into());
                }
                writeln!(stdout, "{}", response.message)?;
            }
        }
        Command::Sources => {
            let mut stdout = std::io::stdout().lock();
            for spec in agent.aggregator().registry().specs() {
                writeln!(
                    stdout,
                    "{:<28} {:<11} {:<17} {}",
                    spec.name,
                    spec.category,
                    spec.kind.as_str(),
                    spec.endpoint
                )?;
            }
        }
    }

    Ok(())
}
