//! Error types for fetching, aggregation and configuration.
//!
//! Failures are layered the same way the pipeline is:
//!
//! - [`FetchError`] tags why one source produced nothing. It never leaves the
//!   fetch task as anything but a recorded outcome.
//! - [`AggregateError`] is the only failure a caller of the aggregator sees, and
//!   only when every candidate source failed.
//! - [`ConfigError`] covers loading settings and the source registry at startup.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a single source fetch produced no articles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timed out before the deadline")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("missing API credentials")]
    MissingCredentials,
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// One failed source, as reported in an aggregation-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    #[serde(serialize_with = "serialize_display")]
    pub cause: FetchError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.cause)
    }
}

fn serialize_display<S: serde::Serializer>(e: &FetchError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("all {} news sources failed ({})", .failures.len(), join_failures(.failures))]
    AllSourcesFailed { failures: Vec<SourceFailure> },
}

impl AggregateError {
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            AggregateError::AllSourcesFailed { failures } => failures,
        }
    }
}

fn join_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
