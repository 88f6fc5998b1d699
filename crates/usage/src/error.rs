//! Error types for usage accounting.

use std::time::Duration;

use fairshare_core::ResourceKind;

/// Failures talking to or decoding the metrics backend.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("HTTP request for query {query} failed: {source}")]
    Http {
        query: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("metrics API returned {status} for query {query}: {body}")]
    Api {
        query: String,
        status: u16,
        body: String,
    },

    #[error("query {query} failed ({error_type}): {error}")]
    Backend {
        query: String,
        error_type: String,
        error: String,
    },

    #[error("failed to parse metrics response: {0}")]
    Parse(String),

    #[error("unexpected result for query {query}: got {got}, expected {expected}")]
    UnexpectedResultType {
        query: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("no data returned for query {query}")]
    NoData { query: String },
}

/// Errors surfaced by the usage accounting engine.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// Bad or missing windowing configuration. Raised at construction only.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One resource kind failed; the whole cycle is discarded.
    #[error("error querying {resource} usage (metric {metric}): {source}")]
    Query {
        resource: ResourceKind,
        metric: String,
        #[source]
        source: QueryError,
    },

    #[error("usage query deadline of {timeout:?} exceeded while querying {resource}")]
    Timeout {
        timeout: Duration,
        resource: ResourceKind,
    },
}

impl UsageError {
    /// Resource kind the failure is attributed to, if any.
    pub fn resource(&self) -> Option<ResourceKind> {
        match self {
            UsageError::Configuration(_) => None,
            UsageError::Query { resource, .. } | UsageError::Timeout { resource, .. } => {
                Some(*resource)
            }
        }
    }
}
