//! Time-series backend abstraction.
//!
//! The engine depends only on [`MetricsQuery`]. [`PrometheusClient`] is the
//! HTTP implementation used in production; tests inject stubs.

mod prometheus;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::QueryError;

pub use prometheus::PrometheusClient;

/// Label that demultiplexes allocation series into queues.
pub const QUEUE_NAME_LABEL: &str = "queue_name";

/// Instant query against a time-series backend.
#[async_trait::async_trait]
pub trait MetricsQuery: Send + Sync {
    /// Evaluate `query` at `at`.
    ///
    /// `timeout` is the remaining budget of the caller's deadline, forwarded
    /// to the backend when it supports one.
    async fn query(
        &self,
        query: &str,
        at: DateTime<Utc>,
        timeout: Option<Duration>,
    ) -> Result<QueryResponse, QueryError>;
}

/// Decoded query result plus any non-fatal backend warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub data: QueryData,
    pub warnings: Vec<String>,
}

impl QueryResponse {
    pub fn new(data: QueryData) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }
}

/// Result shapes returned by an instant query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    /// One value per labelled series.
    Vector(Vec<Series>),
    /// Time-ordered values per labelled series.
    Matrix(Vec<Series>),
    Scalar(Point),
    String(DateTime<Utc>, String),
}

impl QueryData {
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryData::Vector(_) => "vector",
            QueryData::Matrix(_) => "matrix",
            QueryData::Scalar(_) => "scalar",
            QueryData::String(..) => "string",
        }
    }
}

/// A labelled series. Vector results carry exactly one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: HashMap<String, String>,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(labels: HashMap<String, String>, points: Vec<Point>) -> Self {
        Self { labels, points }
    }

    /// Convenience constructor for a series keyed only by queue name.
    pub fn for_queue(queue: &str, points: Vec<Point>) -> Self {
        Self {
            labels: HashMap::from([(QUEUE_NAME_LABEL.to_string(), queue.to_string())]),
            points,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn queue_name(&self) -> Option<&str> {
        self.label(QUEUE_NAME_LABEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Point {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}
