//! Prometheus HTTP API client (`/api/v1/query`).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use fairshare_core::duration::format_duration;

use super::{MetricsQuery, Point, QueryData, QueryResponse, Series};
use crate::error::{QueryError, UsageError};

/// Instant-query client for a Prometheus-compatible server.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    /// Fully resolved `/api/v1/query` endpoint.
    query_url: Url,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl PrometheusClient {
    /// Create a client for the server at `address` (e.g. `http://prometheus:9090`).
    ///
    /// A path prefix in the address is kept (`http://host/prom` queries
    /// `http://host/prom/api/v1/query`).
    pub fn new(address: &str) -> Result<Self, UsageError> {
        let mut base = Url::parse(address).map_err(|e| {
            UsageError::Configuration(format!("invalid metrics address '{address}': {e}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let query_url = base.join("api/v1/query").map_err(|e| {
            UsageError::Configuration(format!("invalid metrics address '{address}': {e}"))
        })?;

        Ok(Self {
            query_url,
            client: reqwest::Client::new(),
        })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }
}

#[async_trait::async_trait]
impl MetricsQuery for PrometheusClient {
    async fn query(
        &self,
        query: &str,
        at: DateTime<Utc>,
        timeout: Option<Duration>,
    ) -> Result<QueryResponse, QueryError> {
        let mut form = vec![
            ("query", query.to_string()),
            ("time", format_timestamp(at)),
        ];
        if let Some(timeout) = timeout {
            form.push(("timeout", format_duration(timeout)));
        }

        debug!(url = %self.query_url, query, "prometheus instant query");

        let response = self
            .client
            .post(self.query_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|source| QueryError::Http {
                query: query.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|source| QueryError::Http {
            query: query.to_string(),
            source,
        })?;

        decode_response(query, status, &body)
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
    #[serde(default)]
    metric: HashMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

/// Decode a Prometheus API body into a [`QueryResponse`].
///
/// An `"error"` envelope maps to [`QueryError::Backend`] regardless of HTTP
/// status. A body that is not an API envelope maps to [`QueryError::Api`]
/// on non-2xx status and [`QueryError::Parse`] otherwise.
pub(crate) fn decode_response(query: &str, status: u16, body: &str) -> Result<QueryResponse, QueryError> {
    let api: ApiResponse = match serde_json::from_str(body) {
        Ok(api) => api,
        Err(_) if !(200..300).contains(&status) => {
            return Err(QueryError::Api {
                query: query.to_string(),
                status,
                body: body.to_string(),
            });
        }
        Err(e) => return Err(QueryError::Parse(format!("invalid response body: {e}"))),
    };

    if api.status != "success" {
        return Err(QueryError::Backend {
            query: query.to_string(),
            error_type: api.error_type.unwrap_or_else(|| "unknown".to_string()),
            error: api.error.unwrap_or_default(),
        });
    }

    let data = api
        .data
        .ok_or_else(|| QueryError::Parse("success response without data".to_string()))?;

    Ok(QueryResponse {
        data: decode_data(data)?,
        warnings: api.warnings,
    })
}

fn decode_data(data: ApiData) -> Result<QueryData, QueryError> {
    let parse_err = |e: serde_json::Error| QueryError::Parse(format!("{} result: {e}", data.result_type));

    match data.result_type.as_str() {
        "vector" => {
            let samples: Vec<ApiSample> = serde_json::from_value(data.result.clone()).map_err(parse_err)?;
            let series = samples
                .into_iter()
                .map(|s| Ok(Series::new(s.metric, vec![decode_point(s.value)?])))
                .collect::<Result<Vec<_>, QueryError>>()?;
            Ok(QueryData::Vector(series))
        }
        "matrix" => {
            let raw: Vec<ApiSeries> = serde_json::from_value(data.result.clone()).map_err(parse_err)?;
            let series = raw
                .into_iter()
                .map(|s| {
                    let points = s
                        .values
                        .into_iter()
                        .map(decode_point)
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Series::new(s.metric, points))
                })
                .collect::<Result<Vec<_>, QueryError>>()?;
            Ok(QueryData::Matrix(series))
        }
        "scalar" => {
            let raw: (f64, String) = serde_json::from_value(data.result.clone()).map_err(parse_err)?;
            Ok(QueryData::Scalar(decode_point(raw)?))
        }
        "string" => {
            let (ts, value): (f64, String) =
                serde_json::from_value(data.result.clone()).map_err(parse_err)?;
            Ok(QueryData::String(decode_timestamp(ts)?, value))
        }
        other => Err(QueryError::Parse(format!("unknown result type '{other}'"))),
    }
}

fn decode_point((ts, raw): (f64, String)) -> Result<Point, QueryError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| QueryError::Parse(format!("invalid sample value '{raw}'")))?;
    Ok(Point::new(decode_timestamp(ts)?, value))
}

/// Prometheus timestamps are float seconds with millisecond precision.
fn decode_timestamp(ts: f64) -> Result<DateTime<Utc>, QueryError> {
    DateTime::from_timestamp_millis((ts * 1_000.0).round() as i64)
        .ok_or_else(|| QueryError::Parse(format!("timestamp out of range: {ts}")))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1_000.0)
}
