//! The usage accounting engine.
//!
//! A [`UsageClient`] binds a metrics backend and a window strategy at
//! construction, then produces a [`ClusterUsage`] snapshot per cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use fairshare_core::{ClusterUsage, ResourceKind};

use crate::backend::{MetricsQuery, PrometheusClient};
use crate::error::UsageError;
use crate::params::{range_duration, AllocationMetrics, UsageParams, WindowType};
use crate::window::{parse_schedule, ExponentialDecay, SlidingWindow, TumblingWindow, WindowStrategy};


/// Client type accepted by [`client_from_config`].
pub const PROMETHEUS_CLIENT_TYPE: &str = "prometheus";

/// Source of per-queue historical usage, consumed by the fairness plugin.
#[async_trait::async_trait]
pub trait UsageSource: Send + Sync {
    async fn get_resource_usage(&self) -> Result<ClusterUsage, UsageError>;
}

/// Usage accounting against a time-series backend.
pub struct UsageClient {
    backend: Arc<dyn MetricsQuery>,
    strategy: Box<dyn WindowStrategy>,
    query_timeout: Duration,
    metrics: AllocationMetrics,
}

impl std::fmt::Debug for UsageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageClient")
            .field("window_type", &self.strategy.window_type())
            .field("query_timeout", &self.query_timeout)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl UsageClient {
    /// Build a client talking to the Prometheus server at `address`.
    pub fn new(address: &str, params: &UsageParams) -> Result<Self, UsageError> {
        let backend = PrometheusClient::new(address)?;
        Self::with_backend(Arc::new(backend), params)
    }

    /// Build a client from the `usageDBConfig` section of a scheduler config.
    pub fn from_config(config: &UsageDbConfig) -> Result<Self, UsageError> {
        match config.client_type.as_str() {
            PROMETHEUS_CLIENT_TYPE => {
                let address = config.resolve_connection_string()?;
                Self::new(&address, &config.effective_params())
            }
            other => Err(UsageError::Configuration(format!(
                "unknown usage db client type: {other}"
            ))),
        }
    }

    /// Build a client over any backend. All configuration is validated here.
    pub fn with_backend(
        backend: Arc<dyn MetricsQuery>,
        params: &UsageParams,
    ) -> Result<Self, UsageError> {
        let window_type = params.window_type.ok_or_else(|| {
            UsageError::Configuration("window type is not set in usage params".to_string())
        })?;
        let window_size = params.window_size.ok_or_else(|| {
            UsageError::Configuration("window size is not set in usage params".to_string())
        })?;
        let window_size = range_duration("window size", window_size)?;

        let query_timeout = params.query_timeout()?;
        let resolution = params.query_resolution()?;

        let strategy: Box<dyn WindowStrategy> = match window_type {
            WindowType::Sliding => {
                let decay = params.half_life_period.map(ExponentialDecay::new).transpose()?;
                Box::new(SlidingWindow::new(window_size, resolution, decay))
            }
            WindowType::Tumbling => {
                let schedule = parse_schedule(&params.cron_expression).map_err(|e| {
                    UsageError::Configuration(format!(
                        "error parsing cron string '{}' for usage tumbling window: {}",
                        params.cron_expression, e
                    ))
                })?;
                Box::new(TumblingWindow::new(window_size, resolution, schedule))
            }
        };

        debug!(
            window_type = %window_type,
            window_size = ?window_size,
            resolution = ?resolution,
            query_timeout = ?query_timeout,
            "usage client configured"
        );

        Ok(Self {
            backend,
            strategy,
            query_timeout,
            metrics: params.allocation_metrics(),
        })
    }

    pub fn window_type(&self) -> WindowType {
        self.strategy.window_type()
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn metrics(&self) -> &AllocationMetrics {
        &self.metrics
    }

    /// Query every tracked resource kind as of `now`.
    ///
    /// Kinds are queried in [`ResourceKind::ALL`] order under one deadline.
    /// Any failure discards the whole snapshot.
    pub async fn get_resource_usage_at(&self, now: DateTime<Utc>) -> Result<ClusterUsage, UsageError> {
        let deadline = Instant::now() + self.query_timeout;
        let mut usage = ClusterUsage::new();

        for kind in ResourceKind::ALL {
            let metric = self.metrics.metric_for(kind);
            let remaining = deadline.saturating_duration_since(Instant::now());
            let query = self
                .strategy
                .query_usage(self.backend.as_ref(), metric, now, Some(remaining));

            let per_queue = match tokio::time::timeout_at(deadline, query).await {
                Ok(Ok(per_queue)) => per_queue,
                Ok(Err(source)) => {
                    return Err(UsageError::Query {
                        resource: kind,
                        metric: metric.to_string(),
                        source,
                    })
                }
                Err(_) => {
                    return Err(UsageError::Timeout {
                        timeout: self.query_timeout,
                        resource: kind,
                    })
                }
            };

            debug!(resource = %kind, metric, queues = per_queue.len(), "resource usage queried");
            usage.merge_resource(kind, per_queue);
        }

        info!(
            window_type = %self.strategy.window_type(),
            queues = usage.len(),
            "cluster usage snapshot built"
        );
        Ok(usage)
    }
}

#[async_trait::async_trait]
impl UsageSource for UsageClient {
    async fn get_resource_usage(&self) -> Result<ClusterUsage, UsageError> {
        self.get_resource_usage_at(Utc::now()).await
    }
}

/// `usageDBConfig` section of the scheduler configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDbConfig {
    pub client_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connection_string: String,

    /// Environment variable holding the connection string, read when
    /// `connection_string` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string_env_var: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_params: Option<UsageParams>,
}

impl UsageDbConfig {
    pub fn prometheus(connection_string: impl Into<String>, usage_params: UsageParams) -> Self {
        Self {
            client_type: PROMETHEUS_CLIENT_TYPE.to_string(),
            connection_string: connection_string.into(),
            connection_string_env_var: None,
            usage_params: Some(usage_params),
        }
    }

    /// Connection string, falling back to the configured environment variable.
    pub fn resolve_connection_string(&self) -> Result<String, UsageError> {
        if !self.connection_string.is_empty() {
            return Ok(self.connection_string.clone());
        }
        match &self.connection_string_env_var {
            Some(var) => std::env::var(var).map_err(|_| {
                UsageError::Configuration(format!(
                    "connection string env var {var} is not set"
                ))
            }),
            None => Err(UsageError::Configuration(
                "usage db connection string is not set".to_string(),
            )),
        }
    }

    /// Usage params with scheduler defaults applied.
    pub fn effective_params(&self) -> UsageParams {
        let mut params = self.usage_params.clone().unwrap_or_default();
        params.set_defaults();
        params
    }
}

/// Resolve a usage DB configuration to a ready usage source.
pub fn client_from_config(config: &UsageDbConfig) -> Result<Arc<dyn UsageSource>, UsageError> {
    Ok(Arc::new(UsageClient::from_config(config)?))
}
