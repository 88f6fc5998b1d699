//! Windowing strategies.
//!
//! A [`WindowStrategy`] turns one allocation metric into per-queue usage.
//! The engine picks one implementation at construction:
//! - [`SlidingWindow`]: trailing-window sum, optionally decayed, computed by the backend
//! - [`TumblingWindow`]: raw samples summed client-side after the latest cron reset

pub(crate) mod cron;
mod decay;
mod sliding;
mod tumbling;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use fairshare_core::QueueId;

use crate::backend::{MetricsQuery, QueryResponse};
use crate::error::QueryError;
use crate::params::WindowType;

pub use self::cron::{latest_reset, normalize_cron, parse_schedule, CronError, ResetSchedule};
pub use decay::ExponentialDecay;
pub use sliding::SlidingWindow;
pub use tumbling::TumblingWindow;

/// Per-queue usage of one resource kind.
pub type QueueUsageMap = HashMap<QueueId, f64>;

#[async_trait::async_trait]
pub trait WindowStrategy: Send + Sync {
    fn window_type(&self) -> WindowType;

    /// Query expression issued for `metric` when evaluated at `now`.
    fn build_query(&self, metric: &str, now: DateTime<Utc>) -> String;

    /// Query the backend and reduce the result to per-queue usage.
    async fn query_usage(
        &self,
        backend: &dyn MetricsQuery,
        metric: &str,
        now: DateTime<Utc>,
        timeout: Option<Duration>,
    ) -> Result<QueueUsageMap, QueryError>;
}

pub(crate) fn log_warnings(metric: &str, response: &QueryResponse) {
    for w in &response.warnings {
        warn!(metric, warning = %w, "warning querying cluster usage metric");
    }
}
