//! Tumbling-window usage: raw samples summed after the latest cron reset.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use fairshare_core::duration::format_duration;
use fairshare_core::QueueId;

use super::cron::{latest_reset, ResetSchedule};
use super::{log_warnings, QueueUsageMap, WindowStrategy};
use crate::backend::{MetricsQuery, QueryData, Series};
use crate::error::QueryError;
use crate::params::WindowType;

#[derive(Debug, Clone)]
pub struct TumblingWindow {
    window_size: Duration,
    resolution: Duration,
    schedule: ResetSchedule,
}

impl TumblingWindow {
    pub fn new(window_size: Duration, resolution: Duration, schedule: ResetSchedule) -> Self {
        Self {
            window_size,
            resolution,
            schedule,
        }
    }

    /// Reset boundary in effect at `now`.
    pub fn reset_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window_start = chrono::Duration::from_std(self.window_size)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        latest_reset(&self.schedule, window_start, now)
    }

    /// Sum samples at or after `boundary`, per queue.
    ///
    /// Every labelled series yields an entry, so a queue whose samples all
    /// predate the boundary reports zero rather than disappearing.
    pub fn sum_since(series: &[Series], boundary: DateTime<Utc>) -> QueueUsageMap {
        let mut usage = QueueUsageMap::new();
        for s in series {
            let Some(queue) = s.queue_name() else {
                warn!(labels = ?s.labels, "series without queue label, skipping");
                continue;
            };
            let total: f64 = s
                .points
                .iter()
                .filter(|p| p.timestamp >= boundary)
                .map(|p| p.value)
                .sum();
            *usage.entry(QueueId::from(queue)).or_insert(0.0) += total;
        }
        usage
    }
}

#[async_trait::async_trait]
impl WindowStrategy for TumblingWindow {
    fn window_type(&self) -> WindowType {
        WindowType::Tumbling
    }

    fn build_query(&self, metric: &str, _now: DateTime<Utc>) -> String {
        format!(
            "({})[{}:{}]",
            metric,
            format_duration(self.window_size),
            format_duration(self.resolution),
        )
    }

    async fn query_usage(
        &self,
        backend: &dyn MetricsQuery,
        metric: &str,
        now: DateTime<Utc>,
        timeout: Option<Duration>,
    ) -> Result<QueueUsageMap, QueryError> {
        let query = self.build_query(metric, now);
        let response = backend.query(&query, now, timeout).await?;
        log_warnings(metric, &response);

        let series = match response.data {
            QueryData::Matrix(series) => series,
            other => {
                return Err(QueryError::UnexpectedResultType {
                    query,
                    expected: "matrix",
                    got: other.type_name(),
                })
            }
        };

        if series.is_empty() {
            return Err(QueryError::NoData { query });
        }

        let boundary = self.reset_boundary(now);
        let usage = Self::sum_since(&series, boundary);

        debug!(metric, %boundary, queues = usage.len(), "tumbling window usage");
        Ok(usage)
    }
}
