//! Sliding-window usage: backend-side `sum_over_time` over the trailing window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use fairshare_core::duration::format_duration;
use fairshare_core::QueueId;

use super::{log_warnings, ExponentialDecay, QueueUsageMap, WindowStrategy};
use crate::backend::{MetricsQuery, QueryData};
use crate::error::QueryError;
use crate::params::WindowType;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window_size: Duration,
    resolution: Duration,
    decay: Option<ExponentialDecay>,
}

impl SlidingWindow {
    pub fn new(window_size: Duration, resolution: Duration, decay: Option<ExponentialDecay>) -> Self {
        Self {
            window_size,
            resolution,
            decay,
        }
    }

    pub fn decay(&self) -> Option<&ExponentialDecay> {
        self.decay.as_ref()
    }

    /// Allocation metric, multiplied by the decay factor when one is set.
    fn decayed_metric(&self, metric: &str, now: DateTime<Utc>) -> String {
        match &self.decay {
            Some(decay) => format!("(({}) * ({}))", metric, decay.promql_factor(now)),
            None => metric.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl WindowStrategy for SlidingWindow {
    fn window_type(&self) -> WindowType {
        WindowType::Sliding
    }

    fn build_query(&self, metric: &str, now: DateTime<Utc>) -> String {
        format!(
            "sum_over_time(({})[{}:{}])",
            self.decayed_metric(metric, now),
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

        let samples = match response.data {
            QueryData::Vector(samples) => samples,
            other => {
                return Err(QueryError::UnexpectedResultType {
                    query,
                    expected: "vector",
                    got: other.type_name(),
                })
            }
        };

        if samples.is_empty() {
            return Err(QueryError::NoData { query });
        }

        let mut usage = QueueUsageMap::new();
        for sample in &samples {
            let Some(queue) = sample.queue_name() else {
                warn!(metric, labels = ?sample.labels, "sample without queue label, skipping");
                continue;
            };
            let value: f64 = sample.points.iter().map(|p| p.value).sum();
            *usage.entry(QueueId::from(queue)).or_insert(0.0) += value;
        }

        debug!(metric, queues = usage.len(), "sliding window usage");
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Point, QueryResponse, Series};
    use std::sync::Mutex;

    struct RecordingBackend {
        response: QueryData,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl MetricsQuery for RecordingBackend {
        async fn query(
            &self,
            query: &str,
            _at: DateTime<Utc>,
            _timeout: Option<Duration>,
        ) -> Result<QueryResponse, QueryError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(QueryResponse::new(self.response.clone()))
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn query_without_decay() {
        let window = SlidingWindow::new(Duration::from_secs(7 * 86_400), Duration::from_secs(60), None);
        assert_eq!(
            window.build_query("kai_queue_allocated_gpus", now()),
            "sum_over_time((kai_queue_allocated_gpus)[7d:1m])"
        );
    }

    #[test]
    fn query_with_decay() {
        let decay = ExponentialDecay::new(Duration::from_secs(3_600)).unwrap();
        let window = SlidingWindow::new(Duration::from_secs(86_400), Duration::from_secs(30), Some(decay));
        assert_eq!(
            window.build_query("m", now()),
            "sum_over_time(((m) * (0.5^((1700000000 - time()) / 3600)))[1d:30s])"
        );
    }

    #[tokio::test]
    async fn vector_maps_to_queues() {
        let backend = RecordingBackend {
            response: QueryData::Vector(vec![
                Series::for_queue("a", vec![Point::new(now(), 120.0)]),
                Series::for_queue("b", vec![Point::new(now(), 0.0)]),
            ]),
            queries: Mutex::new(Vec::new()),
        };
        let window = SlidingWindow::new(Duration::from_secs(3_600), Duration::from_secs(60), None);
        let usage = window.query_usage(&backend, "m", now(), None).await.unwrap();

        assert_eq!(usage.len(), 2);
        assert_eq!(usage[&QueueId::from("a")], 120.0);
        assert_eq!(usage[&QueueId::from("b")], 0.0);
        assert_eq!(backend.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_vector_is_no_data() {
        let backend = RecordingBackend {
            response: QueryData::Vector(vec![]),
            queries: Mutex::new(Vec::new()),
        };
        let window = SlidingWindow::new(Duration::from_secs(3_600), Duration::from_secs(60), None);
        let err = window.query_usage(&backend, "m", now(), None).await.unwrap_err();
        assert!(matches!(err, QueryError::NoData { query } if query.contains("sum_over_time")));
    }

    #[tokio::test]
    async fn matrix_is_unexpected() {
        let backend = RecordingBackend {
            response: QueryData::Matrix(vec![Series::for_queue("a", vec![])]),
            queries: Mutex::new(Vec::new()),
        };
        let window = SlidingWindow::new(Duration::from_secs(3_600), Duration::from_secs(60), None);
        let err = window.query_usage(&backend, "m", now(), None).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnexpectedResultType { expected: "vector", got: "matrix", .. }
        ));
    }

    #[tokio::test]
    async fn unlabelled_samples_are_skipped() {
        let backend = RecordingBackend {
            response: QueryData::Vector(vec![
                Series::new(Default::default(), vec![Point::new(now(), 5.0)]),
                Series::for_queue("a", vec![Point::new(now(), 1.0)]),
            ]),
            queries: Mutex::new(Vec::new()),
        };
        let window = SlidingWindow::new(Duration::from_secs(3_600), Duration::from_secs(60), None);
        let usage = window.query_usage(&backend, "m", now(), None).await.unwrap();
        assert_eq!(usage.len(), 1);
    }
}
