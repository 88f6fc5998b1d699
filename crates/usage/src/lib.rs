//! Fair-share usage accounting.
//!
//! This crate provides:
//! - `UsageParams`: windowing configuration (sliding or tumbling, decay, cron resets)
//! - `MetricsQuery` trait over the time-series backend, with a Prometheus HTTP client
//! - Sliding-window (optionally half-life decayed) and cron-aligned tumbling-window strategies
//! - `UsageClient`: one accounting cycle over GPU, CPU and memory under a shared deadline
//!
//! The window strategy is chosen once when the client is built and never
//! re-evaluated per call.

pub mod backend;
pub mod engine;
pub mod error;
pub mod params;
pub mod window;

pub use backend::{MetricsQuery, Point, PrometheusClient, QueryData, QueryResponse, Series, QUEUE_NAME_LABEL};
pub use engine::{client_from_config, UsageClient, UsageDbConfig, UsageSource, PROMETHEUS_CLIENT_TYPE};
pub use error::{QueryError, UsageError};
pub use params::{AllocationMetrics, UsageParams, WindowType};
pub use window::{ExponentialDecay, SlidingWindow, TumblingWindow, WindowStrategy};
