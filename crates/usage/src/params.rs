//! Windowing configuration for usage accounting.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fairshare_core::duration::{parse_duration, serde_opt_duration};
use fairshare_core::ResourceKind;

use crate::error::UsageError;

// ── Extra parameter keys ────────────────────────────────────────────

pub const USAGE_QUERY_TIMEOUT_KEY: &str = "usageQueryTimeout";
pub const QUERY_RESOLUTION_KEY: &str = "queryResolution";
pub const GPU_ALLOCATION_METRIC_KEY: &str = "gpuAllocationMetric";
pub const CPU_ALLOCATION_METRIC_KEY: &str = "cpuAllocationMetric";
pub const MEMORY_ALLOCATION_METRIC_KEY: &str = "memoryAllocationMetric";

const DEFAULT_USAGE_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_QUERY_RESOLUTION: Duration = Duration::from_secs(60);
const DEFAULT_WINDOW_SIZE: Duration = Duration::from_secs(7 * 24 * 3_600);

const DEFAULT_GPU_METRIC: &str = "kai_queue_allocated_gpus";
const DEFAULT_CPU_METRIC: &str = "kai_queue_allocated_cpu_cores";
const DEFAULT_MEMORY_METRIC: &str = "kai_queue_allocated_memory_bytes";

/// How usage is aggregated over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Trailing window ending now, optionally decayed.
    Sliding,
    /// Window that resets at cron-defined boundaries.
    Tumbling,
}

impl std::fmt::Display for WindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowType::Sliding => write!(f, "sliding"),
            WindowType::Tumbling => write!(f, "tumbling"),
        }
    }
}

/// Usage accounting parameters, as found under `usageDBConfig.usageParams`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageParams {
    /// Half-life of the exponential decay applied to sliding windows.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_opt_duration")]
    pub half_life_period: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_opt_duration")]
    pub window_size: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_type: Option<WindowType>,

    /// Reset schedule for tumbling windows (5- or 6-field cron).
    #[serde(
        default,
        rename = "tumblingWindowCronString",
        skip_serializing_if = "String::is_empty"
    )]
    pub cron_expression: String,

    /// String-keyed overrides: query timeout, resolution, metric names.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_params: BTreeMap<String, String>,
}

impl UsageParams {
    pub fn sliding(window_size: Duration) -> Self {
        Self {
            window_type: Some(WindowType::Sliding),
            window_size: Some(window_size),
            ..Self::default()
        }
    }

    pub fn tumbling(window_size: Duration, cron_expression: impl Into<String>) -> Self {
        Self {
            window_type: Some(WindowType::Tumbling),
            window_size: Some(window_size),
            cron_expression: cron_expression.into(),
            ..Self::default()
        }
    }

    pub fn with_half_life(mut self, half_life: Duration) -> Self {
        self.half_life_period = Some(half_life);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Fill unset window size and type the way the scheduler does on config load.
    pub fn set_defaults(&mut self) {
        if self.window_size.is_none() {
            self.window_size = Some(DEFAULT_WINDOW_SIZE);
        }
        if self.window_type.is_none() {
            self.window_type = Some(WindowType::Sliding);
        }
    }

    /// Read a duration from `extra_params`, falling back to `default` when absent.
    ///
    /// A present but unparsable value is a configuration error.
    pub fn extra_duration_or(&self, key: &str, default: Duration) -> Result<Duration, UsageError> {
        match self.extra_params.get(key) {
            Some(raw) => parse_duration(raw).map_err(|e| {
                UsageError::Configuration(format!("invalid extra param {key}: {e}"))
            }),
            None => Ok(default),
        }
    }

    pub fn extra_string_or(&self, key: &str, default: &str) -> String {
        self.extra_params
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn query_timeout(&self) -> Result<Duration, UsageError> {
        self.extra_duration_or(USAGE_QUERY_TIMEOUT_KEY, DEFAULT_USAGE_QUERY_TIMEOUT)
    }

    pub fn query_resolution(&self) -> Result<Duration, UsageError> {
        let resolution = self.extra_duration_or(QUERY_RESOLUTION_KEY, DEFAULT_QUERY_RESOLUTION)?;
        range_duration("query resolution", resolution)
    }

    pub fn allocation_metrics(&self) -> AllocationMetrics {
        AllocationMetrics {
            gpu: self.extra_string_or(GPU_ALLOCATION_METRIC_KEY, DEFAULT_GPU_METRIC),
            cpu: self.extra_string_or(CPU_ALLOCATION_METRIC_KEY, DEFAULT_CPU_METRIC),
            memory: self.extra_string_or(MEMORY_ALLOCATION_METRIC_KEY, DEFAULT_MEMORY_METRIC),
        }
    }
}

/// Check a duration used inside a PromQL range selector.
///
/// Range durations are rendered in whole milliseconds, so zero and
/// sub-millisecond precision are rejected.
pub(crate) fn range_duration(name: &str, d: Duration) -> Result<Duration, UsageError> {
    if d.is_zero() {
        return Err(UsageError::Configuration(format!(
            "{name} must be greater than zero"
        )));
    }
    if d.subsec_nanos() % 1_000_000 != 0 {
        return Err(UsageError::Configuration(format!(
            "{name} must be a whole number of milliseconds, got {d:?}"
        )));
    }
    Ok(d)
}

/// Queue-labelled allocation metric names, one per resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationMetrics {
    pub gpu: String,
    pub cpu: String,
    pub memory: String,
}

impl AllocationMetrics {
    pub fn metric_for(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::Gpu => &self.gpu,
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Memory => &self.memory,
        }
    }
}

impl Default for AllocationMetrics {
    fn default() -> Self {
        UsageParams::default().allocation_metrics()
    }
}
