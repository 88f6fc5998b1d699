//! Exponential half-life decay for sliding windows.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::UsageError;

/// Weight `0.5 ^ ((now - t) / half_life)` applied to a sample taken at `t`.
///
/// The backend evaluates the expression per subquery step through
/// [`promql_factor`](ExponentialDecay::promql_factor).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    half_life: Duration,
}

impl ExponentialDecay {
    pub fn new(half_life: Duration) -> Result<Self, UsageError> {
        if half_life.is_zero() {
            return Err(UsageError::Configuration(
                "half-life period must be greater than zero".to_string(),
            ));
        }
        Ok(Self { half_life })
    }

    pub fn half_life(&self) -> Duration {
        self.half_life
    }

    /// Weight for a sample of the given age.
    #[cfg(test)]
    fn weight(&self, age: Duration) -> f64 {
        0.5f64.powf(age.as_secs_f64() / self.half_life.as_secs_f64())
    }

    /// Weight for a sample taken at `sample_time`, evaluated at `now`.
    #[cfg(test)]
    fn weight_at(&self, now: DateTime<Utc>, sample_time: DateTime<Utc>) -> f64 {
        let age_secs = (now - sample_time).num_milliseconds() as f64 / 1_000.0;
        0.5f64.powf(age_secs / self.half_life.as_secs_f64())
    }

    /// PromQL factor multiplied into the allocation metric.
    ///
    /// `time()` is the evaluation time of each subquery step.
    pub fn promql_factor(&self, now: DateTime<Utc>) -> String {
        format!(
            "0.5^(({} - time()) / {})",
            now.timestamp(),
            self.half_life.as_secs_f64()
        )
    }
}
