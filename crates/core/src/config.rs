use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub prometheus: PrometheusConfig,
    pub scheduler: SchedulerTarget,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FAIRSHARE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FAIRSHARE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            prometheus: PrometheusConfig::from_env_profiled(p),
            scheduler: SchedulerTarget::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  prometheus:  url={}", self.prometheus.url);
        tracing::info!(
            "  scheduler:   namespace={}, config={}/{}, workload={}",
            self.scheduler.namespace,
            self.scheduler.config_name,
            self.scheduler.config_key,
            self.scheduler.workload
        );
        if let Some(path) = &self.scheduler.config_path {
            tracing::info!("  scheduler:   config_path={}", path.display());
        }
    }
}

// ── Prometheus ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    pub url: String,
}

impl PrometheusConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "FAIRSHARE_PROMETHEUS_URL", "http://localhost:9090"),
        }
    }
}

// ── Scheduler deployment ──────────────────────────────────────

/// Where the scheduler's policy document lives and which workload reloads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerTarget {
    pub namespace: String,
    /// Name of the configuration object holding the policy.
    pub config_name: String,
    /// Data key of the serialized policy inside that object.
    pub config_key: String,
    /// Workload restarted after the policy changes.
    pub workload: String,
    pub rollout_timeout: Duration,
    /// Local scheduler configuration YAML (usage params live here).
    pub config_path: Option<PathBuf>,
}

impl SchedulerTarget {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            namespace: profiled_env_or(p, "FAIRSHARE_NAMESPACE", "kai-scheduler"),
            config_name: profiled_env_or(p, "FAIRSHARE_CONFIG_NAME", "scheduler-config"),
            config_key: profiled_env_or(p, "FAIRSHARE_CONFIG_KEY", "config.yaml"),
            workload: profiled_env_or(p, "FAIRSHARE_WORKLOAD", "kai-scheduler-default"),
            rollout_timeout: Duration::from_secs(profiled_env_u64(
                p,
                "FAIRSHARE_ROLLOUT_TIMEOUT_SECS",
                300,
            )),
            config_path: profiled_env_opt(p, "FAIRSHARE_SCHEDULER_CONFIG").map(PathBuf::from),
        }
    }
}

impl Default for SchedulerTarget {
    fn default() -> Self {
        Self::from_env_profiled("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-mutating tests use keys unique to each test to avoid interference.

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        env::set_var("CFGTEST_ONE_KEY", "plain");
        env::set_var("STAGING_CFGTEST_ONE_KEY", "staged");
        assert_eq!(profiled_env_or("STAGING", "CFGTEST_ONE_KEY", "x"), "staged");
        assert_eq!(profiled_env_or("", "CFGTEST_ONE_KEY", "x"), "plain");
        assert_eq!(profiled_env_or("OTHER", "CFGTEST_ONE_KEY", "x"), "plain");
        env::remove_var("CFGTEST_ONE_KEY");
        env::remove_var("STAGING_CFGTEST_ONE_KEY");
    }

    #[test]
    fn empty_values_fall_back_to_default() {
        env::set_var("CFGTEST_EMPTY_KEY", "");
        assert_eq!(profiled_env_or("", "CFGTEST_EMPTY_KEY", "fallback"), "fallback");
        env::remove_var("CFGTEST_EMPTY_KEY");
    }

    #[test]
    fn unparsable_numbers_use_default() {
        env::set_var("CFGTEST_NUM_KEY", "soon");
        assert_eq!(profiled_env_u64("", "CFGTEST_NUM_KEY", 42), 42);
        env::remove_var("CFGTEST_NUM_KEY");
    }

    #[test]
    fn profile_label_defaults() {
        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        let cfg = Config::for_profile("prod");
        assert_eq!(cfg.profile_label(), "PROD");
    }
}
