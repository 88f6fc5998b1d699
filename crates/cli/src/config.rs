use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use fairshare_policy::SchedulerConfiguration;
use fairshare_usage::{UsageDbConfig, UsageParams};

/// Load a scheduler configuration YAML file.
pub fn load_scheduler_config(path: &Path) -> Result<SchedulerConfiguration> {
    debug!(path = %path.display(), "Loading scheduler configuration");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scheduler config: {}", path.display()))?;
    SchedulerConfiguration::from_yaml(&content)
        .with_context(|| format!("failed to parse scheduler config: {}", path.display()))
}

/// Usage DB settings for an accounting run.
///
/// Taken from the scheduler config file when it has a `usageDBConfig`
/// section, otherwise a Prometheus client with default params. A
/// `prometheus_url` given on the command line or in the environment
/// overrides the file's connection string.
pub fn resolve_usage_db(
    path: Option<&Path>,
    prometheus_url: Option<&str>,
    default_url: &str,
) -> Result<UsageDbConfig> {
    let from_file = match path {
        Some(path) => load_scheduler_config(path)?.usage_db_config,
        None => None,
    };

    let mut db = from_file.unwrap_or_else(|| UsageDbConfig::prometheus(default_url, UsageParams::default()));
    if let Some(url) = prometheus_url {
        db.connection_string = url.to_string();
    }
    if db.connection_string.is_empty() && db.connection_string_env_var.is_none() {
        db.connection_string = default_url.to_string();
    }
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairshare_usage::WindowType;
    use std::io::Write;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn usage_db_from_file() {
        let file = write_config(
            r#"
actions: allocate, reclaim
tiers:
  - plugins:
      - name: proportion
usageDBConfig:
  clientType: prometheus
  connectionString: http://prometheus-operated:9090
  usageParams:
    windowType: tumbling
    windowSize: 720h
    tumblingWindowCronString: "0 0 1 * *"
"#,
        );
        let db = resolve_usage_db(Some(file.path()), None, "http://localhost:9090").unwrap();
        assert_eq!(db.connection_string, "http://prometheus-operated:9090");
        assert_eq!(db.effective_params().window_type, Some(WindowType::Tumbling));
    }

    #[test]
    fn flag_overrides_file_address() {
        let file = write_config("usageDBConfig:\n  clientType: prometheus\n  connectionString: http://a:9090\n");
        let db = resolve_usage_db(Some(file.path()), Some("http://b:9090"), "http://c:9090").unwrap();
        assert_eq!(db.connection_string, "http://b:9090");
    }

    #[test]
    fn missing_section_falls_back_to_defaults() {
        let file = write_config("actions: allocate\n");
        let db = resolve_usage_db(Some(file.path()), None, "http://localhost:9090").unwrap();
        assert_eq!(db.client_type, "prometheus");
        assert_eq!(db.connection_string, "http://localhost:9090");
        assert_eq!(db.effective_params().window_type, Some(WindowType::Sliding));

        let db = resolve_usage_db(None, None, "http://localhost:9090").unwrap();
        assert_eq!(db.connection_string, "http://localhost:9090");
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_usage_db(Some(&dir.path().join("absent.yaml")), None, "http://x").unwrap_err();
        assert!(err.to_string().contains("failed to read scheduler config"));

        let file = write_config("tiers: [");
        assert!(load_scheduler_config(file.path()).is_err());
    }
}
