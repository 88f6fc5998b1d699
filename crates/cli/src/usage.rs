//! `fairshare usage`: run accounting cycles against Prometheus.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use fairshare_core::config::Config;
use fairshare_core::{ClusterUsage, ResourceKind};
use fairshare_usage::{UsageClient, UsageDbConfig};

use crate::cli::UsageArgs;
use crate::config::resolve_usage_db;

pub async fn run(args: UsageArgs, prometheus_url: Option<&str>, config: &Config) -> Result<()> {
    let db = resolve_usage_db(args.config.as_deref(), prometheus_url, &config.prometheus.url)?;
    let client = build_client(&db)?;
    info!(
        window_type = %client.window_type(),
        timeout = ?client.query_timeout(),
        "usage client ready"
    );

    let Some(every) = args.watch else {
        let now = args.at.unwrap_or_else(Utc::now);
        let usage = client
            .get_resource_usage_at(now)
            .await
            .context("usage accounting cycle failed")?;
        print_usage(&usage, now, args.json)?;
        return Ok(());
    };

    let mut interval = tokio::time::interval(Duration::from_secs(every.max(1)));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();
                match client.get_resource_usage_at(now).await {
                    Ok(usage) => print_usage(&usage, now, args.json)?,
                    // A failed cycle is reported and the next one still runs.
                    Err(e) => error!(error = %e, resource = ?e.resource(), "usage accounting cycle failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping usage watch");
                return Ok(());
            }
        }
    }
}

fn build_client(db: &UsageDbConfig) -> Result<UsageClient> {
    UsageClient::from_config(db).with_context(|| {
        format!("failed to build {} usage client", db.client_type)
    })
}

fn print_usage(usage: &ClusterUsage, at: DateTime<Utc>, json: bool) -> Result<()> {
    if json {
        let body = serde_json::json!({ "at": at.to_rfc3339(), "usage": usage });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", render_table(usage, at));
    }
    Ok(())
}

fn render_table(usage: &ClusterUsage, at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "usage at {}", at.to_rfc3339());
    let _ = write!(out, "{:<32}", "QUEUE");
    for kind in ResourceKind::ALL {
        let _ = write!(out, " {:>18}", kind.to_string().to_uppercase());
    }
    out.push('\n');

    for queue in usage.sorted_queues() {
        let _ = write!(out, "{:<32}", queue.as_str());
        for kind in ResourceKind::ALL {
            match usage.usage(queue, kind) {
                Some(v) => {
                    let _ = write!(out, " {:>18.3}", v);
                }
                None => {
                    let _ = write!(out, " {:>18}", "-");
                }
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairshare_core::QueueId;
    use std::collections::HashMap;

    #[test]
    fn table_marks_missing_kinds() {
        let mut usage = ClusterUsage::new();
        usage.merge_resource(
            ResourceKind::Gpu,
            HashMap::from([(QueueId::from("team-b"), 2.0), (QueueId::from("team-a"), 1.5)]),
        );
        usage.merge_resource(ResourceKind::Cpu, HashMap::from([(QueueId::from("team-a"), 8.0)]));

        let at = DateTime::from_timestamp(1_741_608_000, 0).unwrap();
        let table = render_table(&usage, at);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("team-a"));
        assert!(lines[2].contains("1.500") && lines[2].contains("8.000"));
        assert!(lines[3].starts_with("team-b"));
        assert!(lines[3].trim_end().ends_with('-'));
    }

    #[test]
    fn rejects_unknown_client_type() {
        let mut db = UsageDbConfig::prometheus("http://localhost:9090", Default::default());
        db.client_type = "influx".to_string();
        let err = build_client(&db).unwrap_err();
        assert!(format!("{err:#}").contains("unknown usage db client type: influx"));
    }
}
