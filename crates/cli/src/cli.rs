use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use fairshare_policy::PlacementStrategy;

/// Fair-share usage accounting and scheduler policy tooling.
#[derive(Parser, Debug)]
#[command(name = "fairshare", version, about)]
pub struct Cli {
    /// Prometheus server address.
    #[arg(long, global = true, env = "FAIRSHARE_PROMETHEUS_URL")]
    pub prometheus_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run usage accounting cycles and print per-queue usage.
    Usage(UsageArgs),

    /// Build, inspect or apply scheduler policies.
    #[command(subcommand)]
    Policy(PolicyCommand),
}

#[derive(Args, Debug)]
pub struct UsageArgs {
    /// Scheduler configuration YAML holding a `usageDBConfig` section.
    #[arg(long, env = "FAIRSHARE_SCHEDULER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Evaluate at this instant (RFC 3339) instead of now.
    #[arg(long, value_parser = parse_instant, conflicts_with = "watch")]
    pub at: Option<DateTime<Utc>>,

    /// Repeat every N seconds until interrupted.
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Print the policy YAML for a placement strategy.
    Render(StrategyArgs),

    /// Compare the policy for a strategy with the default configuration.
    Diff(StrategyArgs),

    /// Write the policy to the cluster and wait for the scheduler rollout.
    Apply(StrategyArgs),
}

#[derive(Args, Debug)]
pub struct StrategyArgs {
    /// Placement strategy for GPU and CPU: binpack or spread.
    #[arg(long, default_value = "binpack", value_parser = parse_strategy)]
    pub strategy: PlacementStrategy,
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{raw}': {e}"))
}

fn parse_strategy(raw: &str) -> Result<PlacementStrategy, String> {
    raw.parse().map_err(|e: fairshare_policy::PolicyError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_usage_flags() {
        let cli = Cli::try_parse_from([
            "fairshare",
            "--prometheus-url",
            "http://prom:9090",
            "usage",
            "--at",
            "2025-03-10T12:00:00Z",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.prometheus_url.as_deref(), Some("http://prom:9090"));
        match cli.command {
            Command::Usage(args) => {
                assert_eq!(args.at.unwrap().to_rfc3339(), "2025-03-10T12:00:00+00:00");
                assert!(args.json);
                assert!(args.watch.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn at_and_watch_conflict() {
        assert!(Cli::try_parse_from(["fairshare", "usage", "--at", "2025-03-10T12:00:00Z", "--watch", "30"]).is_err());
    }

    #[test]
    fn policy_strategy_defaults_to_binpack() {
        let cli = Cli::try_parse_from(["fairshare", "policy", "render"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Policy(PolicyCommand::Render(StrategyArgs { strategy: PlacementStrategy::Binpack }))
        ));

        let cli = Cli::try_parse_from(["fairshare", "policy", "diff", "--strategy", "spread"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Policy(PolicyCommand::Diff(StrategyArgs { strategy: PlacementStrategy::Spread }))
        ));

        assert!(Cli::try_parse_from(["fairshare", "policy", "render", "--strategy", "random"]).is_err());
    }
}
