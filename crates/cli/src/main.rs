mod cli;
mod config;
mod policy;
mod usage;

use anyhow::Result;
use clap::Parser;

use fairshare_core::config::{load_dotenv, Config};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    match args.command {
        Command::Usage(usage_args) => {
            usage::run(usage_args, args.prometheus_url.as_deref(), &config).await
        }
        Command::Policy(command) => policy::run(command, &config).await,
    }
}
