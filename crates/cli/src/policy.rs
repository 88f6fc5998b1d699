//! `fairshare policy`: render, diff and apply strategy-built policies.

use anyhow::{Context, Result};

use fairshare_core::config::Config;
use fairshare_policy::{PolicyAssembler, PolicyDiff, SchedulerConfiguration};

use crate::cli::PolicyCommand;

pub async fn run(command: PolicyCommand, config: &Config) -> Result<()> {
    let assembler = PolicyAssembler::default();
    match command {
        PolicyCommand::Render(args) => {
            let policy = assembler.build(args.strategy);
            print!("{}", policy.to_yaml()?);
            Ok(())
        }
        PolicyCommand::Diff(args) => {
            let policy = assembler.build(args.strategy);
            print!("{}", diff_report(assembler.defaults(), &policy, args.strategy.as_str()));
            Ok(())
        }
        PolicyCommand::Apply(args) => {
            let policy = assembler.build(args.strategy);
            apply(&policy, config)
                .await
                .with_context(|| format!("failed to apply {} policy", args.strategy))
        }
    }
}

fn diff_report(defaults: &SchedulerConfiguration, policy: &SchedulerConfiguration, strategy: &str) -> String {
    format!(
        "--- default configuration\n+++ {strategy} policy\n{}",
        PolicyDiff::between(defaults, policy)
    )
}

#[cfg(feature = "kubernetes")]
async fn apply(policy: &SchedulerConfiguration, config: &Config) -> Result<()> {
    use std::sync::Arc;

    use fairshare_policy::{KubeConfigStore, KubeRollout, PolicyPropagator};
    use tracing::info;

    let store = KubeConfigStore::try_default()
        .await
        .context("failed to create kubernetes client")?;
    let rollout = KubeRollout::try_default()
        .await
        .context("failed to create kubernetes client")?;
    let propagator = PolicyPropagator::new(Arc::new(store), Arc::new(rollout), config.scheduler.clone());

    let previous = propagator.current().await.ok();
    if let Some(previous) = &previous {
        info!(changes = %PolicyDiff::between(previous, policy).to_string().trim_end(), "replacing scheduler policy");
    }

    propagator.propagate(policy).await?;
    println!(
        "policy applied to {}/{} and {} rolled out",
        config.scheduler.namespace, config.scheduler.config_name, config.scheduler.workload
    );
    Ok(())
}

#[cfg(not(feature = "kubernetes"))]
async fn apply(_policy: &SchedulerConfiguration, _config: &Config) -> Result<()> {
    anyhow::bail!("policy apply needs the `kubernetes` feature (cargo build --features kubernetes)")
}
