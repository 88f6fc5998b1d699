//! Strategy-to-policy assembly.

use tracing::debug;

use crate::defaults::{is_strategy_owned, node_placement, GPU_SHARING_ORDER_PLUGIN};
use crate::document::{Action, PluginOption, SchedulerConfiguration, Tier};
use crate::error::PolicyError;
use crate::strategy::PlacementStrategy;

/// Builds complete policy documents from a placement strategy.
///
/// The base document is owned by the assembler and never modified; every
/// build works on a fresh copy of its first tier.
#[derive(Debug, Clone)]
pub struct PolicyAssembler {
    defaults: SchedulerConfiguration,
}

impl Default for PolicyAssembler {
    fn default() -> Self {
        Self::new(SchedulerConfiguration::default_configuration())
    }
}

impl PolicyAssembler {
    pub fn new(defaults: SchedulerConfiguration) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &SchedulerConfiguration {
        &self.defaults
    }

    /// Build the policy for `strategy`, applied to both GPU and CPU.
    pub fn build(&self, strategy: PlacementStrategy) -> SchedulerConfiguration {
        let mut actions = vec![Action::Allocate];
        if strategy.allows_consolidation() {
            actions.push(Action::Consolidation);
        }
        actions.extend([Action::Reclaim, Action::Preempt, Action::StaleGangEviction]);

        let mut plugins = self.base_plugins();
        plugins.push(PluginOption::named(strategy.gpu_order_plugin()));
        plugins.push(node_placement(strategy));
        if strategy.allows_gpu_sharing() {
            plugins.push(PluginOption::named(GPU_SHARING_ORDER_PLUGIN));
        }

        debug!(%strategy, plugins = plugins.len(), "assembled scheduler policy");

        SchedulerConfiguration {
            usage_db_config: self.defaults.usage_db_config.clone(),
            ..SchedulerConfiguration::new(&actions, vec![Tier::new(plugins)])
        }
    }

    /// Parse a strategy token and build its policy.
    pub fn build_for(&self, token: &str) -> Result<SchedulerConfiguration, PolicyError> {
        Ok(self.build(token.parse()?))
    }

    /// First default tier without the plugins the strategy rules add.
    fn base_plugins(&self) -> Vec<PluginOption> {
        self.defaults
            .tiers
            .first()
            .map(|tier| {
                tier.plugins
                    .iter()
                    .filter(|p| !is_strategy_owned(&p.name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
