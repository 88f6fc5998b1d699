//! The scheduler's built-in policy document.

use crate::document::{Action, PluginOption, SchedulerConfiguration, Tier};
use crate::strategy::{PlacementStrategy, CPU_RESOURCE, GPU_RESOURCE};

pub const NODE_PLACEMENT_PLUGIN: &str = "nodeplacement";
pub const GPU_SHARING_ORDER_PLUGIN: &str = "gpusharingorder";

/// Plugins added by the placement strategy rules rather than inherited
/// from the default tier.
pub fn is_strategy_owned(plugin: &str) -> bool {
    plugin == NODE_PLACEMENT_PLUGIN
        || plugin == GPU_SHARING_ORDER_PLUGIN
        || PlacementStrategy::ALL
            .iter()
            .any(|s| s.gpu_order_plugin() == plugin)
}

/// `nodeplacement` with the same strategy for both resource classes.
pub fn node_placement(strategy: PlacementStrategy) -> PluginOption {
    PluginOption::with_arguments(
        NODE_PLACEMENT_PLUGIN,
        [(GPU_RESOURCE, strategy.as_str()), (CPU_RESOURCE, strategy.as_str())],
    )
}

impl SchedulerConfiguration {
    /// Policy the scheduler runs when no configuration is supplied.
    pub fn default_configuration() -> Self {
        let default_strategy = PlacementStrategy::default();
        let plugins = [
            "predicates",
            "proportion",
            "priority",
            "elastic",
            "kubeflow",
            "ray",
            "nodeavailability",
            GPU_SHARING_ORDER_PLUGIN,
        ]
        .into_iter()
        .map(PluginOption::named)
        .chain([PluginOption::named(default_strategy.gpu_order_plugin())])
        .chain(
            ["resourcetype", "taskorder", "nominatednode", "dynamicresources"]
                .into_iter()
                .map(PluginOption::named),
        )
        .chain([node_placement(default_strategy)])
        .chain(["minruntime", "topology"].into_iter().map(PluginOption::named))
        .collect();

        SchedulerConfiguration::new(&Action::ALL, vec![Tier::new(plugins)])
    }
}
