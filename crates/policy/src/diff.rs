//! Read-only comparison of two policy documents.

use std::collections::BTreeMap;
use std::fmt;

use crate::document::{PluginOption, SchedulerConfiguration};

/// Differences between a baseline policy and a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDiff {
    pub actions_added: Vec<String>,
    pub actions_removed: Vec<String>,
    /// True when both sides have the same actions in a different order.
    pub actions_reordered: bool,
    pub plugins_added: Vec<String>,
    pub plugins_removed: Vec<String>,
    /// Plugins present on both sides whose arguments differ.
    pub plugins_changed: Vec<String>,
    /// True when the plugins both sides share run in a different order.
    pub plugins_reordered: bool,
}

impl PolicyDiff {
    pub fn between(baseline: &SchedulerConfiguration, candidate: &SchedulerConfiguration) -> Self {
        let base_actions = baseline.action_list();
        let cand_actions = candidate.action_list();

        let actions_added = missing_from(&cand_actions, &base_actions);
        let actions_removed = missing_from(&base_actions, &cand_actions);
        let actions_reordered = actions_added.is_empty()
            && actions_removed.is_empty()
            && base_actions != cand_actions;

        let base_plugins = plugin_index(baseline);
        let cand_plugins = plugin_index(candidate);

        let plugins_added = cand_plugins
            .keys()
            .filter(|name| !base_plugins.contains_key(*name))
            .map(|name| name.to_string())
            .collect();
        let plugins_removed = base_plugins
            .keys()
            .filter(|name| !cand_plugins.contains_key(*name))
            .map(|name| name.to_string())
            .collect();
        let plugins_changed = cand_plugins
            .iter()
            .filter(|(name, plugin)| {
                base_plugins
                    .get(*name)
                    .is_some_and(|base| base.arguments != plugin.arguments)
            })
            .map(|(name, _)| name.to_string())
            .collect();
        let plugins_reordered =
            shared_order(baseline, &cand_plugins) != shared_order(candidate, &base_plugins);

        Self {
            actions_added,
            actions_removed,
            actions_reordered,
            plugins_added,
            plugins_removed,
            plugins_changed,
            plugins_reordered,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn missing_from(items: &[&str], other: &[&str]) -> Vec<String> {
    items
        .iter()
        .filter(|a| !other.contains(*a))
        .map(|a| a.to_string())
        .collect()
}

/// Last occurrence wins when a name repeats across tiers.
fn plugin_index(config: &SchedulerConfiguration) -> BTreeMap<&str, &PluginOption> {
    config.plugins().map(|p| (p.name.as_str(), p)).collect()
}

/// Pipeline order of the plugins in `config` that also appear in `other`.
fn shared_order<'a>(
    config: &'a SchedulerConfiguration,
    other: &BTreeMap<&str, &PluginOption>,
) -> Vec<&'a str> {
    config
        .plugins()
        .map(|p| p.name.as_str())
        .filter(|name| other.contains_key(name))
        .collect()
}

impl fmt::Display for PolicyDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no differences");
        }
        for a in &self.actions_added {
            writeln!(f, "+ action {a}")?;
        }
        for a in &self.actions_removed {
            writeln!(f, "- action {a}")?;
        }
        if self.actions_reordered {
            writeln!(f, "~ actions reordered")?;
        }
        for p in &self.plugins_added {
            writeln!(f, "+ plugin {p}")?;
        }
        for p in &self.plugins_removed {
            writeln!(f, "- plugin {p}")?;
        }
        for p in &self.plugins_changed {
            writeln!(f, "~ plugin {p} arguments")?;
        }
        if self.plugins_reordered {
            writeln!(f, "~ plugins reordered")?;
        }
        Ok(())
    }
}
