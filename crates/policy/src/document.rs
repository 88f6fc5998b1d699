//! The scheduler policy document and its YAML form.
//!
//! ```yaml
//! actions: allocate, consolidation, reclaim, preempt, stalegangeviction
//! tiers:
//!   - plugins:
//!       - name: predicates
//!       - name: nodeplacement
//!         arguments:
//!           cpu: binpack
//!           gpu: binpack
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use fairshare_usage::UsageDbConfig;

use crate::error::PolicyError;

const ACTION_SEPARATOR: &str = ", ";

// ── Actions ─────────────────────────────────────────────────────────

/// Top-level scheduling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Allocate,
    Consolidation,
    Reclaim,
    Preempt,
    StaleGangEviction,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Allocate,
        Action::Consolidation,
        Action::Reclaim,
        Action::Preempt,
        Action::StaleGangEviction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allocate => "allocate",
            Action::Consolidation => "consolidation",
            Action::Reclaim => "reclaim",
            Action::Preempt => "preempt",
            Action::StaleGangEviction => "stalegangeviction",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| PolicyError::UnknownAction(s.to_string()))
    }
}

/// Render actions the way the scheduler expects: `"allocate, reclaim"`.
pub fn join_actions(actions: &[Action]) -> String {
    actions
        .iter()
        .map(Action::as_str)
        .collect::<Vec<_>>()
        .join(ACTION_SEPARATOR)
}

// ── Document ────────────────────────────────────────────────────────

/// Named, optionally parameterised plugin reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<BTreeMap<String, String>>,
}

impl PluginOption {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: None,
        }
    }

    pub fn with_arguments<K, V>(name: impl Into<String>, arguments: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: Some(
                arguments
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.as_ref()?.get(key).map(String::as_str)
    }
}

/// Ordered plugin group. Earlier tiers take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    #[serde(default)]
    pub plugins: Vec<PluginOption>,
}

impl Tier {
    pub fn new(plugins: Vec<PluginOption>) -> Self {
        Self { plugins }
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginOption> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Complete scheduler policy: ordered actions plus tiered plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfiguration {
    /// Comma-and-space separated action names, in execution order.
    #[serde(default)]
    pub actions: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiers: Vec<Tier>,

    #[serde(default, rename = "usageDBConfig", skip_serializing_if = "Option::is_none")]
    pub usage_db_config: Option<UsageDbConfig>,
}

impl SchedulerConfiguration {
    pub fn new(actions: &[Action], tiers: Vec<Tier>) -> Self {
        Self {
            actions: join_actions(actions),
            tiers,
            usage_db_config: None,
        }
    }

    /// Action names in order, as written in the document.
    pub fn action_list(&self) -> Vec<&str> {
        self.actions
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// Actions parsed into the fixed vocabulary.
    pub fn actions(&self) -> Result<Vec<Action>, PolicyError> {
        self.action_list().into_iter().map(Action::from_str).collect()
    }

    /// Every plugin across all tiers, in tier order.
    pub fn plugins(&self) -> impl Iterator<Item = &PluginOption> {
        self.tiers.iter().flat_map(|t| t.plugins.iter())
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginOption> {
        self.plugins().find(|p| p.name == name)
    }

    pub fn to_yaml(&self) -> Result<String, PolicyError> {
        serde_yaml::to_string(self).map_err(PolicyError::Serialize)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        serde_yaml::from_str(yaml).map_err(PolicyError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trip_through_str() {
        for action in Action::ALL {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
        assert!(matches!(
            "backfill".parse::<Action>(),
            Err(PolicyError::UnknownAction(a)) if a == "backfill"
        ));
    }

    #[test]
    fn action_list_tolerates_spacing() {
        let config = SchedulerConfiguration {
            actions: "allocate,reclaim ,  preempt,".to_string(),
            ..Default::default()
        };
        assert_eq!(config.action_list(), vec!["allocate", "reclaim", "preempt"]);
        assert_eq!(
            config.actions().unwrap(),
            vec![Action::Allocate, Action::Reclaim, Action::Preempt]
        );
    }

    #[test]
    fn join_uses_comma_space() {
        assert_eq!(
            join_actions(&[Action::Allocate, Action::StaleGangEviction]),
            "allocate, stalegangeviction"
        );
    }

    #[test]
    fn parse_scheduler_yaml() {
        let yaml = r#"
actions: allocate, reclaim
tiers:
  - plugins:
      - name: predicates
      - name: nodeplacement
        arguments:
          gpu: spread
          cpu: binpack
usageDBConfig:
  clientType: prometheus
  connectionString: http://prometheus:9090
  usageParams:
    windowType: sliding
    halfLifePeriod: 10m
"#;
        let config = SchedulerConfiguration::from_yaml(yaml).unwrap();
        assert_eq!(config.action_list(), vec!["allocate", "reclaim"]);
        assert_eq!(config.tiers.len(), 1);
        let placement = config.plugin("nodeplacement").unwrap();
        assert_eq!(placement.argument("gpu"), Some("spread"));
        assert_eq!(placement.argument("cpu"), Some("binpack"));
        assert_eq!(config.plugin("predicates").unwrap().arguments, None);

        let usage = config.usage_db_config.unwrap();
        assert_eq!(usage.client_type, "prometheus");
        assert!(usage.usage_params.unwrap().half_life_period.is_some());
    }

    #[test]
    fn serialized_form_omits_empty_fields() {
        let config = SchedulerConfiguration::new(
            &[Action::Allocate],
            vec![Tier::new(vec![PluginOption::named("priority")])],
        );
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("actions: allocate"));
        assert!(yaml.contains("- name: priority"));
        assert!(!yaml.contains("arguments"));
        assert!(!yaml.contains("usageDBConfig"));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        assert!(matches!(
            SchedulerConfiguration::from_yaml("tiers: [oops"),
            Err(PolicyError::Parse(_))
        ));
    }
}
