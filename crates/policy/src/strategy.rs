//! Placement strategies and the plugin names derived from them.

use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;

/// Resource classes the node placement plugin takes a strategy for.
pub const GPU_RESOURCE: &str = "gpu";
pub const CPU_RESOURCE: &str = "cpu";

/// How candidate nodes are ordered for a resource class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlacementStrategy {
    /// Pack workloads onto as few nodes as possible.
    #[default]
    Binpack,
    /// Distribute workloads across nodes.
    Spread,
}

impl PlacementStrategy {
    pub const ALL: [PlacementStrategy; 2] = [PlacementStrategy::Binpack, PlacementStrategy::Spread];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementStrategy::Binpack => "binpack",
            PlacementStrategy::Spread => "spread",
        }
    }

    /// GPU ordering plugin for this strategy: `binpack` gives `gpupack`,
    /// `spread` gives `gpuspread`.
    pub fn gpu_order_plugin(&self) -> String {
        format!("gpu{}", self.as_str().replacen("bin", "", 1))
    }

    /// Fractional GPU sharing order only applies when packing.
    pub fn allows_gpu_sharing(&self) -> bool {
        matches!(self, PlacementStrategy::Binpack)
    }

    pub fn allows_consolidation(&self) -> bool {
        !matches!(self, PlacementStrategy::Spread)
    }
}

impl fmt::Display for PlacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementStrategy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "binpack" => Ok(PlacementStrategy::Binpack),
            "spread" => Ok(PlacementStrategy::Spread),
            other => Err(PolicyError::UnknownStrategy(other.to_string())),
        }
    }
}
