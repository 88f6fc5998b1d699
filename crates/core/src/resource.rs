use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Opaque queue identifier, unique per queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(String);

impl QueueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QueueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Resource kinds tracked by usage accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "nvidia.com/gpu")]
    Gpu,
    #[serde(rename = "cpu")]
    Cpu,
    #[serde(rename = "memory")]
    Memory,
}

impl ResourceKind {
    /// Every tracked kind, in the order an accounting cycle queries them.
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Gpu, ResourceKind::Cpu, ResourceKind::Memory];

    /// Cluster resource name (`nvidia.com/gpu`, `cpu`, `memory`).
    pub fn resource_name(&self) -> &'static str {
        match self {
            ResourceKind::Gpu => "nvidia.com/gpu",
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nvidia.com/gpu" | "gpu" => Ok(ResourceKind::Gpu),
            "cpu" => Ok(ResourceKind::Cpu),
            "memory" | "mem" => Ok(ResourceKind::Memory),
            other => Err(CoreError::UnknownResource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.resource_name().parse::<ResourceKind>().unwrap(), kind);
        }
        assert_eq!("GPU".parse::<ResourceKind>().unwrap(), ResourceKind::Gpu);
    }

    #[test]
    fn unknown_resource_is_rejected() {
        assert!(matches!(
            "storage".parse::<ResourceKind>(),
            Err(CoreError::UnknownResource(s)) if s == "storage"
        ));
    }

    #[test]
    fn tracked_order_is_gpu_cpu_memory() {
        assert_eq!(
            ResourceKind::ALL,
            [ResourceKind::Gpu, ResourceKind::Cpu, ResourceKind::Memory]
        );
    }
}
