//! Error types for policy assembly and propagation.

use std::time::Duration;

/// Error returned by configuration store and rollout adapters.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Policy document and strategy errors.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Strategy token other than `binpack` or `spread`.
    #[error("unknown placement strategy: '{0}' (expected binpack or spread)")]
    UnknownStrategy(String),

    #[error("unknown action: '{0}'")]
    UnknownAction(String),

    #[error("failed to serialize scheduler configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to parse scheduler configuration: {0}")]
    Parse(#[source] serde_yaml::Error),
}

/// Failure at one stage of pushing a policy to the running scheduler.
///
/// A `Rollout` failure means the store write already happened.
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("failed to fetch config {namespace}/{name}: {source}")]
    Fetch {
        namespace: String,
        name: String,
        #[source]
        source: PortError,
    },

    #[error("policy codec error for {namespace}/{name}: {source}")]
    Serialize {
        namespace: String,
        name: String,
        #[source]
        source: PolicyError,
    },

    #[error("failed to write config {namespace}/{name}: {source}")]
    Write {
        namespace: String,
        name: String,
        #[source]
        source: PortError,
    },

    #[error("rollout of {namespace}/{workload} failed (wait budget {timeout:?}): {source}")]
    Rollout {
        namespace: String,
        workload: String,
        timeout: Duration,
        #[source]
        source: PortError,
    },

    #[error("config {namespace}/{name} has no '{key}' entry")]
    MissingPayload {
        namespace: String,
        name: String,
        key: String,
    },
}

impl PropagationError {
    /// Short stage label used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PropagationError::Fetch { .. } => "fetch",
            PropagationError::Serialize { .. } => "serialize",
            PropagationError::Write { .. } => "write",
            PropagationError::Rollout { .. } => "rollout",
            PropagationError::MissingPayload { .. } => "read",
        }
    }

    /// Whether the configuration store may already hold the new policy.
    pub fn store_mutated(&self) -> bool {
        matches!(self, PropagationError::Rollout { .. })
    }
}
