//! Scheduler policy assembly and propagation.
//!
//! This crate provides:
//! - `SchedulerConfiguration`: the policy document (actions + tiered plugins) and its YAML codec
//! - The scheduler's default configuration
//! - `PolicyAssembler`: builds a full policy from a placement strategy
//! - `PolicyDiff`: read-only comparison of two documents
//! - `PolicyPropagator`: writes a policy to the configuration store and waits for the rollout
//!
//! Kubernetes adapters for the store and rollout ports are behind the
//! `kubernetes` feature.

pub mod builder;
pub mod defaults;
pub mod diff;
pub mod document;
pub mod error;
pub mod propagate;
pub mod strategy;

pub use builder::PolicyAssembler;
pub use diff::PolicyDiff;
pub use document::{join_actions, Action, PluginOption, SchedulerConfiguration, Tier};
pub use error::{PolicyError, PortError, PropagationError};
pub use propagate::{ConfigDocument, ConfigStore, PolicyPropagator, RolloutController};
pub use strategy::PlacementStrategy;

#[cfg(feature = "kubernetes")]
pub use propagate::{KubeConfigStore, KubeRollout};
