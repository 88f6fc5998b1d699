//! Pushing a policy document to the running scheduler.
//!
//! Propagation is a read-modify-write of the configuration object followed
//! by a restart-based rollout of the scheduler workload:
//! 1. fetch the current object (metadata and other data keys are kept)
//! 2. overwrite the policy payload key with the serialized document
//! 3. write the object back
//! 4. restart the workload and wait until it is ready
//!
//! The store write is not rolled back when step 4 fails.

#[cfg(feature = "kubernetes")]
mod kubernetes;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use fairshare_core::config::SchedulerTarget;

use crate::document::SchedulerConfiguration;
use crate::error::{PortError, PropagationError};

#[cfg(feature = "kubernetes")]
pub use self::kubernetes::{KubeConfigStore, KubeRollout};

/// A named configuration object with string data entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    pub namespace: String,
    pub name: String,
    /// Store revision the document was read at, used for conflict detection.
    pub resource_version: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
}

impl ConfigDocument {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Declarative configuration store holding the scheduler's policy.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<ConfigDocument, PortError>;

    /// Replace the stored object with `document`.
    async fn replace(&self, document: &ConfigDocument) -> Result<(), PortError>;
}

/// Restart-and-wait against a named workload.
#[async_trait::async_trait]
pub trait RolloutController: Send + Sync {
    /// Trigger a restart and block until the new instances are ready.
    async fn restart_and_wait(
        &self,
        namespace: &str,
        workload: &str,
        timeout: Duration,
    ) -> Result<(), PortError>;
}

/// Serialised propagation of policies to one scheduler deployment.
///
/// Calls through one propagator never interleave. Separate processes can
/// still race on the store; the last write wins.
pub struct PolicyPropagator {
    store: Arc<dyn ConfigStore>,
    rollout: Arc<dyn RolloutController>,
    target: SchedulerTarget,
    lock: Mutex<()>,
}

impl PolicyPropagator {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        rollout: Arc<dyn RolloutController>,
        target: SchedulerTarget,
    ) -> Self {
        Self {
            store,
            rollout,
            target,
            lock: Mutex::new(()),
        }
    }

    pub fn target(&self) -> &SchedulerTarget {
        &self.target
    }

    /// Replace the live policy with `config` and wait for the rollout.
    pub async fn propagate(&self, config: &SchedulerConfiguration) -> Result<(), PropagationError> {
        let _guard = self.lock.lock().await;
        let t = &self.target;

        let mut document = self.fetch().await?;

        let payload = config.to_yaml().map_err(|source| PropagationError::Serialize {
            namespace: t.namespace.clone(),
            name: t.config_name.clone(),
            source,
        })?;
        document.data.insert(t.config_key.clone(), payload);

        self.store
            .replace(&document)
            .await
            .map_err(|source| PropagationError::Write {
                namespace: t.namespace.clone(),
                name: t.config_name.clone(),
                source,
            })?;
        info!(namespace = %t.namespace, name = %t.config_name, key = %t.config_key, "scheduler policy written");

        self.wait_for_rollout().await?;
        info!(namespace = %t.namespace, workload = %t.workload, "scheduler rollout complete");
        Ok(())
    }

    /// Policy currently stored for the scheduler.
    pub async fn current(&self) -> Result<SchedulerConfiguration, PropagationError> {
        let t = &self.target;
        let document = self.fetch().await?;
        let payload = document
            .data
            .get(&t.config_key)
            .ok_or_else(|| PropagationError::MissingPayload {
                namespace: t.namespace.clone(),
                name: t.config_name.clone(),
                key: t.config_key.clone(),
            })?;
        SchedulerConfiguration::from_yaml(payload).map_err(|source| PropagationError::Serialize {
            namespace: t.namespace.clone(),
            name: t.config_name.clone(),
            source,
        })
    }

    async fn fetch(&self) -> Result<ConfigDocument, PropagationError> {
        let t = &self.target;
        self.store
            .get(&t.namespace, &t.config_name)
            .await
            .map_err(|source| PropagationError::Fetch {
                namespace: t.namespace.clone(),
                name: t.config_name.clone(),
                source,
            })
    }

    async fn wait_for_rollout(&self) -> Result<(), PropagationError> {
        let t = &self.target;
        let rollout_err = |source: PortError| PropagationError::Rollout {
            namespace: t.namespace.clone(),
            workload: t.workload.clone(),
            timeout: t.rollout_timeout,
            source,
        };

        let wait = self
            .rollout
            .restart_and_wait(&t.namespace, &t.workload, t.rollout_timeout);
        match tokio::time::timeout(t.rollout_timeout, wait).await {
            Ok(result) => result.map_err(rollout_err),
            Err(elapsed) => {
                warn!(workload = %t.workload, timeout = ?t.rollout_timeout, "rollout wait timed out");
                Err(rollout_err(Box::new(elapsed)))
            }
        }
    }
}
