//! ConfigMap store and Deployment rollout over the Kubernetes API.

use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ConfigDocument, ConfigStore, RolloutController};
use crate::error::PortError;

const FIELD_MANAGER: &str = "fairshare";
const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";
const ROLLOUT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Scheduler policy stored in a ConfigMap.
#[derive(Clone)]
pub struct KubeConfigStore {
    client: Client,
}

impl KubeConfigStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client from the ambient kubeconfig or in-cluster service account.
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait::async_trait]
impl ConfigStore for KubeConfigStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ConfigDocument, PortError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api.get(name).await?;
        Ok(document_from_config_map(namespace, name, config_map))
    }

    /// Merge-patches data, labels and annotations. The read revision is sent
    /// along, so a concurrent writer causes a conflict error.
    async fn replace(&self, document: &ConfigDocument) -> Result<(), PortError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &document.namespace);
        let patch = config_map_patch(document);
        api.patch(&document.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        debug!(namespace = %document.namespace, name = %document.name, "config map patched");
        Ok(())
    }
}

/// Restart-based rollout of a Deployment.
#[derive(Clone)]
pub struct KubeRollout {
    client: Client,
    poll_interval: Duration,
}

impl KubeRollout {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            poll_interval: ROLLOUT_POLL_INTERVAL,
        }
    }

    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait::async_trait]
impl RolloutController for KubeRollout {
    async fn restart_and_wait(
        &self,
        namespace: &str,
        workload: &str,
        timeout: Duration,
    ) -> Result<(), PortError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);

        // Same trigger as `kubectl rollout restart`.
        let restart = json!({
            "spec": { "template": { "metadata": { "annotations": {
                RESTARTED_AT_ANNOTATION: Utc::now().to_rfc3339(),
            }}}}
        });
        api.patch(workload, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&restart))
            .await?;
        info!(namespace, workload, "rollout restart triggered");

        let deadline = Instant::now() + timeout;
        loop {
            let deployment = api.get(workload).await?;
            if rollout_complete(&deployment) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(format!(
                    "deployment {namespace}/{workload} not ready after {timeout:?}"
                )
                .into());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn document_from_config_map(namespace: &str, name: &str, config_map: ConfigMap) -> ConfigDocument {
    ConfigDocument {
        namespace: namespace.to_string(),
        name: name.to_string(),
        resource_version: config_map.metadata.resource_version,
        labels: config_map.metadata.labels.unwrap_or_default(),
        annotations: config_map.metadata.annotations.unwrap_or_default(),
        data: config_map.data.unwrap_or_default(),
    }
}

fn config_map_patch(document: &ConfigDocument) -> Value {
    let mut metadata = Map::new();
    if let Some(version) = &document.resource_version {
        metadata.insert("resourceVersion".to_string(), json!(version));
    }
    if !document.labels.is_empty() {
        metadata.insert("labels".to_string(), json!(document.labels));
    }
    if !document.annotations.is_empty() {
        metadata.insert("annotations".to_string(), json!(document.annotations));
    }
    json!({
        "metadata": Value::Object(metadata),
        "data": document.data,
    })
}

/// A Deployment is rolled out when the controller has seen the latest spec
/// and every replica is updated, ready and available, with no old pods left.
fn rollout_complete(deployment: &Deployment) -> bool {
    let (Some(spec), Some(status)) = (&deployment.spec, &deployment.status) else {
        return false;
    };
    let desired = spec.replicas.unwrap_or(1);
    let generation = deployment.metadata.generation.unwrap_or_default();

    status.observed_generation.unwrap_or_default() >= generation
        && status.updated_replicas.unwrap_or_default() == desired
        && status.ready_replicas.unwrap_or_default() == desired
        && status.available_replicas.unwrap_or_default() == desired
        && status.replicas.unwrap_or_default() == desired
}
