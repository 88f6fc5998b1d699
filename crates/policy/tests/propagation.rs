//! Policy propagation against in-memory store and rollout ports.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fairshare_core::config::SchedulerTarget;
use fairshare_policy::{
    ConfigDocument, ConfigStore, PlacementStrategy, PolicyAssembler, PolicyPropagator,
    PortError, PropagationError, RolloutController, SchedulerConfiguration,
};

#[derive(Default)]
struct MemoryStore {
    documents: Mutex<HashMap<(String, String), ConfigDocument>>,
    fail_writes: bool,
    writes: Mutex<usize>,
}

impl MemoryStore {
    fn with(document: ConfigDocument) -> Self {
        let store = Self::default();
        store.documents.lock().unwrap().insert(
            (document.namespace.clone(), document.name.clone()),
            document,
        );
        store
    }

    fn document(&self, namespace: &str, name: &str) -> ConfigDocument {
        self.documents.lock().unwrap()[&(namespace.to_string(), name.to_string())].clone()
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ConfigDocument, PortError> {
        self.documents
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| format!("configmaps \"{name}\" not found").into())
    }

    async fn replace(&self, document: &ConfigDocument) -> Result<(), PortError> {
        if self.fail_writes {
            return Err("admission webhook denied the request".into());
        }
        *self.writes.lock().unwrap() += 1;
        self.documents.lock().unwrap().insert(
            (document.namespace.clone(), document.name.clone()),
            document.clone(),
        );
        Ok(())
    }
}

#[derive(Default)]
struct RecordingRollout {
    restarts: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
    fail: bool,
}

#[async_trait::async_trait]
impl RolloutController for RecordingRollout {
    async fn restart_and_wait(
        &self,
        namespace: &str,
        workload: &str,
        _timeout: Duration,
    ) -> Result<(), PortError> {
        self.restarts
            .lock()
            .unwrap()
            .push((namespace.to_string(), workload.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err("progress deadline exceeded".into());
        }
        Ok(())
    }
}

fn target() -> SchedulerTarget {
    SchedulerTarget {
        namespace: "kai-scheduler".to_string(),
        config_name: "scheduler-config".to_string(),
        config_key: "config.yaml".to_string(),
        workload: "kai-scheduler-default".to_string(),
        rollout_timeout: Duration::from_secs(60),
        config_path: None,
    }
}

fn existing_document() -> ConfigDocument {
    let mut document = ConfigDocument::new("kai-scheduler", "scheduler-config");
    document.resource_version = Some("1234".to_string());
    document.labels = BTreeMap::from([("app".to_string(), "kai-scheduler".to_string())]);
    document.data = BTreeMap::from([
        ("config.yaml".to_string(), "actions: allocate\n".to_string()),
        ("logLevel".to_string(), "debug".to_string()),
    ]);
    document
}

fn spread_policy() -> SchedulerConfiguration {
    PolicyAssembler::default().build(PlacementStrategy::Spread)
}

#[tokio::test]
async fn propagate_replaces_payload_and_restarts() {
    let store = Arc::new(MemoryStore::with(existing_document()));
    let rollout = Arc::new(RecordingRollout::default());
    let propagator = PolicyPropagator::new(store.clone(), rollout.clone(), target());

    let policy = spread_policy();
    propagator.propagate(&policy).await.unwrap();

    let stored = store.document("kai-scheduler", "scheduler-config");
    let parsed = SchedulerConfiguration::from_yaml(&stored.data["config.yaml"]).unwrap();
    assert_eq!(parsed, policy);
    assert_eq!(stored.data["logLevel"], "debug");
    assert_eq!(stored.labels["app"], "kai-scheduler");
    assert_eq!(stored.resource_version.as_deref(), Some("1234"));

    assert_eq!(
        *rollout.restarts.lock().unwrap(),
        vec![("kai-scheduler".to_string(), "kai-scheduler-default".to_string())]
    );
    assert_eq!(propagator.current().await.unwrap(), policy);
}

#[tokio::test]
async fn missing_config_fails_at_fetch_without_side_effects() {
    let store = Arc::new(MemoryStore::default());
    let rollout = Arc::new(RecordingRollout::default());
    let propagator = PolicyPropagator::new(store.clone(), rollout.clone(), target());

    let err = propagator.propagate(&spread_policy()).await.unwrap_err();
    assert_eq!(err.stage(), "fetch");
    assert!(!err.store_mutated());
    assert_eq!(*store.writes.lock().unwrap(), 0);
    assert!(rollout.restarts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn write_failure_skips_rollout() {
    let store = Arc::new(MemoryStore {
        fail_writes: true,
        ..MemoryStore::with(existing_document())
    });
    let rollout = Arc::new(RecordingRollout::default());
    let propagator = PolicyPropagator::new(store, rollout.clone(), target());

    let err = propagator.propagate(&spread_policy()).await.unwrap_err();
    assert!(matches!(err, PropagationError::Write { ref name, .. } if name == "scheduler-config"));
    assert!(rollout.restarts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rollout_failure_leaves_store_written() {
    let store = Arc::new(MemoryStore::with(existing_document()));
    let rollout = Arc::new(RecordingRollout {
        fail: true,
        ..Default::default()
    });
    let propagator = PolicyPropagator::new(store.clone(), rollout, target());

    let policy = spread_policy();
    let err = propagator.propagate(&policy).await.unwrap_err();
    assert_eq!(err.stage(), "rollout");
    assert!(err.store_mutated());
    assert!(err.to_string().contains("progress deadline exceeded"));

    let stored = store.document("kai-scheduler", "scheduler-config");
    assert_eq!(
        SchedulerConfiguration::from_yaml(&stored.data["config.yaml"]).unwrap(),
        policy
    );
}

#[tokio::test(start_paused = true)]
async fn rollout_wait_is_bounded() {
    let store = Arc::new(MemoryStore::with(existing_document()));
    let rollout = Arc::new(RecordingRollout {
        delay: Some(Duration::from_secs(600)),
        ..Default::default()
    });
    let propagator = PolicyPropagator::new(store, rollout, target());

    let err = propagator.propagate(&spread_policy()).await.unwrap_err();
    assert!(matches!(
        err,
        PropagationError::Rollout { timeout, .. } if timeout == Duration::from_secs(60)
    ));
}

#[tokio::test]
async fn concurrent_propagations_are_serialised() {
    let store = Arc::new(MemoryStore::with(existing_document()));
    let rollout = Arc::new(RecordingRollout {
        delay: Some(Duration::from_millis(20)),
        ..Default::default()
    });
    let propagator = Arc::new(PolicyPropagator::new(store.clone(), rollout.clone(), target()));

    let assembler = PolicyAssembler::default();
    let spread = assembler.build(PlacementStrategy::Spread);
    let binpack = assembler.build(PlacementStrategy::Binpack);

    let (a, b) = tokio::join!(propagator.propagate(&spread), propagator.propagate(&binpack));
    a.unwrap();
    b.unwrap();

    assert_eq!(*store.writes.lock().unwrap(), 2);
    assert_eq!(rollout.restarts.lock().unwrap().len(), 2);

    // join! polls the first future first, so it takes the lock first.
    let stored = store.document("kai-scheduler", "scheduler-config");
    assert_eq!(
        SchedulerConfiguration::from_yaml(&stored.data["config.yaml"]).unwrap(),
        binpack
    );
}

#[tokio::test]
async fn current_reports_missing_payload() {
    let mut document = existing_document();
    document.data.remove("config.yaml");
    let propagator = PolicyPropagator::new(
        Arc::new(MemoryStore::with(document)),
        Arc::new(RecordingRollout::default()),
        target(),
    );

    let err = propagator.current().await.unwrap_err();
    assert!(matches!(err, PropagationError::MissingPayload { ref key, .. } if key == "config.yaml"));
}
