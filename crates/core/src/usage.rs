//! Cluster-wide usage snapshot produced by one accounting cycle.

use std::collections::HashMap;

use serde::Serialize;

use crate::resource::{QueueId, ResourceKind};

/// Per-resource usage of a single queue. Kinds with no data are absent, not zero.
pub type QueueUsage = HashMap<ResourceKind, f64>;

/// Usage of every queue seen in an accounting cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterUsage {
    pub queues: HashMap<QueueId, QueueUsage>,
}

impl ClusterUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one resource kind's per-queue results into the snapshot.
    ///
    /// Queues not seen before are added with only this kind set.
    pub fn merge_resource(&mut self, kind: ResourceKind, per_queue: HashMap<QueueId, f64>) {
        for (queue, value) in per_queue {
            self.queues.entry(queue).or_default().insert(kind, value);
        }
    }

    pub fn queue(&self, queue: &QueueId) -> Option<&QueueUsage> {
        self.queues.get(queue)
    }

    /// Usage of `kind` for `queue`, or `None` when the backend had no series for it.
    pub fn usage(&self, queue: &QueueId, kind: ResourceKind) -> Option<f64> {
        self.queues.get(queue).and_then(|u| u.get(&kind).copied())
    }

    /// Sum of `kind` across all queues.
    pub fn total(&self, kind: ResourceKind) -> f64 {
        self.queues.values().filter_map(|u| u.get(&kind)).sum()
    }

    /// Queue IDs in sorted order, for stable output.
    pub fn sorted_queues(&self) -> Vec<&QueueId> {
        let mut ids: Vec<&QueueId> = self.queues.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_queue(entries: &[(&str, f64)]) -> HashMap<QueueId, f64> {
        entries.iter().map(|(q, v)| (QueueId::from(*q), *v)).collect()
    }

    #[test]
    fn merge_keeps_missing_kinds_absent() {
        let mut usage = ClusterUsage::new();
        usage.merge_resource(ResourceKind::Gpu, per_queue(&[("a", 4.0), ("b", 2.0)]));
        usage.merge_resource(ResourceKind::Cpu, per_queue(&[("a", 10.0), ("c", 1.0)]));

        let a = QueueId::from("a");
        let b = QueueId::from("b");
        let c = QueueId::from("c");

        assert_eq!(usage.len(), 3);
        assert_eq!(usage.usage(&a, ResourceKind::Gpu), Some(4.0));
        assert_eq!(usage.usage(&a, ResourceKind::Cpu), Some(10.0));
        assert_eq!(usage.usage(&b, ResourceKind::Cpu), None);
        assert_eq!(usage.usage(&c, ResourceKind::Gpu), None);
        assert_eq!(usage.queue(&c).map(|u| u.len()), Some(1));
    }

    #[test]
    fn zero_valued_series_is_present() {
        let mut usage = ClusterUsage::new();
        usage.merge_resource(ResourceKind::Memory, per_queue(&[("idle", 0.0)]));
        assert_eq!(
            usage.usage(&QueueId::from("idle"), ResourceKind::Memory),
            Some(0.0)
        );
    }

    #[test]
    fn total_sums_one_kind() {
        let mut usage = ClusterUsage::new();
        usage.merge_resource(ResourceKind::Gpu, per_queue(&[("a", 1.5), ("b", 2.5)]));
        usage.merge_resource(ResourceKind::Cpu, per_queue(&[("a", 100.0)]));
        assert_eq!(usage.total(ResourceKind::Gpu), 4.0);
        assert_eq!(usage.total(ResourceKind::Memory), 0.0);
    }

    #[test]
    fn sorted_queues_is_stable() {
        let mut usage = ClusterUsage::new();
        usage.merge_resource(ResourceKind::Gpu, per_queue(&[("z", 1.0), ("a", 1.0), ("m", 1.0)]));
        let ids: Vec<&str> = usage.sorted_queues().iter().map(|q| q.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }
}
