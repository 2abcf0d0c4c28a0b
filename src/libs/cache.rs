//! An in-memory snapshot of the cluster state the controller allocates over
//!
//! The cache mirrors pods, nodes, and quota objects from watch events. It is
//! the single shared structure between the reconcilers and the periodic
//! tasks; everything it hands out is a clone taken under its lock.

use k8s_openapi::api::core::v1::{Node, Pod};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{event, Level};

use super::crds::JobQuota;
use super::models::{JobQuotaInfo, NodeInfo, PodInfo, PodPhase};
use super::queue::Keyed;

/// The indices guarded by the cache lock
#[derive(Default)]
struct CacheInner {
    /// The tracked quotas keyed by their consumer's uid
    quotas: HashMap<String, JobQuotaInfo>,
    /// The tracked nodes keyed by name
    nodes: HashMap<String, NodeInfo>,
}

/// A thread safe cache of quotas and nodes fed by watch events
#[derive(Default)]
pub struct Cache {
    /// The guarded indices
    inner: Mutex<CacheInner>,
}

impl Cache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Cache::default()
    }

    /// Take the cache lock
    fn lock(&self) -> std::sync::MutexGuard<CacheInner> {
        self.inner.lock().expect("cache lock poisoned")
    }

    /// Track a pod that was added or updated
    ///
    /// Running pods are queued on their owning quota; terminal pods are
    /// dropped from both queues. Pods without a unique owner are ignored.
    ///
    /// # Arguments
    ///
    /// * `pod` - The pod that was added or updated
    pub fn add_pod(&self, pod: &Pod) {
        // skip pods without exactly one owner
        let Some(info) = PodInfo::new(pod) else {
            event!(Level::DEBUG, msg = "skipping pod without a unique owner", pod = ?pod.metadata.name);
            return;
        };
        let mut inner = self.lock();
        // skip pods whose owner has no quota
        let Some(quota) = inner.quotas.get_mut(&info.owner) else {
            return;
        };
        match info.phase {
            // queue running pods for reclamation decisions
            PodPhase::Running => quota.running_pods.add(info),
            // terminal pods free their slot in both queues
            PodPhase::Failed | PodPhase::Succeeded => {
                let key = info.key();
                quota.running_pods.delete(&key);
                quota.reclaiming_pods.delete(&key);
            }
            _ => (),
        }
    }

    /// Stop tracking a deleted pod
    ///
    /// # Arguments
    ///
    /// * `pod` - The pod that was deleted
    pub fn delete_pod(&self, pod: &Pod) {
        let Some(info) = PodInfo::new(pod) else {
            return;
        };
        let mut inner = self.lock();
        let Some(quota) = inner.quotas.get_mut(&info.owner) else {
            return;
        };
        // drop this pod from both queues
        let key = info.key();
        quota.running_pods.delete(&key);
        quota.reclaiming_pods.delete(&key);
    }

    /// Track a node that was added or updated
    ///
    /// # Arguments
    ///
    /// * `node` - The node that was added or updated
    pub fn add_node(&self, node: &Node) {
        let info = NodeInfo::new(node);
        let mut inner = self.lock();
        inner.nodes.insert(info.name.clone(), info);
    }

    /// Stop tracking a deleted node
    ///
    /// # Arguments
    ///
    /// * `node` - The node that was deleted
    pub fn delete_node(&self, node: &Node) {
        let info = NodeInfo::new(node);
        let mut inner = self.lock();
        inner.nodes.remove(&info.name);
    }

    /// Track a quota that was added or updated
    ///
    /// The replacement is a fresh entry: an update drops any queued pods. The
    /// queues refill from subsequent pod events.
    ///
    /// # Arguments
    ///
    /// * `quota` - The quota that was added or updated
    pub fn add_quota(&self, quota: &JobQuota) {
        let info = JobQuotaInfo::new(quota);
        let mut inner = self.lock();
        inner.quotas.insert(info.consumer_id.clone(), info);
    }

    /// Stop tracking a deleted quota
    ///
    /// # Arguments
    ///
    /// * `quota` - The quota that was deleted
    pub fn delete_quota(&self, quota: &JobQuota) {
        let info = JobQuotaInfo::new(quota);
        let mut inner = self.lock();
        inner.quotas.remove(&info.consumer_id);
    }

    /// Get a cloned snapshot of all quotas and nodes
    ///
    /// The clones are taken under the lock so no tick ever observes an
    /// intermediate state, and callers operate without holding the lock.
    pub fn get_snapshot(&self) -> (Vec<JobQuotaInfo>, Vec<NodeInfo>) {
        let inner = self.lock();
        let quotas = inner.quotas.values().cloned().collect();
        let nodes = inner.nodes.values().cloned().collect();
        (quotas, nodes)
    }

    /// Get clones of all quotas whose usage strictly exceeds their entitlement
    ///
    /// A quota is overused only when `used` is greater on both axes; this is
    /// the trigger predicate for reclamation.
    pub fn get_overused(&self) -> Vec<JobQuotaInfo> {
        let inner = self.lock();
        inner
            .quotas
            .values()
            .filter(|quota| quota.allocated.less(&quota.used))
            .cloned()
            .collect()
    }

    /// Mark pods of a quota as being reclaimed
    ///
    /// Marked pods stay in the running queue until their terminal event
    /// arrives; the reclaiming queue keeps later ticks from double evicting.
    ///
    /// # Arguments
    ///
    /// * `job` - The quota the pods belong to
    /// * `pods` - The pods being reclaimed
    pub fn reclaim(&self, job: &JobQuotaInfo, pods: &[PodInfo]) {
        let mut inner = self.lock();
        let Some(quota) = inner.quotas.get_mut(&job.consumer_id) else {
            return;
        };
        for pod in pods {
            quota.reclaiming_pods.add(pod.clone());
        }
    }
}
