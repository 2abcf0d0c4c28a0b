//! The controller that keeps batch job tenants inside their fair share
//!
//! One reconciler per watched kind mirrors pods, nodes, and quota objects
//! into the snapshot cache. Two periodic tasks drive the cluster toward
//! fairness: `allocate` recomputes entitlements and writes them back,
//! `reclaim` evicts pods of quotas whose usage exceeds what they deserve.

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod, ReplicationController};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, ListParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::finalizer::{finalizer, Event as Finalizer};
use kube::runtime::watcher::Config;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{event, instrument, Level};

use super::cache::Cache;
use super::crds::{JobQuota, JobQuotaSpec, ResourceList};
use super::k8s::{K8s, Pods, Quotas};
use super::models::{self, JobQuotaInfo, PodInfo};
use super::policy::{self, Allocator};
use crate::conf::Conf;
use crate::errors::Error;

/// The finalizer marking quota objects tracked by this controller
const QUOTA_FINALIZER: &str = "quotad.io/tracked";

/// How long to wait before retrying a failed reconcile
const RECONCILE_ERROR_REQUEUE_SECS: u64 = 60;

/// How often to re-reconcile pods and nodes without events
///
/// Quota updates reset their pod queues, so pods are requeued on a timer to
/// repopulate them even when no pod event arrives.
const RESYNC_SECS: u64 = 300;

/// Controller state shared with every reconciler
#[derive(Clone)]
pub struct State {
    /// kube API client
    client: kube::Client,
    /// The cluster state the controller allocates over
    cache: Arc<Cache>,
    /// The quota wrapper shadow mode writes through
    quotas: Quotas,
}

/// Methods operating on controller state
impl State {
    /// Wrap state in Arc
    pub fn to_context(&self) -> Arc<State> {
        Arc::new(self.clone())
    }
}

/// Handle errors in a reconcile process
///
/// # Arguments
///
/// * `error` - The error the reconciler hit
fn error_policy<K>(_obj: Arc<K>, error: &Error, _state: Arc<State>) -> Action {
    event!(Level::ERROR, msg = "reconcile error", error = %error);
    Action::requeue(Duration::from_secs(RECONCILE_ERROR_REQUEUE_SECS))
}

/// Reconcile changes to a pod into the cache
///
/// # Arguments
///
/// * `pod` - The pod being changed
/// * `state` - Controller state including the cache
async fn reconcile_pod(pod: Arc<Pod>, state: Arc<State>) -> Result<Action, Error> {
    // a deletion timestamp means this pod is on its way out
    if pod.metadata.deletion_timestamp.is_some() {
        state.cache.delete_pod(&pod);
    } else {
        state.cache.add_pod(&pod);
    }
    Ok(Action::requeue(Duration::from_secs(RESYNC_SECS)))
}

/// Reconcile changes to a node into the cache
///
/// # Arguments
///
/// * `node` - The node being changed
/// * `state` - Controller state including the cache
async fn reconcile_node(node: Arc<Node>, state: Arc<State>) -> Result<Action, Error> {
    if node.metadata.deletion_timestamp.is_some() {
        state.cache.delete_node(&node);
    } else {
        state.cache.add_node(&node);
    }
    Ok(Action::requeue(Duration::from_secs(RESYNC_SECS)))
}

/// Reconcile changes to a quota into the cache
///
/// The finalizer dispatches deletes through cleanup so quotas leave the cache
/// before their object disappears.
///
/// # Arguments
///
/// * `quota` - The quota being changed
/// * `state` - Controller state including the cache
async fn reconcile_quota(quota: Arc<JobQuota>, state: Arc<State>) -> Result<Action, Error> {
    // quotas without a namespace never made it into the cluster
    let Some(ns) = quota.metadata.namespace.clone() else {
        return Ok(Action::await_change());
    };
    let quota_api: Api<JobQuota> = Api::namespaced(state.client.clone(), &ns);
    finalizer(&quota_api, QUOTA_FINALIZER, quota, |event| async {
        match event {
            Finalizer::Apply(quota) => state.cache.add_quota(&quota),
            Finalizer::Cleanup(quota) => state.cache.delete_quota(&quota),
        }
        Ok::<Action, Error>(Action::await_change())
    })
    .await
    .map_err(|e| Error::new(format!("Finalizer error: {}", e)))
}

/// Compute the request unit of a replication controller's pod template
///
/// # Arguments
///
/// * `rc` - The replication controller to total requests for
fn shadow_request_unit(rc: &ReplicationController) -> ResourceList {
    rc.spec
        .as_ref()
        .and_then(|spec| spec.template.as_ref())
        .and_then(|template| template.spec.as_ref())
        .map(models::resource_request)
        .unwrap_or_default()
        .resource_list()
}

/// Build the shadow quota for a replication controller
///
/// The rc's uid names the quota and its owner reference ties the two
/// together. Controllers without a uid or namespace build nothing.
///
/// # Arguments
///
/// * `rc` - The replication controller to mirror
fn shadow_quota(rc: &ReplicationController) -> Option<JobQuota> {
    let (Some(uid), Some(ns)) = (rc.metadata.uid.clone(), rc.metadata.namespace.clone()) else {
        return None;
    };
    let replicas = rc.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(0);
    // build a quota matching this rc's pod template
    let mut quota = JobQuota::new(
        &uid,
        JobQuotaSpec {
            replicas,
            request_unit: shadow_request_unit(rc),
        },
    );
    quota.metadata.namespace = Some(ns);
    quota.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "v1".to_owned(),
        kind: "ReplicationController".to_owned(),
        name: rc.metadata.name.clone().unwrap_or_default(),
        uid,
        ..Default::default()
    }]);
    Some(quota)
}

/// Mirror a replication controller into its shadow quota object
///
/// # Arguments
///
/// * `quotas` - The quota wrapper to write through
/// * `rc` - The replication controller to mirror
async fn shadow_apply(quotas: &Quotas, rc: &ReplicationController) -> Result<(), Error> {
    // controllers without a uid or namespace have nothing to mirror
    let Some(shadow) = shadow_quota(rc) else {
        return Ok(());
    };
    let ns = shadow.metadata.namespace.clone().unwrap_or_default();
    let name = shadow.metadata.name.clone().unwrap_or_default();
    // update the existing shadow quota or create a fresh one
    match quotas.get(&ns, &name).await {
        Ok(mut quota) => {
            // carry the recomputed spec onto the existing object
            quota.spec = shadow.spec;
            quotas.update(&ns, &quota).await?;
        }
        Err(_) => {
            quotas.create(&ns, &shadow).await?;
        }
    }
    Ok(())
}

/// Remove the shadow quota of a deleted replication controller
///
/// # Arguments
///
/// * `quotas` - The quota wrapper to write through
/// * `rc` - The replication controller that was deleted
async fn shadow_delete(quotas: &Quotas, rc: &ReplicationController) -> Result<(), Error> {
    let (Some(uid), Some(ns)) = (rc.metadata.uid.clone(), rc.metadata.namespace.clone()) else {
        return Ok(());
    };
    quotas.delete(&ns, &uid).await
}

/// Reconcile a replication controller into its shadow quota
///
/// # Arguments
///
/// * `rc` - The replication controller being changed
/// * `state` - Controller state including the quota wrapper
async fn reconcile_shadow(
    rc: Arc<ReplicationController>,
    state: Arc<State>,
) -> Result<Action, Error> {
    if rc.metadata.deletion_timestamp.is_some() {
        shadow_delete(&state.quotas, &rc).await?;
    } else {
        shadow_apply(&state.quotas, &rc).await?;
    }
    Ok(Action::await_change())
}

/// Wait until the stop signal fires or its sender goes away
///
/// # Arguments
///
/// * `stop` - The stop signal to wait on
async fn stopped(mut stop: watch::Receiver<bool>) {
    while !*stop.borrow() {
        if stop.changed().await.is_err() {
            break;
        }
    }
}

/// Run a controller for one watched kind until shutdown
///
/// # Arguments
///
/// * `api` - The api to watch
/// * `reconcile` - The reconciler to dispatch changes to
/// * `ctx` - The state shared with the reconciler
/// * `stop` - The stop signal to watch for shutdown
fn spawn_controller<K, F, Fut>(
    api: Api<K>,
    reconcile: F,
    ctx: Arc<State>,
    stop: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(Arc<K>, Arc<State>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Action, Error>> + Send + 'static,
{
    tokio::spawn(async move {
        // reconcile this kinds changes until shutdown
        let controller = Controller::new(api, Config::default().any_semantic())
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()));
        tokio::select! {
            _ = controller => (),
            _ = stopped(stop) => (),
        }
    })
}

/// Recompute entitlements from a snapshot and assign them to each job
///
/// # Arguments
///
/// * `cache` - The cache to snapshot
/// * `allocator` - The allocation policy to run
fn allocate_jobs(
    cache: &Cache,
    allocator: &mut Box<dyn Allocator + Send>,
) -> HashMap<String, Vec<JobQuotaInfo>> {
    // get the snapshot of the current cluster
    let (jobs, nodes) = cache.get_snapshot();
    // group jobs according to the policy
    let mut groups = allocator.group(jobs);
    // allocate resources to each group
    let allocs = allocator.allocate(&groups, &nodes);
    // assign each group's allocation to its jobs
    for (group, alloc) in &allocs {
        if let Some(jobs) = groups.get_mut(group) {
            allocator.assign(jobs, alloc);
        }
    }
    groups
}

/// Recompute entitlements and write them back to each quota's status
///
/// # Arguments
///
/// * `cache` - The cache to snapshot
/// * `allocator` - The allocation policy to run
/// * `quotas` - The quota wrapper to write status through
#[instrument(name = "QuotaController::allocate", skip_all)]
async fn allocate(cache: &Cache, allocator: &mut Box<dyn Allocator + Send>, quotas: &Quotas) {
    // recompute and assign entitlements
    let groups = allocate_jobs(cache, allocator);
    // update each quota's status for admission and cli consumers
    for job in groups.values().flatten() {
        if let Err(error) = quotas.update_status(job).await {
            // the next tick recomputes and retries this write
            event!(Level::WARN, msg = "failed to update quota status", quota = job.consumer_id, error = %error);
        }
    }
}

/// Select and mark the pods to evict for every overused quota
///
/// # Arguments
///
/// * `cache` - The cache to query for overused quotas
/// * `allocator` - The allocation policy selecting victims
fn select_victims(cache: &Cache, allocator: &dyn Allocator) -> Vec<PodInfo> {
    // get the overused jobs in the cluster
    let overused = cache.get_overused();
    let mut victims = Vec::new();
    for job in overused {
        // the overshoot this job is being driven back by
        let mut res = job.used.clone();
        res.sub(&job.allocated);
        // get the pods to evict to release resources
        let pods = allocator.reclaim(&job, &res);
        // mark these pods so later ticks do not double evict
        cache.reclaim(&job, &pods);
        victims.extend(pods);
    }
    victims
}

/// Evict the pods of quotas whose usage exceeds their entitlement
///
/// # Arguments
///
/// * `cache` - The cache to query for overused quotas
/// * `allocator` - The allocation policy selecting victims
/// * `pods` - The pod wrapper to evict through
#[instrument(name = "QuotaController::reclaim", skip_all)]
async fn reclaim(cache: &Cache, allocator: &dyn Allocator, pods: &Pods) {
    // evict without serializing this tick on api latency
    for pod in select_victims(cache, allocator) {
        let pods = pods.clone();
        tokio::spawn(async move {
            if let Err(error) = pods.delete(&pod.namespace, &pod.name).await {
                // the pod stays overused and is reselected next tick
                event!(Level::WARN, msg = "failed to evict pod", pod = %pod, error = %error);
            }
        });
    }
}

/// Run the allocate task on its period until shutdown
///
/// # Arguments
///
/// * `cache` - The cache to snapshot
/// * `quotas` - The quota wrapper to write status through
/// * `allocator` - The allocation policy to run
/// * `period` - How often to allocate in seconds
/// * `stop` - The stop signal to watch for shutdown
async fn allocate_loop(
    cache: Arc<Cache>,
    quotas: Quotas,
    mut allocator: Box<dyn Allocator + Send>,
    period: u64,
    stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(period.max(1)));
    let stop = stopped(stop);
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = interval.tick() => allocate(&cache, &mut allocator, &quotas).await,
            _ = &mut stop => break,
        }
    }
}

/// Run the reclaim task on its period until shutdown
///
/// # Arguments
///
/// * `cache` - The cache to query for overused quotas
/// * `pods` - The pod wrapper to evict through
/// * `allocator` - The allocation policy selecting victims
/// * `period` - How often to reclaim in seconds
/// * `stop` - The stop signal to watch for shutdown
async fn reclaim_loop(
    cache: Arc<Cache>,
    pods: Pods,
    allocator: Box<dyn Allocator + Send>,
    period: u64,
    stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(period.max(1)));
    let stop = stopped(stop);
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = interval.tick() => reclaim(&cache, &*allocator, &pods).await,
            _ = &mut stop => break,
        }
    }
}

/// Enforces fair share entitlements for batch job tenants
pub struct QuotaController {
    /// The controller config
    conf: Conf,
    /// A client for the k8s api
    client: kube::Client,
    /// The cluster state the controller allocates over
    cache: Arc<Cache>,
    /// The send half of the stop signal
    stop: watch::Sender<bool>,
}

impl QuotaController {
    /// Create a new quota controller
    ///
    /// # Arguments
    ///
    /// * `conf` - The config to use
    /// * `client` - The k8s client to use
    pub fn new(conf: Conf, client: kube::Client) -> Self {
        let (stop, _) = watch::channel(false);
        QuotaController {
            conf,
            client,
            cache: Arc::new(Cache::new()),
            stop,
        }
    }

    /// Get a handle that can stop this controller
    pub fn stopper(&self) -> watch::Sender<bool> {
        self.stop.clone()
    }

    /// Signal the controller and all of its tasks to stop
    pub fn shutdown(&self) {
        let _ = self.stop.send(true);
    }

    /// Load the initial cluster state into the cache
    ///
    /// Quotas land first so the pods that follow can find their owners.
    #[instrument(name = "QuotaController::initial_sync", skip_all, err(Debug))]
    async fn initial_sync(&self) -> Result<(), Error> {
        let quota_api: Api<JobQuota> = Api::all(self.client.clone());
        for quota in quota_api.list(&ListParams::default()).await? {
            self.cache.add_quota(&quota);
        }
        let node_api: Api<Node> = Api::all(self.client.clone());
        for node in node_api.list(&ListParams::default()).await? {
            self.cache.add_node(&node);
        }
        let pod_api: Api<Pod> = Api::all(self.client.clone());
        for pod in pod_api.list(&ListParams::default()).await? {
            self.cache.add_pod(&pod);
        }
        Ok(())
    }

    /// Start the controller and run until shutdown
    #[instrument(name = "QuotaController::start", skip_all, err(Debug))]
    pub async fn start(&self) -> Result<(), Error> {
        // build both periodic tasks policies before spawning anything
        let policy_name = &self.conf.controller.policy;
        let allocate_policy = policy::new_policy(policy_name)
            .ok_or_else(|| Error::new(format!("unknown allocation policy {policy_name}")))?;
        let reclaim_policy = policy::new_policy(policy_name)
            .ok_or_else(|| Error::new(format!("unknown allocation policy {policy_name}")))?;
        // build our api wrappers
        let k8s = K8s::new(&self.client);
        // load the initial cluster state before reconciling events
        self.initial_sync().await?;
        event!(Level::INFO, msg = "initial sync complete");
        // share state with every reconciler
        let state = State {
            client: self.client.clone(),
            cache: self.cache.clone(),
            quotas: k8s.quotas.clone(),
        };
        // reconcile the watched kinds into the cache
        let mut controllers = vec![
            spawn_controller(
                Api::<Pod>::all(self.client.clone()),
                reconcile_pod,
                state.to_context(),
                self.stop.subscribe(),
            ),
            spawn_controller(
                Api::<Node>::all(self.client.clone()),
                reconcile_node,
                state.to_context(),
                self.stop.subscribe(),
            ),
            spawn_controller(
                Api::<JobQuota>::all(self.client.clone()),
                reconcile_quota,
                state.to_context(),
                self.stop.subscribe(),
            ),
        ];
        // mirror replication controllers into quotas when shadow mode is on
        if self.conf.controller.shadow_replication_controllers {
            controllers.push(spawn_controller(
                Api::<ReplicationController>::all(self.client.clone()),
                reconcile_shadow,
                state.to_context(),
                self.stop.subscribe(),
            ));
        }
        // start the periodic tasks
        let allocate = tokio::spawn(allocate_loop(
            self.cache.clone(),
            k8s.quotas.clone(),
            allocate_policy,
            self.conf.controller.allocate_period,
            self.stop.subscribe(),
        ));
        let reclaim = tokio::spawn(reclaim_loop(
            self.cache.clone(),
            k8s.pods.clone(),
            reclaim_policy,
            self.conf.controller.reclaim_period,
            self.stop.subscribe(),
        ));
        // run until the stop signal fires
        stopped(self.stop.subscribe()).await;
        // wait for the periodic tasks and controllers to wind down
        allocate.await?;
        reclaim.await?;
        for controller in controllers {
            controller.await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::crds::JobQuotaStatus;
    use crate::libs::models::{AllocationInfo, NodeInfo, Resource};
    use k8s_openapi::api::core::v1::{
        Container, NodeStatus, PodSpec, PodStatus, PodTemplateSpec, ReplicationControllerSpec,
        ResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use kube::core::ObjectMeta;
    use std::collections::BTreeMap;

    /// Build a resource list from raw quantity strings
    fn resource_list(cpu: &str, memory: &str) -> ResourceList {
        let mut list = BTreeMap::new();
        list.insert("cpu".to_owned(), Quantity(cpu.to_owned()));
        list.insert("memory".to_owned(), Quantity(memory.to_owned()));
        list
    }

    /// Build a quota owned by the given consumer uid
    fn quota(uid: &str, replicas: i32, cpu: &str, memory: &str) -> JobQuota {
        let mut quota = JobQuota::new(
            &format!("quota-{uid}"),
            JobQuotaSpec {
                replicas,
                request_unit: resource_list(cpu, memory),
            },
        );
        quota.metadata.namespace = Some("tenant-a".to_owned());
        quota.metadata.owner_references = Some(vec![OwnerReference {
            uid: uid.to_owned(),
            name: "job".to_owned(),
            ..Default::default()
        }]);
        quota
    }

    /// Build a running pod owned by the given consumer uid
    fn pod(name: &str, uid: &str, cpu: &str, memory: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("tenant-a".to_owned()),
                owner_references: Some(vec![OwnerReference {
                    uid: uid.to_owned(),
                    name: "job".to_owned(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "main".to_owned(),
                    resources: Some(ResourceRequirements {
                        requests: Some(resource_list(cpu, memory)),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_owned()),
                ..Default::default()
            }),
        }
    }

    /// Build a node with the given allocatable resources
    fn node(name: &str, cpu: &str, memory: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..Default::default()
            },
            spec: None,
            status: Some(NodeStatus {
                allocatable: Some(resource_list(cpu, memory)),
                capacity: Some(resource_list(cpu, memory)),
                ..Default::default()
            }),
        }
    }

    /// Build a replication controller with a pod template of requests
    fn rc(uid: Option<&str>, replicas: i32, cpu: &str, memory: &str) -> ReplicationController {
        ReplicationController {
            metadata: ObjectMeta {
                name: Some("web".to_owned()),
                namespace: Some("tenant-a".to_owned()),
                uid: uid.map(str::to_owned),
                ..Default::default()
            },
            spec: Some(ReplicationControllerSpec {
                replicas: Some(replicas),
                template: Some(PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "main".to_owned(),
                            resources: Some(ResourceRequirements {
                                requests: Some(resource_list(cpu, memory)),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }),
            status: None,
        }
    }

    /// A policy stub that always selects the oldest running pod
    struct OldestPodOnly;

    impl Allocator for OldestPodOnly {
        fn name(&self) -> &'static str {
            "oldest-pod"
        }

        fn group(&self, jobs: Vec<JobQuotaInfo>) -> HashMap<String, Vec<JobQuotaInfo>> {
            let mut groups: HashMap<String, Vec<JobQuotaInfo>> = HashMap::new();
            for job in jobs {
                groups.entry(job.namespace.clone()).or_default().push(job);
            }
            groups
        }

        fn allocate(
            &mut self,
            _jobs: &HashMap<String, Vec<JobQuotaInfo>>,
            _nodes: &[NodeInfo],
        ) -> HashMap<String, AllocationInfo> {
            HashMap::new()
        }

        fn assign(&self, _jobs: &mut [JobQuotaInfo], alloc: &AllocationInfo) -> Resource {
            alloc.allocated.clone()
        }

        fn reclaim(&self, job: &JobQuotaInfo, _res: &Resource) -> Vec<PodInfo> {
            job.running_pods.list().take(1).cloned().collect()
        }
    }

    #[test]
    fn test_shadow_quota_from_rc() {
        let shadow = shadow_quota(&rc(Some("rc-uid-1"), 3, "250m", "256Mi")).unwrap();
        // the rc's uid names the quota and its owner reference
        assert_eq!(shadow.metadata.name.as_deref(), Some("rc-uid-1"));
        assert_eq!(shadow.metadata.namespace.as_deref(), Some("tenant-a"));
        let owners = shadow.metadata.owner_references.unwrap();
        assert_eq!(owners[0].uid, "rc-uid-1");
        assert_eq!(owners[0].kind, "ReplicationController");
        // the spec mirrors the rc's replicas and pod template requests
        assert_eq!(shadow.spec.replicas, 3);
        let unit = Resource::new(&shadow.spec.request_unit);
        assert_eq!(unit, Resource { cpu: 250.0, memory: 268_435_456.0 });
    }

    #[test]
    fn test_shadow_quota_requires_uid() {
        assert!(shadow_quota(&rc(None, 3, "250m", "256Mi")).is_none());
    }

    #[test]
    fn test_allocate_assigns_entitlements() {
        let cache = Cache::new();
        cache.add_quota(&quota("uid-1", 2, "500m", "1Gi"));
        cache.add_node(&node("node-0", "4", "8Gi"));
        let mut allocator = policy::new_policy("drf").unwrap();
        let groups = allocate_jobs(&cache, &mut allocator);
        // the lone job is charged its full demand
        let job = &groups["tenant-a"][0];
        assert_eq!(job.allocated, Resource { cpu: 1000.0, memory: 2_147_483_648.0 });
    }

    #[test]
    fn test_reclaim_selects_and_marks_victims() {
        let cache = Cache::new();
        // an overused quota with two running pods
        let mut overused = quota("uid-1", 2, "500m", "512Mi");
        overused.status = Some(JobQuotaStatus {
            allocated: resource_list("1000m", "1Gi"),
            used: resource_list("2000m", "2Gi"),
        });
        cache.add_quota(&overused);
        cache.add_pod(&pod("worker-0", "uid-1", "500m", "512Mi"));
        cache.add_pod(&pod("worker-1", "uid-1", "500m", "512Mi"));
        // the stub policy only selects the oldest running pod
        let victims = select_victims(&cache, &OldestPodOnly);
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].name, "worker-0");
        // the selected pod is marked reclaiming but stays running
        let (quotas, _) = cache.get_snapshot();
        assert_eq!(quotas[0].reclaiming_pods.len(), 1);
        assert_eq!(quotas[0].running_pods.len(), 2);
    }

    #[test]
    fn test_reclaim_skips_quotas_within_entitlement() {
        let cache = Cache::new();
        // used matches allocated so nothing is overused
        let mut healthy = quota("uid-1", 2, "500m", "512Mi");
        healthy.status = Some(JobQuotaStatus {
            allocated: resource_list("1000m", "1Gi"),
            used: resource_list("1000m", "1Gi"),
        });
        cache.add_quota(&healthy);
        cache.add_pod(&pod("worker-0", "uid-1", "500m", "512Mi"));
        assert!(select_victims(&cache, &OldestPodOnly).is_empty());
    }

    #[tokio::test]
    async fn test_stopped_waits_for_signal() {
        // a sent stop signal releases the waiter
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(stopped(rx));
        tx.send(true).unwrap();
        waiter.await.unwrap();
        // a dropped sender releases the waiter too
        let (tx, rx) = watch::channel(false);
        drop(tx);
        stopped(rx).await;
    }
}
