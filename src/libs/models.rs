//! The entities the allocation controller tracks
//!
//! These are lossy projections of the k8s objects the controller watches. They
//! carry only the fields allocation and reclamation decisions need.

use k8s_openapi::api::core::v1::{Node, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::{event, Level};

use super::crds::{JobQuota, JobQuotaStatus, ResourceList};
use super::helpers;
use super::queue::{Fifo, Keyed};

/// The smallest millicpu amount considered non-empty
const MIN_MILLI_CPU: f64 = 10.0;
/// The smallest memory amount in bytes considered non-empty (10 MiB)
const MIN_MEMORY: f64 = 10.0 * 1024.0 * 1024.0;

/// A two dimensional resource amount
///
/// Both axes are real valued so they can participate in share ratios without
/// integer rounding bias. Components may go negative transiently while
/// subtracting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    /// The amount of millicpu
    pub cpu: f64,
    /// The amount of memory in bytes
    pub memory: f64,
}

impl Resource {
    /// Create an empty resource
    pub fn empty() -> Self {
        Resource::default()
    }

    /// Create a resource from a k8s resource list
    ///
    /// Unparsable quantities count as zero.
    ///
    /// # Arguments
    ///
    /// * `list` - The resource list to convert
    pub fn new(list: &ResourceList) -> Self {
        Resource {
            cpu: helpers::cpu(list.get("cpu")).unwrap_or_default(),
            memory: helpers::memory(list.get("memory")).unwrap_or_default(),
        }
    }

    /// Convert this resource to a k8s resource list
    ///
    /// The canonical forms are decimal milli-units for cpu and binary bytes
    /// for memory.
    pub fn resource_list(&self) -> ResourceList {
        let mut list = ResourceList::new();
        list.insert("cpu".to_owned(), Quantity(format!("{}m", self.cpu as i64)));
        list.insert("memory".to_owned(), Quantity(format!("{}", self.memory as i64)));
        list
    }

    /// Add another resource to this one
    ///
    /// # Arguments
    ///
    /// * `other` - The resource to add
    pub fn add(&mut self, other: &Resource) -> &mut Self {
        self.cpu += other.cpu;
        self.memory += other.memory;
        self
    }

    /// Subtract another resource from this one
    ///
    /// # Arguments
    ///
    /// * `other` - The resource to subtract
    pub fn sub(&mut self, other: &Resource) -> &mut Self {
        self.cpu -= other.cpu;
        self.memory -= other.memory;
        self
    }

    /// Scale this resource by a replica count
    ///
    /// # Arguments
    ///
    /// * `replicas` - The replica count to scale by
    pub fn scale(&mut self, replicas: i32) -> &mut Self {
        self.cpu *= f64::from(replicas);
        self.memory *= f64::from(replicas);
        self
    }

    /// Check if this resource is strictly smaller than another on both axes
    ///
    /// # Arguments
    ///
    /// * `other` - The resource to compare against
    pub fn less(&self, other: &Resource) -> bool {
        self.cpu < other.cpu && self.memory < other.memory
    }

    /// Check if this resource fits into another within a small tolerance
    ///
    /// The tolerance (0.01 millicpu / 1 byte) keeps a run of equal requests
    /// from churning across repeated fills due to floating drift.
    ///
    /// # Arguments
    ///
    /// * `other` - The resource to compare against
    pub fn less_equal(&self, other: &Resource) -> bool {
        (self.cpu < other.cpu || (self.cpu - other.cpu).abs() < 0.01)
            && (self.memory < other.memory || (self.memory - other.memory).abs() < 1.0)
    }

    /// Check if this resource is too small to schedule anything with
    pub fn is_empty(&self) -> bool {
        self.cpu < MIN_MILLI_CPU && self.memory < MIN_MEMORY
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "cpu {}, mem {}", self.cpu, self.memory)
    }
}

/// Sum the resource requests of a pod spec's containers
///
/// Init containers are ignored for allocation purposes.
///
/// # Arguments
///
/// * `spec` - The pod spec to sum requests over
pub fn resource_request(spec: &PodSpec) -> Resource {
    // sum the requests over every container in this pod
    let mut result = Resource::empty();
    for container in &spec.containers {
        // skip any containers without resource requests
        let requests = match container.resources.as_ref().and_then(|res| res.requests.as_ref()) {
            Some(requests) => requests,
            None => continue,
        };
        // add this containers cpu request
        match helpers::cpu(requests.get("cpu")) {
            Ok(cpu) => result.cpu += cpu,
            Err(error) => event!(Level::DEBUG, container = container.name, error = %error),
        }
        // add this containers memory request
        match helpers::memory(requests.get("memory")) {
            Ok(memory) => result.memory += memory,
            Err(error) => event!(Level::DEBUG, container = container.name, error = %error),
        }
    }
    result
}

/// The phase a pod is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    /// The pod has been accepted but is not running yet
    Pending,
    /// The pod is bound to a node and running
    Running,
    /// All of the pod's containers terminated successfully
    Succeeded,
    /// At least one of the pod's containers terminated in failure
    Failed,
    /// The pod's phase could not be determined
    Unknown,
}

impl PodPhase {
    /// Parse a pod phase from the k8s status string
    ///
    /// # Arguments
    ///
    /// * `raw` - The raw phase string if one is set
    pub fn parse(raw: Option<&String>) -> Self {
        match raw.map(String::as_str) {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// Info on a single owned pod
#[derive(Debug, Clone)]
pub struct PodInfo {
    /// The uid of this pods single owner
    pub owner: String,
    /// The name of this pod
    pub name: String,
    /// The namespace this pod lives in
    pub namespace: String,
    /// The name of the consumer that owns this pod
    pub consumer_name: String,
    /// The phase this pod is in
    pub phase: PodPhase,
    /// The node this pod is scheduled on
    pub hostname: String,
    /// The resources this pod requests
    pub resource: Resource,
}

impl PodInfo {
    /// Build info for a pod with exactly one owner
    ///
    /// Pods without a unique owner are not tracked and return `None`.
    ///
    /// # Arguments
    ///
    /// * `pod` - The pod to build info for
    pub fn new(pod: &Pod) -> Option<Self> {
        // only track pods with exactly one owner reference
        let owners = pod.metadata.owner_references.as_deref().unwrap_or_default();
        if owners.len() != 1 {
            return None;
        }
        // get this pods resource requests
        let resource = pod
            .spec
            .as_ref()
            .map(resource_request)
            .unwrap_or_default();
        Some(PodInfo {
            owner: owners[0].uid.clone(),
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            consumer_name: owners[0].name.clone(),
            phase: PodPhase::parse(pod.status.as_ref().and_then(|status| status.phase.as_ref())),
            hostname: pod
                .spec
                .as_ref()
                .and_then(|spec| spec.node_name.clone())
                .unwrap_or_default(),
            resource,
        })
    }
}

impl Keyed for PodInfo {
    /// Pods are keyed by namespace and name
    fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl std::fmt::Display for PodInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Info on a single node's resources
#[derive(Debug, Clone)]
pub struct NodeInfo {
    /// The name of this node
    pub name: String,
    /// The resources this node can schedule
    pub allocatable: Resource,
    /// The resources currently allocated on this node
    ///
    /// Starts at zero; the current allocator treats the cluster as a single
    /// pool and only reads `allocatable`.
    pub allocated: Resource,
    /// The total resources this node has
    pub capacity: Resource,
}

impl NodeInfo {
    /// Build info for a node
    ///
    /// # Arguments
    ///
    /// * `node` - The node to build info for
    pub fn new(node: &Node) -> Self {
        NodeInfo {
            name: node.metadata.name.clone().unwrap_or_default(),
            allocatable: node
                .status
                .as_ref()
                .and_then(|status| status.allocatable.as_ref())
                .map(Resource::new)
                .unwrap_or_default(),
            allocated: Resource::empty(),
            capacity: node
                .status
                .as_ref()
                .and_then(|status| status.capacity.as_ref())
                .map(Resource::new)
                .unwrap_or_default(),
        }
    }
}

/// Info on a single job quota and its pods
#[derive(Debug, Clone)]
pub struct JobQuotaInfo {
    /// The quota object this info was built from
    pub quota: JobQuota,
    /// The uid of the consumer this quota is charged to
    pub consumer_id: String,
    /// The namespace this quota lives in
    pub namespace: String,
    /// The number of replicas this job runs
    pub replicas: i32,
    /// The resources a single replica requests
    pub request_unit: Resource,
    /// The resources allocated to this job
    pub allocated: Resource,
    /// The resources used by this job's consumer
    pub used: Resource,
    /// The pods of this job that are currently running
    pub running_pods: Fifo<PodInfo>,
    /// The pods of this job that are being reclaimed
    pub reclaiming_pods: Fifo<PodInfo>,
}

impl JobQuotaInfo {
    /// Build info for a quota object
    ///
    /// # Arguments
    ///
    /// * `quota` - The quota object to build info for
    pub fn new(quota: &JobQuota) -> Self {
        // the consumer is only known when the quota has exactly one owner
        let owners = quota.metadata.owner_references.as_deref().unwrap_or_default();
        let consumer_id = match owners {
            [owner] => owner.uid.clone(),
            _ => String::new(),
        };
        // read the current entitlement and consumption from the status
        let status = quota.status.clone().unwrap_or_default();
        JobQuotaInfo {
            quota: quota.clone(),
            consumer_id,
            namespace: quota.metadata.namespace.clone().unwrap_or_default(),
            replicas: quota.spec.replicas,
            request_unit: Resource::new(&quota.spec.request_unit),
            allocated: Resource::new(&status.allocated),
            used: Resource::new(&status.used),
            running_pods: Fifo::new(),
            reclaiming_pods: Fifo::new(),
        }
    }

    /// The total demand of this job across all replicas
    pub fn request(&self) -> Resource {
        let mut request = self.request_unit.clone();
        request.scale(self.replicas);
        request
    }

    /// Build the status to write back to this quota's object
    pub fn status(&self) -> JobQuotaStatus {
        JobQuotaStatus {
            allocated: self.allocated.resource_list(),
            used: self.used.resource_list(),
        }
    }
}

impl Keyed for JobQuotaInfo {
    /// Quotas are keyed by the uid of their consumer
    fn key(&self) -> String {
        self.consumer_id.clone()
    }
}

/// The allocation computed for one group of jobs
#[derive(Debug, Clone)]
pub struct AllocationInfo {
    /// The id of the group this allocation is for
    pub group_id: String,
    /// The resources allocated to this group
    pub allocated: Resource,
    /// The resources used by this group
    pub used: Resource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, NodeStatus, PodStatus, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::core::ObjectMeta;
    use std::collections::BTreeMap;

    /// Build a resource list from raw quantity strings
    fn resource_list(cpu: &str, memory: &str) -> ResourceList {
        let mut list = BTreeMap::new();
        list.insert("cpu".to_owned(), Quantity(cpu.to_owned()));
        list.insert("memory".to_owned(), Quantity(memory.to_owned()));
        list
    }

    /// Build a pod with the given owners and one container of requests
    fn pod(owners: Vec<OwnerReference>, cpu: &str, memory: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("worker-0".to_owned()),
                namespace: Some("tenant-a".to_owned()),
                owner_references: Some(owners),
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

    /// Build an owner reference with the given uid
    fn owner(uid: &str) -> OwnerReference {
        OwnerReference {
            uid: uid.to_owned(),
            name: "job".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resource_add_sub_scale() {
        let mut resource = Resource { cpu: 500.0, memory: 1024.0 };
        resource
            .add(&Resource { cpu: 500.0, memory: 1024.0 })
            .scale(2)
            .sub(&Resource { cpu: 1000.0, memory: 2048.0 });
        assert_eq!(resource, Resource { cpu: 1000.0, memory: 2048.0 });
    }

    #[test]
    fn test_resource_sub_may_go_negative() {
        let mut resource = Resource { cpu: 100.0, memory: 100.0 };
        resource.sub(&Resource { cpu: 200.0, memory: 300.0 });
        assert_eq!(resource.cpu, -100.0);
        assert_eq!(resource.memory, -200.0);
    }

    #[test]
    fn test_resource_less_requires_both_axes() {
        let small = Resource { cpu: 100.0, memory: 100.0 };
        let large = Resource { cpu: 200.0, memory: 200.0 };
        let mixed = Resource { cpu: 50.0, memory: 300.0 };
        assert!(small.less(&large));
        assert!(!large.less(&small));
        assert!(!mixed.less(&large));
    }

    #[test]
    fn test_resource_less_equal_tolerance() {
        let left = Resource { cpu: 1000.005, memory: 2048.5 };
        let right = Resource { cpu: 1000.0, memory: 2048.0 };
        // within 0.01 millicpu and 1 byte counts as fitting
        assert!(left.less_equal(&right));
        let drifted = Resource { cpu: 1000.5, memory: 2048.0 };
        assert!(!drifted.less_equal(&right));
    }

    #[test]
    fn test_resource_is_empty() {
        assert!(Resource { cpu: 9.0, memory: 1024.0 }.is_empty());
        assert!(!Resource { cpu: 10.0, memory: 1024.0 }.is_empty());
        assert!(!Resource { cpu: 0.0, memory: 11.0 * 1024.0 * 1024.0 }.is_empty());
    }

    #[test]
    fn test_resource_list_round_trip() {
        let resource = Resource { cpu: 1500.0, memory: 2_147_483_648.0 };
        let rebuilt = Resource::new(&resource.resource_list());
        assert!(rebuilt.less_equal(&resource));
        assert!(resource.less_equal(&rebuilt));
    }

    #[test]
    fn test_pod_info_requires_single_owner() {
        // a pod with no owners is not tracked
        assert!(PodInfo::new(&pod(Vec::new(), "500m", "1Gi")).is_none());
        // a pod with two owners is not tracked either
        let owners = vec![owner("uid-1"), owner("uid-2")];
        assert!(PodInfo::new(&pod(owners, "500m", "1Gi")).is_none());
        // a single owner builds info
        let info = PodInfo::new(&pod(vec![owner("uid-1")], "500m", "1Gi")).unwrap();
        assert_eq!(info.owner, "uid-1");
        assert_eq!(info.phase, PodPhase::Running);
        assert_eq!(info.resource, Resource { cpu: 500.0, memory: 1_073_741_824.0 });
        assert_eq!(info.key(), "tenant-a/worker-0");
    }

    #[test]
    fn test_resource_request_ignores_init_containers() {
        let mut pod = pod(vec![owner("uid-1")], "500m", "1Gi");
        // add an init container that must not be counted
        if let Some(spec) = pod.spec.as_mut() {
            spec.init_containers = Some(vec![Container {
                name: "init".to_owned(),
                resources: Some(ResourceRequirements {
                    requests: Some(resource_list("4", "4Gi")),
                    ..Default::default()
                }),
                ..Default::default()
            }]);
        }
        let info = PodInfo::new(&pod).unwrap();
        assert_eq!(info.resource, Resource { cpu: 500.0, memory: 1_073_741_824.0 });
    }

    #[test]
    fn test_node_info_clone_keeps_fields() {
        let node = Node {
            metadata: ObjectMeta {
                name: Some("node-0".to_owned()),
                ..Default::default()
            },
            spec: None,
            status: Some(NodeStatus {
                allocatable: Some(resource_list("4", "8Gi")),
                capacity: Some(resource_list("4", "8Gi")),
                ..Default::default()
            }),
        };
        let info = NodeInfo::new(&node);
        let clone = info.clone();
        // each field of the clone comes from its own source field
        assert_eq!(clone.allocatable, info.allocatable);
        assert_eq!(clone.allocated, Resource::empty());
        assert_eq!(clone.capacity, info.capacity);
    }

    #[test]
    fn test_quota_info_maps_status() {
        let mut quota = JobQuota::new("job-quota", crate::libs::crds::JobQuotaSpec {
            replicas: 2,
            request_unit: resource_list("500m", "1Gi"),
        });
        quota.metadata.namespace = Some("tenant-a".to_owned());
        quota.metadata.owner_references = Some(vec![owner("uid-1")]);
        quota.status = Some(JobQuotaStatus {
            allocated: resource_list("1000m", "2Gi"),
            used: resource_list("2000m", "4Gi"),
        });
        let info = JobQuotaInfo::new(&quota);
        assert_eq!(info.consumer_id, "uid-1");
        assert_eq!(info.replicas, 2);
        // allocated comes from status.allocated and used from status.used
        assert_eq!(info.allocated, Resource { cpu: 1000.0, memory: 2_147_483_648.0 });
        assert_eq!(info.used, Resource { cpu: 2000.0, memory: 4_294_967_296.0 });
        // total demand is the request unit scaled by replicas
        assert_eq!(info.request(), Resource { cpu: 1000.0, memory: 2_147_483_648.0 });
    }
}
