//! The allocation policies that divide cluster resources between tenants

use std::collections::HashMap;

use super::models::{AllocationInfo, JobQuotaInfo, NodeInfo, PodInfo, Resource};

mod drf;

pub use drf::Drf;

/// The methods required to be used as an allocation policy
pub trait Allocator: Sync {
    /// The unique name of this allocator
    fn name(&self) -> &'static str;

    /// Group jobs into buckets that resources are allocated across
    ///
    /// # Arguments
    ///
    /// * `jobs` - The jobs to group
    fn group(&self, jobs: Vec<JobQuotaInfo>) -> HashMap<String, Vec<JobQuotaInfo>>;

    /// Allocate the cluster's resources to each group
    ///
    /// # Arguments
    ///
    /// * `jobs` - The grouped jobs to allocate resources for
    /// * `nodes` - The nodes whose resources are being divided
    fn allocate(
        &mut self,
        jobs: &HashMap<String, Vec<JobQuotaInfo>>,
        nodes: &[NodeInfo],
    ) -> HashMap<String, AllocationInfo>;

    /// Assign a group's allocation to its jobs and return what remains
    ///
    /// # Arguments
    ///
    /// * `jobs` - The jobs in this group in arrival order
    /// * `alloc` - The allocation this group received
    fn assign(&self, jobs: &mut [JobQuotaInfo], alloc: &AllocationInfo) -> Resource;

    /// Select the pods to evict to drive a job back toward its entitlement
    ///
    /// # Arguments
    ///
    /// * `job` - The overused job
    /// * `res` - The overshoot to reclaim
    fn reclaim(&self, job: &JobQuotaInfo, res: &Resource) -> Vec<PodInfo>;
}

/// Build an allocation policy by name
///
/// # Arguments
///
/// * `name` - The name of the policy to build
pub fn new_policy(name: &str) -> Option<Box<dyn Allocator + Send>> {
    match name {
        "drf" => Some(Box::new(Drf::default())),
        _ => None,
    }
}
