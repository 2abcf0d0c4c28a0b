//! Dominant Resource Fairness allocation
//!
//! Namespaces are the fairness principals. The allocator progressively fills
//! the namespace with the smallest dominant share until no request fits into
//! what remains of the cluster.

use std::collections::HashMap;
use tracing::{event, Level};

use super::Allocator;
use crate::libs::models::{AllocationInfo, JobQuotaInfo, NodeInfo, PodInfo, Resource};
use crate::libs::queue::{Fifo, Priority, PriorityQueue};

/// One namespace competing for cluster resources
struct Consumer {
    /// The namespace this consumer represents
    name: String,
    /// This consumer's current dominant share
    share: f64,
    /// The resources this consumer has been granted so far
    deserved: Resource,
    /// The total resources this consumer's jobs request
    request: Resource,
    /// The jobs of this consumer in arrival order
    jobs: Fifo<JobQuotaInfo>,
}

/// A consumer's position in the filling queue
struct Ranked {
    /// The index of the consumer this rank belongs to
    idx: usize,
    /// The consumer's share when it was ranked
    share: f64,
}

impl Priority for Ranked {
    /// Consumers with the smallest share fill first
    fn priority(&self) -> f64 {
        self.share
    }
}

/// Compute a consumer's dominant share
///
/// The dominant axis is the one the consumer demands the larger fraction of;
/// on a tie the larger of the two deserved shares wins.
///
/// # Arguments
///
/// * `consumer` - The consumer to compute the share for
/// * `total` - The total resources in the cluster
fn dominant_share(consumer: &Consumer, total: &Resource) -> f64 {
    let cpu_demand = consumer.request.cpu / total.cpu;
    let mem_demand = consumer.request.memory / total.memory;
    // if the dominant resource is cpu return its share
    if cpu_demand > mem_demand {
        return consumer.deserved.cpu / total.cpu;
    }
    // if the dominant resource is memory return its share
    if cpu_demand < mem_demand {
        return consumer.deserved.memory / total.memory;
    }
    f64::max(
        consumer.deserved.cpu / total.cpu,
        consumer.deserved.memory / total.memory,
    )
}

/// The Dominant Resource Fairness allocator
#[derive(Default)]
pub struct Drf {
    /// The total resources in the cluster
    total: Resource,
    /// The resources still unallocated
    available: Resource,
    /// The consumers competing in the current run
    consumers: Vec<Consumer>,
}

impl Drf {
    /// Build one consumer per namespace from the grouped jobs
    ///
    /// # Arguments
    ///
    /// * `jobs` - The grouped jobs to build consumers from
    fn build_consumers(&self, jobs: &HashMap<String, Vec<JobQuotaInfo>>) -> Vec<Consumer> {
        let mut consumers = Vec::with_capacity(jobs.len());
        for (namespace, group) in jobs {
            // build this namespaces consumer
            let mut consumer = Consumer {
                name: namespace.clone(),
                share: 0.0,
                deserved: Resource::empty(),
                request: Resource::empty(),
                jobs: Fifo::new(),
            };
            // queue this consumers jobs and total up their demand
            for job in group {
                consumer.request.add(&job.request());
                consumer.jobs.add(job.clone());
            }
            consumers.push(consumer);
        }
        consumers
    }

    /// Rank all consumers into a fresh filling queue
    fn sort_consumers(&self) -> PriorityQueue<Ranked> {
        let mut queue = PriorityQueue::new();
        for (idx, consumer) in self.consumers.iter().enumerate() {
            queue.push(Ranked {
                idx,
                share: consumer.share,
            });
        }
        queue
    }
}

impl Allocator for Drf {
    /// The unique name of this allocator
    fn name(&self) -> &'static str {
        "drf"
    }

    /// Group jobs by the namespace they live in
    ///
    /// # Arguments
    ///
    /// * `jobs` - The jobs to group
    fn group(&self, jobs: Vec<JobQuotaInfo>) -> HashMap<String, Vec<JobQuotaInfo>> {
        let mut groups: HashMap<String, Vec<JobQuotaInfo>> = HashMap::new();
        for job in jobs {
            groups.entry(job.namespace.clone()).or_default().push(job);
        }
        groups
    }

    /// Progressively fill namespaces by dominant share
    ///
    /// # Arguments
    ///
    /// * `jobs` - The grouped jobs to allocate resources for
    /// * `nodes` - The nodes whose resources are being divided
    fn allocate(
        &mut self,
        jobs: &HashMap<String, Vec<JobQuotaInfo>>,
        nodes: &[NodeInfo],
    ) -> HashMap<String, AllocationInfo> {
        let mut allocation = HashMap::new();
        // nothing to divide or nothing to divide between
        if nodes.is_empty() || jobs.is_empty() {
            return allocation;
        }
        // total up the allocatable resources in the cluster
        self.total = Resource::empty();
        self.available = Resource::empty();
        for node in nodes {
            self.total.add(&node.allocatable);
            self.available.add(&node.allocatable);
        }
        self.consumers = self.build_consumers(jobs);
        let total = self.total.clone();
        // keep making passes until a full pass allocates nothing
        loop {
            // rank all consumers by their current share
            let mut queue = self.sort_consumers();
            let mut allocated_once = false;
            event!(Level::DEBUG, total = %self.total, available = %self.available);
            loop {
                // stop this pass once the cluster is drained
                if self.available.is_empty() {
                    break;
                }
                // grab the consumer with the smallest share
                let Some(ranked) = queue.pop() else {
                    break;
                };
                // a consumer with no jobs left drops out of this pass
                let Some(job) = self.consumers[ranked.idx].jobs.pop() else {
                    continue;
                };
                let req = job.request();
                // skip jobs the remaining resources cannot hold
                if !req.less_equal(&self.available) {
                    continue;
                }
                // grant this job and reorder the consumer by its new share
                self.available.sub(&req);
                let consumer = &mut self.consumers[ranked.idx];
                consumer.deserved.add(&req);
                consumer.share = dominant_share(consumer, &total);
                let share = consumer.share;
                event!(
                    Level::DEBUG,
                    consumer = consumer.name,
                    share = share,
                    available = %self.available
                );
                queue.push(Ranked {
                    idx: ranked.idx,
                    share,
                });
                allocated_once = true;
            }
            if !allocated_once {
                break;
            }
        }
        // emit each consumers allocation
        for consumer in &self.consumers {
            allocation.insert(
                consumer.name.clone(),
                AllocationInfo {
                    group_id: consumer.name.clone(),
                    allocated: consumer.deserved.clone(),
                    used: Resource::empty(),
                },
            );
        }
        allocation
    }

    /// Charge a group's allocation to its jobs in arrival order
    ///
    /// Each job takes its full demand or nothing; the first job that does not
    /// fit ends the walk.
    ///
    /// # Arguments
    ///
    /// * `jobs` - The jobs in this group in arrival order
    /// * `alloc` - The allocation this group received
    fn assign(&self, jobs: &mut [JobQuotaInfo], alloc: &AllocationInfo) -> Resource {
        let mut remaining = alloc.allocated.clone();
        event!(Level::DEBUG, allocated = %remaining, jobs = jobs.len());
        for job in jobs.iter_mut() {
            let req = job.request();
            // all or nothing per job
            if !req.less_equal(&remaining) {
                break;
            }
            remaining.sub(&req);
            job.allocated = req;
        }
        remaining
    }

    /// Select the pods to evict for an overused job
    ///
    /// Every running pod is returned regardless of the requested overshoot.
    ///
    /// # Arguments
    ///
    /// * `job` - The overused job
    /// * `res` - The overshoot to reclaim
    fn reclaim(&self, job: &JobQuotaInfo, _res: &Resource) -> Vec<PodInfo> {
        job.running_pods.list().cloned().collect()
    }
}
