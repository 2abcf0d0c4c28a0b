mod cache;
mod controller;
mod crds;
mod helpers;
mod k8s;
mod models;
pub mod policy;
mod queue;

pub use cache::Cache;
pub use controller::QuotaController;
pub use crds::{JobQuota, JobQuotaSpec, JobQuotaStatus};
pub use models::{AllocationInfo, JobQuotaInfo, NodeInfo, PodInfo, PodPhase, Resource};
pub use queue::{Fifo, Keyed, Priority, PriorityQueue};
