//! The controller responsible for fair sharing cluster resources between batch job tenants

pub mod args;
pub mod conf;
pub mod errors;
mod libs;
pub mod utils;

pub use errors::Error;
pub use libs::policy;
pub use libs::{
    AllocationInfo, Cache, Fifo, JobQuota, JobQuotaInfo, JobQuotaSpec, JobQuotaStatus, Keyed,
    NodeInfo, PodInfo, PodPhase, Priority, PriorityQueue, QuotaController, Resource,
};
