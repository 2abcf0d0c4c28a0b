mod pods;
mod quotas;

pub use pods::Pods;
pub use quotas::Quotas;

/// Kubernetes wrapper
pub struct K8s {
    /// Pod wrappers
    pub pods: Pods,
    /// Quota wrappers
    pub quotas: Quotas,
}

impl K8s {
    /// Builds a new k8s wrapper
    ///
    /// # Arguments
    ///
    /// * `client` - Kubernetes client
    pub fn new(client: &kube::Client) -> Self {
        // setup k8s wrappers
        let pods = Pods::new(client);
        let quotas = Quotas::new(client);
        K8s { pods, quotas }
    }
}
