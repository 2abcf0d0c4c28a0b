use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams};

use crate::errors::Error;

/// Wrapper for pod api routes in k8s
#[derive(Clone)]
pub struct Pods {
    /// Client to use for creating namespaced clients
    client: kube::Client,
}

impl Pods {
    /// Creates new pods wrapper
    ///
    /// # Arguments
    ///
    /// * `client` - Kubernetes client
    pub fn new(client: &kube::Client) -> Self {
        Pods {
            client: client.clone(),
        }
    }

    /// Delete a pod in a specific namespace
    ///
    /// # Arguments
    ///
    /// * `ns` - The namespace to delete this pod from
    /// * `name` - The name of the pod to delete
    pub async fn delete(&self, ns: &str, name: &str) -> Result<(), Error> {
        // build a pod api client for this namespace
        let api: Api<Pod> = Api::namespaced(self.client.clone(), ns);
        // delete this pod immediately
        let params = DeleteParams::default().grace_period(0);
        api.delete(name, &params).await?;
        Ok(())
    }
}
