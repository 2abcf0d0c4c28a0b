use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use serde_json::json;

use crate::errors::Error;
use crate::libs::crds::JobQuota;
use crate::libs::models::JobQuotaInfo;

/// Wrapper for job quota api routes in k8s
#[derive(Clone)]
pub struct Quotas {
    /// Client to use for creating namespaced clients
    client: kube::Client,
}

impl Quotas {
    /// Creates new quotas wrapper
    ///
    /// # Arguments
    ///
    /// * `client` - Kubernetes client
    pub fn new(client: &kube::Client) -> Self {
        Quotas {
            client: client.clone(),
        }
    }

    /// Build a quota api client for a specific namespace
    ///
    /// # Arguments
    ///
    /// * `ns` - The namespace to build a client for
    fn api(&self, ns: &str) -> Api<JobQuota> {
        Api::namespaced(self.client.clone(), ns)
    }

    /// Write a job's computed entitlement back to its quota's status
    ///
    /// # Arguments
    ///
    /// * `job` - The job whose status to write
    pub async fn update_status(&self, job: &JobQuotaInfo) -> Result<(), Error> {
        // quotas that never made it into the cluster cannot be updated
        let name = match &job.quota.metadata.name {
            Some(name) => name,
            None => return Err(Error::new("quota does not have a name")),
        };
        // patch just the status subresource
        let patch = Patch::Merge(json!({"status": job.status()}));
        self.api(&job.namespace)
            .patch_status(name, &PatchParams::default(), &patch)
            .await?;
        Ok(())
    }

    /// Get a quota in a specific namespace
    ///
    /// # Arguments
    ///
    /// * `ns` - The namespace to get this quota from
    /// * `name` - The name of the quota to get
    pub async fn get(&self, ns: &str, name: &str) -> Result<JobQuota, Error> {
        Ok(self.api(ns).get(name).await?)
    }

    /// Create a quota in a specific namespace
    ///
    /// # Arguments
    ///
    /// * `ns` - The namespace to create this quota in
    /// * `quota` - The quota to create
    pub async fn create(&self, ns: &str, quota: &JobQuota) -> Result<JobQuota, Error> {
        Ok(self.api(ns).create(&PostParams::default(), quota).await?)
    }

    /// Replace a quota in a specific namespace
    ///
    /// # Arguments
    ///
    /// * `ns` - The namespace to replace this quota in
    /// * `quota` - The quota to replace
    pub async fn update(&self, ns: &str, quota: &JobQuota) -> Result<JobQuota, Error> {
        let name = match &quota.metadata.name {
            Some(name) => name,
            None => return Err(Error::new("quota does not have a name")),
        };
        Ok(self
            .api(ns)
            .replace(name, &PostParams::default(), quota)
            .await?)
    }

    /// Delete a quota in a specific namespace
    ///
    /// # Arguments
    ///
    /// * `ns` - The namespace to delete this quota from
    /// * `name` - The name of the quota to delete
    pub async fn delete(&self, ns: &str, name: &str) -> Result<(), Error> {
        self.api(ns).delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}
