//! The JobQuota custom resource consumed and written by the quota controller

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::schema::{InstanceType, ObjectValidation, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A list of resource quantities keyed by resource name
pub type ResourceList = BTreeMap<String, Quantity>;

/// Generate an openapi schema for a resource list
///
/// Quantities serialize as strings so the schema is a string map.
fn resource_list_schema(_: &mut schemars::gen::SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        object: Some(Box::new(ObjectValidation {
            additional_properties: Some(Box::new(Schema::Object(SchemaObject {
                instance_type: Some(InstanceType::String.into()),
                ..Default::default()
            }))),
            ..Default::default()
        })),
        ..Default::default()
    })
}

/// JobQuota CRD definition
///
/// One quota object exists per replicated batch job. Its single owner
/// reference identifies the consumer the quota is charged to.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "quotad.io",
    version = "v1",
    kind = "JobQuota",
    namespaced,
    status = "JobQuotaStatus",
    doc = "Custom resource tracking the resource entitlement of a batch job"
)]
#[serde(rename_all = "camelCase")]
pub struct JobQuotaSpec {
    /// The number of replicas this job runs
    #[serde(default)]
    pub replicas: i32,
    /// The resources a single replica requests
    #[serde(default)]
    #[schemars(schema_with = "resource_list_schema")]
    pub request_unit: ResourceList,
}

/// The status of a JobQuota
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobQuotaStatus {
    /// The resources allocated to this job by the controller
    #[serde(default)]
    #[schemars(schema_with = "resource_list_schema")]
    pub allocated: ResourceList,
    /// The resources used by this job's consumer
    #[serde(default)]
    #[schemars(schema_with = "resource_list_schema")]
    pub used: ResourceList,
}
