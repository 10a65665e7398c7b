//! RuntimeClass synthesis.

use super::{SynthesisError, component_name, owner_reference};
use crate::config::RUNTIME_HANDLER;
use crds::PerformanceProfile;
use k8s_openapi::api::node::v1::{RuntimeClass, Scheduling};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

/// Builds `performance-<profile>`, scheduling pods onto the profile's nodes.
pub fn build(profile: &PerformanceProfile) -> Result<RuntimeClass, SynthesisError> {
    Ok(RuntimeClass {
        metadata: ObjectMeta {
            name: Some(component_name(&profile.name_any())),
            owner_references: Some(vec![owner_reference(profile)?]),
            ..Default::default()
        },
        handler: RUNTIME_HANDLER.to_string(),
        scheduling: Some(Scheduling {
            node_selector: Some(profile.spec.node_selector.clone()),
            tolerations: None,
        }),
        overhead: None,
    })
}
