//! Idempotent application of generated components.
//!
//! Desired objects are compared with what the cluster holds and only the
//! ones whose spec, labels or annotations differ are written. When nothing
//! differs no write is issued at all.

use super::Reconciler;
use crate::components::{self, Components};
use crate::error::ControllerError;
use cluster_client::ClusterError;
use crds::{KubeletConfig, MachineConfig, PerformanceProfile, Tuned};
use k8s_openapi::api::node::v1::RuntimeClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A generated object whose desired state can be copied onto an existing one
pub trait Component: Resource + Clone + PartialEq {
    /// Overwrites everything except metadata with `desired`
    fn copy_spec(&mut self, desired: &Self);
}

impl Component for MachineConfig {
    fn copy_spec(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl Component for KubeletConfig {
    fn copy_spec(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl Component for Tuned {
    fn copy_spec(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
    }
}

impl Component for RuntimeClass {
    fn copy_spec(&mut self, desired: &Self) {
        self.handler = desired.handler.clone();
        self.scheduling = desired.scheduling.clone();
        self.overhead = desired.overhead.clone();
    }
}

fn merge_map(
    existing: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    let Some(desired) = desired.filter(|d| !d.is_empty()) else {
        return existing.cloned();
    };
    let mut merged = existing.cloned().unwrap_or_default();
    merged.extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
    Some(merged)
}

fn merged_meta(existing: &ObjectMeta, desired: &ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        labels: merge_map(existing.labels.as_ref(), desired.labels.as_ref()),
        annotations: merge_map(existing.annotations.as_ref(), desired.annotations.as_ref()),
        ..existing.clone()
    }
}

/// The object to write to bring `existing` to `desired`, or `None` when
/// they already agree.
///
/// Labels and annotations are merged with desired values winning.
pub fn mutated<K: Component>(existing: &K, desired: &K) -> Option<K> {
    let mut updated = existing.clone();
    *updated.meta_mut() = merged_meta(existing.meta(), desired.meta());
    updated.copy_spec(desired);
    (updated != *existing).then_some(updated)
}

/// Pending write for one component
#[derive(Debug, Clone, PartialEq)]
pub enum Write<K> {
    Create(K),
    Update(K),
    Unchanged,
}

impl<K> Write<K> {
    fn is_unchanged(&self) -> bool {
        matches!(self, Write::Unchanged)
    }
}

fn plan<K: Component>(existing: Option<K>, desired: K) -> Write<K> {
    match existing {
        None => Write::Create(desired),
        Some(existing) => mutated(&existing, &desired).map_or(Write::Unchanged, Write::Update),
    }
}

/// Maps not-found to `None`
fn found<K>(result: Result<K, ClusterError>) -> Result<Option<K>, ClusterError> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Maps not-found to success
fn deleted(result: Result<(), ClusterError>) -> Result<(), ClusterError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

impl Reconciler {
    /// Synthesizes the profile's components and writes the ones that
    /// changed. Returns whether anything was written.
    pub(crate) async fn apply_components(&self, profile: &PerformanceProfile) -> Result<bool, ControllerError> {
        let Components {
            machine_config,
            kubelet_config,
            tuned,
            runtime_class,
        } = components::synthesize(profile, &self.config)?;

        let tuned_namespace = tuned.namespace().unwrap_or_else(|| self.config.tuned_namespace.clone());

        let mc = plan(
            found(self.client.get_machine_config(&machine_config.name_any()).await)?,
            machine_config,
        );
        let kc = plan(
            found(self.client.get_kubelet_config(&kubelet_config.name_any()).await)?,
            kubelet_config,
        );
        let tuned_name = tuned.name_any();
        let tuned = plan(
            found(self.client.get_tuned(&tuned_namespace, &tuned_name).await)?,
            tuned,
        );
        let rc = plan(
            found(self.client.get_runtime_class(&runtime_class.name_any()).await)?,
            runtime_class,
        );

        if mc.is_unchanged() && kc.is_unchanged() && tuned.is_unchanged() && rc.is_unchanged() {
            debug!("Components of PerformanceProfile {} are up to date", profile.name_any());
            return Ok(false);
        }

        match mc {
            Write::Create(obj) => {
                self.client.create_machine_config(&obj).await?;
                self.applied("MachineConfig", &obj);
            }
            Write::Update(obj) => {
                self.client.update_machine_config(&obj).await?;
                self.applied("MachineConfig", &obj);
            }
            Write::Unchanged => {}
        }

        self.delete_outdated_tuned(profile, &tuned_namespace, &tuned_name).await?;
        match tuned {
            Write::Create(obj) => {
                self.client.create_tuned(&obj).await?;
                self.applied("Tuned", &obj);
            }
            Write::Update(obj) => {
                self.client.update_tuned(&obj).await?;
                self.applied("Tuned", &obj);
            }
            Write::Unchanged => {}
        }

        match kc {
            Write::Create(obj) => {
                self.client.create_kubelet_config(&obj).await?;
                self.applied("KubeletConfig", &obj);
            }
            Write::Update(obj) => {
                self.client.update_kubelet_config(&obj).await?;
                self.applied("KubeletConfig", &obj);
            }
            Write::Unchanged => {}
        }

        match rc {
            Write::Create(obj) => {
                self.client.create_runtime_class(&obj).await?;
                self.applied("RuntimeClass", &obj);
            }
            Write::Update(obj) => {
                self.client.update_runtime_class(&obj).await?;
                self.applied("RuntimeClass", &obj);
            }
            Write::Unchanged => {}
        }

        Ok(true)
    }

    fn applied<K: Resource>(&self, kind: &str, obj: &K) {
        info!("Applied {} {}", kind, obj.meta().name.as_deref().unwrap_or("<unknown>"));
        self.metrics.record_applied(kind);
    }

    /// Deletes Tuned objects owned by the profile under a name it no
    /// longer generates
    async fn delete_outdated_tuned(
        &self,
        profile: &PerformanceProfile,
        namespace: &str,
        current_name: &str,
    ) -> Result<(), ControllerError> {
        let Some(uid) = profile.uid() else {
            return Ok(());
        };

        for tuned in self.client.list_tuned(namespace).await? {
            let owned = tuned.owner_references().iter().any(|owner| owner.uid == uid);
            let name = tuned.name_any();
            if owned && name != current_name {
                info!("Deleting outdated Tuned {}/{}", namespace, name);
                deleted(self.client.delete_tuned(namespace, &name).await)?;
            }
        }
        Ok(())
    }

    /// Deletes every generated component; missing ones count as deleted
    pub(crate) async fn delete_components(&self, profile: &PerformanceProfile) -> Result<(), ClusterError> {
        let name = profile.name_any();
        let component = components::component_name(&name);

        deleted(
            self.client
                .delete_tuned(&self.config.tuned_namespace, &components::tuned_name(&name))
                .await,
        )?;
        deleted(self.client.delete_kubelet_config(&component).await)?;
        deleted(self.client.delete_runtime_class(&component).await)?;
        deleted(
            self.client
                .delete_machine_config(&components::machine_config_name(&name))
                .await,
        )?;
        Ok(())
    }

    /// Whether any generated component is still present
    pub(crate) async fn components_exist(&self, profile: &PerformanceProfile) -> Result<bool, ClusterError> {
        let name = profile.name_any();
        let component = components::component_name(&name);

        Ok(found(
            self.client
                .get_tuned(&self.config.tuned_namespace, &components::tuned_name(&name))
                .await,
        )?
        .is_some()
            || found(self.client.get_kubelet_config(&component).await)?.is_some()
            || found(self.client.get_runtime_class(&component).await)?.is_some()
            || found(
                self.client
                    .get_machine_config(&components::machine_config_name(&name))
                    .await,
            )?
            .is_some())
    }
}
