//! Kubernetes-backed cluster client
//!
//! Implements [`ClusterClientTrait`] on top of kube `Api` handles. 404
//! responses are mapped to [`ClusterError::NotFound`].

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::{
    KubeletConfig, MachineConfig, MachineConfigPool, PerformanceProfile, PerformanceProfileStatus,
    Tuned,
};
use k8s_openapi::api::node::v1::RuntimeClass;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

/// Cluster client backed by a kube [`Client`]
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn not_found_or(kind: &str, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(format!("{kind} {name}")),
        e => ClusterError::Kube(e),
    }
}

async fn get_object<K>(api: &Api<K>, kind: &str, name: &str) -> Result<K, ClusterError>
where
    K: Clone + DeserializeOwned + Debug,
{
    api.get(name).await.map_err(|e| not_found_or(kind, name, e))
}

async fn create_object<K>(api: &Api<K>, kind: &str, obj: &K) -> Result<K, ClusterError>
where
    K: kube::Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    debug!("Creating {} {}", kind, obj.name_any());
    Ok(api.create(&PostParams::default(), obj).await?)
}

async fn replace_object<K>(api: &Api<K>, kind: &str, obj: &K) -> Result<K, ClusterError>
where
    K: kube::Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    let name = obj.name_any();
    debug!("Updating {} {}", kind, name);
    api.replace(&name, &PostParams::default(), obj)
        .await
        .map_err(|e| not_found_or(kind, &name, e))
}

async fn delete_object<K>(api: &Api<K>, kind: &str, name: &str) -> Result<(), ClusterError>
where
    K: Clone + DeserializeOwned + Debug,
{
    debug!("Deleting {} {}", kind, name);
    api.delete(name, &DeleteParams::default())
        .await
        .map(|_| ())
        .map_err(|e| not_found_or(kind, name, e))
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn get_profile(&self, name: &str) -> Result<PerformanceProfile, ClusterError> {
        let api: Api<PerformanceProfile> = Api::all(self.client.clone());
        get_object(&api, "PerformanceProfile", name).await
    }

    async fn update_profile(&self, profile: &PerformanceProfile) -> Result<PerformanceProfile, ClusterError> {
        let api: Api<PerformanceProfile> = Api::all(self.client.clone());
        replace_object(&api, "PerformanceProfile", profile).await
    }

    async fn patch_profile_status(&self, name: &str, status: &PerformanceProfileStatus) -> Result<(), ClusterError> {
        let api: Api<PerformanceProfile> = Api::all(self.client.clone());
        let status_patch = json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await
            .map(|_| ())
            .map_err(|e| not_found_or("PerformanceProfile", name, e))
    }

    async fn get_machine_config(&self, name: &str) -> Result<MachineConfig, ClusterError> {
        let api: Api<MachineConfig> = Api::all(self.client.clone());
        get_object(&api, "MachineConfig", name).await
    }

    async fn create_machine_config(&self, mc: &MachineConfig) -> Result<MachineConfig, ClusterError> {
        let api: Api<MachineConfig> = Api::all(self.client.clone());
        create_object(&api, "MachineConfig", mc).await
    }

    async fn update_machine_config(&self, mc: &MachineConfig) -> Result<MachineConfig, ClusterError> {
        let api: Api<MachineConfig> = Api::all(self.client.clone());
        replace_object(&api, "MachineConfig", mc).await
    }

    async fn delete_machine_config(&self, name: &str) -> Result<(), ClusterError> {
        let api: Api<MachineConfig> = Api::all(self.client.clone());
        delete_object(&api, "MachineConfig", name).await
    }

    async fn get_kubelet_config(&self, name: &str) -> Result<KubeletConfig, ClusterError> {
        let api: Api<KubeletConfig> = Api::all(self.client.clone());
        get_object(&api, "KubeletConfig", name).await
    }

    async fn create_kubelet_config(&self, kc: &KubeletConfig) -> Result<KubeletConfig, ClusterError> {
        let api: Api<KubeletConfig> = Api::all(self.client.clone());
        create_object(&api, "KubeletConfig", kc).await
    }

    async fn update_kubelet_config(&self, kc: &KubeletConfig) -> Result<KubeletConfig, ClusterError> {
        let api: Api<KubeletConfig> = Api::all(self.client.clone());
        replace_object(&api, "KubeletConfig", kc).await
    }

    async fn delete_kubelet_config(&self, name: &str) -> Result<(), ClusterError> {
        let api: Api<KubeletConfig> = Api::all(self.client.clone());
        delete_object(&api, "KubeletConfig", name).await
    }

    async fn get_tuned(&self, namespace: &str, name: &str) -> Result<Tuned, ClusterError> {
        let api: Api<Tuned> = Api::namespaced(self.client.clone(), namespace);
        get_object(&api, "Tuned", name).await
    }

    async fn list_tuned(&self, namespace: &str) -> Result<Vec<Tuned>, ClusterError> {
        let api: Api<Tuned> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn create_tuned(&self, tuned: &Tuned) -> Result<Tuned, ClusterError> {
        let namespace = tuned.namespace().unwrap_or_default();
        let api: Api<Tuned> = Api::namespaced(self.client.clone(), &namespace);
        create_object(&api, "Tuned", tuned).await
    }

    async fn update_tuned(&self, tuned: &Tuned) -> Result<Tuned, ClusterError> {
        let namespace = tuned.namespace().unwrap_or_default();
        let api: Api<Tuned> = Api::namespaced(self.client.clone(), &namespace);
        replace_object(&api, "Tuned", tuned).await
    }

    async fn delete_tuned(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let api: Api<Tuned> = Api::namespaced(self.client.clone(), namespace);
        delete_object(&api, "Tuned", name).await
    }

    async fn get_runtime_class(&self, name: &str) -> Result<RuntimeClass, ClusterError> {
        let api: Api<RuntimeClass> = Api::all(self.client.clone());
        get_object(&api, "RuntimeClass", name).await
    }

    async fn create_runtime_class(&self, rc: &RuntimeClass) -> Result<RuntimeClass, ClusterError> {
        let api: Api<RuntimeClass> = Api::all(self.client.clone());
        create_object(&api, "RuntimeClass", rc).await
    }

    async fn update_runtime_class(&self, rc: &RuntimeClass) -> Result<RuntimeClass, ClusterError> {
        let api: Api<RuntimeClass> = Api::all(self.client.clone());
        replace_object(&api, "RuntimeClass", rc).await
    }

    async fn delete_runtime_class(&self, name: &str) -> Result<(), ClusterError> {
        let api: Api<RuntimeClass> = Api::all(self.client.clone());
        delete_object(&api, "RuntimeClass", name).await
    }

    async fn list_machine_config_pools(&self, label_selector: &str) -> Result<Vec<MachineConfigPool>, ClusterError> {
        let api: Api<MachineConfigPool> = Api::all(self.client.clone());
        let lp = ListParams::default().labels(label_selector);
        Ok(api.list(&lp).await?.items)
    }
}
