//! ClusterClient trait for mocking
//!
//! The controller only ever talks to the cluster through this trait, so
//! reconcile logic can run against [`crate::MockClusterClient`] in tests.

use crate::error::ClusterError;
use crds::{
    KubeletConfig, MachineConfig, MachineConfigPool, PerformanceProfile, PerformanceProfileStatus,
    Tuned,
};
use k8s_openapi::api::node::v1::RuntimeClass;

/// Object store operations used by the performance profile controller
///
/// Reads of missing objects return [`ClusterError::NotFound`]. All async
/// methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    // Profile
    async fn get_profile(&self, name: &str) -> Result<PerformanceProfile, ClusterError>;
    async fn update_profile(&self, profile: &PerformanceProfile) -> Result<PerformanceProfile, ClusterError>;
    async fn patch_profile_status(&self, name: &str, status: &PerformanceProfileStatus) -> Result<(), ClusterError>;

    // MachineConfig (cluster-scoped)
    async fn get_machine_config(&self, name: &str) -> Result<MachineConfig, ClusterError>;
    async fn create_machine_config(&self, mc: &MachineConfig) -> Result<MachineConfig, ClusterError>;
    async fn update_machine_config(&self, mc: &MachineConfig) -> Result<MachineConfig, ClusterError>;
    async fn delete_machine_config(&self, name: &str) -> Result<(), ClusterError>;

    // KubeletConfig (cluster-scoped)
    async fn get_kubelet_config(&self, name: &str) -> Result<KubeletConfig, ClusterError>;
    async fn create_kubelet_config(&self, kc: &KubeletConfig) -> Result<KubeletConfig, ClusterError>;
    async fn update_kubelet_config(&self, kc: &KubeletConfig) -> Result<KubeletConfig, ClusterError>;
    async fn delete_kubelet_config(&self, name: &str) -> Result<(), ClusterError>;

    // Tuned (namespaced)
    async fn get_tuned(&self, namespace: &str, name: &str) -> Result<Tuned, ClusterError>;
    async fn list_tuned(&self, namespace: &str) -> Result<Vec<Tuned>, ClusterError>;
    async fn create_tuned(&self, tuned: &Tuned) -> Result<Tuned, ClusterError>;
    async fn update_tuned(&self, tuned: &Tuned) -> Result<Tuned, ClusterError>;
    async fn delete_tuned(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    // RuntimeClass (cluster-scoped)
    async fn get_runtime_class(&self, name: &str) -> Result<RuntimeClass, ClusterError>;
    async fn create_runtime_class(&self, rc: &RuntimeClass) -> Result<RuntimeClass, ClusterError>;
    async fn update_runtime_class(&self, rc: &RuntimeClass) -> Result<RuntimeClass, ClusterError>;
    async fn delete_runtime_class(&self, name: &str) -> Result<(), ClusterError>;

    // MachineConfigPool (read-only)

    /// Lists pools matching a label selector in list-call syntax (`k=v,...`)
    async fn list_machine_config_pools(&self, label_selector: &str) -> Result<Vec<MachineConfigPool>, ClusterError>;
}
