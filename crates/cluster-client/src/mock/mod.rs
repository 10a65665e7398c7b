//! Mock ClusterClient for unit testing
//!
//! In-memory object store implementing [`ClusterClientTrait`]. Every
//! mutating call is recorded (`"<verb> <Kind> <key>"`) so tests can assert
//! on exactly what a reconcile wrote, and any operation can be made to fail.
//!
//! - `store.rs` - generic get/create/update/delete over one kind
//! - `events.rs` - [`MockEventRecorder`]

mod events;
mod store;

pub use events::{MockEventRecorder, RecordedEvent};

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::{
    KubeletConfig, MachineConfig, MachineConfigPool, PerformanceProfile, PerformanceProfileStatus,
    Tuned,
};
use k8s_openapi::api::node::v1::RuntimeClass;
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use store::Store;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    pub(crate) profiles: Store<PerformanceProfile>,
    pub(crate) machine_configs: Store<MachineConfig>,
    pub(crate) kubelet_configs: Store<KubeletConfig>,
    pub(crate) tuneds: Store<Tuned>,
    pub(crate) runtime_classes: Store<RuntimeClass>,
    pub(crate) pools: Store<MachineConfigPool>,
    // "<verb> <Kind> <key>" for every successful mutating call
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    // "<verb> <Kind>" -> error message
    pub(crate) failures: Arc<Mutex<HashMap<String, String>>>,
    // "<Kind> <key>" of objects deleted while deletion is deferred
    pub(crate) terminating: Arc<Mutex<BTreeSet<String>>>,
    pub(crate) deferred_deletion: Arc<AtomicBool>,
    pub(crate) next_uid: Arc<AtomicU64>,
}

impl MockClusterClient {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes only mark objects as terminating; they stay readable until
    /// [`Self::collect_garbage`] runs, like objects held by the garbage collector.
    pub fn with_deferred_deletion(self) -> Self {
        self.deferred_deletion.store(true, Ordering::SeqCst);
        self
    }

    /// Removes every object deleted while deletion was deferred
    pub fn collect_garbage(&self) {
        let terminating: Vec<String> = std::mem::take(&mut *lock(&self.terminating)).into_iter().collect();
        for entry in terminating {
            let Some((kind, key)) = entry.split_once(' ') else {
                continue;
            };
            match kind {
                "MachineConfig" => self.machine_configs.remove(key),
                "KubeletConfig" => self.kubelet_configs.remove(key),
                "Tuned" => self.tuneds.remove(key),
                "RuntimeClass" => self.runtime_classes.remove(key),
                _ => {}
            }
        }
    }

    /// Makes every `<verb> <Kind>` call fail with `message`
    /// (verbs: get, list, create, update, update_status, delete)
    pub fn fail_on(&self, operation: &str, message: &str) {
        lock(&self.failures).insert(operation.to_string(), message.to_string());
    }

    /// Clears injected failures
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Mutating calls recorded so far
    pub fn mutating_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Forgets recorded calls
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Seeds a profile (test setup, not recorded)
    pub fn add_profile(&self, profile: PerformanceProfile) {
        self.profiles.insert(profile);
    }

    /// Seeds a machine config pool (test setup, not recorded)
    pub fn add_pool(&self, pool: MachineConfigPool) {
        self.pools.insert(pool);
    }

    /// Seeds a tuned object (test setup, not recorded)
    pub fn add_tuned(&self, tuned: Tuned) {
        self.tuneds.insert(tuned);
    }

    /// Current stored copy of a profile
    pub fn profile(&self, name: &str) -> Option<PerformanceProfile> {
        self.profiles.peek(name)
    }

    pub fn machine_config(&self, name: &str) -> Option<MachineConfig> {
        self.machine_configs.peek(name)
    }

    pub fn kubelet_config(&self, name: &str) -> Option<KubeletConfig> {
        self.kubelet_configs.peek(name)
    }

    pub fn tuned(&self, namespace: &str, name: &str) -> Option<Tuned> {
        self.tuneds.peek(&format!("{namespace}/{name}"))
    }

    pub fn runtime_class(&self, name: &str) -> Option<RuntimeClass> {
        self.runtime_classes.peek(name)
    }

    pub(crate) fn check(&self, operation: &str) -> Result<(), ClusterError> {
        match lock(&self.failures).get(operation) {
            Some(message) => Err(ClusterError::Api(message.clone())),
            None => Ok(()),
        }
    }

    pub(crate) fn record(&self, verb: &str, kind: &str, key: &str) {
        lock(&self.calls).push(format!("{verb} {kind} {key}"));
    }

    pub(crate) fn next_uid(&self) -> String {
        format!("mock-uid-{}", self.next_uid.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn remove_or_defer<K>(&self, store: &Store<K>, kind: &str, key: &str) -> Result<(), ClusterError>
    where
        K: kube::Resource + Clone,
    {
        self.check(&format!("delete {kind}"))?;
        if store.peek(key).is_none() {
            return Err(ClusterError::NotFound(format!("{kind} {key}")));
        }
        if self.deferred_deletion.load(Ordering::SeqCst) {
            lock(&self.terminating).insert(format!("{kind} {key}"));
        } else {
            store.remove(key);
        }
        self.record("delete", kind, key);
        Ok(())
    }
}

fn parse_selector(selector: &str) -> BTreeMap<String, String> {
    selector
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_profile(&self, name: &str) -> Result<PerformanceProfile, ClusterError> {
        store::get(self, &self.profiles, "PerformanceProfile", name)
    }

    async fn update_profile(&self, profile: &PerformanceProfile) -> Result<PerformanceProfile, ClusterError> {
        self.check("update PerformanceProfile")?;
        let name = profile.name_any();
        let existing = self
            .profiles
            .peek(&name)
            .ok_or_else(|| ClusterError::NotFound(format!("PerformanceProfile {name}")))?;

        // status is a subresource; a plain update never changes it
        let mut updated = profile.clone();
        updated.status = existing.status;
        self.record("update", "PerformanceProfile", &name);

        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            self.profiles.remove(&name);
        } else {
            self.profiles.insert(updated.clone());
        }
        Ok(updated)
    }

    async fn patch_profile_status(&self, name: &str, status: &PerformanceProfileStatus) -> Result<(), ClusterError> {
        self.check("update_status PerformanceProfile")?;
        let mut profile = self
            .profiles
            .peek(name)
            .ok_or_else(|| ClusterError::NotFound(format!("PerformanceProfile {name}")))?;
        profile.status = Some(status.clone());
        self.profiles.insert(profile);
        self.record("update_status", "PerformanceProfile", name);
        Ok(())
    }

    async fn get_machine_config(&self, name: &str) -> Result<MachineConfig, ClusterError> {
        store::get(self, &self.machine_configs, "MachineConfig", name)
    }

    async fn create_machine_config(&self, mc: &MachineConfig) -> Result<MachineConfig, ClusterError> {
        store::create(self, &self.machine_configs, "MachineConfig", mc)
    }

    async fn update_machine_config(&self, mc: &MachineConfig) -> Result<MachineConfig, ClusterError> {
        store::update(self, &self.machine_configs, "MachineConfig", mc)
    }

    async fn delete_machine_config(&self, name: &str) -> Result<(), ClusterError> {
        self.remove_or_defer(&self.machine_configs, "MachineConfig", name)
    }

    async fn get_kubelet_config(&self, name: &str) -> Result<KubeletConfig, ClusterError> {
        store::get(self, &self.kubelet_configs, "KubeletConfig", name)
    }

    async fn create_kubelet_config(&self, kc: &KubeletConfig) -> Result<KubeletConfig, ClusterError> {
        store::create(self, &self.kubelet_configs, "KubeletConfig", kc)
    }

    async fn update_kubelet_config(&self, kc: &KubeletConfig) -> Result<KubeletConfig, ClusterError> {
        store::update(self, &self.kubelet_configs, "KubeletConfig", kc)
    }

    async fn delete_kubelet_config(&self, name: &str) -> Result<(), ClusterError> {
        self.remove_or_defer(&self.kubelet_configs, "KubeletConfig", name)
    }

    async fn get_tuned(&self, namespace: &str, name: &str) -> Result<Tuned, ClusterError> {
        store::get(self, &self.tuneds, "Tuned", &format!("{namespace}/{name}"))
    }

    async fn list_tuned(&self, namespace: &str) -> Result<Vec<Tuned>, ClusterError> {
        self.check("list Tuned")?;
        Ok(self
            .tuneds
            .values()
            .into_iter()
            .filter(|t| t.namespace().as_deref() == Some(namespace))
            .collect())
    }

    async fn create_tuned(&self, tuned: &Tuned) -> Result<Tuned, ClusterError> {
        store::create(self, &self.tuneds, "Tuned", tuned)
    }

    async fn update_tuned(&self, tuned: &Tuned) -> Result<Tuned, ClusterError> {
        store::update(self, &self.tuneds, "Tuned", tuned)
    }

    async fn delete_tuned(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.remove_or_defer(&self.tuneds, "Tuned", &format!("{namespace}/{name}"))
    }

    async fn get_runtime_class(&self, name: &str) -> Result<RuntimeClass, ClusterError> {
        store::get(self, &self.runtime_classes, "RuntimeClass", name)
    }

    async fn create_runtime_class(&self, rc: &RuntimeClass) -> Result<RuntimeClass, ClusterError> {
        store::create(self, &self.runtime_classes, "RuntimeClass", rc)
    }

    async fn update_runtime_class(&self, rc: &RuntimeClass) -> Result<RuntimeClass, ClusterError> {
        store::update(self, &self.runtime_classes, "RuntimeClass", rc)
    }

    async fn delete_runtime_class(&self, name: &str) -> Result<(), ClusterError> {
        self.remove_or_defer(&self.runtime_classes, "RuntimeClass", name)
    }

    async fn list_machine_config_pools(&self, label_selector: &str) -> Result<Vec<MachineConfigPool>, ClusterError> {
        self.check("list MachineConfigPool")?;
        let wanted = parse_selector(label_selector);
        Ok(self
            .pools
            .values()
            .into_iter()
            .filter(|pool| wanted.iter().all(|(k, v)| pool.labels().get(k) == Some(v)))
            .collect())
    }
}
