//! Generic in-memory storage for one resource kind

use super::{MockClusterClient, lock};
use crate::error::ClusterError;
use kube::Resource;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Objects of one kind keyed by `name` or `namespace/name`
pub(crate) struct Store<K> {
    objects: Arc<Mutex<BTreeMap<String, K>>>,
}

impl<K> Clone for Store<K> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
        }
    }
}

impl<K> Default for Store<K> {
    fn default() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

pub(crate) fn key_of<K: Resource>(obj: &K) -> String {
    let meta = obj.meta();
    let name = meta.name.clone().unwrap_or_default();
    match &meta.namespace {
        Some(ns) => format!("{ns}/{name}"),
        None => name,
    }
}

impl<K: Resource + Clone> Store<K> {
    pub(crate) fn peek(&self, key: &str) -> Option<K> {
        lock(&self.objects).get(key).cloned()
    }

    pub(crate) fn insert(&self, obj: K) {
        lock(&self.objects).insert(key_of(&obj), obj);
    }

    pub(crate) fn remove(&self, key: &str) {
        lock(&self.objects).remove(key);
    }

    pub(crate) fn values(&self) -> Vec<K> {
        lock(&self.objects).values().cloned().collect()
    }
}

pub(crate) fn get<K: Resource + Clone>(
    client: &MockClusterClient,
    store: &Store<K>,
    kind: &str,
    key: &str,
) -> Result<K, ClusterError> {
    client.check(&format!("get {kind}"))?;
    store
        .peek(key)
        .ok_or_else(|| ClusterError::NotFound(format!("{kind} {key}")))
}

pub(crate) fn create<K: Resource + Clone>(
    client: &MockClusterClient,
    store: &Store<K>,
    kind: &str,
    obj: &K,
) -> Result<K, ClusterError> {
    client.check(&format!("create {kind}"))?;
    let key = key_of(obj);
    if store.peek(&key).is_some() {
        return Err(ClusterError::Api(format!("{kind} {key} already exists")));
    }

    let mut created = obj.clone();
    let meta = created.meta_mut();
    if meta.uid.is_none() {
        meta.uid = Some(client.next_uid());
    }
    meta.resource_version = Some("1".to_string());
    store.insert(created.clone());
    client.record("create", kind, &key);
    Ok(created)
}

pub(crate) fn update<K: Resource + Clone>(
    client: &MockClusterClient,
    store: &Store<K>,
    kind: &str,
    obj: &K,
) -> Result<K, ClusterError> {
    client.check(&format!("update {kind}"))?;
    let key = key_of(obj);
    let existing = store
        .peek(&key)
        .ok_or_else(|| ClusterError::NotFound(format!("{kind} {key}")))?;

    let version = existing
        .meta()
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let mut updated = obj.clone();
    let meta = updated.meta_mut();
    meta.uid = existing.meta().uid.clone();
    meta.resource_version = Some((version + 1).to_string());
    store.insert(updated.clone());
    client.record("update", kind, &key);
    Ok(updated)
}
