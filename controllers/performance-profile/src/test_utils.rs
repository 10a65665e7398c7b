//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::config::OperatorConfig;
use crate::metrics::ControllerMetrics;
use crate::reconciler::Reconciler;
use cluster_client::{MockClusterClient, MockEventRecorder};
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TEST_UID: &str = "11111111-2222-3333-4444-555555555555";

/// Helper to create a test PerformanceProfile targeting `worker-cnf` nodes
pub fn create_test_profile(name: &str) -> PerformanceProfile {
    PerformanceProfile {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(TEST_UID.to_string()),
            ..Default::default()
        },
        spec: PerformanceProfileSpec {
            cpu: Cpu {
                reserved: "0-1".to_string(),
                isolated: "2-7".to_string(),
                balance_isolated: None,
            },
            hugepages: None,
            node_selector: BTreeMap::from([("node-role.kubernetes.io/worker-cnf".to_string(), String::new())]),
            machine_config_label: None,
            machine_config_pool_selector: None,
            real_time_kernel: None,
            additional_kernel_args: Vec::new(),
            numa: None,
            workload_hints: None,
        },
        status: None,
    }
}

/// Same as [`create_test_profile`] with the finalizer already in place
pub fn create_finalized_profile(name: &str) -> PerformanceProfile {
    let mut profile = create_test_profile(name);
    profile.metadata.finalizers = Some(vec![crate::config::FINALIZER.to_string()]);
    profile
}

/// A finalized profile whose deletion has been requested
pub fn create_deleted_profile(name: &str) -> PerformanceProfile {
    let mut profile = create_finalized_profile(name);
    let meta: ObjectMeta = serde_json::from_value(json!({
        "name": name,
        "uid": TEST_UID,
        "finalizers": [crate::config::FINALIZER],
        "deletionTimestamp": "2024-01-01T00:00:00Z"
    }))
    .unwrap();
    profile.metadata = meta;
    profile
}

/// Helper to create a MachineConfigPool for the `worker-cnf` role
pub fn create_test_pool(name: &str, conditions: serde_json::Value) -> MachineConfigPool {
    serde_json::from_value(json!({
        "apiVersion": "machineconfiguration.openshift.io/v1",
        "kind": "MachineConfigPool",
        "metadata": {
            "name": name,
            "labels": { "machineconfiguration.openshift.io/role": "worker-cnf" }
        },
        "spec": {},
        "status": { "conditions": conditions }
    }))
    .unwrap()
}

/// A pool that finished rolling out
pub fn create_healthy_pool(name: &str) -> MachineConfigPool {
    create_test_pool(
        name,
        json!([
            { "type": "Updated", "status": "True" },
            { "type": "Updating", "status": "False" },
            { "type": "Degraded", "status": "False" }
        ]),
    )
}

/// A pool with a degraded node
pub fn create_degraded_pool(name: &str, reason: &str, message: &str) -> MachineConfigPool {
    create_test_pool(
        name,
        json!([
            { "type": "Updated", "status": "False" },
            { "type": "Degraded", "status": "True" },
            { "type": "NodeDegraded", "status": "True", "reason": reason, "message": message }
        ]),
    )
}

/// Reconciler wired to in-memory mocks
pub fn create_test_reconciler() -> (Reconciler, MockClusterClient, MockEventRecorder) {
    create_test_reconciler_with(MockClusterClient::new())
}

/// Reconciler over a preconfigured mock client
pub fn create_test_reconciler_with(client: MockClusterClient) -> (Reconciler, MockClusterClient, MockEventRecorder) {
    let recorder = MockEventRecorder::new();
    let reconciler = Reconciler::new(
        Arc::new(client.clone()),
        Arc::new(recorder.clone()),
        OperatorConfig::default(),
        Arc::new(ControllerMetrics::new().unwrap()),
    );
    (reconciler, client, recorder)
}

/// Looks up a status condition of a stored profile
pub fn find_condition(profile: &PerformanceProfile, type_: ConditionType) -> Condition {
    profile
        .conditions()
        .iter()
        .find(|c| c.type_ == type_)
        .cloned()
        .unwrap_or_else(|| panic!("condition {type_:?} missing"))
}
