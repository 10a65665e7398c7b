//! Machine configuration resources
//!
//! `MachineConfig` and `KubeletConfig` are written by the performance
//! profile controller; `MachineConfigPool` is only read, to surface
//! rollout problems on the profile.

use crate::selector::LabelSelector;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ignition spec version written into generated machine configs
pub const IGNITION_VERSION: &str = "3.2.0";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "machineconfiguration.openshift.io",
    version = "v1",
    kind = "MachineConfig",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigSpec {
    /// Ignition payload (files and systemd units)
    pub config: IgnitionConfig,

    /// Kernel command line arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kernel_arguments: Vec<String>,

    /// `default` or `realtime`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionConfig {
    pub ignition: Ignition,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systemd: Option<Systemd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct Ignition {
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct Storage {
    #[serde(default)]
    pub files: Vec<IgnitionFile>,
}

/// A file laid down on the node at first boot
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionFile {
    /// Absolute path on the node
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,

    /// Unix permission bits, in decimal as Ignition expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<NodeUser>,

    pub contents: FileContents,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NodeUser {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FileContents {
    /// Data URL (`data:text/plain;charset=utf-8;base64,...`)
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct Systemd {
    #[serde(default)]
    pub units: Vec<SystemdUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SystemdUnit {
    /// Unit file name, e.g. `pre-boot-tuning.service`
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Unit file body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "machineconfiguration.openshift.io",
    version = "v1",
    kind = "KubeletConfig",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfigSpec {
    /// Pools whose nodes receive this kubelet configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_config_pool_selector: Option<LabelSelector>,

    /// Kubelet configuration fragment merged over the pool defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet_config: Option<KubeletConfiguration>,
}

/// The subset of `kubelet.config.k8s.io/v1beta1` the controller manages
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfiguration {
    pub api_version: String,

    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_manager_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_manager_reconcile_period: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_manager_policy: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kube_reserved: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub system_reserved: BTreeMap<String, String>,

    /// CPU list kept away from pods with exclusive CPUs
    #[serde(
        rename = "reservedSystemCPUs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reserved_system_cpus: Option<String>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "machineconfiguration.openshift.io",
    version = "v1",
    kind = "MachineConfigPool",
    derive = "PartialEq",
    status = "MachineConfigPoolStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigPoolSpec {
    /// Selects the machine configs rendered into this pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_config_selector: Option<LabelSelector>,

    /// Selects the nodes that belong to this pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<LabelSelector>,

    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigPoolStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<MachineConfigPoolCondition>,

    #[serde(default)]
    pub machine_count: i32,

    #[serde(default)]
    pub updated_machine_count: i32,

    #[serde(default)]
    pub ready_machine_count: i32,

    #[serde(default)]
    pub degraded_machine_count: i32,
}

/// Pool condition; `type_` is one of the `MCP_*` constants below
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigPoolCondition {
    #[serde(rename = "type")]
    pub type_: String,

    /// `True`, `False` or `Unknown`
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

pub const MCP_UPDATED: &str = "Updated";
pub const MCP_UPDATING: &str = "Updating";
pub const MCP_DEGRADED: &str = "Degraded";
pub const MCP_NODE_DEGRADED: &str = "NodeDegraded";
pub const MCP_RENDER_DEGRADED: &str = "RenderDegraded";

impl MachineConfigPool {
    /// Looks up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&MachineConfigPoolCondition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.type_ == type_)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kubelet_configuration_field_names() {
        let config = KubeletConfiguration {
            api_version: "kubelet.config.k8s.io/v1beta1".to_string(),
            kind: "KubeletConfiguration".to_string(),
            reserved_system_cpus: Some("0-1".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["reservedSystemCPUs"], "0-1");
        assert_eq!(value["apiVersion"], "kubelet.config.k8s.io/v1beta1");
        assert!(value.get("kubeReserved").is_none());
    }

    #[test]
    fn test_pool_condition_lookup() {
        let pool: MachineConfigPool = serde_json::from_value(json!({
            "apiVersion": "machineconfiguration.openshift.io/v1",
            "kind": "MachineConfigPool",
            "metadata": { "name": "worker-cnf" },
            "spec": {},
            "status": {
                "conditions": [
                    { "type": "Updated", "status": "True" },
                    { "type": "NodeDegraded", "status": "False" }
                ]
            }
        }))
        .unwrap();

        assert_eq!(pool.condition(MCP_UPDATED).map(|c| c.status.as_str()), Some("True"));
        assert_eq!(pool.condition(MCP_NODE_DEGRADED).map(|c| c.status.as_str()), Some("False"));
        assert!(pool.condition(MCP_RENDER_DEGRADED).is_none());
    }
}
