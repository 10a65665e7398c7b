//! PerformanceProfile CRD
//!
//! The declarative tuning intent for a group of nodes: CPU partitioning,
//! huge pages, real-time kernel, NUMA policy and extra kernel arguments.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "performance.openshift.io",
    version = "v2",
    kind = "PerformanceProfile",
    derive = "PartialEq",
    status = "PerformanceProfileStatus",
    shortname = "pp"
)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceProfileSpec {
    /// CPU partitioning between housekeeping and application workloads
    pub cpu: Cpu,

    /// Huge pages layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<HugePages>,

    /// Selects the nodes this profile applies to (exactly one label)
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    /// Labels put on the generated MachineConfig (defaults to the role derived from the node selector)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_config_label: Option<BTreeMap<String, String>>,

    /// Selects the MachineConfigPool the profile rolls out to (defaults to the role derived from the node selector)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_config_pool_selector: Option<BTreeMap<String, String>>,

    /// Real-time kernel toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_time_kernel: Option<RealTimeKernel>,

    /// Extra kernel arguments appended verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_kernel_args: Vec<String>,

    /// NUMA alignment policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    /// Workload hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_hints: Option<WorkloadHints>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    /// CPUs kept for the OS and kubelet housekeeping (CPU list, e.g. "0-1")
    pub reserved: String,

    /// CPUs handed exclusively to application workloads (CPU list)
    pub isolated: String,

    /// Whether the scheduler may load-balance across isolated CPUs (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_isolated: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HugePages {
    /// Default huge page size (e.g. "1G")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_hugepages_size: Option<String>,

    /// Huge page allocations
    #[serde(default)]
    pub pages: Vec<HugePage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HugePage {
    /// Page size ("2M" or "1G")
    pub size: String,

    /// Number of pages
    pub count: u32,

    /// NUMA node to allocate on (boot arguments allocate across all nodes when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeKernel {
    /// Install the real-time kernel (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Numa {
    /// Kubelet topology manager policy (e.g. "single-numa-node")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_policy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadHints {
    /// Tune for latency-sensitive real-time workloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_time: Option<bool>,

    /// Trade power consumption for performance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_power_consumption: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceProfileStatus {
    /// Available, Upgradeable, Progressing and Degraded conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generated Tuned object reference (`<namespace>/<name>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuned: Option<String>,

    /// Generated RuntimeClass name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_class: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Condition status
    pub status: ConditionStatus,

    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the status changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// Last time the condition was computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_time: Option<DateTime<Utc>>,
}

/// Profile condition types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    /// All components applied and rolled out
    Available,
    /// Safe to upgrade (tracks Available)
    Upgradeable,
    /// Components are being rolled out
    Progressing,
    /// Something went wrong; see reason and message
    Degraded,
}

/// Kubernetes-style tri-state condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Not known yet
    #[default]
    Unknown,
}

impl PerformanceProfile {
    /// Whether isolated CPUs take part in scheduler load balancing.
    ///
    /// An absent flag means `true`; only an explicit `false` turns on static isolation.
    #[must_use]
    pub fn balance_isolated(&self) -> bool {
        self.spec.cpu.balance_isolated.unwrap_or(true)
    }

    /// Whether the real-time kernel is requested. An absent flag means `true`.
    #[must_use]
    pub fn real_time_kernel_enabled(&self) -> bool {
        self.spec
            .real_time_kernel
            .as_ref()
            .and_then(|rt| rt.enabled)
            .unwrap_or(true)
    }

    /// Conditions currently recorded in status (empty when status is unset).
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map_or(&[], |status| status.conditions.as_slice())
    }
}
