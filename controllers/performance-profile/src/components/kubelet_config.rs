//! KubeletConfig synthesis.

use super::{SynthesisError, component_name, machine_config_pool_selector, owner_reference};
use crds::{
    KubeletConfig, KubeletConfigSpec, KubeletConfiguration, LabelSelector, PerformanceProfile,
};
use kube::ResourceExt;
use std::collections::BTreeMap;

pub const CPU_MANAGER_POLICY_STATIC: &str = "static";
pub const CPU_MANAGER_RECONCILE_PERIOD: &str = "5s";
pub const DEFAULT_TOPOLOGY_MANAGER_POLICY: &str = "best-effort";

/// Builds `performance-<profile>`.
pub fn build(profile: &PerformanceProfile) -> Result<KubeletConfig, SynthesisError> {
    let name = component_name(&profile.name_any());

    let topology_manager_policy = profile
        .spec
        .numa
        .as_ref()
        .and_then(|numa| numa.topology_policy.clone())
        .unwrap_or_else(|| DEFAULT_TOPOLOGY_MANAGER_POLICY.to_string());

    let kubelet_config = KubeletConfiguration {
        api_version: "kubelet.config.k8s.io/v1beta1".to_string(),
        kind: "KubeletConfiguration".to_string(),
        cpu_manager_policy: Some(CPU_MANAGER_POLICY_STATIC.to_string()),
        cpu_manager_reconcile_period: Some(CPU_MANAGER_RECONCILE_PERIOD.to_string()),
        topology_manager_policy: Some(topology_manager_policy),
        kube_reserved: reserved_resources(),
        system_reserved: reserved_resources(),
        reserved_system_cpus: Some(profile.spec.cpu.reserved.clone()),
    };

    let mut kc = KubeletConfig::new(
        &name,
        KubeletConfigSpec {
            machine_config_pool_selector: Some(LabelSelector::from_labels(machine_config_pool_selector(profile)?)),
            kubelet_config: Some(kubelet_config),
        },
    );
    kc.metadata.owner_references = Some(vec![owner_reference(profile)?]);
    Ok(kc)
}

fn reserved_resources() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("cpu".to_string(), "1000m".to_string()),
        ("memory".to_string(), "500Mi".to_string()),
    ])
}
