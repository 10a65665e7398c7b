//! Component synthesis.
//!
//! Pure functions that derive every node-configuration object from a
//! profile. The same profile always yields the same objects, which is what
//! lets the applier skip writes when nothing changed.
//!
//! - `machine_config`: kernel arguments, boot-time scripts and systemd units
//! - `kubelet_config`: CPU manager and topology manager settings
//! - `tuned`: tuned profile and its node recommendation
//! - `runtime_class`: the high-performance container runtime class

pub mod kubelet_config;
pub mod machine_config;
pub mod runtime_class;
pub mod tuned;

use crate::config::{
    COMPONENT_PREFIX, MACHINE_CONFIG_PREFIX, MACHINE_CONFIG_ROLE_LABEL, NODE_ROLE_PREFIX,
    OperatorConfig, TUNED_PREFIX,
};
use cpuset::{CpuSet, CpuSetError};
use crds::{KubeletConfig, MachineConfig, PerformanceProfile, Tuned};
use k8s_openapi::api::node::v1::RuntimeClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while deriving components from a profile
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("invalid CPU list: {0}")]
    CpuSet(#[from] CpuSetError),

    #[error("unsupported huge page size {0:?}, supported sizes are 2M and 1G")]
    UnsupportedHugePageSize(String),

    #[error("can't derive a machine config role: {0}")]
    Role(String),

    #[error("profile {0} has no uid, can't set owner references")]
    MissingOwner(String),
}

/// Every object generated for one profile
#[derive(Debug, Clone, PartialEq)]
pub struct Components {
    pub machine_config: MachineConfig,
    pub kubelet_config: KubeletConfig,
    pub tuned: Tuned,
    pub runtime_class: RuntimeClass,
}

/// Derives all components for `profile`.
pub fn synthesize(profile: &PerformanceProfile, config: &OperatorConfig) -> Result<Components, SynthesisError> {
    Ok(Components {
        machine_config: machine_config::build(profile)?,
        kubelet_config: kubelet_config::build(profile)?,
        tuned: tuned::build(profile, &config.tuned_namespace)?,
        runtime_class: runtime_class::build(profile)?,
    })
}

/// `50-performance-<profile>`
pub fn machine_config_name(profile_name: &str) -> String {
    format!("{MACHINE_CONFIG_PREFIX}-{profile_name}")
}

/// `performance-<profile>`, shared by the kubelet config and the runtime class
pub fn component_name(profile_name: &str) -> String {
    format!("{COMPONENT_PREFIX}-{profile_name}")
}

/// `openshift-node-performance-<profile>`, the Tuned object and its profile entry
pub fn tuned_name(profile_name: &str) -> String {
    format!("{TUNED_PREFIX}-{profile_name}")
}

/// Controller owner reference pointing back at the profile
pub fn owner_reference(profile: &PerformanceProfile) -> Result<OwnerReference, SynthesisError> {
    let mut owner = profile
        .controller_owner_ref(&())
        .ok_or_else(|| SynthesisError::MissingOwner(profile.name_any()))?;
    // foreground deletion of the profile waits for its components
    owner.block_owner_deletion = Some(true);
    Ok(owner)
}

/// Labels put on the machine config, also matched by the tuned recommendation
pub fn machine_config_labels(profile: &PerformanceProfile) -> Result<BTreeMap<String, String>, SynthesisError> {
    match &profile.spec.machine_config_label {
        Some(labels) => Ok(labels.clone()),
        None => role_labels(profile),
    }
}

/// Labels identifying the machine config pool the profile rolls out to
pub fn machine_config_pool_selector(profile: &PerformanceProfile) -> Result<BTreeMap<String, String>, SynthesisError> {
    match &profile.spec.machine_config_pool_selector {
        Some(selector) => Ok(selector.clone()),
        None => role_labels(profile),
    }
}

fn role_labels(profile: &PerformanceProfile) -> Result<BTreeMap<String, String>, SynthesisError> {
    let node_selector = &profile.spec.node_selector;
    let mut keys = node_selector.keys();
    let (Some(key), None) = (keys.next(), keys.next()) else {
        return Err(SynthesisError::Role(format!(
            "node selector must have exactly one label, found {}",
            node_selector.len()
        )));
    };

    let role = key
        .strip_prefix(NODE_ROLE_PREFIX)
        .filter(|role| !role.is_empty())
        .ok_or_else(|| {
            SynthesisError::Role(format!("node selector key {key:?} does not start with {NODE_ROLE_PREFIX:?}"))
        })?;

    Ok(BTreeMap::from([(MACHINE_CONFIG_ROLE_LABEL.to_string(), role.to_string())]))
}

/// Parses the profile's reserved and isolated CPU lists
pub(crate) fn cpu_sets(profile: &PerformanceProfile) -> Result<(CpuSet, CpuSet), SynthesisError> {
    let reserved = CpuSet::parse(&profile.spec.cpu.reserved)?;
    let isolated = CpuSet::parse(&profile.spec.cpu.isolated)?;
    Ok((reserved, isolated))
}

/// Size of a huge page in kB
pub fn hugepage_size_kb(size: &str) -> Result<u64, SynthesisError> {
    match size {
        "2M" => Ok(2048),
        "1G" => Ok(1_048_576),
        other => Err(SynthesisError::UnsupportedHugePageSize(other.to_string())),
    }
}

/// Kernel arguments for huge pages that are not pinned to a NUMA node
pub(crate) fn hugepage_kernel_args(profile: &PerformanceProfile) -> Result<Vec<String>, SynthesisError> {
    let Some(hugepages) = &profile.spec.hugepages else {
        return Ok(Vec::new());
    };

    let mut args = Vec::new();
    if let Some(default_size) = &hugepages.default_hugepages_size {
        hugepage_size_kb(default_size)?;
        args.push(format!("default_hugepagesz={default_size}"));
    }
    for page in hugepages.pages.iter().filter(|p| p.node.is_none()) {
        hugepage_size_kb(&page.size)?;
        args.push(format!("hugepagesz={}", page.size));
        args.push(format!("hugepages={}", page.count));
    }
    Ok(args)
}
