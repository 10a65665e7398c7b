//! Profile validation.
//!
//! A profile that fails validation is never synthesized. The failure is
//! terminal until the profile is edited, so messages are written for the
//! person editing it.

use crate::components::{self, hugepage_size_kb};
use cpuset::CpuSet;
use crds::PerformanceProfile;

/// Precondition check run before any component is synthesized
pub trait ProfileValidator: Send + Sync {
    /// Returns a human-readable reason when the profile can't be reconciled
    fn validate(&self, profile: &PerformanceProfile) -> Result<(), String>;
}

/// Checks CPU lists, node selector and huge page sizes
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl ProfileValidator for DefaultValidator {
    fn validate(&self, profile: &PerformanceProfile) -> Result<(), String> {
        let cpu = &profile.spec.cpu;
        let reserved = parse_cpus("reserved", &cpu.reserved)?;
        let isolated = parse_cpus("isolated", &cpu.isolated)?;

        let overlap = reserved.intersection(&isolated);
        if !overlap.is_empty() {
            return Err(format!("reserved and isolated CPUs overlap: {overlap}"));
        }

        if profile.spec.node_selector.len() > 1 {
            return Err(format!(
                "you should provide only 1 node selector, found {}",
                profile.spec.node_selector.len()
            ));
        }
        if let Some(labels) = &profile.spec.machine_config_label
            && labels.len() > 1
        {
            return Err(format!("you should provide only 1 machine config label, found {}", labels.len()));
        }
        if let Some(selector) = &profile.spec.machine_config_pool_selector
            && selector.len() > 1
        {
            return Err(format!(
                "you should provide only 1 machine config pool selector label, found {}",
                selector.len()
            ));
        }
        components::machine_config_labels(profile).map_err(|e| e.to_string())?;
        components::machine_config_pool_selector(profile).map_err(|e| e.to_string())?;

        if let Some(hugepages) = &profile.spec.hugepages {
            if let Some(size) = &hugepages.default_hugepages_size {
                hugepage_size_kb(size).map_err(|e| e.to_string())?;
            }
            for page in &hugepages.pages {
                hugepage_size_kb(&page.size).map_err(|e| e.to_string())?;
            }
        }

        Ok(())
    }
}

fn parse_cpus(field: &str, list: &str) -> Result<CpuSet, String> {
    let set = CpuSet::parse(list).map_err(|e| format!("cpu.{field}: {e}"))?;
    if set.is_empty() {
        return Err(format!("cpu.{field} must not be empty"));
    }
    Ok(set)
}
