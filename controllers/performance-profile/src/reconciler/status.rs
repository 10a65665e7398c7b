//! Profile status conditions and machine config pool aggregation.
//!
//! Every condition set written by the controller carries exactly the four
//! condition types. Exactly one of Available, Progressing and Degraded is
//! `True`; Upgradeable follows Available.

use super::Reconciler;
use crate::components::{component_name, machine_config_pool_selector, tuned_name};
use crate::error::ControllerError;
use chrono::Utc;
use crds::{
    Condition, ConditionStatus, ConditionType, LabelSelector, MCP_NODE_DEGRADED,
    MCP_RENDER_DEGRADED, MachineConfigPool, PerformanceProfile, PerformanceProfileStatus,
};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

pub const REASON_DEPLOYMENT_STARTING: &str = "DeploymentStarting";
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";
pub const REASON_COMPONENT_CREATION_FAILED: &str = "ComponentCreationFailed";
pub const REASON_MCP_STATUS_FAILED: &str = "GettingMCPStatusFailed";
pub const REASON_MCP_DEGRADED: &str = "MCPDegraded";

fn condition(type_: ConditionType, status: ConditionStatus, reason: Option<&str>, message: Option<&str>) -> Condition {
    let now = Utc::now();
    Condition {
        type_,
        status,
        reason: reason.map(str::to_string),
        message: message.map(str::to_string),
        last_transition_time: Some(now),
        last_heartbeat_time: Some(now),
    }
}

/// Everything rolled out
pub fn available_conditions() -> Vec<Condition> {
    vec![
        condition(ConditionType::Available, ConditionStatus::True, None, None),
        condition(ConditionType::Upgradeable, ConditionStatus::True, None, None),
        condition(ConditionType::Progressing, ConditionStatus::False, None, None),
        condition(ConditionType::Degraded, ConditionStatus::False, None, None),
    ]
}

pub fn progressing_conditions(reason: &str, message: &str) -> Vec<Condition> {
    vec![
        condition(ConditionType::Available, ConditionStatus::False, None, None),
        condition(ConditionType::Upgradeable, ConditionStatus::False, None, None),
        condition(ConditionType::Progressing, ConditionStatus::True, Some(reason), Some(message)),
        condition(ConditionType::Degraded, ConditionStatus::False, None, None),
    ]
}

pub fn degraded_conditions(reason: &str, message: &str) -> Vec<Condition> {
    vec![
        condition(ConditionType::Available, ConditionStatus::False, None, None),
        condition(ConditionType::Upgradeable, ConditionStatus::False, None, None),
        condition(ConditionType::Progressing, ConditionStatus::False, None, None),
        condition(ConditionType::Degraded, ConditionStatus::True, Some(reason), Some(message)),
    ]
}

/// Describes every pool with a degraded node or a failed render.
///
/// Empty when no pool is degraded.
pub fn degraded_pools_message(pools: &[MachineConfigPool]) -> String {
    let mut message = String::new();
    for pool in pools {
        let name = pool.name_any();
        for type_ in [MCP_NODE_DEGRADED, MCP_RENDER_DEGRADED] {
            let Some(cond) = pool.condition(type_).filter(|c| c.status == "True") else {
                continue;
            };
            if let Some(reason) = cond.reason.as_deref().filter(|r| !r.is_empty()) {
                message.push_str(&format!("Machine config pool {name} Degraded Reason: {reason}.\n"));
            }
            if let Some(text) = cond.message.as_deref().filter(|m| !m.is_empty()) {
                message.push_str(&format!("Machine config pool {name} Degraded Message: {text}.\n"));
            }
        }
    }
    message
}

/// Same type, status, reason and message; timestamps don't count
fn conditions_equal(old: &[Condition], new: &[Condition]) -> bool {
    old.len() == new.len()
        && new.iter().all(|n| {
            old.iter().any(|o| {
                o.type_ == n.type_ && o.status == n.status && o.reason == n.reason && o.message == n.message
            })
        })
}

/// Keeps the old transition time of conditions whose status didn't flip
fn carry_transition_times(old: &[Condition], new: &mut [Condition]) {
    for cond in new.iter_mut() {
        if let Some(prev) = old.iter().find(|o| o.type_ == cond.type_ && o.status == cond.status)
            && prev.last_transition_time.is_some()
        {
            cond.last_transition_time = prev.last_transition_time;
        }
    }
}

impl Reconciler {
    /// Condition set derived from the profile's machine config pools.
    ///
    /// `None` when no pool is degraded.
    pub(crate) async fn pool_conditions(
        &self,
        profile: &PerformanceProfile,
    ) -> Result<Option<Vec<Condition>>, ControllerError> {
        let selector = machine_config_pool_selector(profile)?;

        // one list per label, de-duplicated by pool name
        let mut pools = BTreeMap::new();
        for (key, value) in selector {
            let query = LabelSelector::from_labels(BTreeMap::from([(key, value)])).to_query();
            let found = self
                .client
                .list_machine_config_pools(&query)
                .await
                .map_err(|e| ControllerError::StatusRead(e.to_string()))?;
            for pool in found {
                pools.insert(pool.name_any(), pool);
            }
        }

        let pools: Vec<MachineConfigPool> = pools.into_values().collect();
        let message = degraded_pools_message(&pools);
        if message.is_empty() {
            return Ok(None);
        }
        Ok(Some(degraded_conditions(REASON_MCP_DEGRADED, &message)))
    }

    /// Writes `conditions` to the profile status, skipping the write when
    /// nothing changed. Recorded object references are left as they are.
    pub(crate) async fn update_status(
        &self,
        profile: &PerformanceProfile,
        conditions: Vec<Condition>,
    ) -> Result<(), ControllerError> {
        self.write_status(profile, conditions, false).await
    }

    /// Writes `conditions` together with references to the applied tuned
    /// and runtime class objects
    pub(crate) async fn update_status_with_components(
        &self,
        profile: &PerformanceProfile,
        conditions: Vec<Condition>,
    ) -> Result<(), ControllerError> {
        self.write_status(profile, conditions, true).await
    }

    async fn write_status(
        &self,
        profile: &PerformanceProfile,
        mut conditions: Vec<Condition>,
        components_applied: bool,
    ) -> Result<(), ControllerError> {
        let name = profile.name_any();
        let old = profile.status.clone().unwrap_or_default();

        carry_transition_times(&old.conditions, &mut conditions);
        let status = if components_applied {
            PerformanceProfileStatus {
                conditions,
                tuned: Some(format!("{}/{}", self.config.tuned_namespace, tuned_name(&name))),
                runtime_class: Some(component_name(&name)),
            }
        } else {
            PerformanceProfileStatus {
                conditions,
                tuned: old.tuned.clone(),
                runtime_class: old.runtime_class.clone(),
            }
        };

        if conditions_equal(&old.conditions, &status.conditions)
            && old.tuned == status.tuned
            && old.runtime_class == status.runtime_class
        {
            debug!("Status of PerformanceProfile {} unchanged, skipping update", name);
            return Ok(());
        }

        self.client.patch_profile_status(&name, &status).await?;
        Ok(())
    }
}
