//! Operator configuration.
//!
//! Names, labels and annotations the controller stamps on what it
//! generates, plus the few runtime settings read from the environment.

use crate::error::ControllerError;
use std::env;
use std::net::SocketAddr;

/// Finalizer that holds a profile until its components are gone
pub const FINALIZER: &str = "foreground-deletion.performance.openshift.io";

/// Annotation that stops reconciliation while set to `"true"`
pub const PAUSE_ANNOTATION: &str = "performance.openshift.io/pause-reconcile";

/// Node selector keys of the form `node-role.kubernetes.io/<role>`
pub const NODE_ROLE_PREFIX: &str = "node-role.kubernetes.io/";

/// Label used to bind machine configs to machine config pools
pub const MACHINE_CONFIG_ROLE_LABEL: &str = "machineconfiguration.openshift.io/role";

pub const MACHINE_CONFIG_PREFIX: &str = "50-performance";
pub const COMPONENT_PREFIX: &str = "performance";
pub const TUNED_PREFIX: &str = "openshift-node-performance";

/// Runtime handler configured by the generated CRI-O drop-in
pub const RUNTIME_HANDLER: &str = "high-performance";

pub const DEFAULT_TUNED_NAMESPACE: &str = "openshift-cluster-node-tuning-operator";
pub const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_RECONCILE_CONCURRENCY: u16 = 3;

/// Reporting component name on published events
pub const CONTROLLER_NAME: &str = "performance-profile-controller";

/// Runtime configuration of the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace the node tuning operator watches for Tuned objects
    pub tuned_namespace: String,
    /// Listen address for `/healthz`, `/readyz` and `/metrics`
    pub probe_addr: SocketAddr,
    /// Maximum number of profiles reconciled in parallel
    pub reconcile_concurrency: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            tuned_namespace: DEFAULT_TUNED_NAMESPACE.to_string(),
            probe_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            reconcile_concurrency: DEFAULT_RECONCILE_CONCURRENCY,
        }
    }
}

impl OperatorConfig {
    /// Loads configuration from `TUNED_NAMESPACE`, `PROBE_ADDR` and
    /// `RECONCILE_CONCURRENCY`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let tuned_namespace = lookup("TUNED_NAMESPACE")
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TUNED_NAMESPACE.to_string());

        let probe_addr = lookup("PROBE_ADDR")
            .unwrap_or_else(|| DEFAULT_PROBE_ADDR.to_string());
        let probe_addr = probe_addr.parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!("PROBE_ADDR {probe_addr:?} is not a socket address: {e}"))
        })?;

        let reconcile_concurrency = match lookup("RECONCILE_CONCURRENCY") {
            Some(value) => value
                .parse::<u16>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "RECONCILE_CONCURRENCY must be a positive integer, got {value:?}"
                    ))
                })?,
            None => DEFAULT_RECONCILE_CONCURRENCY,
        };

        Ok(Self {
            tuned_namespace,
            probe_addr,
            reconcile_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = OperatorConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.tuned_namespace, "openshift-cluster-node-tuning-operator");
    }

    #[test]
    fn test_overrides() {
        let config = OperatorConfig::from_lookup(lookup_from(&[
            ("TUNED_NAMESPACE", "tuning"),
            ("PROBE_ADDR", "127.0.0.1:9090"),
            ("RECONCILE_CONCURRENCY", "8"),
        ]))
        .unwrap();
        assert_eq!(config.tuned_namespace, "tuning");
        assert_eq!(config.probe_addr.port(), 9090);
        assert_eq!(config.reconcile_concurrency, 8);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            OperatorConfig::from_lookup(lookup_from(&[("PROBE_ADDR", "nope")])),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            OperatorConfig::from_lookup(lookup_from(&[("RECONCILE_CONCURRENCY", "0")])),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
