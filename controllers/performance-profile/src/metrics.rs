//! Prometheus metrics
//!
//! Metrics live in their own registry rather than the process-global one so
//! each reconciler (and each test) counts independently.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Reconcile counters exposed on `/metrics`
#[derive(Debug, Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    reconciles: IntCounter,
    reconcile_errors: IntCounter,
    components_applied: IntCounterVec,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciles = IntCounter::new(
            "performance_profile_reconciles_total",
            "Total number of reconcile passes",
        )?;
        let reconcile_errors = IntCounter::new(
            "performance_profile_reconcile_errors_total",
            "Total number of reconcile passes that returned an error",
        )?;
        let components_applied = IntCounterVec::new(
            Opts::new(
                "performance_profile_components_applied_total",
                "Total number of generated components created or updated",
            ),
            &["kind"],
        )?;

        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(reconcile_errors.clone()))?;
        registry.register(Box::new(components_applied.clone()))?;

        Ok(Self {
            registry,
            reconciles,
            reconcile_errors,
            components_applied,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_reconcile(&self) {
        self.reconciles.inc();
    }

    pub fn record_error(&self) {
        self.reconcile_errors.inc();
    }

    /// `kind` is the resource kind, e.g. `MachineConfig`
    pub fn record_applied(&self, kind: &str) {
        self.components_applied.with_label_values(&[kind]).inc();
    }

    pub fn applied(&self, kind: &str) -> u64 {
        self.components_applied.with_label_values(&[kind]).get()
    }

    pub fn reconciles(&self) -> u64 {
        self.reconciles.get()
    }

    pub fn errors(&self) -> u64 {
        self.reconcile_errors.get()
    }
}
