//! Reconciliation logic for PerformanceProfile resources.
//!
//! One pass drives a profile through its lifecycle:
//! - deletion: remove generated components, then release the finalizer
//! - first sight: add the finalizer and report Progressing
//! - validation, component synthesis and application
//! - status aggregation from the profile's machine config pools
//!
//! - `apply`: idempotent create/update/delete of generated components
//! - `status`: condition sets and status persistence

pub mod apply;
#[cfg(test)]
mod apply_test;
#[cfg(test)]
mod reconcile_test;
pub mod status;

use crate::backoff::ExponentialBackoff;
use crate::config::{FINALIZER, OperatorConfig, PAUSE_ANNOTATION};
use crate::error::ControllerError;
use crate::metrics::ControllerMetrics;
use crate::validation::{DefaultValidator, ProfileValidator};
use cluster_client::{ClusterClientTrait, EventRecorder, EventSeverity};
use crds::PerformanceProfile;
use kube::ResourceExt;
use status::{
    REASON_COMPONENT_CREATION_FAILED, REASON_DEPLOYMENT_STARTING, REASON_MCP_STATUS_FAILED,
    REASON_VALIDATION_FAILED, available_conditions, degraded_conditions, progressing_conditions,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay before checking again whether deleted components are gone
pub const DELETION_REQUEUE: Duration = Duration::from_secs(10);

pub const EVENT_DELETION_FAILED: &str = "Deletion failed";
pub const EVENT_DELETION_SUCCEEDED: &str = "Deletion succeeded";
pub const EVENT_VALIDATION_FAILED: &str = "Validation failed";
pub const EVENT_CREATION_FAILED: &str = "Creation failed";
pub const EVENT_CREATION_SUCCEEDED: &str = "Creation succeeded";

/// Outcome of a successful reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Nothing left to do until the profile or something it owns changes
    Done,
    /// Check again after the given delay
    RequeueAfter(Duration),
}

/// Backoff state for a profile
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: ExponentialBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: ExponentialBackoff::new(5, 300), // 5 seconds min, 5 minutes max
            error_count: 0,
        }
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciles PerformanceProfile resources.
pub struct Reconciler {
    pub(crate) client: Arc<dyn ClusterClientTrait>,
    pub(crate) recorder: Arc<dyn EventRecorder>,
    pub(crate) validator: Box<dyn ProfileValidator>,
    pub(crate) config: OperatorConfig,
    pub(crate) metrics: Arc<ControllerMetrics>,
    /// Error count tracking per profile name
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler using [`DefaultValidator`].
    pub fn new(
        client: Arc<dyn ClusterClientTrait>,
        recorder: Arc<dyn EventRecorder>,
        config: OperatorConfig,
        metrics: Arc<ControllerMetrics>,
    ) -> Self {
        Self {
            client,
            recorder,
            validator: Box::new(DefaultValidator),
            config,
            metrics,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replaces the profile validator
    #[must_use]
    pub fn with_validator(mut self, validator: impl ProfileValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Runs one reconcile pass for the named profile.
    ///
    /// Errors are meant to be retried with [`Reconciler::next_backoff`];
    /// a successful pass resets the profile's backoff.
    pub async fn reconcile(&self, name: &str) -> Result<ReconcileResult, ControllerError> {
        self.metrics.record_reconcile();
        let result = self.reconcile_profile(name).await;
        match &result {
            Ok(_) => self.reset_error(name),
            Err(e) => {
                self.metrics.record_error();
                if !e.is_not_found() {
                    error!("Failed to reconcile PerformanceProfile {}: {}", name, e);
                }
            }
        }
        result
    }

    async fn reconcile_profile(&self, name: &str) -> Result<ReconcileResult, ControllerError> {
        let mut profile = match self.client.get_profile(name).await {
            Ok(profile) => profile,
            Err(e) if e.is_not_found() => {
                debug!("PerformanceProfile {} not found, nothing to do", name);
                return Ok(ReconcileResult::Done);
            }
            Err(e) => return Err(e.into()),
        };

        if profile.metadata.deletion_timestamp.is_some() {
            return self.finalize(profile).await;
        }

        if !has_finalizer(&profile) {
            info!("Adding finalizer to PerformanceProfile {}", name);
            profile.finalizers_mut().push(FINALIZER.to_string());
            let updated = self.client.update_profile(&profile).await?;
            self.update_status(
                &updated,
                progressing_conditions(REASON_DEPLOYMENT_STARTING, "Deployment is starting"),
            )
            .await?;
            // the update triggers the next pass
            return Ok(ReconcileResult::Done);
        }

        if let Err(message) = self.validator.validate(&profile) {
            warn!("PerformanceProfile {} failed validation: {}", name, message);
            self.update_status(&profile, degraded_conditions(REASON_VALIDATION_FAILED, &message))
                .await?;
            self.recorder
                .record(&profile, EventSeverity::Warning, EVENT_VALIDATION_FAILED, &message)
                .await;
            return Ok(ReconcileResult::Done);
        }

        if is_paused(&profile) {
            info!("Reconciliation of PerformanceProfile {} is paused", name);
            if profile.conditions().is_empty() {
                debug!("PerformanceProfile {} has no status yet, leaving it untouched", name);
            } else {
                self.update_status(&profile, profile.conditions().to_vec()).await?;
            }
            return Ok(ReconcileResult::Done);
        }

        let mut pending = None;
        match self.apply_components(&profile).await {
            Ok(true) => {
                self.recorder
                    .record(
                        &profile,
                        EventSeverity::Normal,
                        EVENT_CREATION_SUCCEEDED,
                        "Succeeded to create all components",
                    )
                    .await;
                pending = Some(ReconcileResult::Done);
            }
            Ok(false) => {}
            Err(e) => {
                let message = format!("failed to create components: {e}");
                if let Err(status_err) = self
                    .update_status(&profile, degraded_conditions(REASON_COMPONENT_CREATION_FAILED, &message))
                    .await
                {
                    error!("Failed to update status of PerformanceProfile {}: {}", name, status_err);
                }
                self.recorder
                    .record(&profile, EventSeverity::Warning, EVENT_CREATION_FAILED, &message)
                    .await;
                return Err(e);
            }
        }

        let conditions = match self.pool_conditions(&profile).await {
            Ok(Some(conditions)) => conditions,
            Ok(None) => available_conditions(),
            Err(e) => {
                let message = format!("failed to get machine config pool status: {e}");
                let conditions = degraded_conditions(REASON_MCP_STATUS_FAILED, &message);
                if let Err(status_err) = self.update_status_with_components(&profile, conditions).await {
                    error!("Failed to update status of PerformanceProfile {}: {}", name, status_err);
                }
                return Err(e);
            }
        };

        if let Err(e) = self.update_status_with_components(&profile, conditions).await {
            error!("Failed to update status of PerformanceProfile {}: {}", name, e);
            return match pending {
                Some(result) => Ok(result),
                None => Err(e),
            };
        }

        Ok(pending.unwrap_or(ReconcileResult::Done))
    }

    /// Removes generated components and, once they are gone, the finalizer
    async fn finalize(&self, mut profile: PerformanceProfile) -> Result<ReconcileResult, ControllerError> {
        let name = profile.name_any();
        if !has_finalizer(&profile) {
            debug!("PerformanceProfile {} is being deleted without our finalizer", name);
            return Ok(ReconcileResult::Done);
        }

        if let Err(e) = self.delete_components(&profile).await {
            self.recorder
                .record(
                    &profile,
                    EventSeverity::Warning,
                    EVENT_DELETION_FAILED,
                    &format!("Failed to delete components: {e}"),
                )
                .await;
            return Err(e.into());
        }
        self.recorder
            .record(
                &profile,
                EventSeverity::Normal,
                EVENT_DELETION_SUCCEEDED,
                "Succeeded to delete all components",
            )
            .await;

        if self.components_exist(&profile).await? {
            debug!("Components of PerformanceProfile {} still exist, waiting", name);
            return Ok(ReconcileResult::RequeueAfter(DELETION_REQUEUE));
        }

        info!("Removing finalizer from PerformanceProfile {}", name);
        profile.finalizers_mut().retain(|f| f != FINALIZER);
        self.client.update_profile(&profile).await?;
        self.forget(&name);
        Ok(ReconcileResult::Done)
    }

    /// Next requeue delay for a failing profile
    ///
    /// Returns (delay, consecutive error count)
    pub fn next_backoff(&self, key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(BackoffState::new);
                state.error_count += 1;
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (Duration::from_secs(60), 0)
            }
        }
    }

    /// Reset error count for a profile (on successful reconciliation)
    pub fn reset_error(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock()
            && let Some(state) = states.get_mut(key)
        {
            state.reset();
        }
    }

    /// Drops the backoff state of a profile that is gone
    fn forget(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }
}

fn has_finalizer(profile: &PerformanceProfile) -> bool {
    profile.finalizers().iter().any(|f| f == FINALIZER)
}

fn is_paused(profile: &PerformanceProfile) -> bool {
    profile
        .annotations()
        .get(PAUSE_ANNOTATION)
        .is_some_and(|value| value == "true")
}
