//! Kubernetes resource watchers.
//!
//! A single kube_runtime::Controller drives PerformanceProfile reconciles.
//! It also watches the objects a profile owns, so edits to generated
//! components are reverted, and machine config pools, so rollout progress
//! and degradation show up in profile status.

use crate::components::machine_config_pool_selector;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileResult, Reconciler};
use crds::{
    KubeletConfig, LabelSelector, MCP_DEGRADED, MCP_NODE_DEGRADED, MCP_RENDER_DEGRADED, MCP_UPDATED,
    MachineConfig, MachineConfigPool, PerformanceProfile, Tuned,
};
use futures::StreamExt;
use k8s_openapi::api::node::v1::RuntimeClass;
use kube::{Api, Client, ResourceExt};
use kube_runtime::{
    Controller, watcher,
    controller::{Action, Config as ControllerConfig},
    reflector::ObjectRef,
};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pool conditions that affect profile status
const FINGERPRINT_CONDITIONS: [&str; 4] = [MCP_UPDATED, MCP_DEGRADED, MCP_NODE_DEGRADED, MCP_RENDER_DEGRADED];

/// Hash of the parts of a pool that matter to profiles: its labels and
/// the status of its updated/degraded conditions
pub fn pool_fingerprint(pool: &MachineConfigPool) -> u64 {
    let mut hasher = DefaultHasher::new();
    pool.labels().hash(&mut hasher);
    for type_ in FINGERPRINT_CONDITIONS {
        let cond = pool.condition(type_);
        type_.hash(&mut hasher);
        cond.map(|c| c.status.as_str()).hash(&mut hasher);
        cond.and_then(|c| c.reason.as_deref()).hash(&mut hasher);
        cond.and_then(|c| c.message.as_deref()).hash(&mut hasher);
    }
    hasher.finish()
}

/// Last seen fingerprint per pool name
#[derive(Debug, Clone, Default)]
pub struct PoolFingerprints {
    seen: Arc<Mutex<HashMap<String, u64>>>,
}

impl PoolFingerprints {
    /// Records the pool's fingerprint, returning whether it differs from
    /// the previous one
    pub fn changed(&self, pool: &MachineConfigPool) -> bool {
        let fingerprint = pool_fingerprint(pool);
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(pool.name_any(), fingerprint) != Some(fingerprint),
            Err(e) => {
                warn!("Failed to lock pool fingerprints: {}", e);
                true
            }
        }
    }
}

/// Profiles whose pool selector matches the pool's labels
pub fn profiles_for_pool<'a>(
    profiles: impl IntoIterator<Item = &'a PerformanceProfile>,
    pool: &MachineConfigPool,
) -> Vec<ObjectRef<PerformanceProfile>> {
    let labels = pool.labels();
    profiles
        .into_iter()
        .filter(|profile| {
            machine_config_pool_selector(profile)
                .is_ok_and(|selector| LabelSelector::from_labels(selector).matches(labels))
        })
        .map(ObjectRef::from_obj)
        .collect()
}

async fn reconcile(profile: Arc<PerformanceProfile>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let name = profile.name_any();
    debug!("Reconciling PerformanceProfile {}", name);

    match ctx.reconcile(&name).await? {
        ReconcileResult::Done => Ok(Action::await_change()),
        ReconcileResult::RequeueAfter(delay) => Ok(Action::requeue(delay)),
    }
}

fn error_policy(profile: Arc<PerformanceProfile>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    let name = profile.name_any();
    let (delay, error_count) = ctx.next_backoff(&name);
    warn!(
        "Reconciliation of PerformanceProfile {} failed ({} consecutive errors), retrying in {:?}: {}",
        name, error_count, delay, error
    );
    Action::requeue(delay)
}

/// Runs the PerformanceProfile controller until shutdown.
pub async fn watch_profiles(
    client: Client,
    reconciler: Arc<Reconciler>,
    config: &OperatorConfig,
) -> Result<(), ControllerError> {
    info!("Starting PerformanceProfile watcher");

    let profiles = Api::<PerformanceProfile>::all(client.clone());
    let controller = Controller::new(profiles, watcher::Config::default());
    let store = controller.store();
    let fingerprints = PoolFingerprints::default();

    let pool_mapper = move |pool: MachineConfigPool| {
        if !fingerprints.changed(&pool) {
            return Vec::new();
        }
        let cached = store.state();
        let refs = profiles_for_pool(cached.iter().map(|profile| &**profile), &pool);
        debug!("MachineConfigPool {} changed, requeueing {} profiles", pool.name_any(), refs.len());
        refs
    };

    // Debounce batches bursts of owned-object events into one reconcile
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(config.reconcile_concurrency);

    controller
        .owns(Api::<MachineConfig>::all(client.clone()), watcher::Config::default())
        .owns(Api::<KubeletConfig>::all(client.clone()), watcher::Config::default())
        .owns(
            Api::<Tuned>::namespaced(client.clone(), &config.tuned_namespace),
            watcher::Config::default(),
        )
        .owns(Api::<RuntimeClass>::all(client.clone()), watcher::Config::default())
        .watches(
            Api::<MachineConfigPool>::all(client),
            watcher::Config::default(),
            pool_mapper,
        )
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _action)) => debug!("Reconciled PerformanceProfile {}", obj.name),
                Err(e) => error!("Controller error for PerformanceProfile: {}", e),
            }
        })
        .await;

    info!("PerformanceProfile watcher stopped");
    Ok(())
}
