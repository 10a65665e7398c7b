//! PerformanceProfile Controller
//!
//! Translates PerformanceProfile resources into the node configuration
//! that implements them:
//! - MachineConfig: kernel arguments, boot-time tuning scripts, CRI-O drop-in
//! - KubeletConfig: static CPU manager and topology manager policy
//! - Tuned: tuned profile recommended for the profile's machine config pool
//! - RuntimeClass: high-performance runtime handler for the profile's nodes
//!
//! Rollout state of the matching machine config pools is folded back into
//! the profile's status conditions.

mod backoff;
mod components;
mod config;
mod controller;
mod error;
mod metrics;
mod probes;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod validation;
mod watcher;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting PerformanceProfile Controller");

    let config = OperatorConfig::from_env()?;
    info!("Configuration:");
    info!("  Tuned namespace: {}", config.tuned_namespace);
    info!("  Probe address: {}", config.probe_addr);
    info!("  Reconcile concurrency: {}", config.reconcile_concurrency);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
