//! Main controller implementation.
//!
//! Wires the Kubernetes client, the reconciler and the probe server
//! together and runs them until one of them stops.

use crate::config::{CONTROLLER_NAME, OperatorConfig};
use crate::error::ControllerError;
use crate::metrics::ControllerMetrics;
use crate::probes::{self, ProbeState};
use crate::reconciler::Reconciler;
use crate::watcher;
use cluster_client::{KubeClusterClient, KubeEventRecorder};
use kube::Client;
use std::sync::Arc;
use tracing::info;

/// Main controller for PerformanceProfile resources.
pub struct Controller {
    client: Client,
    reconciler: Arc<Reconciler>,
    probes: ProbeState,
    config: OperatorConfig,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing PerformanceProfile controller");

        let client = Client::try_default().await?;

        let metrics = Arc::new(
            ControllerMetrics::new().map_err(|e| ControllerError::Server(format!("failed to register metrics: {e}")))?,
        );

        let reconciler = Reconciler::new(
            Arc::new(KubeClusterClient::new(client.clone())),
            Arc::new(KubeEventRecorder::new(client.clone(), CONTROLLER_NAME)),
            config.clone(),
            Arc::clone(&metrics),
        );

        Ok(Self {
            client,
            reconciler: Arc::new(reconciler),
            probes: ProbeState::new(metrics),
            config,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        let probe_server = tokio::spawn(probes::serve(self.config.probe_addr, self.probes.clone()));

        self.probes.set_ready(true);
        info!("PerformanceProfile controller running");

        // Whichever finishes first ends the process
        tokio::select! {
            result = probe_server => {
                result.map_err(|e| ControllerError::Server(format!("probe server panicked: {}", e)))??;
            }
            result = watcher::watch_profiles(self.client, self.reconciler, &self.config) => {
                result?;
            }
        }

        Ok(())
    }
}
