//! Controller-specific error types.
//!
//! Errors from the cluster client and CPU set parsing are wrapped here so
//! a reconcile pass has a single error type to hand to the error policy.

use crate::components::SynthesisError;
use cluster_client::ClusterError;
use thiserror::Error;

/// Errors that can occur in the performance profile controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Object store error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Components could not be generated from the profile
    #[error("Component synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Machine config pool status could not be read
    #[error("Failed to read machine config pool status: {0}")]
    StatusRead(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Probe/metrics server failed
    #[error("Probe server failed: {0}")]
    Server(String),
}

impl ControllerError {
    /// Whether the underlying cause is a missing object
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::Cluster(e) if e.is_not_found())
    }
}

impl From<kube::Error> for ControllerError {
    fn from(e: kube::Error) -> Self {
        ControllerError::Cluster(ClusterError::Kube(e))
    }
}
