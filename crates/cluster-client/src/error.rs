//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the cluster object store
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Transport or API server error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other API failure
    #[error("API error: {0}")]
    Api(String),
}

impl ClusterError {
    /// Whether the error means the object is absent
    pub fn is_not_found(&self) -> bool {
        match self {
            ClusterError::NotFound(_) => true,
            ClusterError::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }
}
