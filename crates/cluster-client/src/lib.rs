//! Cluster object store client
//!
//! A narrow view of the Kubernetes API covering exactly what the
//! performance profile controller reads and writes: the profile itself,
//! its four generated artifacts, and machine config pools.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClientTrait, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::new(kube::Client::try_default().await?);
//!
//! let profile = client.get_profile("manual").await?;
//! let pools = client
//!     .list_machine_config_pools("machineconfiguration.openshift.io/role=worker-cnf")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! With the `test-util` feature, [`MockClusterClient`] and
//! [`MockEventRecorder`] provide in-memory stand-ins for unit tests.

pub mod client;
pub mod error;
pub mod events;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use error::ClusterError;
pub use events::{EventRecorder, EventSeverity, KubeEventRecorder};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterClient, MockEventRecorder, RecordedEvent};
