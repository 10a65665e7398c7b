//! Performance profile CRD definitions
//!
//! The `PerformanceProfile` custom resource plus the node-configuration
//! resources (machine configs, kubelet configs, tuned profiles, machine
//! config pools) the controller generates or reads.

pub mod machine_config;
pub mod performance_profile;
pub mod selector;
pub mod tuned;

pub use machine_config::*;
pub use performance_profile::*;
pub use selector::*;
pub use tuned::*;
