//! Tuned resource
//!
//! Node tuning daemon profiles plus the rules that decide which nodes
//! they are recommended for.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "tuned.openshift.io",
    version = "v1",
    kind = "Tuned",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TunedSpec {
    /// Tuned profiles, each an ini-style document
    #[serde(default)]
    pub profile: Vec<TunedProfile>,

    /// Selection rules, highest priority (lowest number) wins
    #[serde(default)]
    pub recommend: Vec<TunedRecommend>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TunedProfile {
    pub name: String,

    /// Profile body in tuned's ini format
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TunedRecommend {
    /// Name of the profile to apply
    pub profile: String,

    pub priority: u64,

    /// Machine config labels a node's pool must carry for this rule to match
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub machine_config_labels: BTreeMap<String, String>,
}
