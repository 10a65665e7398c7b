//! Unit tests for component application

#[cfg(test)]
mod tests {
    use crate::components::{self, owner_reference};
    use crate::config::OperatorConfig;
    use crate::reconciler::apply::mutated;
    use crate::test_utils::*;
    use cluster_client::ClusterClientTrait;
    use crds::{Tuned, TunedSpec};
    use kube::ResourceExt;
    use std::collections::BTreeMap;

    const NS: &str = "openshift-cluster-node-tuning-operator";

    #[test]
    fn test_unchanged_component_is_not_mutated() {
        let profile = create_test_profile("manual");
        let desired = components::synthesize(&profile, &OperatorConfig::default()).unwrap();

        let mut existing = desired.machine_config.clone();
        existing.metadata.uid = Some("mock-uid-1".to_string());
        existing.metadata.resource_version = Some("7".to_string());
        existing
            .labels_mut()
            .insert("added-by".to_string(), "someone-else".to_string());

        assert_eq!(mutated(&existing, &desired.machine_config), None);
    }

    #[test]
    fn test_desired_labels_win_and_foreign_labels_stay() {
        let profile = create_test_profile("manual");
        let desired = components::synthesize(&profile, &OperatorConfig::default()).unwrap();

        let mut existing = desired.machine_config.clone();
        existing
            .labels_mut()
            .insert("machineconfiguration.openshift.io/role".to_string(), "worker".to_string());
        existing.labels_mut().insert("team".to_string(), "edge".to_string());

        let updated = mutated(&existing, &desired.machine_config).unwrap();
        assert_eq!(
            updated.labels().get("machineconfiguration.openshift.io/role").map(String::as_str),
            Some("worker-cnf")
        );
        assert_eq!(updated.labels().get("team").map(String::as_str), Some("edge"));
    }

    #[test]
    fn test_spec_is_overwritten_and_identity_kept() {
        let profile = create_test_profile("manual");
        let desired = components::synthesize(&profile, &OperatorConfig::default()).unwrap();

        let mut existing = desired.kubelet_config.clone();
        existing.metadata.uid = Some("mock-uid-3".to_string());
        if let Some(config) = existing.spec.kubelet_config.as_mut() {
            config.cpu_manager_policy = Some("none".to_string());
        }

        let updated = mutated(&existing, &desired.kubelet_config).unwrap();
        assert_eq!(updated.spec, desired.kubelet_config.spec);
        assert_eq!(updated.metadata.uid.as_deref(), Some("mock-uid-3"));
    }

    #[test]
    fn test_runtime_class_handler_change() {
        let profile = create_test_profile("manual");
        let desired = components::synthesize(&profile, &OperatorConfig::default()).unwrap();

        let mut existing = desired.runtime_class.clone();
        existing.handler = "runc".to_string();

        let updated = mutated(&existing, &desired.runtime_class).unwrap();
        assert_eq!(updated.handler, "high-performance");
    }

    #[tokio::test]
    async fn test_apply_reports_whether_anything_was_written() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        let profile = create_finalized_profile("manual");

        assert!(reconciler.apply_components(&profile).await.unwrap());
        client.clear_calls();
        assert!(!reconciler.apply_components(&profile).await.unwrap());
        assert!(client.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_outdated_tuned_is_swept() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        let profile = create_finalized_profile("manual");

        let mut outdated = Tuned::new("openshift-node-performance-old", TunedSpec::default());
        outdated.metadata.namespace = Some(NS.to_string());
        outdated.metadata.owner_references = Some(vec![owner_reference(&profile).unwrap()]);
        client.add_tuned(outdated);

        let mut foreign = Tuned::new("default", TunedSpec::default());
        foreign.metadata.namespace = Some(NS.to_string());
        client.add_tuned(foreign);

        reconciler.apply_components(&profile).await.unwrap();

        let calls = client.mutating_calls();
        let delete = calls
            .iter()
            .position(|c| c == &format!("delete Tuned {NS}/openshift-node-performance-old"))
            .unwrap();
        let create = calls
            .iter()
            .position(|c| c == &format!("create Tuned {NS}/openshift-node-performance-manual"))
            .unwrap();
        assert!(delete < create);
        assert!(client.tuned(NS, "openshift-node-performance-old").is_none());
        assert!(client.tuned(NS, "default").is_some());
    }

    #[tokio::test]
    async fn test_delete_components_order_and_missing_objects() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        let profile = create_finalized_profile("manual");
        reconciler.apply_components(&profile).await.unwrap();
        assert!(reconciler.components_exist(&profile).await.unwrap());
        client.clear_calls();

        reconciler.delete_components(&profile).await.unwrap();

        assert_eq!(
            client.mutating_calls(),
            vec![
                format!("delete Tuned {NS}/openshift-node-performance-manual"),
                "delete KubeletConfig performance-manual".to_string(),
                "delete RuntimeClass performance-manual".to_string(),
                "delete MachineConfig 50-performance-manual".to_string(),
            ]
        );
        assert!(!reconciler.components_exist(&profile).await.unwrap());

        // a second delete finds nothing and still succeeds
        reconciler.delete_components(&profile).await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_uses_configured_tuned_namespace() {
        let (mut reconciler, client, _recorder) = create_test_reconciler();
        reconciler.config.tuned_namespace = "tuning".to_string();
        let profile = create_finalized_profile("manual");

        reconciler.apply_components(&profile).await.unwrap();

        let tuned = client.get_tuned("tuning", "openshift-node-performance-manual").await.unwrap();
        assert_eq!(
            tuned.spec.recommend[0].machine_config_labels,
            BTreeMap::from([(
                "machineconfiguration.openshift.io/role".to_string(),
                "worker-cnf".to_string()
            )])
        );
    }
}
