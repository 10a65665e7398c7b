//! Unit tests for the PerformanceProfile reconcile loop

#[cfg(test)]
mod tests {
    use crate::config::{FINALIZER, PAUSE_ANNOTATION};
    use crate::error::ControllerError;
    use crate::reconciler::{DELETION_REQUEUE, ReconcileResult};
    use crate::test_utils::*;
    use crate::validation::ProfileValidator;
    use cluster_client::{ClusterClientTrait, EventSeverity, MockClusterClient};
    use crds::{ConditionStatus, ConditionType, PerformanceProfile};
    use kube::ResourceExt;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const TUNED_KEY: &str = "openshift-cluster-node-tuning-operator/openshift-node-performance-manual";

    fn stored(client: &MockClusterClient) -> PerformanceProfile {
        client.profile("manual").expect("profile should be stored")
    }

    fn creates(client: &MockClusterClient) -> Vec<String> {
        client
            .mutating_calls()
            .into_iter()
            .filter(|call| call.starts_with("create "))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_profile_is_done() {
        let (reconciler, client, recorder) = create_test_reconciler();

        let result = reconciler.reconcile("manual").await.unwrap();

        assert_eq!(result, ReconcileResult::Done);
        assert!(client.mutating_calls().is_empty());
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_first_pass_adds_finalizer_and_progressing() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        client.add_profile(create_test_profile("manual"));

        let result = reconciler.reconcile("manual").await.unwrap();

        assert_eq!(result, ReconcileResult::Done);
        assert_eq!(
            client.mutating_calls(),
            vec!["update PerformanceProfile manual", "update_status PerformanceProfile manual"]
        );

        let profile = stored(&client);
        assert_eq!(profile.finalizers(), [FINALIZER.to_string()]);
        let progressing = find_condition(&profile, ConditionType::Progressing);
        assert_eq!(progressing.status, ConditionStatus::True);
        assert_eq!(progressing.reason.as_deref(), Some("DeploymentStarting"));
        assert_eq!(progressing.message.as_deref(), Some("Deployment is starting"));
        assert!(client.machine_config("50-performance-manual").is_none());
        // nothing was generated yet, so nothing is referenced
        let status = profile.status.unwrap();
        assert_eq!(status.tuned, None);
        assert_eq!(status.runtime_class, None);
    }

    #[tokio::test]
    async fn test_creates_components_and_reports_available() {
        let (reconciler, client, recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        client.add_pool(create_healthy_pool("worker-cnf"));

        let result = reconciler.reconcile("manual").await.unwrap();

        assert_eq!(result, ReconcileResult::Done);
        assert_eq!(
            client.mutating_calls(),
            vec![
                "create MachineConfig 50-performance-manual".to_string(),
                format!("create Tuned {TUNED_KEY}"),
                "create KubeletConfig performance-manual".to_string(),
                "create RuntimeClass performance-manual".to_string(),
                "update_status PerformanceProfile manual".to_string(),
            ]
        );
        assert_eq!(recorder.reasons(), vec!["Creation succeeded"]);
        assert_eq!(recorder.events()[0].severity, EventSeverity::Normal);

        let profile = stored(&client);
        assert_eq!(find_condition(&profile, ConditionType::Available).status, ConditionStatus::True);
        assert_eq!(find_condition(&profile, ConditionType::Upgradeable).status, ConditionStatus::True);
        assert_eq!(find_condition(&profile, ConditionType::Progressing).status, ConditionStatus::False);
        assert_eq!(find_condition(&profile, ConditionType::Degraded).status, ConditionStatus::False);

        let status = profile.status.unwrap();
        assert_eq!(status.tuned.as_deref(), Some(TUNED_KEY));
        assert_eq!(status.runtime_class.as_deref(), Some("performance-manual"));

        assert_eq!(reconciler.metrics.applied("MachineConfig"), 1);
        assert_eq!(reconciler.metrics.reconciles(), 1);
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let (reconciler, client, recorder) = create_test_reconciler();
        client.add_profile(create_test_profile("manual"));
        client.add_pool(create_healthy_pool("worker-cnf"));

        reconciler.reconcile("manual").await.unwrap();
        reconciler.reconcile("manual").await.unwrap();
        client.clear_calls();
        recorder.clear();

        let result = reconciler.reconcile("manual").await.unwrap();

        assert_eq!(result, ReconcileResult::Done);
        assert!(client.mutating_calls().is_empty(), "{:?}", client.mutating_calls());
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_spec_change_updates_only_affected_components() {
        let (reconciler, client, recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        reconciler.reconcile("manual").await.unwrap();
        client.clear_calls();
        recorder.clear();

        let mut profile = stored(&client);
        profile.spec.cpu.balance_isolated = Some(false);
        client.add_profile(profile);

        reconciler.reconcile("manual").await.unwrap();

        assert_eq!(
            client.mutating_calls(),
            vec!["update MachineConfig 50-performance-manual".to_string(), format!("update Tuned {TUNED_KEY}")]
        );
        assert_eq!(recorder.reasons(), vec!["Creation succeeded"]);
        let mc = client.machine_config("50-performance-manual").unwrap();
        assert!(
            mc.spec
                .kernel_arguments
                .contains(&"isolcpus=domain,managed_irq,2-7".to_string())
        );
    }

    #[tokio::test]
    async fn test_deletion_drains_in_two_passes() {
        let (reconciler, client, recorder) = create_test_reconciler_with(MockClusterClient::new().with_deferred_deletion());
        client.add_profile(create_finalized_profile("manual"));
        reconciler.reconcile("manual").await.unwrap();
        client.clear_calls();
        recorder.clear();

        client.add_profile(create_deleted_profile("manual"));

        let first = reconciler.reconcile("manual").await.unwrap();
        assert_eq!(first, ReconcileResult::RequeueAfter(DELETION_REQUEUE));
        assert_eq!(first, ReconcileResult::RequeueAfter(Duration::from_secs(10)));
        assert_eq!(
            client.mutating_calls(),
            vec![
                format!("delete Tuned {TUNED_KEY}"),
                "delete KubeletConfig performance-manual".to_string(),
                "delete RuntimeClass performance-manual".to_string(),
                "delete MachineConfig 50-performance-manual".to_string(),
            ]
        );
        assert_eq!(stored(&client).finalizers(), [FINALIZER.to_string()]);
        assert_eq!(recorder.reasons(), vec!["Deletion succeeded"]);

        client.collect_garbage();
        let second = reconciler.reconcile("manual").await.unwrap();

        assert_eq!(second, ReconcileResult::Done);
        assert!(client.profile("manual").is_none());
    }

    #[tokio::test]
    async fn test_deletion_without_components_takes_one_pass() {
        let (reconciler, client, recorder) = create_test_reconciler();
        client.add_profile(create_deleted_profile("manual"));

        let result = reconciler.reconcile("manual").await.unwrap();

        assert_eq!(result, ReconcileResult::Done);
        assert!(client.profile("manual").is_none());
        assert_eq!(recorder.reasons(), vec!["Deletion succeeded"]);
    }

    #[tokio::test]
    async fn test_deletion_failure_keeps_finalizer() {
        let (reconciler, client, recorder) = create_test_reconciler();
        client.add_profile(create_deleted_profile("manual"));
        client.fail_on("delete KubeletConfig", "connection reset");

        let err = reconciler.reconcile("manual").await.unwrap_err();

        assert!(matches!(err, ControllerError::Cluster(_)));
        assert_eq!(recorder.reasons(), vec!["Deletion failed"]);
        assert_eq!(recorder.events()[0].severity, EventSeverity::Warning);
        assert!(recorder.events()[0].message.contains("connection reset"));
        assert_eq!(stored(&client).finalizers(), [FINALIZER.to_string()]);
    }

    #[tokio::test]
    async fn test_paused_profile_never_creates_components() {
        let (reconciler, client, recorder) = create_test_reconciler();
        let mut profile = create_test_profile("manual");
        profile.metadata.annotations = Some(BTreeMap::from([(PAUSE_ANNOTATION.to_string(), "true".to_string())]));
        client.add_profile(profile);

        for _ in 0..3 {
            assert_eq!(reconciler.reconcile("manual").await.unwrap(), ReconcileResult::Done);
        }

        // lifecycle bookkeeping still happens while paused
        let profile = stored(&client);
        assert_eq!(profile.finalizers(), [FINALIZER.to_string()]);
        assert_eq!(find_condition(&profile, ConditionType::Progressing).status, ConditionStatus::True);

        assert!(creates(&client).is_empty());
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_paused_profile_without_status_is_left_alone() {
        let (reconciler, client, recorder) = create_test_reconciler();
        let mut profile = create_finalized_profile("manual");
        profile.metadata.annotations = Some(BTreeMap::from([(PAUSE_ANNOTATION.to_string(), "true".to_string())]));
        client.add_profile(profile);

        assert_eq!(reconciler.reconcile("manual").await.unwrap(), ReconcileResult::Done);

        assert!(client.mutating_calls().is_empty());
        assert!(recorder.events().is_empty());
        assert!(stored(&client).status.is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_is_terminal() {
        let (reconciler, client, recorder) = create_test_reconciler();
        let mut profile = create_finalized_profile("manual");
        profile.spec.cpu.isolated = "1-7".to_string();
        client.add_profile(profile);

        let result = reconciler.reconcile("manual").await.unwrap();

        assert_eq!(result, ReconcileResult::Done);
        assert!(creates(&client).is_empty());
        assert_eq!(recorder.reasons(), vec!["Validation failed"]);
        assert_eq!(recorder.events()[0].severity, EventSeverity::Warning);

        let degraded = find_condition(&stored(&client), ConditionType::Degraded);
        assert_eq!(degraded.status, ConditionStatus::True);
        assert_eq!(degraded.reason.as_deref(), Some("ValidationFailed"));
        assert_eq!(degraded.message.as_deref(), Some("reserved and isolated CPUs overlap: 1"));
        assert_eq!(stored(&client).status.unwrap().tuned, None);
    }

    #[tokio::test]
    async fn test_out_of_range_cpu_is_a_validation_failure() {
        let (reconciler, client, recorder) = create_test_reconciler();
        let mut profile = create_finalized_profile("manual");
        profile.spec.cpu.reserved = "1000000000".to_string();
        client.add_profile(profile);

        assert_eq!(reconciler.reconcile("manual").await.unwrap(), ReconcileResult::Done);

        assert!(creates(&client).is_empty());
        assert_eq!(recorder.reasons(), vec!["Validation failed"]);
        let degraded = find_condition(&stored(&client), ConditionType::Degraded);
        assert_eq!(degraded.reason.as_deref(), Some("ValidationFailed"));
        assert!(degraded.message.unwrap().contains("out of range"));
    }

    struct RejectAll;

    impl ProfileValidator for RejectAll {
        fn validate(&self, _profile: &PerformanceProfile) -> Result<(), String> {
            Err("rejected".to_string())
        }
    }

    #[tokio::test]
    async fn test_custom_validator() {
        let (reconciler, client, recorder) = create_test_reconciler();
        let reconciler = reconciler.with_validator(RejectAll);
        client.add_profile(create_finalized_profile("manual"));

        reconciler.reconcile("manual").await.unwrap();

        assert!(creates(&client).is_empty());
        assert_eq!(recorder.events()[0].message, "rejected");
    }

    #[tokio::test]
    async fn test_creation_failure_degrades_and_errors() {
        let (reconciler, client, recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        client.fail_on("create KubeletConfig", "quota exceeded");

        let err = reconciler.reconcile("manual").await.unwrap_err();

        assert!(err.to_string().contains("quota exceeded"), "{err}");
        assert_eq!(recorder.reasons(), vec!["Creation failed"]);
        let degraded = find_condition(&stored(&client), ConditionType::Degraded);
        assert_eq!(degraded.status, ConditionStatus::True);
        assert_eq!(degraded.reason.as_deref(), Some("ComponentCreationFailed"));
        assert_eq!(reconciler.metrics.errors(), 1);

        client.clear_failures();
        reconciler.reconcile("manual").await.unwrap();

        let profile = stored(&client);
        assert_eq!(find_condition(&profile, ConditionType::Available).status, ConditionStatus::True);
        assert_eq!(find_condition(&profile, ConditionType::Degraded).status, ConditionStatus::False);
        assert_eq!(recorder.reasons(), vec!["Creation failed", "Creation succeeded"]);
    }

    #[tokio::test]
    async fn test_degraded_pool_reports_degraded_only() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        client.add_pool(create_degraded_pool("worker-cnf", "1 nodes are reporting degraded status on sync", "Node node-1 is degraded"));

        reconciler.reconcile("manual").await.unwrap();

        let profile = stored(&client);
        let degraded = find_condition(&profile, ConditionType::Degraded);
        assert_eq!(degraded.status, ConditionStatus::True);
        assert_eq!(degraded.reason.as_deref(), Some("MCPDegraded"));
        assert!(
            degraded
                .message
                .as_deref()
                .unwrap()
                .contains("Machine config pool worker-cnf Degraded Reason: 1 nodes are reporting degraded status on sync.")
        );
        assert_eq!(find_condition(&profile, ConditionType::Available).status, ConditionStatus::False);
        assert_eq!(find_condition(&profile, ConditionType::Progressing).status, ConditionStatus::False);
    }

    #[tokio::test]
    async fn test_pool_recovery_returns_to_available() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        client.add_pool(create_degraded_pool("worker-cnf", "NodeFailed", "node-1 failed"));
        reconciler.reconcile("manual").await.unwrap();

        client.add_pool(create_healthy_pool("worker-cnf"));
        reconciler.reconcile("manual").await.unwrap();

        let profile = stored(&client);
        assert_eq!(find_condition(&profile, ConditionType::Available).status, ConditionStatus::True);
        assert_eq!(find_condition(&profile, ConditionType::Degraded).status, ConditionStatus::False);
    }

    #[tokio::test]
    async fn test_pool_listing_failure() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        client.fail_on("list MachineConfigPool", "timeout");

        let err = reconciler.reconcile("manual").await.unwrap_err();

        assert!(matches!(err, ControllerError::StatusRead(_)));
        let degraded = find_condition(&stored(&client), ConditionType::Degraded);
        assert_eq!(degraded.reason.as_deref(), Some("GettingMCPStatusFailed"));
    }

    #[tokio::test]
    async fn test_status_write_failure_prefers_pending_result() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        client.fail_on("update_status PerformanceProfile", "conflict");

        // components were written, so the pass still succeeds
        assert_eq!(reconciler.reconcile("manual").await.unwrap(), ReconcileResult::Done);

        // nothing left to apply, the status error surfaces
        assert!(reconciler.reconcile("manual").await.is_err());
    }

    #[tokio::test]
    async fn test_backoff_grows_and_resets_on_success() {
        let (reconciler, client, _recorder) = create_test_reconciler();

        assert_eq!(reconciler.next_backoff("manual"), (Duration::from_secs(5), 1));
        assert_eq!(reconciler.next_backoff("manual"), (Duration::from_secs(10), 2));
        assert_eq!(reconciler.next_backoff("other"), (Duration::from_secs(5), 1));

        client.add_profile(create_finalized_profile("manual"));
        reconciler.reconcile("manual").await.unwrap();

        assert_eq!(reconciler.next_backoff("manual"), (Duration::from_secs(5), 1));
    }

    #[tokio::test]
    async fn test_finalizer_only_removed_once_components_gone() {
        let (reconciler, client, _recorder) = create_test_reconciler();
        client.add_profile(create_finalized_profile("manual"));
        reconciler.reconcile("manual").await.unwrap();
        assert!(client.get_runtime_class("performance-manual").await.is_ok());

        reconciler.next_backoff("manual");

        client.add_profile(create_deleted_profile("manual"));
        assert_eq!(reconciler.reconcile("manual").await.unwrap(), ReconcileResult::Done);

        assert!(client.get_runtime_class("performance-manual").await.unwrap_err().is_not_found());
        assert!(client.profile("manual").is_none());
        // released profiles leave no backoff state behind
        assert!(!reconciler.backoff_states.lock().unwrap().contains_key("manual"));
    }
}
