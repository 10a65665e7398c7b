//! Kubernetes events for performance profiles
//!
//! Events are fire-and-forget: a failure to publish is logged and never
//! fails the reconcile that emitted it.

use crds::PerformanceProfile;
use kube::Client;
use kube::Resource;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Event type as shown by `kubectl describe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// Sink for profile events
#[async_trait::async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, profile: &PerformanceProfile, severity: EventSeverity, reason: &str, message: &str);
}

/// Publishes events through the kube-runtime [`Recorder`]
#[derive(Clone)]
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    /// `controller` is the reporting component name shown on each event
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, profile: &PerformanceProfile, severity: EventSeverity, reason: &str, message: &str) {
        let event = Event {
            type_: match severity {
                EventSeverity::Normal => EventType::Normal,
                EventSeverity::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };

        if let Err(e) = self.recorder.publish(&event, &profile.object_ref(&())).await {
            warn!(
                "Failed to publish {:?} event {:?} for PerformanceProfile {:?}: {}",
                severity, reason, profile.meta().name, e
            );
        }
    }
}
