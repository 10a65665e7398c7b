//! Recording event sink

use super::lock;
use crate::events::{EventRecorder, EventSeverity};
use crds::PerformanceProfile;
use kube::ResourceExt;
use std::sync::{Arc, Mutex};

/// An event captured by [`MockEventRecorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub profile: String,
    pub severity: EventSeverity,
    pub reason: String,
    pub message: String,
}

/// Event recorder that keeps every event in memory
#[derive(Clone, Default)]
pub struct MockEventRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl MockEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first
    pub fn events(&self) -> Vec<RecordedEvent> {
        lock(&self.events).clone()
    }

    /// Reasons of recorded events, oldest first
    pub fn reasons(&self) -> Vec<String> {
        lock(&self.events).iter().map(|e| e.reason.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

#[async_trait::async_trait]
impl EventRecorder for MockEventRecorder {
    async fn record(&self, profile: &PerformanceProfile, severity: EventSeverity, reason: &str, message: &str) {
        lock(&self.events).push(RecordedEvent {
            profile: profile.name_any(),
            severity,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}
