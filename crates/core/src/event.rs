//! Domain event system — decoupled lifecycle notifications.
//!
//! The orchestrator and the sync loop publish events; external observers
//! subscribe. Publishing is fire-and-forget and never affects the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DomainEvent {
    PipelineStarted {
        run_id: String,
        goal: String,
    },

    PatternDiscovered {
        run_id: String,
        pattern_id: String,
        confidence: f32,
    },

    WorkflowCreated {
        run_id: String,
        workflow_name: String,
        node_count: usize,
    },

    ValidationCompleted {
        run_id: String,
        error_count: usize,
        warning_count: usize,
    },

    ValidationFailed {
        run_id: String,
        error_count: usize,
        first_error: Option<String>,
    },

    PipelineCompleted {
        run_id: String,
        total_time_ms: f64,
    },

    PipelineFailed {
        run_id: String,
        errors: Vec<String>,
    },

    /// The sync loop applied a catalog delta to the knowledge graph
    CatalogSynced {
        fingerprint: String,
        added: usize,
        modified: usize,
        removed: usize,
    },
}

impl DomainEvent {
    /// The stable event type name (`pipeline-started`, ...).
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::PipelineStarted { .. } => "pipeline-started",
            DomainEvent::PatternDiscovered { .. } => "pattern-discovered",
            DomainEvent::WorkflowCreated { .. } => "workflow-created",
            DomainEvent::ValidationCompleted { .. } => "validation-completed",
            DomainEvent::ValidationFailed { .. } => "validation-failed",
            DomainEvent::PipelineCompleted { .. } => "pipeline-completed",
            DomainEvent::PipelineFailed { .. } => "pipeline-failed",
            DomainEvent::CatalogSynced { .. } => "catalog-synced",
        }
    }
}

/// An event plus its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub event: DomainEvent,
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Slow subscribers lag and drop events rather than blocking publishers.
pub struct EventBus {
    sender: broadcast::Sender<Arc<EventEnvelope>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, source: &str, event: DomainEvent) {
        tracing::trace!(source, event_type = event.event_type(), "Publishing event");
        let envelope = EventEnvelope {
            source: source.to_string(),
            timestamp: Utc::now(),
            event,
        };
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(envelope));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventEnvelope>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(
            "orchestrator",
            DomainEvent::PatternDiscovered {
                run_id: "r1".into(),
                pattern_id: "slack-notification".into(),
                confidence: 0.6,
            },
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.source, "orchestrator");
        assert_eq!(envelope.event.event_type(), "pattern-discovered");
        match &envelope.event {
            DomainEvent::PatternDiscovered { pattern_id, .. } => {
                assert_eq!(pattern_id, "slack-notification");
            }
            _ => panic!("Expected PatternDiscovered event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(
            "orchestrator",
            DomainEvent::PipelineFailed {
                run_id: "r1".into(),
                errors: vec!["no subscribers".into()],
            },
        );
    }

    #[test]
    fn events_serialize_with_kebab_case_tag() {
        let json = serde_json::to_value(DomainEvent::ValidationCompleted {
            run_id: "r".into(),
            error_count: 0,
            warning_count: 2,
        })
        .unwrap();
        assert_eq!(json["type"], "validation-completed");
    }
}
