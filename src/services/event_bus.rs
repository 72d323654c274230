use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

/// Internal observability events for the ingest and query state machines.
/// Nowhere in the public HTTP contract (§6 is unchanged); a sink for tests
/// and optional external export.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum SystemEvent {
    IngestStageEntered { doc_id: String, stage: String },
    IngestCompleted { doc_id: String, chunk_count: usize },
    IngestFailed { doc_id: String, stage: String, reason: String },
    QueryStageEntered { request_id: String, stage: String },
    QueryCompleted { request_id: String, latency_ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub session_id: String,
    pub event: SystemEvent,
}

/// Non-blocking fan-out of pipeline transitions. `publish` never awaits and
/// never fails the caller's request; a full channel or zero subscribers
/// both just drop the event.
pub struct EventBus {
    tx: broadcast::Sender<Envelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, session_id: impl Into<String>, event: SystemEvent) {
        let envelope = Envelope {
            session_id: session_id.into(),
            event,
        };
        if let Err(e) = self.tx.send(envelope) {
            warn!(error = %e, "event published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(
            "doc-1",
            SystemEvent::IngestStageEntered {
                doc_id: "doc-1".into(),
                stage: "parsed".into(),
            },
        );
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.session_id, "doc-1");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish(
            "doc-2",
            SystemEvent::IngestCompleted {
                doc_id: "doc-2".into(),
                chunk_count: 3,
            },
        );
    }
}
