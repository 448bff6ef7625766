//! EventSink - cheap-to-clone publish handle over a broadcast channel.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::OrcEvent;

/// At a few events per phase iteration, this buffers comfortably past any
/// slow subscriber without much memory cost.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// A cheap-to-clone publish handle. `publish` is synchronous and
/// non-blocking: a full or subscriber-less channel never blocks or errors
/// the caller (§4.9 "fire-and-forget", no back-pressure contract).
#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<OrcEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventSink::new");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: OrcEvent) {
        debug!(event_type = event.event_type(), task_id = event.task_id(), "EventSink::publish");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrcEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let sink = EventSink::default();
        sink.publish(OrcEvent::StateChanged {
            task_id: "t1".into(),
            status: "running".into(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let sink = EventSink::new(16);
        let mut rx = sink.subscribe();
        sink.publish(OrcEvent::PhaseStarted {
            task_id: "t1".into(),
            phase: "spec".into(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id(), "t1");
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let sink = EventSink::new(16);
        let mut rx1 = sink.subscribe();
        let mut rx2 = sink.subscribe();
        sink.publish(OrcEvent::StateChanged {
            task_id: "t1".into(),
            status: "complete".into(),
        });
        assert_eq!(rx1.recv().await.unwrap().task_id(), "t1");
        assert_eq!(rx2.recv().await.unwrap().task_id(), "t1");
    }
}
