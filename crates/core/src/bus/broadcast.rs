//! In-process change bus on a tokio broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::{ChangeBus, ChangeBusError, ChangeEvent, MessageId};

/// Fan-out change bus for subscribers in the same process.
///
/// Publishing with no subscribers succeeds; the event is simply dropped.
/// Slow subscribers lag and lose the oldest events.
pub struct BroadcastChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
    closed: AtomicBool,
}

impl BroadcastChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Stop accepting events. Subsequent publishes and health checks fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeBus for BroadcastChangeBus {
    async fn publish_change(&self, event: &ChangeEvent) -> Result<MessageId, ChangeBusError> {
        if self.is_closed() {
            return Err(ChangeBusError::Closed);
        }

        // A send error only means nobody is listening right now.
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        debug!(
            "Published {:?} for {} to {} subscriber(s)",
            event.kind,
            event.key(),
            delivered
        );

        Ok(MessageId(event.event_id.to_string()))
    }

    async fn health_check(&self) -> Result<(), ChangeBusError> {
        if self.is_closed() {
            return Err(ChangeBusError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChangeKind;
    use crate::ticket::{TicketKey, TicketTable};

    fn event() -> ChangeEvent {
        ChangeEvent::invalidated(&TicketKey::new("test-123", TicketTable::Incident))
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = BroadcastChangeBus::new(16);
        let mut rx = bus.subscribe();

        let event = event();
        let id = bus.publish_change(&event).await.unwrap();
        assert_eq!(id.0, event.event_id.to_string());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, ChangeKind::Invalidated);
        assert_eq!(received.sys_id, "test-123");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let bus = BroadcastChangeBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish_change(&event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_bus_is_unhealthy() {
        let bus = BroadcastChangeBus::new(16);
        assert!(bus.health_check().await.is_ok());

        bus.close();

        assert!(matches!(
            bus.health_check().await,
            Err(ChangeBusError::Closed)
        ));
        assert!(matches!(
            bus.publish_change(&event()).await,
            Err(ChangeBusError::Closed)
        ));
    }
}
