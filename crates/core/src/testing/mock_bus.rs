//! Mock change bus for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bus::{ChangeBus, ChangeBusError, ChangeEvent, MessageId};

/// Recording implementation of the ChangeBus trait.
#[derive(Debug, Default)]
pub struct MockChangeBus {
    published: Arc<RwLock<Vec<ChangeEvent>>>,
    fail: Arc<RwLock<bool>>,
    unhealthy: Arc<RwLock<bool>>,
}

impl MockChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<ChangeEvent> {
        self.published.read().await.clone()
    }

    /// Make every publish fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn set_healthy(&self, healthy: bool) {
        *self.unhealthy.write().await = !healthy;
    }
}

#[async_trait]
impl ChangeBus for MockChangeBus {
    async fn publish_change(&self, event: &ChangeEvent) -> Result<MessageId, ChangeBusError> {
        if *self.fail.read().await {
            return Err(ChangeBusError::Publish("mock publish failure".to_string()));
        }
        self.published.write().await.push(event.clone());
        Ok(MessageId(event.event_id.to_string()))
    }

    async fn health_check(&self) -> Result<(), ChangeBusError> {
        if *self.unhealthy.read().await {
            return Err(ChangeBusError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{TicketKey, TicketTable};

    #[test]
    fn test_records_published_events() {
        let bus = MockChangeBus::new();
        let event = ChangeEvent::invalidated(&TicketKey::new("a", TicketTable::Incident));

        let id = tokio_test::block_on(bus.publish_change(&event)).unwrap();

        assert_eq!(id.0, event.event_id.to_string());
        assert_eq!(tokio_test::block_on(bus.published()), vec![event]);
    }

    #[test]
    fn test_failure_records_nothing() {
        let bus = MockChangeBus::new();
        tokio_test::block_on(bus.set_fail(true));
        let event = ChangeEvent::invalidated(&TicketKey::new("a", TicketTable::Incident));

        assert!(tokio_test::block_on(bus.publish_change(&event)).is_err());
        assert!(tokio_test::block_on(bus.published()).is_empty());
    }
}
