//! In-process broker on a tokio channel
//!
//! Used by the local deployment and by tests. Dead-lettered batches are
//! retained for inspection instead of being dropped.

use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::events::EventBatch;
use crate::messaging::traits::MessageBroker;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub struct ChannelBroker {
    tx: Mutex<Option<mpsc::UnboundedSender<EventBatch>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<EventBatch>>,
    dead: Mutex<Vec<EventBatch>>,
}

impl ChannelBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            dead: Mutex::new(Vec::new()),
        }
    }

    /// Batches parked by [`MessageBroker::dead_letter`]
    pub fn dead_letters(&self) -> Vec<EventBatch> {
        self.dead.lock().clone()
    }

    fn send(&self, batch: EventBatch) -> MessagingResult<()> {
        let tx = self.tx.lock();
        let Some(ref sender) = *tx else {
            return Err(MessagingError::BackendUnavailable(
                "channel broker closed".to_string(),
            ));
        };
        sender
            .send(batch)
            .map_err(|e| MessagingError::PublishFailed(e.to_string()))
    }
}

impl Default for ChannelBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for ChannelBroker {
    async fn publish(&self, batch: EventBatch) -> MessagingResult<()> {
        self.send(batch)
    }

    async fn next_batch(&self) -> MessagingResult<Option<EventBatch>> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn requeue(&self, batch: EventBatch) -> MessagingResult<()> {
        tracing::debug!(batch_id = %batch.id, attempts = batch.attempts, "Requeueing batch");
        self.send(batch)
    }

    async fn dead_letter(&self, batch: EventBatch) -> MessagingResult<()> {
        tracing::warn!(
            batch_id = %batch.id,
            entity = %batch.entity,
            attempts = batch.attempts,
            "Batch dead-lettered"
        );
        self.dead.lock().push(batch);
        Ok(())
    }

    async fn close(&self) -> MessagingResult<()> {
        self.tx.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeEvent, ChangeType, ContentKind, EntityId};

    fn batch(user: &str) -> EventBatch {
        EventBatch::new(
            EntityId::user(user),
            vec![ChangeEvent::new(
                EntityId::user(user),
                ChangeType::Created,
                ContentKind::Note,
                "tag:n1",
            )],
        )
    }

    #[tokio::test]
    async fn test_publish_then_consume() {
        let broker = ChannelBroker::new();
        broker.publish(batch("alice")).await.unwrap();
        broker.publish(batch("bob")).await.unwrap();

        let first = broker.next_batch().await.unwrap().unwrap();
        assert_eq!(first.entity, EntityId::user("alice"));
        let second = broker.next_batch().await.unwrap().unwrap();
        assert_eq!(second.entity, EntityId::user("bob"));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let broker = ChannelBroker::new();
        broker.publish(batch("alice")).await.unwrap();
        broker.close().await.unwrap();

        assert!(broker.next_batch().await.unwrap().is_some());
        assert!(broker.next_batch().await.unwrap().is_none());
        assert!(broker.publish(batch("carol")).await.is_err());
    }

    #[tokio::test]
    async fn test_dead_letters_are_retained() {
        let broker = ChannelBroker::new();
        broker.dead_letter(batch("alice").next_attempt()).await.unwrap();

        let parked = broker.dead_letters();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].attempts, 1);
    }
}
