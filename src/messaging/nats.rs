//! NATS-backed broker for the distributed pipeline

use crate::config::MessagingConfig;
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::events::EventBatch;
use crate::messaging::traits::MessageBroker;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

pub struct NatsBroker {
    client: Arc<async_nats::Client>,
    subject: String,
    dlq_subject: String,
    subscriber: tokio::sync::Mutex<Option<async_nats::Subscriber>>,
}

impl NatsBroker {
    /// Connect to the first configured server
    pub async fn connect(config: &MessagingConfig) -> MessagingResult<Self> {
        let server = config
            .nats
            .servers
            .first()
            .ok_or_else(|| MessagingError::ConnectionFailed("no NATS servers configured".into()))?;

        let client = async_nats::connect(server)
            .await
            .map_err(|e| MessagingError::ConnectionFailed(format!("NATS connection failed: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            subject: format!("{}.batches", config.subject_prefix),
            dlq_subject: format!("{}.dlq", config.subject_prefix),
            subscriber: tokio::sync::Mutex::new(None),
        })
    }

    async fn publish_to(&self, subject: &str, batch: &EventBatch) -> MessagingResult<()> {
        let payload = serde_json::to_vec(batch)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| MessagingError::PublishFailed(format!("NATS publish failed: {}", e)))
    }
}

#[async_trait]
impl MessageBroker for NatsBroker {
    async fn publish(&self, batch: EventBatch) -> MessagingResult<()> {
        self.publish_to(&self.subject, &batch).await
    }

    async fn next_batch(&self) -> MessagingResult<Option<EventBatch>> {
        let mut guard = self.subscriber.lock().await;
        if guard.is_none() {
            let subscriber = self
                .client
                .subscribe(self.subject.clone())
                .await
                .map_err(|e| {
                    MessagingError::SubscribeFailed(format!("NATS subscribe failed: {}", e))
                })?;
            *guard = Some(subscriber);
        }

        let subscriber = guard.as_mut().expect("subscriber just installed");
        match subscriber.next().await {
            Some(msg) => {
                let batch: EventBatch = serde_json::from_slice(&msg.payload)
                    .map_err(|e| MessagingError::InvalidMessage(e.to_string()))?;
                Ok(Some(batch))
            }
            None => Ok(None),
        }
    }

    async fn requeue(&self, batch: EventBatch) -> MessagingResult<()> {
        tracing::debug!(batch_id = %batch.id, attempts = batch.attempts, "Requeueing batch");
        self.publish_to(&self.subject, &batch).await
    }

    async fn dead_letter(&self, batch: EventBatch) -> MessagingResult<()> {
        tracing::warn!(
            batch_id = %batch.id,
            entity = %batch.entity,
            attempts = batch.attempts,
            "Batch dead-lettered"
        );
        self.publish_to(&self.dlq_subject, &batch).await
    }

    async fn close(&self) -> MessagingResult<()> {
        let mut guard = self.subscriber.lock().await;
        if let Some(mut subscriber) = guard.take() {
            subscriber
                .unsubscribe()
                .await
                .map_err(|e| MessagingError::ConsumeFailed(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MessagingConfig;

    #[test]
    fn test_subjects_derive_from_prefix() {
        let config = MessagingConfig::default();
        assert_eq!(config.subject_prefix, "cse.index");
        assert!(!config.nats.servers.is_empty());
    }
}
