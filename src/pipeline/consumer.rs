//! Distributed batch consumer
//!
//! Reads per-entity event batches from a message broker. Each entity gets
//! a dedicated worker task fed by its own channel, so exactly one worker
//! mutates an entity's catalogs while different entities proceed
//! concurrently. A batch that fails to apply is requeued until its attempt
//! budget is spent, then dead-lettered; the batch boundary is the unit of
//! atomicity for shutdown.

use crate::config::PipelineConfig;
use crate::error::{AppError, Result};
use crate::messaging::{EventBatch, MessageBroker};
use crate::metrics::ENGINE_METRICS;
use crate::pipeline::{apply_event, ObjectResolver};
use crate::search::IndexManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct ConsumerInner {
    broker: Arc<dyn MessageBroker>,
    manager: Arc<IndexManager>,
    resolver: Arc<dyn ObjectResolver>,
    config: PipelineConfig,
}

impl ConsumerInner {
    /// Apply one batch in arrival order; on failure hand it back to the
    /// broker. Failures never propagate out of the worker loop.
    async fn apply_batch(&self, batch: EventBatch) {
        for event in &batch.events {
            if let Err(e) =
                apply_event(&self.manager, self.resolver.as_ref(), &self.config, event).await
            {
                tracing::error!(
                    batch_id = %batch.id,
                    entity = %batch.entity,
                    event_id = %event.id,
                    error = %e,
                    "Batch apply failed"
                );
                self.hand_back(batch).await;
                return;
            }
        }
    }

    async fn hand_back(&self, batch: EventBatch) {
        let batch = batch.next_attempt();
        if batch.attempts < self.config.max_batch_attempts {
            ENGINE_METRICS.batches_requeued.inc();
            if let Err(e) = self.broker.requeue(batch).await {
                tracing::error!(error = %e, "Requeue failed, batch lost until reindex");
            }
        } else {
            ENGINE_METRICS.batches_dead_lettered.inc();
            if let Err(e) = self.broker.dead_letter(batch).await {
                tracing::error!(error = %e, "Dead-letter failed, batch lost until reindex");
            }
        }
    }
}

pub struct BatchConsumer {
    broker: Arc<dyn MessageBroker>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchConsumer {
    /// Spawn the dispatch loop and return the running consumer
    pub fn start(
        broker: Arc<dyn MessageBroker>,
        manager: Arc<IndexManager>,
        resolver: Arc<dyn ObjectResolver>,
        config: PipelineConfig,
    ) -> Self {
        let queue_capacity = config.queue_capacity;
        let inner = Arc::new(ConsumerInner {
            broker: broker.clone(),
            manager,
            resolver,
            config,
        });

        let handle = tokio::spawn(async move {
            let mut workers: HashMap<String, mpsc::Sender<EventBatch>> = HashMap::new();
            let mut tasks: Vec<JoinHandle<()>> = Vec::new();

            loop {
                match inner.broker.next_batch().await {
                    Ok(Some(batch)) => {
                        let key = batch.entity.key();
                        let tx = workers.entry(key.clone()).or_insert_with(|| {
                            let (tx, mut rx) = mpsc::channel::<EventBatch>(queue_capacity);
                            let worker = inner.clone();
                            tasks.push(tokio::spawn(async move {
                                while let Some(batch) = rx.recv().await {
                                    worker.apply_batch(batch).await;
                                }
                            }));
                            tracing::debug!(entity = %key, "Entity worker started");
                            tx
                        });
                        if tx.send(batch).await.is_err() {
                            tracing::error!(entity = %key, "Entity worker is gone");
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // A dead dispatch loop stops all future indexing;
                        // that is a fatal operational condition, not a
                        // per-document error.
                        tracing::error!(error = %e, "Broker consume failed, stopping consumer");
                        break;
                    }
                }
            }

            // Dropping the senders lets the workers drain their queues and
            // finish at a batch boundary.
            workers.clear();
            for task in tasks {
                let _ = task.await;
            }
            tracing::debug!("Batch consumer stopped");
        });

        Self {
            broker,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Close the broker, let workers finish their in-flight batches, and
    /// join the dispatch loop.
    pub async fn close(&self) -> Result<()> {
        self.broker.close().await.map_err(AppError::from)?;
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| AppError::Internal(format!("consumer join failed: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::messaging::events::group_by_entity;
    use crate::messaging::ChannelBroker;
    use crate::models::{
        Address, ChangeEvent, ChangeType, ContentKind, ContentObject, EntityId,
    };
    use crate::pipeline::testing::MapResolver;
    use crate::search::SearchRequest;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            retry_delay_ms: 1,
            max_batch_attempts: 1,
            ..PipelineConfig::default()
        }
    }

    fn created(user: &str, address: &str) -> ChangeEvent {
        ChangeEvent::new(
            EntityId::user(user),
            ChangeType::Created,
            ContentKind::Note,
            address,
        )
    }

    #[tokio::test]
    async fn test_batches_apply_in_arrival_order() {
        let manager = Arc::new(IndexManager::new(&Config::default()));
        let resolver = Arc::new(MapResolver::new());
        let broker = Arc::new(ChannelBroker::new());
        let alice = EntityId::user("alice");

        resolver.put(ContentObject::new(
            "tag:n1",
            ContentKind::Note,
            "alice",
            "ephemeral",
        ));

        // Created then Deleted for the same address within one batch: the
        // catalog must end up empty.
        let events = vec![
            created("alice", "tag:n1"),
            ChangeEvent::new(
                alice.clone(),
                ChangeType::Deleted,
                ContentKind::Note,
                "tag:n1",
            ),
        ];
        for batch in group_by_entity(events) {
            broker.publish(batch).await.unwrap();
        }

        let consumer = BatchConsumer::start(
            broker.clone(),
            manager.clone(),
            resolver,
            fast_config(),
        );
        consumer.close().await.unwrap();

        let catalog = manager
            .registry()
            .get(&alice, ContentKind::Note)
            .expect("catalog exists");
        assert_eq!(catalog.doc_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entity_failure_is_isolated() {
        let manager = Arc::new(IndexManager::new(&Config::default()));
        let broker = Arc::new(ChannelBroker::new());

        // Only bob's object resolves; alice's resolver calls error out.
        struct FailingForAlice {
            inner: MapResolver,
        }
        #[async_trait::async_trait]
        impl ObjectResolver for FailingForAlice {
            async fn resolve(&self, address: &Address) -> crate::error::Result<Option<ContentObject>> {
                if address.as_str().starts_with("tag:alice") {
                    return Err(crate::error::AppError::Storage(
                        "synthetic failure".to_string(),
                    ));
                }
                self.inner.resolve(address).await
            }
        }

        let resolver = MapResolver::new();
        resolver.put(ContentObject::new(
            "tag:bob1",
            ContentKind::Note,
            "bob",
            "resilient document",
        ));
        let resolver = Arc::new(FailingForAlice { inner: resolver });

        broker
            .publish(EventBatch::new(
                EntityId::user("alice"),
                vec![created("alice", "tag:alice1")],
            ))
            .await
            .unwrap();
        broker
            .publish(EventBatch::new(
                EntityId::user("bob"),
                vec![created("bob", "tag:bob1")],
            ))
            .await
            .unwrap();

        let consumer = BatchConsumer::start(
            broker.clone(),
            manager.clone(),
            resolver,
            fast_config(),
        );
        consumer.close().await.unwrap();

        // Bob's batch completed despite alice's failure.
        let response = manager
            .search(&EntityId::user("bob"), &SearchRequest::new("resilient"))
            .await
            .unwrap();
        assert_eq!(response.total_hits, 1);

        // Alice's batch was dead-lettered after its single attempt.
        let parked = broker.dead_letters();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].entity, EntityId::user("alice"));
    }

    #[tokio::test]
    async fn test_failed_batch_is_requeued_then_applied() {
        let manager = Arc::new(IndexManager::new(&Config::default()));
        let broker = Arc::new(ChannelBroker::new());

        // Fails on the first resolver call, succeeds afterwards: the first
        // delivery dies, the requeued batch goes through.
        struct FailOnce {
            inner: MapResolver,
            failed: std::sync::atomic::AtomicBool,
        }
        #[async_trait::async_trait]
        impl ObjectResolver for FailOnce {
            async fn resolve(&self, address: &Address) -> crate::error::Result<Option<ContentObject>> {
                if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                    return Err(crate::error::AppError::Storage("first call".to_string()));
                }
                self.inner.resolve(address).await
            }
        }

        let inner = MapResolver::new();
        inner.put(ContentObject::new(
            "tag:n1",
            ContentKind::Note,
            "alice",
            "eventually indexed",
        ));
        let resolver = Arc::new(FailOnce {
            inner,
            failed: std::sync::atomic::AtomicBool::new(false),
        });

        broker
            .publish(EventBatch::new(
                EntityId::user("alice"),
                vec![created("alice", "tag:n1")],
            ))
            .await
            .unwrap();

        let config = PipelineConfig {
            retry_delay_ms: 1,
            max_batch_attempts: 3,
            ..PipelineConfig::default()
        };
        let consumer = BatchConsumer::start(broker.clone(), manager.clone(), resolver, config);

        // Give the requeued batch time to be redelivered before closing.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        consumer.close().await.unwrap();

        let response = manager
            .search(&EntityId::user("alice"), &SearchRequest::new("eventually"))
            .await
            .unwrap();
        assert_eq!(response.total_hits, 1);
        assert!(broker.dead_letters().is_empty());
    }
}
