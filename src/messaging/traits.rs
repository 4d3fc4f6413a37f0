//! Messaging trait abstractions

use crate::messaging::error::MessagingResult;
use crate::messaging::events::EventBatch;
use async_trait::async_trait;

/// Broker delivering per-entity event batches at least once.
///
/// Within one published batch the broker preserves event order; across
/// entities no ordering is guaranteed.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a batch for delivery
    async fn publish(&self, batch: EventBatch) -> MessagingResult<()>;

    /// Next batch, or `None` once the broker is closed and drained
    async fn next_batch(&self) -> MessagingResult<Option<EventBatch>>;

    /// Put a failed batch back on the queue for redelivery
    async fn requeue(&self, batch: EventBatch) -> MessagingResult<()>;

    /// Park a batch that exhausted its attempts
    async fn dead_letter(&self, batch: EventBatch) -> MessagingResult<()>;

    /// Stop accepting new batches; queued batches remain consumable
    async fn close(&self) -> MessagingResult<()>;
}
