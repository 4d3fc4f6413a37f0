//! Batch envelope for the distributed pipeline

use crate::models::{ChangeEvent, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events for one entity, applied together in arrival order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBatch {
    /// Batch identifier
    pub id: Uuid,

    /// Entity every event in the batch belongs to
    pub entity: EntityId,

    /// Events in arrival order
    pub events: Vec<ChangeEvent>,

    /// Delivery attempts so far
    pub attempts: u32,

    /// Publish timestamp
    pub published_at: DateTime<Utc>,
}

impl EventBatch {
    pub fn new(entity: EntityId, events: Vec<ChangeEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity,
            events,
            attempts: 0,
            published_at: Utc::now(),
        }
    }

    /// The batch with its attempt counter advanced, for requeueing
    pub fn next_attempt(mut self) -> Self {
        self.attempts += 1;
        self
    }
}

/// Group a mixed event stream into per-entity batches.
///
/// Batch order follows each entity's first appearance; event order within a
/// batch follows arrival order, regardless of event type.
pub fn group_by_entity(events: Vec<ChangeEvent>) -> Vec<EventBatch> {
    let mut batches: Vec<(String, EventBatch)> = Vec::new();
    for event in events {
        let key = event.entity.key();
        match batches.iter_mut().find(|(k, _)| *k == key) {
            Some((_, batch)) => batch.events.push(event),
            None => {
                let entity = event.entity.clone();
                batches.push((key, EventBatch::new(entity, vec![event])));
            }
        }
    }
    batches.into_iter().map(|(_, batch)| batch).collect()
}
