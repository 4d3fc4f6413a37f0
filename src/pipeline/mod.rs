//! Index agent: applies content-change events to catalogs
//!
//! Two variants share the same event application logic. The local agent
//! feeds a bounded in-process queue with one worker task; the distributed
//! consumer reads per-entity batches off a message broker with
//! requeue-on-failure. Both retry events whose address is not yet
//! resolvable, since the writer's transaction may not be visible to this
//! reader yet.

pub mod agent;
pub mod consumer;

pub use agent::IndexAgent;
pub use consumer::BatchConsumer;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::metrics::ENGINE_METRICS;
use crate::models::{Address, ChangeEvent, ChangeType, ContentObject};
use crate::search::IndexManager;
use async_trait::async_trait;

/// Resolves an address to the canonical content object.
///
/// `None` is treated as potentially transient, not permanent: the writer
/// may simply not have committed yet.
#[async_trait]
pub trait ObjectResolver: Send + Sync {
    async fn resolve(&self, address: &Address) -> Result<Option<ContentObject>>;
}

/// Terminal state of one event's application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The catalog reflects the event
    Applied,
    /// Dropped after the visibility-retry bound; a future full reindex
    /// reconciles the content
    Dropped,
}

/// Apply one change event, retrying unresolvable addresses up to the
/// configured bound with a delay between attempts.
pub(crate) async fn apply_event(
    manager: &IndexManager,
    resolver: &dyn ObjectResolver,
    config: &PipelineConfig,
    event: &ChangeEvent,
) -> Result<EventOutcome> {
    ENGINE_METRICS
        .events_consumed
        .with_label_values(&[&event.change_type.to_string()])
        .inc();

    if event.change_type == ChangeType::Deleted {
        manager
            .delete_content(&event.entity, event.content_kind, &event.address)
            .await?;
        return Ok(EventOutcome::Applied);
    }

    let mut retries = 0u32;
    loop {
        match resolver.resolve(&event.address).await? {
            Some(obj) => {
                match event.change_type {
                    ChangeType::Modified => {
                        manager
                            .update_content(&event.entity, event.content_kind, &obj)
                            .await?;
                    }
                    _ => {
                        manager
                            .index_content(&event.entity, event.content_kind, &obj)
                            .await?;
                    }
                }
                return Ok(EventOutcome::Applied);
            }
            None => {
                if retries >= config.max_visibility_retries {
                    ENGINE_METRICS.events_dropped.inc();
                    tracing::warn!(
                        event_id = %event.id,
                        entity = %event.entity,
                        address = %event.address,
                        retries = retries,
                        "Content not resolvable after retry bound, dropping event"
                    );
                    return Ok(EventOutcome::Dropped);
                }
                retries += 1;
                ENGINE_METRICS.visibility_retries.inc();
                tokio::time::sleep(config.retry_delay()).await;
            }
        }
    }
}

/// Test doubles shared by the pipeline unit tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Resolver backed by a map, hiding every object for the first
    /// `visible_after` calls.
    pub(crate) struct MapResolver {
        objects: DashMap<Address, ContentObject>,
        visible_after: u32,
        calls: AtomicU32,
    }

    impl MapResolver {
        pub(crate) fn new() -> Self {
            Self::delayed(0)
        }

        pub(crate) fn delayed(visible_after: u32) -> Self {
            Self {
                objects: DashMap::new(),
                visible_after,
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn put(&self, obj: ContentObject) {
            self.objects.insert(obj.address.clone(), obj);
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectResolver for MapResolver {
        async fn resolve(&self, address: &Address) -> Result<Option<ContentObject>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.visible_after {
                return Ok(None);
            }
            Ok(self.objects.get(address).map(|obj| obj.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MapResolver;
    use super::*;
    use crate::config::Config;
    use crate::models::{ContentKind, EntityId};
    use crate::search::SearchRequest;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            retry_delay_ms: 1,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_created_event_indexes_object() {
        let manager = IndexManager::new(&Config::default());
        let resolver = MapResolver::new();
        let alice = EntityId::user("alice");
        resolver.put(ContentObject::new(
            "tag:n1",
            ContentKind::Note,
            "alice",
            "hello world",
        ));

        let event = ChangeEvent::new(
            alice.clone(),
            ChangeType::Created,
            ContentKind::Note,
            "tag:n1",
        );
        let outcome = apply_event(&manager, &resolver, &fast_config(), &event)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Applied);

        let response = manager
            .search(&alice, &SearchRequest::new("hello"))
            .await
            .unwrap();
        assert_eq!(response.total_hits, 1);
    }

    #[tokio::test]
    async fn test_transient_invisibility_is_retried() {
        let manager = IndexManager::new(&Config::default());
        let resolver = MapResolver::delayed(3);
        let alice = EntityId::user("alice");
        resolver.put(ContentObject::new(
            "tag:n1",
            ContentKind::Note,
            "alice",
            "late arrival",
        ));

        let event = ChangeEvent::new(
            alice.clone(),
            ChangeType::Created,
            ContentKind::Note,
            "tag:n1",
        );
        let outcome = apply_event(&manager, &resolver, &fast_config(), &event)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(resolver.calls(), 4);
    }

    #[tokio::test]
    async fn test_event_dropped_after_retry_bound() {
        let manager = IndexManager::new(&Config::default());
        let resolver = MapResolver::delayed(u32::MAX);
        let event = ChangeEvent::new(
            EntityId::user("alice"),
            ChangeType::Created,
            ContentKind::Note,
            "tag:never",
        );

        let config = fast_config();
        let outcome = apply_event(&manager, &resolver, &config, &event)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Dropped);
        assert_eq!(resolver.calls(), config.max_visibility_retries + 1);
    }

    #[tokio::test]
    async fn test_deleted_event_needs_no_resolution() {
        let manager = IndexManager::new(&Config::default());
        let resolver = MapResolver::delayed(u32::MAX);
        let alice = EntityId::user("alice");

        let obj = ContentObject::new("tag:n1", ContentKind::Note, "alice", "body");
        manager
            .index_content(&alice, ContentKind::Note, &obj)
            .await
            .unwrap();

        let event = ChangeEvent::new(
            alice.clone(),
            ChangeType::Deleted,
            ContentKind::Note,
            "tag:n1",
        );
        let outcome = apply_event(&manager, &resolver, &fast_config(), &event)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(resolver.calls(), 0);

        let response = manager
            .search(&alice, &SearchRequest::new("body"))
            .await
            .unwrap();
        assert_eq!(response.total_hits, 0);
    }

    #[tokio::test]
    async fn test_shared_event_indexes_like_created() {
        let manager = IndexManager::new(&Config::default());
        let resolver = MapResolver::new();
        let group = EntityId::group("study-group");
        resolver.put(ContentObject::new(
            "tag:n9",
            ContentKind::Note,
            "alice",
            "shared content",
        ));

        let event = ChangeEvent::new(
            group.clone(),
            ChangeType::Shared,
            ContentKind::Note,
            "tag:n9",
        );
        apply_event(&manager, &resolver, &fast_config(), &event)
            .await
            .unwrap();

        let response = manager
            .search(&group, &SearchRequest::new("shared"))
            .await
            .unwrap();
        assert_eq!(response.total_hits, 1);
    }
}
