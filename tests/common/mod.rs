//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use content_search_engine::config::PipelineConfig;
use content_search_engine::error::Result;
use content_search_engine::models::{Address, ContentKind, ContentObject};
use content_search_engine::pipeline::ObjectResolver;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Resolver backed by a map. Each address can be configured to stay
/// invisible for a number of resolution attempts, simulating a writer
/// transaction that has not become visible to the reader yet.
pub struct TestResolver {
    objects: DashMap<Address, ContentObject>,
    remaining_misses: DashMap<Address, AtomicU32>,
}

impl TestResolver {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            remaining_misses: DashMap::new(),
        }
    }

    pub fn put(&self, obj: ContentObject) {
        self.objects.insert(obj.address.clone(), obj);
    }

    /// Hide an address for the next `misses` resolution attempts
    pub fn hide_for(&self, address: impl Into<Address>, misses: u32) {
        self.remaining_misses
            .insert(address.into(), AtomicU32::new(misses));
    }
}

impl Default for TestResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectResolver for TestResolver {
    async fn resolve(&self, address: &Address) -> Result<Option<ContentObject>> {
        if let Some(countdown) = self.remaining_misses.get(address) {
            let left = countdown.load(Ordering::SeqCst);
            if left > 0 {
                countdown.store(left - 1, Ordering::SeqCst);
                return Ok(None);
            }
        }
        Ok(self.objects.get(address).map(|obj| obj.clone()))
    }
}

/// A note owned by `creator`
pub fn note(address: &str, creator: &str, body: &str) -> ContentObject {
    ContentObject::new(address, ContentKind::Note, creator, body)
}

/// Pipeline settings with short retry delays for tests
pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        retry_delay_ms: 1,
        ..PipelineConfig::default()
    }
}
