//! Entity index registry
//!
//! Maps an entity to its set of catalogs, one per content kind. Catalogs
//! are created lazily on first index access; removing an entity cascades
//! over every catalog it owns. Indexing into a removed catalog recreates
//! it: removal is not terminal for the synchronous write path.

use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::error::Result;
use crate::models::{Address, ContentKind, EntityId};
use crate::storage::{DocId, StoreFactory};
use dashmap::DashMap;
use std::sync::Arc;

pub struct CatalogRegistry {
    factory: StoreFactory,
    catalogs: DashMap<(String, ContentKind), Arc<Catalog>>,
}

impl CatalogRegistry {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            factory: StoreFactory::new(storage),
            catalogs: DashMap::new(),
        }
    }

    /// The catalog for (entity, kind), creating it on first access
    pub fn get_or_create(&self, entity: &EntityId, kind: ContentKind) -> Result<Arc<Catalog>> {
        let key = (entity.key(), kind);
        if let Some(catalog) = self.catalogs.get(&key) {
            return Ok(catalog.clone());
        }

        let store = self.factory.create(&entity.key(), &kind.to_string())?;
        let catalog = self
            .catalogs
            .entry(key)
            .or_insert_with(|| {
                tracing::debug!(entity = %entity, kind = %kind, "Catalog created");
                Arc::new(Catalog::new(entity.clone(), kind, store))
            })
            .clone();
        Ok(catalog)
    }

    /// The catalog for (entity, kind), if it exists
    pub fn get(&self, entity: &EntityId, kind: ContentKind) -> Option<Arc<Catalog>> {
        self.catalogs.get(&(entity.key(), kind)).map(|c| c.clone())
    }

    /// Drop one catalog and its storage; false if it never existed
    pub async fn remove_catalog(&self, entity: &EntityId, kind: ContentKind) -> Result<bool> {
        let Some((_, catalog)) = self.catalogs.remove(&(entity.key(), kind)) else {
            return Ok(false);
        };
        catalog.clear().await?;
        self.factory
            .drop_catalog(&entity.key(), &kind.to_string())?;
        tracing::info!(entity = %entity, kind = %kind, "Catalog removed");
        Ok(true)
    }

    /// Cascade-drop every catalog owned by an entity; returns the count
    pub async fn remove_entity(&self, entity: &EntityId) -> Result<usize> {
        let kinds = self.kinds_for(entity);
        let mut removed = 0;
        for kind in kinds {
            if self.remove_catalog(entity, kind).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Look up or allocate the document id for an address, creating the
    /// catalog if needed
    pub fn address_to_doc_id(
        &self,
        entity: &EntityId,
        kind: ContentKind,
        address: &Address,
    ) -> Result<DocId> {
        Ok(self.get_or_create(entity, kind)?.address_to_doc_id(address))
    }

    /// Remove an address mapping and its document; a no-op when the
    /// catalog or the address does not exist
    pub async fn remove_address(
        &self,
        entity: &EntityId,
        kind: ContentKind,
        address: &Address,
    ) -> Result<Option<DocId>> {
        match self.get(entity, kind) {
            Some(catalog) => catalog.remove_address(address).await,
            None => Ok(None),
        }
    }

    /// Content kinds with a live catalog for the entity
    pub fn kinds_for(&self, entity: &EntityId) -> Vec<ContentKind> {
        let key = entity.key();
        let mut kinds: Vec<ContentKind> = self
            .catalogs
            .iter()
            .filter(|entry| entry.key().0 == key)
            .map(|entry| entry.key().1)
            .collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }

    /// Flush pending writes of file-backed catalogs
    pub fn flush(&self) -> Result<()> {
        self.factory.flush()
    }
}
