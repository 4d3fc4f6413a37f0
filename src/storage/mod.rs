pub mod codec;
pub mod memory;
pub mod sled_store;

pub use memory::MemoryPostings;
pub use sled_store::SledPostings;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use crate::lexicon::TermId;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Per-catalog document identifier, reusable across process runs
pub type DocId = u64;

/// Term-frequency sidecar: document id -> (term id -> occurrence count)
pub type TermFrequencyTable = HashMap<DocId, HashMap<TermId, u32>>;

/// Per-catalog storage mapping document ids to ordered term lists plus the
/// derived inverted view. Implementations keep both views consistent on
/// every mutation.
#[async_trait]
pub trait PostingsStore: Send + Sync {
    /// Replace the postings for `doc_id` with `term_ids`.
    ///
    /// Only inverted entries in the symmetric difference against the
    /// previous term list are touched; re-inserting an identical list is a
    /// no-op for the inverted index.
    async fn insert_document(&self, doc_id: DocId, term_ids: &[TermId]) -> Result<()>;

    /// Remove the forward entry, its inverted entries, and its term
    /// frequencies. Absent documents are ignored.
    async fn remove_document(&self, doc_id: DocId) -> Result<()>;

    /// Documents containing the given term; empty for unknown terms
    async fn documents_for_term(&self, term_id: TermId) -> Result<BTreeSet<DocId>>;

    /// Union of postings for several terms
    async fn documents_for_terms(&self, term_ids: &[TermId]) -> Result<BTreeSet<DocId>> {
        let mut union = BTreeSet::new();
        for term_id in term_ids {
            union.extend(self.documents_for_term(*term_id).await?);
        }
        Ok(union)
    }

    /// Number of documents containing the given term
    async fn document_frequency(&self, term_id: TermId) -> Result<u64>;

    /// Snapshot of the term-frequency sidecar for the ranking engine
    async fn term_frequency_table(&self) -> Result<TermFrequencyTable>;

    /// Number of indexed documents
    async fn document_count(&self) -> Result<u64>;

    /// All indexed document ids
    async fn doc_ids(&self) -> Result<Vec<DocId>>;

    /// Drop every document
    async fn clear(&self) -> Result<()>;
}

/// Stable on-disk tree name for an (entity, kind) catalog
pub fn catalog_tree_name(entity_key: &str, kind: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity_key.as_bytes());
    hasher.update(b"/");
    hasher.update(kind.as_bytes());
    format!("catalog_{:x}", hasher.finalize())
}

/// Creates postings stores for catalogs; file-backed catalogs share one
/// sled database opened lazily on first use.
pub struct StoreFactory {
    config: StorageConfig,
    db: OnceCell<sled::Db>,
}

impl StoreFactory {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&sled::Db> {
        self.db
            .get_or_try_init(|| sled::open(&self.config.data_dir))
            .map_err(Into::into)
    }

    /// Create the postings store for one catalog
    pub fn create(&self, entity_key: &str, kind: &str) -> Result<Arc<dyn PostingsStore>> {
        match self.config.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryPostings::new())),
            StorageBackend::Sled => {
                let tree = self
                    .db()?
                    .open_tree(catalog_tree_name(entity_key, kind))?;
                Ok(Arc::new(SledPostings::new(tree)))
            }
        }
    }

    /// Drop the on-disk tree backing one catalog, if any
    pub fn drop_catalog(&self, entity_key: &str, kind: &str) -> Result<()> {
        if self.config.backend == StorageBackend::Sled {
            self.db()?
                .drop_tree(catalog_tree_name(entity_key, kind))?;
        }
        Ok(())
    }

    /// Flush pending writes for file-backed storage
    pub fn flush(&self) -> Result<()> {
        if let Some(db) = self.db.get() {
            db.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_names_are_stable_and_distinct() {
        let a = catalog_tree_name("user:alice", "note");
        let b = catalog_tree_name("user:alice", "note");
        let c = catalog_tree_name("user:alice", "highlight");
        let d = catalog_tree_name("user:bob", "note");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.starts_with("catalog_"));
    }

    #[test]
    fn test_memory_factory_creates_stores() {
        let factory = StoreFactory::new(StorageConfig::default());
        assert!(factory.create("user:alice", "note").is_ok());
        assert!(factory.drop_catalog("user:alice", "note").is_ok());
    }
}
