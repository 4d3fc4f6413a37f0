//! Catalogs: one content kind's searchable index for one entity

pub mod fields;
pub mod registry;

pub use fields::FieldIndexes;
pub use registry::CatalogRegistry;

use crate::error::Result;
use crate::lexicon::{Lexicon, TermId, Tokenizer};
use crate::models::{searchable_fields, Address, ContentKind, ContentObject, EntityId};
use crate::query::{QueryExpr, QueryResult};
use crate::storage::{DocId, PostingsStore};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Address <-> DocumentId mapping plus the document-id allocator.
///
/// Allocation advances a monotonic watermark; freed ids are recorded but
/// never handed out again within one process run, so concurrent allocation
/// cannot race a reuse.
#[derive(Debug, Default)]
struct AddressBook {
    by_address: HashMap<Address, DocId>,
    by_doc: HashMap<DocId, Address>,
    next_doc_id: DocId,
    freed: BTreeSet<DocId>,
}

impl AddressBook {
    fn get_or_allocate(&mut self, address: &Address) -> DocId {
        if let Some(doc_id) = self.by_address.get(address) {
            return *doc_id;
        }
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.by_address.insert(address.clone(), doc_id);
        self.by_doc.insert(doc_id, address.clone());
        doc_id
    }

    fn release(&mut self, address: &Address) -> Option<DocId> {
        let doc_id = self.by_address.remove(address)?;
        self.by_doc.remove(&doc_id);
        self.freed.insert(doc_id);
        Some(doc_id)
    }
}

/// One content kind's index for one entity: a postings store plus scalar
/// field indexes and the address book.
pub struct Catalog {
    entity: EntityId,
    kind: ContentKind,
    store: Arc<dyn PostingsStore>,
    fields: RwLock<FieldIndexes>,
    addresses: RwLock<AddressBook>,
}

impl Catalog {
    pub fn new(entity: EntityId, kind: ContentKind, store: Arc<dyn PostingsStore>) -> Self {
        Self {
            entity,
            kind,
            store,
            fields: RwLock::new(FieldIndexes::new()),
            addresses: RwLock::new(AddressBook::default()),
        }
    }

    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<dyn PostingsStore> {
        &self.store
    }

    /// Look up or allocate the document id for an address
    pub fn address_to_doc_id(&self, address: &Address) -> DocId {
        self.addresses.write().get_or_allocate(address)
    }

    /// Document id for an address, if indexed
    pub fn doc_id_for(&self, address: &Address) -> Option<DocId> {
        self.addresses.read().by_address.get(address).copied()
    }

    /// Address for a document id, if indexed
    pub fn address_for(&self, doc_id: DocId) -> Option<Address> {
        self.addresses.read().by_doc.get(&doc_id).cloned()
    }

    /// Index or reindex one object. Reindexing an already-known address
    /// reuses its document id, which makes repeated application idempotent.
    pub async fn index_object(
        &self,
        obj: &ContentObject,
        lexicon: &Lexicon,
        tokenizer: &dyn Tokenizer,
    ) -> Result<DocId> {
        let mut term_ids: Vec<TermId> = Vec::new();
        for (field, text) in searchable_fields(self.kind, obj) {
            for token in tokenizer.tokenize(&text) {
                term_ids.push(lexicon.term_id(field, &token));
            }
        }

        let doc_id = self.address_to_doc_id(&obj.address);
        self.store.insert_document(doc_id, &term_ids).await?;
        self.fields.write().insert(doc_id, obj);

        tracing::debug!(
            entity = %self.entity,
            kind = %self.kind,
            address = %obj.address,
            doc_id = doc_id,
            terms = term_ids.len(),
            "Indexed document"
        );
        Ok(doc_id)
    }

    /// Remove the object behind an address; absent addresses are a no-op
    pub async fn remove_address(&self, address: &Address) -> Result<Option<DocId>> {
        let Some(doc_id) = self.addresses.write().release(address) else {
            return Ok(None);
        };
        self.store.remove_document(doc_id).await?;
        self.fields.write().remove(doc_id);

        tracing::debug!(
            entity = %self.entity,
            kind = %self.kind,
            address = %address,
            doc_id = doc_id,
            "Removed document"
        );
        Ok(Some(doc_id))
    }

    /// Evaluate a structured filter against this catalog's field indexes
    pub fn evaluate_filter(&self, expr: &QueryExpr) -> QueryResult<BTreeSet<DocId>> {
        self.fields.read().evaluate(expr)
    }

    /// All indexed document ids according to the field indexes
    pub fn all_docs(&self) -> BTreeSet<DocId> {
        self.fields.read().all_docs()
    }

    /// Number of indexed documents
    pub async fn doc_count(&self) -> Result<u64> {
        self.store.document_count().await
    }

    /// Drop all documents from the catalog, keeping it usable
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        let mut addresses = self.addresses.write();
        let docs: Vec<DocId> = addresses.by_doc.keys().copied().collect();
        for doc_id in docs {
            addresses.freed.insert(doc_id);
        }
        addresses.by_address.clear();
        addresses.by_doc.clear();
        *self.fields.write() = FieldIndexes::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::SimpleTokenizer;
    use crate::storage::MemoryPostings;

    fn catalog() -> Catalog {
        Catalog::new(
            EntityId::user("alice"),
            ContentKind::Note,
            Arc::new(MemoryPostings::new()),
        )
    }

    fn note(address: &str, body: &str) -> ContentObject {
        ContentObject::new(address, ContentKind::Note, "alice", body)
    }

    #[tokio::test]
    async fn test_index_assigns_and_reuses_doc_ids() {
        let catalog = catalog();
        let lexicon = Lexicon::new();
        let tokenizer = SimpleTokenizer;

        let first = catalog
            .index_object(&note("tag:n1", "hello world"), &lexicon, &tokenizer)
            .await
            .unwrap();
        let again = catalog
            .index_object(&note("tag:n1", "hello world"), &lexicon, &tokenizer)
            .await
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(catalog.doc_count().await.unwrap(), 1);

        let other = catalog
            .index_object(&note("tag:n2", "hello"), &lexicon, &tokenizer)
            .await
            .unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_freed_ids_are_not_reused_mid_run() {
        let catalog = catalog();
        let lexicon = Lexicon::new();
        let tokenizer = SimpleTokenizer;

        let first = catalog
            .index_object(&note("tag:n1", "alpha"), &lexicon, &tokenizer)
            .await
            .unwrap();
        catalog
            .remove_address(&Address::new("tag:n1"))
            .await
            .unwrap();

        let second = catalog
            .index_object(&note("tag:n2", "beta"), &lexicon, &tokenizer)
            .await
            .unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_remove_absent_address_is_noop() {
        let catalog = catalog();
        assert_eq!(
            catalog
                .remove_address(&Address::new("tag:missing"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_no_dangling_postings_after_remove() {
        let catalog = catalog();
        let lexicon = Lexicon::new();
        let tokenizer = SimpleTokenizer;

        catalog
            .index_object(&note("tag:n1", "unique marker words"), &lexicon, &tokenizer)
            .await
            .unwrap();
        let term = lexicon.lookup("content", "marker").unwrap();
        assert_eq!(catalog.store().documents_for_term(term).await.unwrap().len(), 1);

        catalog
            .remove_address(&Address::new("tag:n1"))
            .await
            .unwrap();
        assert!(catalog
            .store()
            .documents_for_term(term)
            .await
            .unwrap()
            .is_empty());
    }
}
