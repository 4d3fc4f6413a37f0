//! Index manager: the composition root
//!
//! Routes index/update/delete operations to the owning entity's catalogs
//! and exposes the unified search and suggest API. Searching an entity with
//! no catalogs yields an empty result, never an error; an unknown content
//! kind is rejected up front.

use crate::catalog::{Catalog, CatalogRegistry};
use crate::config::{Config, SearchConfig};
use crate::error::{AppError, Result};
use crate::lexicon::{Lexicon, SimpleTokenizer, Tokenizer};
use crate::metrics::ENGINE_METRICS;
use crate::models::{search_fields_for, Address, ContentKind, ContentObject, EntityId};
use crate::ranking::{cosine_rank, RankingContext, ResolvedTerm};
use crate::search::results::{sort_hits, SearchHit, SearchRequest, SearchResponse, SuggestResponse};
use crate::storage::DocId;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

pub struct IndexManager {
    registry: Arc<CatalogRegistry>,
    lexicon: Arc<Lexicon>,
    tokenizer: Arc<dyn Tokenizer>,
    config: SearchConfig,
}

impl IndexManager {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Arc::new(CatalogRegistry::new(config.storage.clone())),
            lexicon: Arc::new(Lexicon::new()),
            tokenizer: Arc::new(SimpleTokenizer),
            config: config.search.clone(),
        }
    }

    /// Replace the default tokenizer (external normalization)
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn registry(&self) -> &Arc<CatalogRegistry> {
        &self.registry
    }

    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    /// Parse a content-kind name; unknown kinds are a validation error
    pub fn parse_kind(name: &str) -> Result<ContentKind> {
        ContentKind::from_str(name)
            .map_err(|_| AppError::Validation(format!("Unknown content kind: {}", name)))
    }

    /// Index one object into the entity's catalog for `kind`, creating the
    /// catalog on first use.
    pub async fn index_content(
        &self,
        entity: &EntityId,
        kind: ContentKind,
        obj: &ContentObject,
    ) -> Result<DocId> {
        let catalog = self.registry.get_or_create(entity, kind)?;
        let doc_id = catalog
            .index_object(obj, &self.lexicon, self.tokenizer.as_ref())
            .await?;
        ENGINE_METRICS
            .documents_indexed
            .with_label_values(&[&kind.to_string()])
            .inc();
        Ok(doc_id)
    }

    /// Reindex an object after modification. The address book guarantees
    /// the document id is reused.
    pub async fn update_content(
        &self,
        entity: &EntityId,
        kind: ContentKind,
        obj: &ContentObject,
    ) -> Result<DocId> {
        self.index_content(entity, kind, obj).await
    }

    /// Remove an object. Deleting against a missing catalog or an unknown
    /// address is a no-op; returns whether a document was removed.
    pub async fn delete_content(
        &self,
        entity: &EntityId,
        kind: ContentKind,
        address: &Address,
    ) -> Result<bool> {
        let Some(catalog) = self.registry.get(entity, kind) else {
            return Ok(false);
        };
        let removed = catalog.remove_address(address).await?.is_some();
        if removed {
            ENGINE_METRICS
                .documents_removed
                .with_label_values(&[&kind.to_string()])
                .inc();
        }
        Ok(removed)
    }

    /// Drop every catalog owned by an entity
    pub async fn remove_entity(&self, entity: &EntityId) -> Result<usize> {
        self.registry.remove_entity(entity).await
    }

    /// Search one entity's catalogs
    pub async fn search(
        &self,
        entity: &EntityId,
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        let start = Instant::now();
        let mut response = SearchResponse::empty(request.term.clone());
        if request.is_empty() {
            return Ok(response);
        }

        let kinds = if request.kinds.is_empty() {
            self.registry.kinds_for(entity)
        } else {
            request.kinds.clone()
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        for kind in kinds {
            let Some(catalog) = self.registry.get(entity, kind) else {
                continue;
            };
            hits.extend(self.search_catalog(&catalog, kind, request).await?);
        }

        sort_hits(&mut hits);
        response.total_hits = hits.len();
        hits.truncate(self.effective_limit(request));
        response.hits = hits;
        response.search_time_ms = start.elapsed().as_millis() as u64;

        ENGINE_METRICS
            .search_latency
            .with_label_values(&[entity_kind_label(entity)])
            .observe(start.elapsed().as_secs_f64());

        tracing::debug!(
            entity = %entity,
            query = %request.term,
            hits = response.total_hits,
            elapsed_ms = response.search_time_ms,
            "Search executed"
        );
        Ok(response)
    }

    /// Search several entities (a user plus its dynamic memberships),
    /// merging the ranked results.
    pub async fn search_all(
        &self,
        entities: &[EntityId],
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        let start = Instant::now();
        let mut merged = SearchResponse::empty(request.term.clone());
        for entity in entities {
            let response = self.search(entity, request).await?;
            merged = merged.merge(response);
        }
        merged.hits.truncate(self.effective_limit(request));
        merged.search_time_ms = start.elapsed().as_millis() as u64;
        Ok(merged)
    }

    /// Expand a prefix against the term dictionary. Entities without any
    /// catalog yield no suggestions.
    pub async fn suggest(&self, entity: &EntityId, prefix: &str) -> Result<SuggestResponse> {
        let suggestions = if self.registry.kinds_for(entity).is_empty() {
            Vec::new()
        } else {
            self.lexicon
                .words_with_prefix(prefix, self.config.suggest_limit)
        };
        Ok(SuggestResponse {
            prefix: prefix.to_string(),
            suggestions,
        })
    }

    /// Flush file-backed storage
    pub fn close(&self) -> Result<()> {
        self.registry.flush()
    }

    fn effective_limit(&self, request: &SearchRequest) -> usize {
        if request.limit == 0 {
            self.config.max_results
        } else {
            request.limit.min(self.config.max_results)
        }
    }

    async fn search_catalog(
        &self,
        catalog: &Arc<Catalog>,
        kind: ContentKind,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>> {
        let store = catalog.store();
        let tokens = self.tokenizer.tokenize(&request.term);

        // Resolve (word, field) pairs; unknown words keep a slot so the
        // ranking engine can account for them without excluding documents.
        let mut resolved: Vec<ResolvedTerm> = Vec::new();
        let mut term_ids = Vec::new();
        for field in search_fields_for(kind) {
            for token in &tokens {
                let term_id = self.lexicon.lookup(field, token);
                let doc_frequency = match term_id {
                    Some(id) => {
                        term_ids.push(id);
                        store.document_frequency(id).await?
                    }
                    None => 0,
                };
                resolved.push(ResolvedTerm {
                    term_id,
                    doc_frequency,
                });
            }
        }

        let mut candidates = if tokens.is_empty() {
            catalog.all_docs()
        } else {
            store.documents_for_terms(&term_ids).await?
        };

        if let Some(ref filter) = request.filter {
            let filtered = catalog.evaluate_filter(filter).map_err(AppError::from)?;
            candidates = candidates.intersection(&filtered).copied().collect();
        }

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ctx = RankingContext {
            collection_size: store.document_count().await?,
            terms: resolved,
            frequencies: store.term_frequency_table().await?,
        };
        let ranked = cosine_rank(&ctx, &candidates, self.config.max_results);

        Ok(ranked
            .into_iter()
            .filter_map(|hit| {
                catalog.address_for(hit.doc_id).map(|address| SearchHit {
                    address,
                    kind,
                    score: hit.score,
                })
            })
            .collect())
    }
}

fn entity_kind_label(entity: &EntityId) -> &'static str {
    match entity {
        EntityId::User(_) => "user",
        EntityId::Group(_) => "group",
        EntityId::Book(_) => "book",
    }
}
