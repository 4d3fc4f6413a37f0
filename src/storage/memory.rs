//! In-memory postings store

use crate::error::Result;
use crate::lexicon::TermId;
use crate::storage::{DocId, PostingsStore, TermFrequencyTable};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap, HashSet};

/// In-memory postings store (default local deployment and tests)
#[derive(Default)]
pub struct MemoryPostings {
    forward: DashMap<DocId, Vec<TermId>>,
    inverted: DashMap<TermId, BTreeSet<DocId>>,
    frequencies: DashMap<DocId, HashMap<TermId, u32>>,
}

impl MemoryPostings {
    pub fn new() -> Self {
        Self::default()
    }
}

fn count_occurrences(term_ids: &[TermId]) -> HashMap<TermId, u32> {
    let mut counts = HashMap::new();
    for term_id in term_ids {
        *counts.entry(*term_id).or_insert(0) += 1;
    }
    counts
}

#[async_trait]
impl PostingsStore for MemoryPostings {
    async fn insert_document(&self, doc_id: DocId, term_ids: &[TermId]) -> Result<()> {
        let previous = self
            .forward
            .insert(doc_id, term_ids.to_vec())
            .unwrap_or_default();

        let old_terms: HashSet<TermId> = previous.iter().copied().collect();
        let new_terms: HashSet<TermId> = term_ids.iter().copied().collect();

        for added in new_terms.difference(&old_terms) {
            self.inverted.entry(*added).or_default().insert(doc_id);
        }
        for removed in old_terms.difference(&new_terms) {
            if let Some(mut postings) = self.inverted.get_mut(removed) {
                postings.remove(&doc_id);
            }
        }

        self.frequencies.insert(doc_id, count_occurrences(term_ids));
        Ok(())
    }

    async fn remove_document(&self, doc_id: DocId) -> Result<()> {
        if let Some((_, term_ids)) = self.forward.remove(&doc_id) {
            for term_id in term_ids.iter().copied().collect::<HashSet<_>>() {
                if let Some(mut postings) = self.inverted.get_mut(&term_id) {
                    postings.remove(&doc_id);
                }
            }
        }
        self.frequencies.remove(&doc_id);
        Ok(())
    }

    async fn documents_for_term(&self, term_id: TermId) -> Result<BTreeSet<DocId>> {
        Ok(self
            .inverted
            .get(&term_id)
            .map(|postings| postings.clone())
            .unwrap_or_default())
    }

    async fn document_frequency(&self, term_id: TermId) -> Result<u64> {
        Ok(self
            .inverted
            .get(&term_id)
            .map(|postings| postings.len() as u64)
            .unwrap_or(0))
    }

    async fn term_frequency_table(&self) -> Result<TermFrequencyTable> {
        Ok(self
            .frequencies
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }

    async fn document_count(&self) -> Result<u64> {
        Ok(self.forward.len() as u64)
    }

    async fn doc_ids(&self) -> Result<Vec<DocId>> {
        let mut ids: Vec<DocId> = self.forward.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn clear(&self) -> Result<()> {
        self.forward.clear();
        self.inverted.clear();
        self.frequencies.clear();
        Ok(())
    }
}
