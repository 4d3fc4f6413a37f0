//! Cosine/TF-IDF relevance ranking
//!
//! Scores a candidate document set against the query's (word, field) terms.
//! Inverse document frequency is add-one smoothed; document weights use a
//! log-damped term frequency; the accumulated rank is normalized by its own
//! square root. Query term frequency and the query maximum both default
//! to 1.

use crate::lexicon::TermId;
use crate::storage::{DocId, TermFrequencyTable};
use std::collections::BTreeSet;

/// A query term resolved against the lexicon and the store
#[derive(Debug, Clone)]
pub struct ResolvedTerm {
    /// Term id, `None` when the lexicon does not know the word. Unresolved
    /// terms contribute nothing but never exclude candidates.
    pub term_id: Option<TermId>,

    /// Number of documents containing the term
    pub doc_frequency: u64,
}

/// Inputs to one ranking pass
#[derive(Debug)]
pub struct RankingContext {
    /// Number of indexed documents in the storage being ranked
    pub collection_size: u64,

    /// Resolved query terms
    pub terms: Vec<ResolvedTerm>,

    /// Term-frequency snapshot from the postings store
    pub frequencies: TermFrequencyTable,
}

/// A scored candidate
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub doc_id: DocId,
    pub score: f64,
}

fn idf(collection_size: u64, doc_frequency: u64) -> f64 {
    (collection_size as f64 / (doc_frequency as f64 + 1.0)).ln() + 1.0
}

/// Rank candidates and keep the top `top_k`, ties broken by ascending
/// document id.
pub fn cosine_rank(
    ctx: &RankingContext,
    candidates: &BTreeSet<DocId>,
    top_k: usize,
) -> Vec<RankedHit> {
    let query_tf = 1.0f64;
    let query_max_tf = 1.0f64;

    let mut hits: Vec<RankedHit> = Vec::with_capacity(candidates.len());
    for doc_id in candidates {
        let mut rank = 0.0f64;
        for term in &ctx.terms {
            let Some(term_id) = term.term_id else {
                continue;
            };
            let term_idf = idf(ctx.collection_size, term.doc_frequency);
            let doc_tf = ctx
                .frequencies
                .get(doc_id)
                .and_then(|counts| counts.get(&term_id))
                .copied()
                .unwrap_or(0);
            if doc_tf == 0 {
                continue;
            }
            let doc_weight = (1.0 + (doc_tf as f64).ln()) * term_idf;
            let query_weight = (0.5 + 0.5 * query_tf / query_max_tf) * term_idf;
            rank += doc_weight * query_weight;
        }
        if rank != 0.0 {
            rank /= rank.sqrt();
        }
        hits.push(RankedHit {
            doc_id: *doc_id,
            score: rank,
        });
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    hits.truncate(top_k);
    hits
}
