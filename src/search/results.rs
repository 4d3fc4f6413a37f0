//! Search request and result envelopes

use crate::models::{Address, ContentKind};
use crate::query::QueryExpr;
use serde::{Deserialize, Serialize};

/// A search request against one entity's catalogs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub term: String,

    /// Optional structured filter applied before ranking
    pub filter: Option<QueryExpr>,

    /// Content kinds to search; empty means every live catalog
    pub kinds: Vec<ContentKind>,

    /// Maximum hits to return; 0 uses the configured maximum
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            filter: None,
            kinds: Vec::new(),
            limit: 0,
        }
    }

    pub fn with_filter(mut self, filter: QueryExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<ContentKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// True when there is nothing to search for
    pub fn is_empty(&self) -> bool {
        self.term.trim().is_empty() && self.filter.is_none()
    }
}

/// A single ranked hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Address of the matching content object
    pub address: Address,

    /// Content kind of the catalog the hit came from
    pub kind: ContentKind,

    /// Relevance score
    pub score: f64,
}

/// Search response with results and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ranked hits
    pub hits: Vec<SearchHit>,

    /// Total number of hits before truncation
    pub total_hits: usize,

    /// The free-text query that was executed
    pub query: String,

    /// Search execution time in milliseconds
    pub search_time_ms: u64,
}

impl SearchResponse {
    /// Empty result envelope echoing the query
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            total_hits: 0,
            query: query.into(),
            search_time_ms: 0,
        }
    }

    /// Merge hits from another response, keeping score order
    pub fn merge(mut self, other: SearchResponse) -> Self {
        self.hits.extend(other.hits);
        self.total_hits += other.total_hits;
        sort_hits(&mut self.hits);
        self
    }
}

/// Order hits by descending score, ties by address for determinism
pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.address.as_str().cmp(b.address.as_str()))
    });
}

/// Prefix-expansion suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    /// The expanded prefix
    pub prefix: String,

    /// Matching dictionary words, sorted
    pub suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(address: &str, score: f64) -> SearchHit {
        SearchHit {
            address: Address::new(address),
            kind: ContentKind::Note,
            score,
        }
    }

    #[test]
    fn test_merge_keeps_score_order() {
        let a = SearchResponse {
            hits: vec![hit("tag:1", 0.4)],
            total_hits: 1,
            query: "q".to_string(),
            search_time_ms: 0,
        };
        let b = SearchResponse {
            hits: vec![hit("tag:2", 0.9), hit("tag:3", 0.1)],
            total_hits: 2,
            query: "q".to_string(),
            search_time_ms: 0,
        };

        let merged = a.merge(b);
        assert_eq!(merged.total_hits, 3);
        let order: Vec<&str> = merged.hits.iter().map(|h| h.address.as_str()).collect();
        assert_eq!(order, vec!["tag:2", "tag:1", "tag:3"]);
    }

    #[test]
    fn test_empty_request_detection() {
        assert!(SearchRequest::new("   ").is_empty());
        assert!(!SearchRequest::new("physics").is_empty());
        assert!(!SearchRequest::new("")
            .with_filter(QueryExpr::eq("creator", "bob"))
            .is_empty());
    }
}
