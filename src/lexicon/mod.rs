//! Term dictionary and tokenization seam
//!
//! The lexicon assigns stable integer term ids to normalized (field, word)
//! pairs. Linguistic normalization (stemming, stopwords) is an external
//! concern; the engine only requires a `Tokenizer` that yields normalized
//! tokens.

use dashmap::DashMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Integer identifier assigned to a normalized token, stable for the
/// lifetime of the lexicon.
pub type TermId = u64;

/// Turns free text into a normalized token sequence
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[\p{L}\p{N}]+").unwrap();
}

/// Default tokenizer: case-folded runs of letters and digits
#[derive(Debug, Default, Clone)]
pub struct SimpleTokenizer;

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        TOKEN_RE
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }
}

// Separator for field-qualified keys; cannot appear in tokens.
const KEY_SEP: char = '\u{0}';

/// Term dictionary mapping (field, word) pairs to term ids
pub struct Lexicon {
    terms: DashMap<String, TermId>,
    words: DashMap<String, ()>,
    next_id: AtomicU64,
}

impl Lexicon {
    pub fn new() -> Self {
        Self {
            terms: DashMap::new(),
            words: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn key(field: &str, word: &str) -> String {
        format!("{}{}{}", field, KEY_SEP, word)
    }

    /// Look up or assign the term id for a (field, word) pair
    pub fn term_id(&self, field: &str, word: &str) -> TermId {
        let key = Self::key(field, word);
        if let Some(id) = self.terms.get(&key) {
            return *id;
        }
        let id = *self
            .terms
            .entry(key)
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::SeqCst));
        self.words.entry(word.to_string()).or_insert(());
        id
    }

    /// Look up without assigning; `None` for unknown terms
    pub fn lookup(&self, field: &str, word: &str) -> Option<TermId> {
        self.terms.get(&Self::key(field, word)).map(|id| *id)
    }

    /// Expand a prefix against the known words, sorted lexicographically
    pub fn words_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let mut matches: Vec<String> = self
            .words
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        matches.sort();
        matches.truncate(limit);
        matches
    }

    /// Number of distinct (field, word) terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}
