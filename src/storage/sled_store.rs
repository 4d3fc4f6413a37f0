//! File-backed postings store on sled

use crate::error::{AppError, Result};
use crate::lexicon::TermId;
use crate::storage::codec;
use crate::storage::{DocId, PostingsStore, TermFrequencyTable};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};

const FORWARD_PREFIX: u8 = b'f';
const INVERTED_PREFIX: u8 = b'i';
const FREQ_PREFIX: u8 = b't';

fn keyed(prefix: u8, id: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = prefix;
    key[1..].copy_from_slice(&id.to_be_bytes());
    key
}

fn id_from_key(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.get(1..9)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Postings store persisted in one sled tree.
///
/// Forward postings are varint sequences, inverted postings gap-encoded
/// sorted lists, term frequencies bincode maps. A decode failure is scoped
/// to its document: the document reads as absent, the tree stays usable.
pub struct SledPostings {
    tree: sled::Tree,
}

impl SledPostings {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    /// Open a standalone store under `dir` (one tree named `tree_name`)
    pub fn open(dir: &std::path::Path, tree_name: &str) -> Result<Self> {
        let db = sled::open(dir)?;
        let tree = db.open_tree(tree_name)?;
        Ok(Self::new(tree))
    }

    fn read_forward(&self, doc_id: DocId) -> Result<Option<Vec<TermId>>> {
        let Some(bytes) = self.tree.get(keyed(FORWARD_PREFIX, doc_id))? else {
            return Ok(None);
        };
        match codec::decode_sequence(&bytes) {
            Ok(term_ids) => Ok(Some(term_ids)),
            Err(e) => {
                tracing::warn!(
                    doc_id = doc_id,
                    error = %e,
                    "Unreadable postings, treating document as absent"
                );
                Err(AppError::Decode {
                    doc_id,
                    message: e.to_string(),
                })
            }
        }
    }

    fn read_inverted(&self, term_id: TermId) -> Result<BTreeSet<DocId>> {
        let Some(bytes) = self.tree.get(keyed(INVERTED_PREFIX, term_id))? else {
            return Ok(BTreeSet::new());
        };
        let doc_ids = codec::decode_sorted(&bytes)
            .map_err(|e| AppError::Storage(format!("inverted entry for term {}: {}", term_id, e)))?;
        Ok(doc_ids.into_iter().collect())
    }

    fn write_inverted(&self, term_id: TermId, doc_ids: &BTreeSet<DocId>) -> Result<()> {
        let key = keyed(INVERTED_PREFIX, term_id);
        if doc_ids.is_empty() {
            self.tree.remove(key)?;
        } else {
            let sorted: Vec<DocId> = doc_ids.iter().copied().collect();
            self.tree.insert(key, codec::encode_sorted(&sorted)?)?;
        }
        Ok(())
    }

    fn detach_doc(&self, doc_id: DocId, term_ids: &HashSet<TermId>) -> Result<()> {
        for term_id in term_ids {
            let mut postings = self.read_inverted(*term_id)?;
            if postings.remove(&doc_id) {
                self.write_inverted(*term_id, &postings)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostingsStore for SledPostings {
    async fn insert_document(&self, doc_id: DocId, term_ids: &[TermId]) -> Result<()> {
        // A corrupt previous entry only loses that document's old inverted
        // links; the new postings are still written.
        let previous = match self.read_forward(doc_id) {
            Ok(terms) => terms.unwrap_or_default(),
            Err(AppError::Decode { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        let old_terms: HashSet<TermId> = previous.iter().copied().collect();
        let new_terms: HashSet<TermId> = term_ids.iter().copied().collect();

        for added in new_terms.difference(&old_terms) {
            let mut postings = self.read_inverted(*added)?;
            postings.insert(doc_id);
            self.write_inverted(*added, &postings)?;
        }
        for removed in old_terms.difference(&new_terms) {
            let mut postings = self.read_inverted(*removed)?;
            if postings.remove(&doc_id) {
                self.write_inverted(*removed, &postings)?;
            }
        }

        self.tree
            .insert(keyed(FORWARD_PREFIX, doc_id), codec::encode_sequence(term_ids))?;

        let mut counts: HashMap<TermId, u32> = HashMap::new();
        for term_id in term_ids {
            *counts.entry(*term_id).or_insert(0) += 1;
        }
        self.tree
            .insert(keyed(FREQ_PREFIX, doc_id), bincode::serialize(&counts)?)?;

        Ok(())
    }

    async fn remove_document(&self, doc_id: DocId) -> Result<()> {
        match self.read_forward(doc_id) {
            Ok(Some(term_ids)) => {
                let terms: HashSet<TermId> = term_ids.into_iter().collect();
                self.detach_doc(doc_id, &terms)?;
            }
            Ok(None) => {}
            // The forward entry is unreadable; drop what we can and fall
            // back to a full inverted sweep for this document.
            Err(AppError::Decode { .. }) => {
                for entry in self.tree.scan_prefix([INVERTED_PREFIX]) {
                    let (key, bytes) = entry?;
                    let Some(term_id) = id_from_key(&key) else {
                        continue;
                    };
                    if let Ok(doc_ids) = codec::decode_sorted(&bytes) {
                        let mut postings: BTreeSet<DocId> = doc_ids.into_iter().collect();
                        if postings.remove(&doc_id) {
                            self.write_inverted(term_id, &postings)?;
                        }
                    }
                }
            }
            Err(e) => return Err(e),
        }

        self.tree.remove(keyed(FORWARD_PREFIX, doc_id))?;
        self.tree.remove(keyed(FREQ_PREFIX, doc_id))?;
        Ok(())
    }

    async fn documents_for_term(&self, term_id: TermId) -> Result<BTreeSet<DocId>> {
        self.read_inverted(term_id)
    }

    async fn document_frequency(&self, term_id: TermId) -> Result<u64> {
        Ok(self.read_inverted(term_id)?.len() as u64)
    }

    async fn term_frequency_table(&self) -> Result<TermFrequencyTable> {
        let mut table = TermFrequencyTable::new();
        for entry in self.tree.scan_prefix([FREQ_PREFIX]) {
            let (key, bytes) = entry?;
            let Some(doc_id) = id_from_key(&key) else {
                continue;
            };
            match bincode::deserialize::<HashMap<TermId, u32>>(&bytes) {
                Ok(counts) => {
                    table.insert(doc_id, counts);
                }
                Err(e) => {
                    tracing::warn!(
                        doc_id = doc_id,
                        error = %e,
                        "Unreadable term frequencies, skipping document"
                    );
                }
            }
        }
        Ok(table)
    }

    async fn document_count(&self) -> Result<u64> {
        let mut count = 0u64;
        for entry in self.tree.scan_prefix([FORWARD_PREFIX]) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    async fn doc_ids(&self) -> Result<Vec<DocId>> {
        let mut ids = Vec::new();
        for entry in self.tree.scan_prefix([FORWARD_PREFIX]) {
            let (key, _) = entry?;
            if let Some(doc_id) = id_from_key(&key) {
                ids.push(doc_id);
            }
        }
        Ok(ids)
    }

    async fn clear(&self) -> Result<()> {
        self.tree.clear()?;
        Ok(())
    }
}
