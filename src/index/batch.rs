//! The in-memory posting store.
//!
//! Ingestion appends into a [`PostingBatch`] until its approximate memory
//! footprint crosses the configured budget; the batch is then sealed into an
//! immutable, term-sorted [`SealedBatch`] and handed to the index builder for
//! flushing. Sealing is the only path from this module to disk I/O.

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;

use crate::error::Result;
use crate::index::posting::PostingList;

/// Threshold above which the term sort at seal time goes parallel.
const PARALLEL_SORT_THRESHOLD: usize = 10_000;

/// A mutable in-memory mapping from term to posting list.
#[derive(Debug, Default, Clone)]
pub struct PostingBatch {
    terms: AHashMap<String, PostingList>,
    /// Approximate heap usage of `terms`, maintained incrementally.
    memory_bytes: usize,
    /// Distinct documents that contributed postings to this batch.
    doc_ids: AHashSet<u64>,
}

impl PostingBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        PostingBatch::default()
    }

    /// Record an occurrence of `term` at `position` in `doc_id`.
    ///
    /// Documents may be added in any ID order. Re-adding a document that is
    /// still in the batch appends to its postings; callers replacing a
    /// document call [`Self::remove_document`] first.
    pub fn add(&mut self, term: &str, doc_id: u64, position: u32) -> Result<()> {
        let list = match self.terms.get_mut(term) {
            Some(list) => list,
            None => {
                self.memory_bytes += term.len() + std::mem::size_of::<PostingList>();
                self.terms.entry(term.to_string()).or_default()
            }
        };

        let before = list.memory_usage();
        list.add_occurrence(doc_id, position)?;
        self.memory_bytes += list.memory_usage() - before;

        self.doc_ids.insert(doc_id);
        Ok(())
    }

    /// Whether the batch holds postings for a document.
    pub fn contains_doc(&self, doc_id: u64) -> bool {
        self.doc_ids.contains(&doc_id)
    }

    /// Drop every posting of `doc_id`, so a newer version can replace them.
    ///
    /// Returns `false` if the document was not in the batch. Terms left with
    /// no postings are dropped entirely.
    pub fn remove_document(&mut self, doc_id: u64) -> bool {
        if !self.doc_ids.remove(&doc_id) {
            return false;
        }

        let memory_bytes = &mut self.memory_bytes;
        self.terms.retain(|term, list| {
            let before = list.memory_usage();
            if list.remove_doc(doc_id) {
                *memory_bytes -= before - list.memory_usage();
            }
            if list.is_empty() {
                *memory_bytes -= term.len() + std::mem::size_of::<PostingList>();
                return false;
            }
            true
        });
        true
    }

    /// Approximate memory footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.memory_bytes
    }

    /// Number of distinct terms in the batch.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Number of distinct documents in the batch.
    pub fn doc_count(&self) -> u64 {
        self.doc_ids.len() as u64
    }

    /// Whether the batch holds no postings.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Look up the posting list for a term, cloned out of the batch.
    ///
    /// Queries read the live batch through this; the clone keeps the read
    /// cheap to reason about while the writer keeps appending.
    pub fn get(&self, term: &str) -> Option<PostingList> {
        self.terms.get(term).cloned()
    }

    /// Seal the batch: sort terms lexicographically and freeze the contents.
    pub fn seal(self) -> SealedBatch {
        let mut entries: Vec<(String, PostingList)> = self.terms.into_iter().collect();

        if entries.len() >= PARALLEL_SORT_THRESHOLD {
            entries.par_sort_unstable_by(|a, b| a.0.cmp(&b.0));
        } else {
            entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        }

        SealedBatch {
            entries,
            doc_count: self.doc_ids.len() as u64,
        }
    }
}

/// An immutable, term-sorted batch ready to be flushed as a segment.
#[derive(Debug)]
pub struct SealedBatch {
    entries: Vec<(String, PostingList)>,
    doc_count: u64,
}

impl SealedBatch {
    /// The term/posting-list entries in lexicographic term order.
    pub fn entries(&self) -> &[(String, PostingList)] {
        &self.entries
    }

    /// Number of distinct documents in the batch.
    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    /// Number of distinct terms in the batch.
    pub fn term_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sealed batch holds no postings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut batch = PostingBatch::new();
        batch.add("ca", 1, 0).unwrap();
        batch.add("at", 1, 1).unwrap();
        batch.add("ca", 2, 0).unwrap();

        let list = batch.get("ca").unwrap();
        assert_eq!(list.doc_frequency(), 2);
        assert!(batch.get("zz").is_none());
        assert_eq!(batch.term_count(), 2);
        assert_eq!(batch.doc_count(), 2);
    }

    #[test]
    fn test_memory_accounting() {
        let mut batch = PostingBatch::new();
        assert_eq!(batch.memory_usage(), 0);

        batch.add("term", 1, 0).unwrap();
        let after_one = batch.memory_usage();
        assert!(after_one > 0);

        batch.add("term", 1, 1).unwrap();
        assert!(batch.memory_usage() > after_one);
    }

    #[test]
    fn test_seal_sorts_terms() {
        let mut batch = PostingBatch::new();
        batch.add("zebra", 1, 0).unwrap();
        batch.add("apple", 1, 1).unwrap();
        batch.add("mango", 1, 2).unwrap();

        let sealed = batch.seal();
        let terms: Vec<_> = sealed.entries().iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(terms, vec!["apple", "mango", "zebra"]);
        assert_eq!(sealed.doc_count(), 1);
    }

    #[test]
    fn test_out_of_order_doc_ids() {
        let mut batch = PostingBatch::new();
        batch.add("aa", 9, 0).unwrap();
        batch.add("aa", 2, 0).unwrap();

        let ids: Vec<u64> = batch
            .get("aa")
            .unwrap()
            .postings
            .iter()
            .map(|p| p.doc_id)
            .collect();
        assert_eq!(ids, vec![2, 9]);
        assert_eq!(batch.doc_count(), 2);
    }

    #[test]
    fn test_remove_document_drops_postings() {
        let mut batch = PostingBatch::new();
        batch.add("aa", 1, 0).unwrap();
        batch.add("bb", 1, 1).unwrap();
        batch.add("aa", 2, 0).unwrap();
        let before = batch.memory_usage();

        assert!(batch.remove_document(1));
        assert!(!batch.remove_document(1));
        assert!(!batch.contains_doc(1));
        assert!(batch.memory_usage() < before);

        assert_eq!(batch.get("aa").unwrap().doc_frequency(), 1);
        assert!(batch.get("bb").is_none()); // emptied terms are dropped
        assert_eq!(batch.doc_count(), 1);

        // The ID accepts fresh postings afterwards.
        batch.add("cc", 1, 0).unwrap();
        assert_eq!(batch.get("cc").unwrap().postings[0].doc_id, 1);
    }

    #[test]
    fn test_empty_batch() {
        let batch = PostingBatch::new();
        assert!(batch.is_empty());
        let sealed = batch.seal();
        assert!(sealed.is_empty());
        assert_eq!(sealed.doc_count(), 0);
    }
}
