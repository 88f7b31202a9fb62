//! Read-side view of the index: snapshots and merged posting resolution.
//!
//! A [`Snapshot`] pins the published segment set and tombstone set for the
//! duration of a query. Compaction and flushes publish by swapping the live
//! state pointer, so a snapshot taken before a swap keeps reading the old
//! segment files untouched (snapshot isolation). The snapshot also captures
//! the batch generation current at creation; sealing swaps in a fresh
//! generation instead of draining the old one, so documents never vanish
//! from a pinned snapshot mid-query.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::index::LiveState;
use crate::index::batch::PostingBatch;
use crate::index::posting::{Posting, PostingList};

/// A consistent read view over the index.
#[derive(Debug, Clone)]
pub struct Snapshot {
    live: Arc<LiveState>,
    batch: Arc<RwLock<PostingBatch>>,
}

impl Snapshot {
    pub(crate) fn new(live: Arc<LiveState>, batch: Arc<RwLock<PostingBatch>>) -> Self {
        Snapshot { live, batch }
    }

    /// Number of segments in this snapshot.
    pub fn segment_count(&self) -> usize {
        self.live.readers.len()
    }

    /// Whether a document is tombstoned in this snapshot.
    pub fn is_deleted(&self, doc_id: u64) -> bool {
        self.live.manifest.is_deleted(doc_id)
    }

    /// Documents across all segments, tombstones not subtracted.
    pub fn segment_doc_count(&self) -> u64 {
        self.live.manifest.segment_doc_count()
    }

    /// Resolve the merged posting list for a term.
    ///
    /// Consults the in-memory batch and every segment, newest source first.
    /// When the same document appears in more than one source (the document
    /// was re-indexed), the newest source's postings win. Tombstoned
    /// documents are excluded. The result is sorted by document ID, as if
    /// the sources were one list.
    pub fn term_postings(&self, term: &str) -> Result<PostingList> {
        let mut merged: BTreeMap<u64, Posting> = BTreeMap::new();

        if let Some(list) = self.batch.read().get(term) {
            self.collect(&mut merged, list);
        }

        // Segments are ordered oldest first; visit newest first so earlier
        // occurrences of a document shadow older ones.
        for reader in self.live.readers.iter().rev() {
            if let Some(list) = reader.postings(term)? {
                self.collect(&mut merged, list);
            }
        }

        Ok(PostingList {
            postings: merged.into_values().collect(),
        })
    }

    fn collect(&self, merged: &mut BTreeMap<u64, Posting>, list: PostingList) {
        for posting in list.postings {
            if self.is_deleted(posting.doc_id) {
                continue;
            }
            merged.entry(posting.doc_id).or_insert(posting);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Index, IndexConfig};
    use crate::storage::{MemoryStorage, Storage};

    fn open_index() -> Index {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        Index::open(storage, IndexConfig::default()).unwrap()
    }

    #[test]
    fn test_merges_batch_and_segments() {
        let index = open_index();

        index.add_document(1, [("aa", 0)]).unwrap();
        index.flush().unwrap();
        index.add_document(2, [("aa", 0)]).unwrap();
        index.flush().unwrap();
        index.add_document(3, [("aa", 0)]).unwrap(); // stays in the batch

        let snapshot = index.snapshot();
        let list = snapshot.term_postings("aa").unwrap();
        let ids: Vec<u64> = list.postings.iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_tombstones_excluded_everywhere() {
        let index = open_index();

        index.add_document(1, [("aa", 0)]).unwrap();
        index.flush().unwrap();
        index.add_document(2, [("aa", 0)]).unwrap(); // in the batch

        index.delete_document(1).unwrap();
        index.delete_document(2).unwrap();

        let snapshot = index.snapshot();
        assert!(snapshot.term_postings("aa").unwrap().is_empty());
    }

    #[test]
    fn test_newest_source_wins_for_reindexed_doc() {
        let index = open_index();

        index.add_document(1, [("aa", 0), ("aa", 1)]).unwrap();
        index.flush().unwrap();
        // Re-index document 1 with different positions; stays in the batch.
        index.add_document(1, [("aa", 5)]).unwrap();

        let snapshot = index.snapshot();
        let list = snapshot.term_postings("aa").unwrap();
        assert_eq!(list.postings.len(), 1);
        assert_eq!(list.postings[0].positions, vec![5]);
    }

    #[test]
    fn test_snapshot_isolation_across_flush() {
        let index = open_index();

        index.add_document(1, [("aa", 0)]).unwrap();
        index.flush().unwrap();

        let before = index.snapshot();
        assert_eq!(before.segment_count(), 1);

        index.add_document(2, [("aa", 0)]).unwrap();
        index.flush().unwrap();

        // The earlier snapshot still sees one segment.
        assert_eq!(before.segment_count(), 1);
        assert_eq!(index.snapshot().segment_count(), 2);
    }

    #[test]
    fn test_snapshot_keeps_batch_contents_across_flush() {
        let index = open_index();
        index.add_document(1, [("aa", 0)]).unwrap();

        let snapshot = index.snapshot();
        index.flush().unwrap();

        // The document moved into a segment, but the pinned snapshot still
        // resolves it from its frozen batch generation.
        assert_eq!(snapshot.segment_count(), 0);
        assert_eq!(snapshot.term_postings("aa").unwrap().doc_frequency(), 1);
    }

    #[test]
    fn test_missing_term_is_empty_not_error() {
        let index = open_index();
        let snapshot = index.snapshot();
        assert!(snapshot.term_postings("nope").unwrap().is_empty());
    }
}
