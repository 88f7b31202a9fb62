//! Ingestion: appending to the batch, tombstoning, and segment publication.
//!
//! The writer side of the index. Appends go into the in-memory batch; when
//! the batch crosses its memory budget [`Index::add_document`] seals it and
//! hands the sealed batch back to the caller, who may publish it on a
//! background thread so ingestion never waits on disk. Explicit
//! [`Index::flush`] seals and publishes synchronously.
//!
//! Every publication follows the same protocol: write the new file under a
//! temporary name, fsync, rename, then atomically save the manifest and swap
//! the live state. A crash at any intermediate point leaves either the old
//! state or the new state durable, never a mixture.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::index::batch::{PostingBatch, SealedBatch};
use crate::index::segment::{self, SegmentReader};
use crate::index::{Index, LiveState};
use crate::storage::with_io_retries;

/// Retry budget for transient I/O failures during publication.
const IO_RETRY_BUDGET: usize = 3;

impl Index {
    /// Add one document's analyzed terms to the in-memory batch.
    ///
    /// `terms` is the normalized term sequence with positions, as produced
    /// by the analyzer. Documents may arrive in any ID order; re-adding a
    /// document that is still in the batch replaces its postings outright.
    /// If the append pushes the batch over its memory budget, the batch is
    /// sealed and returned; a fresh batch is already accepting writes by
    /// then. The caller decides whether to publish the sealed batch
    /// synchronously or in the background.
    pub fn add_document<'a, I>(&self, doc_id: u64, terms: I) -> Result<Option<SealedBatch>>
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        {
            let generation = self.active().read();
            let mut batch = generation.write();
            batch.remove_document(doc_id);
            for (term, position) in terms {
                batch.add(term, doc_id, position)?;
            }
            if batch.memory_usage() <= self.config().memory_budget_bytes {
                return Ok(None);
            }
        }
        Ok(self.seal_active())
    }

    /// Swap in a fresh batch generation and seal the previous one.
    ///
    /// The old generation stays intact behind its `Arc`, so snapshots that
    /// captured it keep a stable view across the flush; its contents are
    /// taken by value only when no snapshot still holds it.
    pub(crate) fn seal_active(&self) -> Option<SealedBatch> {
        let mut active = self.active().write();
        if active.read().is_empty() {
            return None;
        }
        let old = std::mem::replace(&mut *active, Arc::new(RwLock::new(PostingBatch::new())));
        drop(active);

        let batch = match Arc::try_unwrap(old) {
            Ok(lock) => lock.into_inner(),
            Err(shared) => shared.read().clone(),
        };
        Some(batch.seal())
    }

    /// Tombstone a document. Returns `false` if it was already tombstoned.
    ///
    /// The tombstone is durable once this returns: the manifest is saved
    /// before the live state is swapped. Physical reclamation of the
    /// document's postings happens during compaction.
    pub fn delete_document(&self, doc_id: u64) -> Result<bool> {
        let _guard = self.publish_lock().lock();

        let current = self.live().read().clone();
        let mut manifest = current.manifest.clone();
        if !manifest.add_tombstone(doc_id) {
            return Ok(false);
        }

        with_io_retries(IO_RETRY_BUDGET, || manifest.save(self.storage().as_ref()))?;

        let state = Arc::new(LiveState {
            manifest,
            readers: current.readers.clone(),
        });
        *self.live().write() = state;
        Ok(true)
    }

    /// Drop a document's tombstone so the ID can be re-indexed.
    ///
    /// Postings for the ID in older segments become visible again, but a
    /// caller re-indexing the document puts its new postings in the newest
    /// source, which shadows them. Returns `false` if the document was not
    /// tombstoned.
    pub fn undelete_document(&self, doc_id: u64) -> Result<bool> {
        let _guard = self.publish_lock().lock();

        let current = self.live().read().clone();
        let mut manifest = current.manifest.clone();
        if !manifest.remove_tombstone(doc_id) {
            return Ok(false);
        }

        with_io_retries(IO_RETRY_BUDGET, || manifest.save(self.storage().as_ref()))?;

        let state = Arc::new(LiveState {
            manifest,
            readers: current.readers.clone(),
        });
        *self.live().write() = state;
        Ok(true)
    }

    /// Seal the current batch and publish it as a segment, synchronously.
    ///
    /// Returns `false` if the batch was empty and nothing was written.
    pub fn flush(&self) -> Result<bool> {
        let Some(sealed) = self.seal_active() else {
            return Ok(false);
        };
        self.publish_sealed(sealed)?;
        Ok(true)
    }

    /// Publish a sealed batch as a new segment at the newest position.
    pub fn publish_sealed(&self, sealed: SealedBatch) -> Result<()> {
        if sealed.is_empty() {
            return Ok(());
        }

        let _guard = self.publish_lock().lock();

        let entry = with_io_retries(IO_RETRY_BUDGET, || {
            segment::write_segment(
                self.storage().as_ref(),
                sealed.entries(),
                sealed.doc_count(),
            )
        })?;
        let reader = SegmentReader::open(self.storage().as_ref(), &entry)?;

        let current = self.live().read().clone();
        let mut manifest = current.manifest.clone();
        manifest.segments.push(entry);
        with_io_retries(IO_RETRY_BUDGET, || manifest.save(self.storage().as_ref()))?;

        let mut readers = current.readers.clone();
        readers.push(reader);

        *self.live().write() = Arc::new(LiveState { manifest, readers });
        Ok(())
    }

    /// Drop all documents, segments, and tombstones, leaving an empty index.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.publish_lock().lock();

        let current = self.live().read().clone();

        let mut manifest = crate::index::manifest::Manifest {
            generation: current.manifest.generation,
            ..Default::default()
        };
        with_io_retries(IO_RETRY_BUDGET, || manifest.save(self.storage().as_ref()))?;

        *self.live().write() = Arc::new(LiveState {
            manifest,
            readers: Vec::new(),
        });
        *self.active().write() = Arc::new(RwLock::new(PostingBatch::new()));

        // Old segment files are unreferenced now; remove them.
        for entry in &current.manifest.segments {
            self.storage().delete_file(&entry.file)?;
        }
        Ok(())
    }
}
