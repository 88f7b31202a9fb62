//! The inverted index: in-memory batch, immutable segments, and the
//! machinery that moves postings between them.
//!
//! A live index is an ordered sequence of on-disk segments (oldest first)
//! plus one mutable in-memory batch. Ingestion goes through
//! [`Index::add_document`]; when the batch outgrows its budget it is sealed
//! and flushed as a new segment. Deletion writes a tombstone; compaction
//! merges segments and reclaims tombstoned postings. Readers work against
//! [`Snapshot`](reader::Snapshot)s and are never blocked by writers.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::error::{NaginataError, Result};
use crate::index::batch::PostingBatch;
use crate::index::manifest::Manifest;
use crate::index::merge::MergeConfig;
use crate::index::reader::Snapshot;
use crate::index::segment::SegmentReader;
use crate::storage::Storage;

pub mod batch;
pub mod manifest;
pub mod merge;
pub mod posting;
pub mod reader;
pub mod segment;
pub mod writer;

pub use batch::{PostingBatch as Batch, SealedBatch};
pub use manifest::SegmentEntry;
pub use merge::MergeScheduler;
pub use posting::{Posting, PostingList};

/// Configuration for the index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Memory budget for the in-memory posting batch, in bytes. Crossing it
    /// seals the batch and triggers a flush.
    pub memory_budget_bytes: usize,

    /// Compaction policy.
    pub merge: MergeConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            memory_budget_bytes: 8 * 1024 * 1024,
            merge: MergeConfig::default(),
        }
    }
}

/// The published index state: manifest plus open readers, swapped as one.
///
/// Queries hold an `Arc` to this for their whole execution, so a concurrent
/// flush or compaction never changes the segment set under them.
#[derive(Debug)]
pub(crate) struct LiveState {
    pub(crate) manifest: Manifest,
    /// Open readers, parallel to `manifest.segments`.
    pub(crate) readers: Vec<Arc<SegmentReader>>,
}

/// A disk-backed inverted index.
#[derive(Debug)]
pub struct Index {
    storage: Arc<dyn Storage>,
    config: IndexConfig,
    /// The mutable in-memory batch, one generation at a time. Writers append
    /// under the inner write lock while holding the outer read lock; sealing
    /// takes the outer write lock and swaps in a fresh generation, leaving
    /// the old one frozen for any snapshot that still holds it.
    active: RwLock<Arc<RwLock<PostingBatch>>>,
    /// The published state, swapped atomically on every publication.
    live: RwLock<Arc<LiveState>>,
    /// Serializes flush, delete, and compaction publications.
    publish_lock: Mutex<()>,
    /// Segment files excluded as corrupt; left on disk for inspection and
    /// skipped by the stray-file sweep and by merges.
    quarantined: Vec<String>,
}

impl Index {
    /// Open an index in the given storage, creating an empty one if no
    /// manifest exists.
    ///
    /// Segments that fail validation are excluded with a warning rather than
    /// failing the open; files left behind by an interrupted flush or
    /// compaction are swept.
    pub fn open(storage: Arc<dyn Storage>, config: IndexConfig) -> Result<Self> {
        let mut manifest = Manifest::load(storage.as_ref())?;

        let mut readers = Vec::with_capacity(manifest.segments.len());
        let mut quarantined = Vec::new();
        let mut kept = Vec::with_capacity(manifest.segments.len());

        for entry in std::mem::take(&mut manifest.segments) {
            match SegmentReader::open(storage.as_ref(), &entry) {
                Ok(reader) => {
                    readers.push(reader);
                    kept.push(entry);
                }
                Err(NaginataError::CorruptSegment(msg)) => {
                    warn!(segment = %entry.id, "excluding corrupt segment: {msg}");
                    quarantined.push(entry.file.clone());
                }
                Err(e) => return Err(e),
            }
        }
        manifest.segments = kept;

        let index = Index {
            storage,
            config,
            active: RwLock::new(Arc::new(RwLock::new(PostingBatch::new()))),
            live: RwLock::new(Arc::new(LiveState { manifest, readers })),
            publish_lock: Mutex::new(()),
            quarantined,
        };
        index.sweep_stray_files()?;
        Ok(index)
    }

    /// The storage backing this index.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// The index configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Take a consistent read snapshot of the index.
    pub fn snapshot(&self) -> Snapshot {
        // The batch generation is captured before the live state. A flush
        // between the two reads then at worst duplicates documents into a
        // segment the snapshot also sees, and merged reads deduplicate;
        // the reverse order could lose them entirely.
        let batch = self.active.read().clone();
        let live = self.live.read().clone();
        Snapshot::new(live, batch)
    }

    /// Number of live segments.
    pub fn segment_count(&self) -> usize {
        self.live.read().readers.len()
    }

    /// Whether a document is tombstoned.
    pub fn is_deleted(&self, doc_id: u64) -> bool {
        self.live.read().manifest.is_deleted(doc_id)
    }

    /// Current statistics.
    pub fn stats(&self) -> IndexStats {
        let live = self.live.read();
        let batch = self.active.read().clone();
        let active = batch.read();
        IndexStats {
            segment_count: live.readers.len(),
            segment_doc_count: live.manifest.segment_doc_count(),
            tombstone_count: live.manifest.tombstones.len() as u64,
            total_size_bytes: live.manifest.total_size_bytes(),
            generation: live.manifest.generation,
            active_term_count: active.term_count(),
            active_memory_bytes: active.memory_usage(),
            quarantined_count: self.quarantined.len(),
        }
    }

    /// Delete index files that the manifest does not reference: segments
    /// orphaned by a crash between rename and manifest save, and leftover
    /// temp files. Files owned by other components (the document store, the
    /// manifest itself) are never touched, nor are quarantined segments,
    /// which are kept for operator attention.
    fn sweep_stray_files(&self) -> Result<()> {
        let live = self.live.read();
        let referenced = live.manifest.referenced_files();

        for file in self.storage.list_files()? {
            let sweepable =
                file.ends_with(&format!(".{}", segment::SEGMENT_EXT)) || file.ends_with(".tmp");
            if !sweepable {
                continue;
            }
            if referenced.contains(&file.as_str()) {
                continue;
            }
            if self.quarantined.contains(&file) {
                continue;
            }
            warn!(file = %file, "sweeping stray file from interrupted operation");
            self.storage.delete_file(&file)?;
        }
        Ok(())
    }

    pub(crate) fn active(&self) -> &RwLock<Arc<RwLock<PostingBatch>>> {
        &self.active
    }

    pub(crate) fn live(&self) -> &RwLock<Arc<LiveState>> {
        &self.live
    }

    pub(crate) fn publish_lock(&self) -> &Mutex<()> {
        &self.publish_lock
    }
}

/// A point-in-time summary of index state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    /// Number of live segments.
    pub segment_count: usize,
    /// Documents across all segments (tombstones not subtracted).
    pub segment_doc_count: u64,
    /// Number of tombstoned document IDs.
    pub tombstone_count: u64,
    /// Total size of segment files in bytes.
    pub total_size_bytes: u64,
    /// Manifest generation.
    pub generation: u64,
    /// Terms in the in-memory batch.
    pub active_term_count: usize,
    /// Approximate memory used by the in-memory batch.
    pub active_memory_bytes: usize,
    /// Segments excluded as corrupt.
    pub quarantined_count: usize,
}
