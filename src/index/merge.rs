//! Compaction: merging segments and reclaiming tombstoned space.
//!
//! Small segments accumulate as batches flush; every extra segment adds
//! fan-out to each term lookup. The merge policy picks an adjacent run of
//! small segments and a k-way merge rewrites them as one, dropping postings
//! for tombstoned documents along the way. The merge works entirely against
//! a snapshot and only takes the publish lock for the final swap, so queries
//! and ingestion continue throughout.
//!
//! [`MergeScheduler`] runs the policy on a background thread fed by a
//! channel; [`Index::optimize`] is the synchronous full merge.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread::JoinHandle;

use ahash::AHashSet;
use crossbeam_channel::{Sender, unbounded};
use tracing::{debug, warn};

use crate::error::{NaginataError, Result};
use crate::index::batch::SealedBatch;
use crate::index::manifest::SegmentEntry;
use crate::index::posting::{Posting, PostingList};
use crate::index::segment::{self, SegmentReader};
use crate::index::{Index, LiveState};

/// Compaction policy configuration.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Merge is considered once the segment count exceeds this.
    pub max_segments: usize,

    /// Minimum number of segments worth merging at once.
    pub min_merge_segments: usize,

    /// Maximum number of segments merged in one pass.
    pub segments_per_merge: usize,

    /// Upper bound on the combined input size of one merge, bounding the
    /// cost of any single compaction pass.
    pub max_merged_bytes: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            max_segments: 8,
            min_merge_segments: 2,
            segments_per_merge: 4,
            max_merged_bytes: 64 * 1024 * 1024,
        }
    }
}

impl MergeConfig {
    /// Whether the segment count warrants a compaction pass.
    pub fn should_merge(&self, segment_count: usize) -> bool {
        segment_count > self.max_segments
    }

    /// Pick the adjacent run of segments with the smallest combined size.
    ///
    /// Only adjacent segments may merge: the segment sequence is ordered
    /// oldest to newest and document shadowing depends on that order.
    /// Returns the index range into `segments`, or `None` if no run fits
    /// the policy.
    pub fn select_merge(&self, segments: &[SegmentEntry]) -> Option<std::ops::Range<usize>> {
        let window = self.segments_per_merge.min(segments.len());
        if window < self.min_merge_segments {
            return None;
        }

        let mut best: Option<(u64, std::ops::Range<usize>)> = None;
        for start in 0..=segments.len() - window {
            let range = start..start + window;
            let combined: u64 = segments[range.clone()].iter().map(|s| s.size_bytes).sum();
            if combined > self.max_merged_bytes {
                continue;
            }
            if best.as_ref().is_none_or(|(size, _)| combined < *size) {
                best = Some((combined, range));
            }
        }

        best.map(|(_, range)| range)
    }
}

impl Index {
    /// Run one compaction pass if the policy calls for it.
    ///
    /// Returns `true` if a merge was performed.
    pub fn maybe_merge(&self) -> Result<bool> {
        let live = self.live().read().clone();
        if !self.config().merge.should_merge(live.readers.len()) {
            return Ok(false);
        }
        let Some(range) = self.config().merge.select_merge(&live.manifest.segments) else {
            return Ok(false);
        };
        self.compact(live, range)?;
        Ok(true)
    }

    /// Merge every segment into one and clear the tombstone set.
    ///
    /// Returns the document IDs whose tombstones were reclaimed, so the
    /// document store can purge them. A fully compacted index (at most one
    /// segment, no tombstones) is left untouched.
    pub fn optimize(&self) -> Result<Vec<u64>> {
        self.flush()?;

        let live = self.live().read().clone();
        if live.readers.len() <= 1 && live.manifest.tombstones.is_empty() {
            return Ok(Vec::new());
        }

        let reclaimed = live.manifest.tombstones.clone();
        let range = 0..live.readers.len();
        self.compact(live, range)?;
        Ok(reclaimed)
    }

    /// Merge the given adjacent run of segments from `live` into one new
    /// segment and publish the result.
    ///
    /// A full-range merge also clears the tombstone set, since no segment
    /// can still contain a tombstoned posting afterwards. Partial merges
    /// keep the set: a tombstoned document may survive in segments outside
    /// the run. If a concurrent compaction replaced any of the inputs before
    /// publication, the pass errors out without changing the live state.
    fn compact(&self, live: Arc<LiveState>, range: std::ops::Range<usize>) -> Result<()> {
        let full_range = range == (0..live.readers.len());
        let inputs = &live.readers[range.clone()];
        let input_entries = &live.manifest.segments[range.clone()];

        debug!(
            inputs = inputs.len(),
            full = full_range,
            "starting compaction"
        );

        let (entries, doc_count) = merge_readers(inputs, &live.manifest.tombstones)?;
        let new_entry = if entries.is_empty() {
            None
        } else {
            Some(segment::write_segment(
                self.storage().as_ref(),
                &entries,
                doc_count,
            )?)
        };

        // Publication: re-locate the inputs in the current live state (a
        // flush may have appended segments since the merge began), splice in
        // the replacement, save the manifest, swap. If any input is gone or
        // the run was rearranged by a concurrent compaction, publishing
        // would drop segments the merge never read, so the pass is
        // abandoned and the inputs stay live.
        {
            let _guard = self.publish_lock().lock();
            let current = self.live().read().clone();
            let segments = &current.manifest.segments;

            let Some(start) = segments.iter().position(|s| s.id == input_entries[0].id) else {
                return self.abandon_compaction(&new_entry);
            };
            let end = start + input_entries.len();
            let run_intact = end <= segments.len()
                && segments[start..end]
                    .iter()
                    .zip(input_entries)
                    .all(|(live_entry, input)| live_entry.id == input.id);
            if !run_intact {
                return self.abandon_compaction(&new_entry);
            }
            // A segment appended mid-merge may still hold a tombstoned
            // document, so tombstones are reclaimed only when the output
            // replaces the whole current sequence.
            let covers_current = start == 0 && end == segments.len();

            let mut manifest = current.manifest.clone();
            let mut readers = current.readers.clone();

            let replacement_reader = match &new_entry {
                Some(entry) => Some(SegmentReader::open(self.storage().as_ref(), entry)?),
                None => None,
            };

            manifest.segments.splice(start..end, new_entry.clone());
            readers.splice(start..end, replacement_reader);

            if full_range && covers_current {
                // Only reclaim tombstones the merge actually applied; a
                // delete that raced in after the merge snapshot must survive.
                let applied = &live.manifest.tombstones;
                manifest
                    .tombstones
                    .retain(|t| applied.binary_search(t).is_err());
            }

            manifest.save(self.storage().as_ref())?;
            *self.live().write() = Arc::new(LiveState { manifest, readers });
        }

        // The inputs are unreferenced now. Snapshots taken before the swap
        // keep their readers open; the underlying data stays valid for them.
        for entry in input_entries {
            self.storage().delete_file(&entry.file)?;
        }

        debug!(doc_count, "compaction published");
        Ok(())
    }

    /// Discard an unpublishable merge output and surface the conflict.
    fn abandon_compaction(&self, new_entry: &Option<SegmentEntry>) -> Result<()> {
        if let Some(entry) = new_entry {
            let _ = self.storage().delete_file(&entry.file);
        }
        Err(NaginataError::index(
            "merge inputs no longer form a live run; compaction abandoned",
        ))
    }
}

/// K-way merge over the sorted term streams of `readers` (oldest first).
///
/// Postings for the same term are combined across inputs with newest-wins
/// document deduplication; tombstoned documents are dropped. Returns the
/// term-sorted entries and the distinct document count of the output.
fn merge_readers(
    readers: &[Arc<SegmentReader>],
    tombstones: &[u64],
) -> Result<(Vec<(String, PostingList)>, u64)> {
    let mut terms: BTreeSet<String> = BTreeSet::new();
    for reader in readers {
        terms.extend(reader.terms().map(|t| t.to_string()));
    }

    let mut entries = Vec::with_capacity(terms.len());
    let mut doc_ids: AHashSet<u64> = AHashSet::new();

    for term in terms {
        let mut merged: BTreeMap<u64, Posting> = BTreeMap::new();

        for reader in readers.iter().rev() {
            if let Some(list) = reader.postings(&term)? {
                for posting in list.postings {
                    if tombstones.binary_search(&posting.doc_id).is_ok() {
                        continue;
                    }
                    merged.entry(posting.doc_id).or_insert(posting);
                }
            }
        }

        if merged.is_empty() {
            continue;
        }
        doc_ids.extend(merged.keys().copied());
        entries.push((
            term,
            PostingList {
                postings: merged.into_values().collect(),
            },
        ));
    }

    Ok((entries, doc_ids.len() as u64))
}

enum MergeMessage {
    /// Publish a sealed batch, then consider merging.
    Publish(SealedBatch),
    /// Consider merging now.
    Trigger,
    /// Stop the worker.
    Shutdown,
}

/// Background compaction worker.
///
/// Owns a thread that publishes sealed batches and runs the merge policy off
/// the ingestion path. Failures are logged and leave the index in its last
/// good state; the worker keeps serving subsequent requests.
pub struct MergeScheduler {
    sender: Sender<MergeMessage>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MergeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeScheduler").finish_non_exhaustive()
    }
}

impl MergeScheduler {
    /// Start the worker thread for the given index.
    pub fn start(index: Arc<Index>) -> Self {
        let (sender, receiver) = unbounded();

        let handle = std::thread::spawn(move || {
            while let Ok(message) = receiver.recv() {
                match message {
                    MergeMessage::Publish(sealed) => {
                        if let Err(e) = index.publish_sealed(sealed) {
                            warn!("background flush failed: {e}");
                            continue;
                        }
                        if let Err(e) = index.maybe_merge() {
                            warn!("background merge failed: {e}");
                        }
                    }
                    MergeMessage::Trigger => {
                        if let Err(e) = index.maybe_merge() {
                            warn!("background merge failed: {e}");
                        }
                    }
                    MergeMessage::Shutdown => break,
                }
            }
        });

        MergeScheduler {
            sender,
            handle: Some(handle),
        }
    }

    /// Hand a sealed batch to the worker for publication.
    pub fn publish(&self, sealed: SealedBatch) {
        let _ = self.sender.send(MergeMessage::Publish(sealed));
    }

    /// Ask the worker to run the merge policy.
    pub fn trigger(&self) {
        let _ = self.sender.send(MergeMessage::Trigger);
    }

    /// Stop the worker and wait for in-flight work to finish.
    pub fn shutdown(&mut self) {
        let _ = self.sender.send(MergeMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MergeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
