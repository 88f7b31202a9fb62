//! The index manifest: the single source of truth for the live segment set.
//!
//! The manifest is a small JSON file naming the published segments in order
//! (oldest first) together with the tombstone set. It is rewritten through
//! the same temp-then-rename protocol as segments, so the transition from
//! one index state to the next is a single atomic rename. Anything in the
//! directory that the manifest does not reference is garbage from an
//! interrupted flush or compaction and is swept on open.

use serde::{Deserialize, Serialize};

use crate::error::{NaginataError, Result};
use crate::storage::Storage;

/// File name of the manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// One published segment as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    /// Segment ID.
    pub id: String,
    /// Segment file name within the storage directory.
    pub file: String,
    /// Number of distinct terms.
    pub term_count: u64,
    /// Number of distinct documents.
    pub doc_count: u64,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// The persisted index state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version.
    pub version: u32,
    /// Publication counter, incremented on every save.
    pub generation: u64,
    /// Live segments, oldest first.
    pub segments: Vec<SegmentEntry>,
    /// Tombstoned document IDs, sorted ascending.
    pub tombstones: Vec<u64>,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            version: MANIFEST_VERSION,
            generation: 0,
            segments: Vec::new(),
            tombstones: Vec::new(),
        }
    }
}

impl Manifest {
    /// Load the manifest, or return the empty initial state if none exists.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        if !storage.file_exists(MANIFEST_FILE) {
            return Ok(Manifest::default());
        }

        let mut input = storage.open_input(MANIFEST_FILE)?;
        let mut data = Vec::new();
        std::io::Read::read_to_end(&mut input, &mut data)?;

        let manifest: Manifest = serde_json::from_slice(&data)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(NaginataError::index(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        Ok(manifest)
    }

    /// Persist atomically: write to a temp name, sync, rename over the old
    /// manifest. Bumps the generation.
    pub fn save(&mut self, storage: &dyn Storage) -> Result<()> {
        self.generation += 1;

        let data = serde_json::to_vec_pretty(self)?;
        let (temp_name, mut output) = storage.create_temp_output("manifest_")?;

        let write = (|| -> Result<()> {
            std::io::Write::write_all(&mut output, &data)?;
            output.flush_and_sync()
        })();
        if let Err(e) = write {
            self.generation -= 1;
            let _ = storage.delete_file(&temp_name);
            return Err(e);
        }
        drop(output);

        if let Err(e) = storage.rename_file(&temp_name, MANIFEST_FILE) {
            self.generation -= 1;
            let _ = storage.delete_file(&temp_name);
            return Err(e);
        }
        Ok(())
    }

    /// Whether a document is tombstoned.
    pub fn is_deleted(&self, doc_id: u64) -> bool {
        self.tombstones.binary_search(&doc_id).is_ok()
    }

    /// Add a tombstone, keeping the set sorted and deduplicated.
    pub fn add_tombstone(&mut self, doc_id: u64) -> bool {
        match self.tombstones.binary_search(&doc_id) {
            Ok(_) => false,
            Err(idx) => {
                self.tombstones.insert(idx, doc_id);
                true
            }
        }
    }

    /// Remove a tombstone. Returns `false` if the document was not
    /// tombstoned.
    pub fn remove_tombstone(&mut self, doc_id: u64) -> bool {
        match self.tombstones.binary_search(&doc_id) {
            Ok(idx) => {
                self.tombstones.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Total documents across all segments (tombstones not subtracted).
    pub fn segment_doc_count(&self) -> u64 {
        self.segments.iter().map(|s| s.doc_count).sum()
    }

    /// Total size of all segment files in bytes.
    pub fn total_size_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size_bytes).sum()
    }

    /// Files the manifest references, including itself.
    pub fn referenced_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.segments.iter().map(|s| s.file.as_str()).collect();
        files.push(MANIFEST_FILE);
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn entry(id: &str, docs: u64) -> SegmentEntry {
        SegmentEntry {
            id: id.to_string(),
            file: format!("{id}.seg"),
            term_count: 10,
            doc_count: docs,
            size_bytes: 100,
        }
    }

    #[test]
    fn test_load_missing_returns_default() {
        let storage = MemoryStorage::new_default();
        let manifest = Manifest::load(&storage).unwrap();
        assert_eq!(manifest.generation, 0);
        assert!(manifest.segments.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let storage = MemoryStorage::new_default();

        let mut manifest = Manifest::default();
        manifest.segments.push(entry("a", 5));
        manifest.add_tombstone(3);
        manifest.save(&storage).unwrap();

        let loaded = Manifest::load(&storage).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.generation, 1);
    }

    #[test]
    fn test_save_replaces_atomically() {
        let storage = MemoryStorage::new_default();

        let mut manifest = Manifest::default();
        manifest.save(&storage).unwrap();
        manifest.segments.push(entry("a", 1));
        manifest.save(&storage).unwrap();

        // No temp files survive a save.
        let files = storage.list_files().unwrap();
        assert_eq!(files, vec![MANIFEST_FILE]);

        let loaded = Manifest::load(&storage).unwrap();
        assert_eq!(loaded.generation, 2);
        assert_eq!(loaded.segments.len(), 1);
    }

    #[test]
    fn test_tombstones_sorted_and_deduped() {
        let mut manifest = Manifest::default();
        assert!(manifest.add_tombstone(7));
        assert!(manifest.add_tombstone(2));
        assert!(!manifest.add_tombstone(7));

        assert_eq!(manifest.tombstones, vec![2, 7]);
        assert!(manifest.is_deleted(2));
        assert!(!manifest.is_deleted(3));
    }

    #[test]
    fn test_counters() {
        let mut manifest = Manifest::default();
        manifest.segments.push(entry("a", 5));
        manifest.segments.push(entry("b", 3));
        assert_eq!(manifest.segment_doc_count(), 8);
        assert_eq!(manifest.total_size_bytes(), 200);
    }
}
