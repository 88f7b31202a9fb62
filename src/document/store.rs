//! The document store: document ID to stored content and attributes.
//!
//! The store is independent of the inverted index; the index holds document
//! IDs only and looks content up here after scoring. Deletion sets a flag on
//! the record (the tombstone's document-store side); physical removal waits
//! for the index's full compaction, which reports the reclaimed IDs back via
//! [`DocumentStore::purge`].
//!
//! Persistence is a single bincode file rewritten through temp-then-rename,
//! the same publish protocol segments use.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{NaginataError, Result};
use crate::storage::{Storage, with_io_retries};

/// File name of the persisted document store.
pub const DOCS_FILE: &str = "documents.bin";

/// Retry budget for transient I/O failures while persisting.
const IO_RETRY_BUDGET: usize = 3;

/// A stored document: raw content plus optional attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Raw document content.
    pub content: Vec<u8>,
    /// Stored attribute mapping.
    pub attributes: HashMap<String, String>,
    /// Deletion flag; set by [`DocumentStore::mark_deleted`].
    pub deleted: bool,
}

impl StoredDocument {
    /// Create a stored document.
    pub fn new(content: Vec<u8>, attributes: HashMap<String, String>) -> Self {
        StoredDocument {
            content,
            attributes,
            deleted: false,
        }
    }

    /// Content as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Mapping from document ID to stored document.
#[derive(Debug)]
pub struct DocumentStore {
    docs: RwLock<BTreeMap<u64, StoredDocument>>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        DocumentStore {
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Load the store from storage, or create an empty one if absent.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        if !storage.file_exists(DOCS_FILE) {
            return Ok(Self::new());
        }

        let mut input = storage.open_input(DOCS_FILE)?;
        let mut data = Vec::new();
        std::io::Read::read_to_end(&mut input, &mut data)?;

        let docs: BTreeMap<u64, StoredDocument> = bincode::deserialize(&data)
            .map_err(|e| NaginataError::serialization(format!("document store: {e}")))?;

        Ok(DocumentStore {
            docs: RwLock::new(docs),
        })
    }

    /// Persist the store atomically.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let data = {
            let docs = self.docs.read();
            bincode::serialize(&*docs)
                .map_err(|e| NaginataError::serialization(format!("document store: {e}")))?
        };

        with_io_retries(IO_RETRY_BUDGET, || {
            let (temp_name, mut output) = storage.create_temp_output("docs_")?;
            let write = (|| -> Result<()> {
                std::io::Write::write_all(&mut output, &data)?;
                output.flush_and_sync()
            })();
            if let Err(e) = write {
                let _ = storage.delete_file(&temp_name);
                return Err(e);
            }
            drop(output);
            storage.rename_file(&temp_name, DOCS_FILE)
        })
    }

    /// Store a document, replacing any existing record for the ID.
    pub fn put(&self, doc_id: u64, content: Vec<u8>, attributes: HashMap<String, String>) {
        self.docs
            .write()
            .insert(doc_id, StoredDocument::new(content, attributes));
    }

    /// Fetch a live document. Tombstoned and absent IDs both return `None`;
    /// a miss is a valid empty result, not an error.
    pub fn get(&self, doc_id: u64) -> Option<StoredDocument> {
        self.docs
            .read()
            .get(&doc_id)
            .filter(|d| !d.deleted)
            .cloned()
    }

    /// Set the deletion flag. Returns `false` if the document does not exist
    /// or is already flagged.
    pub fn mark_deleted(&self, doc_id: u64) -> bool {
        let mut docs = self.docs.write();
        match docs.get_mut(&doc_id) {
            Some(doc) if !doc.deleted => {
                doc.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Physically remove records. Called after a full compaction has
    /// reclaimed the matching tombstones from the index.
    pub fn purge(&self, doc_ids: &[u64]) {
        let mut docs = self.docs.write();
        for doc_id in doc_ids {
            docs.remove(doc_id);
        }
    }

    /// Remove every record.
    pub fn clear(&self) {
        self.docs.write().clear();
    }

    /// Live (non-tombstoned) document IDs in ascending order.
    pub fn live_doc_ids(&self) -> Vec<u64> {
        self.docs
            .read()
            .iter()
            .filter(|(_, d)| !d.deleted)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Number of live documents.
    pub fn live_count(&self) -> u64 {
        self.docs.read().values().filter(|d| !d.deleted).count() as u64
    }

    /// Number of tombstoned records awaiting purge.
    pub fn deleted_count(&self) -> u64 {
        self.docs.read().values().filter(|d| d.deleted).count() as u64
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}
