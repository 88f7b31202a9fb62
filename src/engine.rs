//! The search engine facade: analyzer, index, document store, and query
//! layer wired together behind one handle.
//!
//! A [`SearchEngine`] owns a storage directory holding the segment files,
//! the manifest, the document store, and the persisted analyzer policy. The
//! policy is pinned on first open so that later opens keep index/query
//! symmetry even if the caller's configuration drifts.
//!
//! Ingestion is non-blocking: when the in-memory batch crosses its budget
//! the sealed batch is handed to a background worker for publication, and
//! the same worker runs the compaction policy. [`SearchEngine::flush`] and
//! [`SearchEngine::sync`] are the synchronous durability points.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{Analyzer, AnalyzerConfig};
use crate::document::{DocumentStore, StoredDocument};
use crate::error::{NaginataError, Result};
use crate::index::{Index, IndexConfig, IndexStats, MergeScheduler};
use crate::query::{QueryParser, SearchHit, Searcher};
use crate::storage::{FileStorage, Storage, StorageConfig};

/// File name of the persisted analyzer policy.
const ANALYZER_FILE: &str = "analyzer.json";

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Term normalization policy. Pinned on first open; later opens reuse
    /// the persisted policy.
    pub analyzer: AnalyzerConfig,
    /// Index tuning: batch budget and compaction policy.
    pub index: IndexConfig,
    /// Storage tuning.
    pub storage: StorageConfig,
}

/// A disk-backed full-text search engine.
pub struct SearchEngine {
    storage: Arc<dyn Storage>,
    index: Arc<Index>,
    docs: DocumentStore,
    analyzer: Arc<Analyzer>,
    parser: QueryParser,
    scheduler: MergeScheduler,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("analyzer", &self.analyzer)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    /// Open an engine over a directory, creating it if necessary.
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let storage: Arc<dyn Storage> =
            Arc::new(FileStorage::new(path, config.storage.clone())?);
        Self::with_storage(storage, config)
    }

    /// Open an engine over an explicit storage backend.
    pub fn with_storage(storage: Arc<dyn Storage>, config: EngineConfig) -> Result<Self> {
        let analyzer_config = Self::pin_analyzer_config(storage.as_ref(), &config.analyzer)?;
        let analyzer = Arc::new(Analyzer::new(analyzer_config)?);

        let index = Arc::new(Index::open(Arc::clone(&storage), config.index)?);
        let docs = DocumentStore::load(storage.as_ref())?;
        let parser = QueryParser::new(Arc::clone(&analyzer));
        let scheduler = MergeScheduler::start(Arc::clone(&index));

        info!(
            segments = index.segment_count(),
            documents = docs.live_count(),
            "engine opened"
        );

        Ok(SearchEngine {
            storage,
            index,
            docs,
            analyzer,
            parser,
            scheduler,
        })
    }

    /// Load the persisted analyzer policy, or persist `requested` if this is
    /// the first open. A persisted policy always wins: re-analyzing queries
    /// under a different policy than the one that built the segments would
    /// silently break matching.
    fn pin_analyzer_config(
        storage: &dyn Storage,
        requested: &AnalyzerConfig,
    ) -> Result<AnalyzerConfig> {
        if storage.file_exists(ANALYZER_FILE) {
            let mut input = storage.open_input(ANALYZER_FILE)?;
            let mut data = Vec::new();
            std::io::Read::read_to_end(&mut input, &mut data)?;
            let pinned: AnalyzerConfig = serde_json::from_slice(&data)?;
            if &pinned != requested {
                warn!(?pinned, ?requested, "ignoring requested analyzer policy; using pinned");
            }
            return Ok(pinned);
        }

        let data = serde_json::to_vec_pretty(requested)?;
        let (temp_name, mut output) = storage.create_temp_output("analyzer_")?;
        let write = (|| -> Result<()> {
            std::io::Write::write_all(&mut output, &data)?;
            output.flush_and_sync()
        })();
        if let Err(e) = write {
            let _ = storage.delete_file(&temp_name);
            return Err(e);
        }
        drop(output);
        storage.rename_file(&temp_name, ANALYZER_FILE)?;
        Ok(requested.clone())
    }

    /// The analyzer this engine indexes and parses queries with.
    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }

    /// Index a text document under the given ID, with optional attributes.
    ///
    /// An existing document under the same ID is replaced. While the old
    /// version is still in the in-memory batch its postings are dropped
    /// outright; once flushed, the new postings shadow the old ones term by
    /// term, and terms present only in the old version may keep matching
    /// until the next full compaction rewrites the segments. A previously
    /// removed ID is resurrected.
    pub fn index(
        &self,
        doc_id: u64,
        text: &str,
        attributes: HashMap<String, String>,
    ) -> Result<()> {
        let tokens: Vec<_> = self.analyzer.analyze(text)?.collect();
        self.index_tokens(doc_id, text.as_bytes().to_vec(), attributes, tokens)
    }

    /// Index raw bytes, validating them as UTF-8 first.
    pub fn index_bytes(
        &self,
        doc_id: u64,
        content: &[u8],
        attributes: HashMap<String, String>,
    ) -> Result<()> {
        let tokens: Vec<_> = self.analyzer.analyze_bytes(content)?.collect();
        self.index_tokens(doc_id, content.to_vec(), attributes, tokens)
    }

    fn index_tokens(
        &self,
        doc_id: u64,
        content: Vec<u8>,
        attributes: HashMap<String, String>,
        tokens: Vec<crate::analysis::Token>,
    ) -> Result<()> {
        if self.index.is_deleted(doc_id) {
            self.index.undelete_document(doc_id)?;
        }

        let sealed = self
            .index
            .add_document(doc_id, tokens.iter().map(|t| (t.text.as_str(), t.position)))?;
        self.docs.put(doc_id, content, attributes);

        if let Some(sealed) = sealed {
            self.scheduler.publish(sealed);
        }
        Ok(())
    }

    /// Remove a document. Returns `false` if no live document had the ID.
    ///
    /// The document stops matching queries immediately; its postings are
    /// physically reclaimed by the next [`optimize`](Self::optimize).
    pub fn remove(&self, doc_id: u64) -> Result<bool> {
        if !self.docs.mark_deleted(doc_id) {
            return Ok(false);
        }
        self.index.delete_document(doc_id)?;
        self.docs.save(self.storage.as_ref())?;
        Ok(true)
    }

    /// Fetch a stored document by ID. Absent and removed IDs return `None`.
    pub fn get(&self, doc_id: u64) -> Option<StoredDocument> {
        self.docs.get(doc_id)
    }

    /// IDs of all live documents, ascending.
    pub fn doc_ids(&self) -> Vec<u64> {
        self.docs.live_doc_ids()
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> u64 {
        self.docs.live_count()
    }

    /// Parse and evaluate a query expression, returning up to `limit` hits
    /// ordered by descending score (document ID breaks ties).
    pub fn search(&self, expression: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query = self.parser.parse(expression)?;
        let searcher = Searcher::new(self.index.snapshot(), Arc::new(self.docs.live_doc_ids()));
        searcher.search(&query, limit)
    }

    /// Make all buffered documents searchable from disk and persist the
    /// document store. Returns `true` if anything was written.
    pub fn flush(&self) -> Result<bool> {
        let flushed = self.index.flush()?;
        self.docs.save(self.storage.as_ref())?;
        Ok(flushed)
    }

    /// Flush and then sync the storage device.
    pub fn sync(&self) -> Result<()> {
        self.flush()?;
        self.storage.sync()
    }

    /// Merge all segments into one and physically reclaim removed documents,
    /// in both the index and the document store.
    pub fn optimize(&self) -> Result<()> {
        let reclaimed = self.index.optimize()?;
        if !reclaimed.is_empty() {
            self.docs.purge(&reclaimed);
            self.docs.save(self.storage.as_ref())?;
        }
        Ok(())
    }

    /// Ask the background worker to run the compaction policy.
    pub fn trigger_merge(&self) {
        self.scheduler.trigger();
    }

    /// Drop every document, segment, and tombstone.
    pub fn clear(&self) -> Result<()> {
        self.index.clear()?;
        self.docs.clear();
        self.docs.save(self.storage.as_ref())
    }

    /// Current engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            live_documents: self.docs.live_count(),
            pending_removals: self.docs.deleted_count(),
            index: self.index.stats(),
        }
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        // Stop the background worker before the final flush so no
        // publication races the shutdown path.
        self.scheduler.shutdown();
        if let Err(e) = self.flush() {
            warn!("flush on close failed: {e}");
        }
    }
}

/// A point-in-time summary of engine state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Number of live documents in the store.
    pub live_documents: u64,
    /// Removed documents awaiting physical reclamation.
    pub pending_removals: u64,
    /// Index-level statistics.
    pub index: IndexStats,
}

impl EngineStats {
    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(NaginataError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn memory_engine(config: EngineConfig) -> SearchEngine {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        SearchEngine::with_storage(storage, config).unwrap()
    }

    fn word_engine() -> SearchEngine {
        memory_engine(EngineConfig {
            analyzer: AnalyzerConfig::word(),
            ..Default::default()
        })
    }

    fn hit_ids(hits: &[SearchHit]) -> Vec<u64> {
        hits.iter().map(|h| h.doc_id).collect()
    }

    #[test]
    fn test_index_and_search() {
        let engine = word_engine();
        engine.index(1, "the cat sat", HashMap::new()).unwrap();
        engine.index(2, "the dog sat", HashMap::new()).unwrap();

        let hits = engine.search("cat", 10).unwrap();
        assert_eq!(hit_ids(&hits), vec![1]);

        // Buffered documents are searchable before any flush.
        assert_eq!(engine.stats().index.segment_count, 0);
    }

    #[test]
    fn test_substring_search_with_bigrams() {
        let engine = memory_engine(EngineConfig::default());
        engine.index(1, "tokyo dystopia", HashMap::new()).unwrap();
        engine.index(2, "kyoto", HashMap::new()).unwrap();

        let hits = engine.search("kyo", 10).unwrap();
        assert_eq!(hit_ids(&hits), vec![1, 2]);

        let hits = engine.search("tokyo", 10).unwrap();
        assert_eq!(hit_ids(&hits), vec![1]);
    }

    #[test]
    fn test_remove_hides_immediately() {
        let engine = word_engine();
        engine.index(1, "cat", HashMap::new()).unwrap();
        engine.index(2, "cat", HashMap::new()).unwrap();
        engine.flush().unwrap();

        assert!(engine.remove(1).unwrap());
        assert!(!engine.remove(1).unwrap());

        assert_eq!(hit_ids(&engine.search("cat", 10).unwrap()), vec![2]);
        assert!(engine.get(1).is_none());
        assert_eq!(engine.doc_ids(), vec![2]);
    }

    #[test]
    fn test_reindex_unflushed_document_replaces_it() {
        let engine = word_engine();
        engine.index(1, "the cat sat", HashMap::new()).unwrap();
        engine.index(1, "the dog sat", HashMap::new()).unwrap();

        assert_eq!(hit_ids(&engine.search("dog", 10).unwrap()), vec![1]);
        assert!(engine.search("cat", 10).unwrap().is_empty());
        assert_eq!(engine.get(1).unwrap().text(), Some("the dog sat"));
        assert_eq!(engine.doc_count(), 1);
    }

    #[test]
    fn test_doc_ids_indexed_in_any_order() {
        let engine = word_engine();
        engine.index(9, "late bird", HashMap::new()).unwrap();
        engine.index(2, "early bird", HashMap::new()).unwrap();

        assert_eq!(hit_ids(&engine.search("bird", 10).unwrap()), vec![2, 9]);
    }

    #[test]
    fn test_reindex_after_remove() {
        let engine = word_engine();
        engine.index(1, "cat", HashMap::new()).unwrap();
        engine.flush().unwrap();
        engine.remove(1).unwrap();

        engine.index(1, "dog", HashMap::new()).unwrap();
        assert_eq!(hit_ids(&engine.search("dog", 10).unwrap()), vec![1]);
        assert_eq!(engine.get(1).unwrap().text(), Some("dog"));
    }

    #[test]
    fn test_get_returns_content_and_attributes() {
        let engine = word_engine();
        let attrs: HashMap<String, String> =
            [("lang".to_string(), "en".to_string())].into_iter().collect();
        engine.index(7, "stored text", attrs).unwrap();

        let doc = engine.get(7).unwrap();
        assert_eq!(doc.text(), Some("stored text"));
        assert_eq!(doc.attributes.get("lang").map(String::as_str), Some("en"));
    }

    #[test]
    fn test_optimize_reclaims_removed() {
        let engine = word_engine();
        engine.index(1, "cat", HashMap::new()).unwrap();
        engine.index(2, "dog", HashMap::new()).unwrap();
        engine.flush().unwrap();
        engine.remove(1).unwrap();

        engine.optimize().unwrap();

        let stats = engine.stats();
        assert_eq!(stats.pending_removals, 0);
        assert_eq!(stats.index.tombstone_count, 0);
        assert_eq!(hit_ids(&engine.search("dog", 10).unwrap()), vec![2]);
    }

    #[test]
    fn test_clear() {
        let engine = word_engine();
        engine.index(1, "cat", HashMap::new()).unwrap();
        engine.flush().unwrap();

        engine.clear().unwrap();
        assert_eq!(engine.doc_count(), 0);
        assert!(engine.search("cat", 10).unwrap().is_empty());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        {
            let engine = SearchEngine::with_storage(
                Arc::clone(&storage),
                EngineConfig {
                    analyzer: AnalyzerConfig::word(),
                    ..Default::default()
                },
            )
            .unwrap();
            engine.index(1, "durable cat", HashMap::new()).unwrap();
            engine.flush().unwrap();
        }

        let engine =
            SearchEngine::with_storage(storage, EngineConfig::default()).unwrap();
        assert_eq!(hit_ids(&engine.search("cat", 10).unwrap()), vec![1]);
        assert_eq!(engine.get(1).unwrap().text(), Some("durable cat"));
    }

    #[test]
    fn test_analyzer_policy_pinned_across_reopen() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        {
            let engine = SearchEngine::with_storage(
                Arc::clone(&storage),
                EngineConfig {
                    analyzer: AnalyzerConfig::ngram(3),
                    ..Default::default()
                },
            )
            .unwrap();
            engine.index(1, "abcdef", HashMap::new()).unwrap();
            engine.flush().unwrap();
        }

        // Reopen with a different requested policy; the pinned one wins.
        let engine = SearchEngine::with_storage(
            storage,
            EngineConfig {
                analyzer: AnalyzerConfig::word(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            engine.analyzer().config(),
            &AnalyzerConfig::ngram(3)
        );
        assert_eq!(hit_ids(&engine.search("bcd", 10).unwrap()), vec![1]);
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        let engine = word_engine();
        let err = engine.index_bytes(1, &[0xFF, 0xFE], HashMap::new());
        assert!(err.is_err());
        assert!(engine.get(1).is_none());
    }

    #[test]
    fn test_search_error_on_bad_expression() {
        let engine = word_engine();
        assert!(engine.search("(cat", 10).is_err());
        assert!(engine.search("", 10).is_err());
    }
}
