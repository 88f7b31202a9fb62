//! Compaction, crash recovery, and tombstone reclamation over real files.

use std::collections::HashMap;
use std::sync::Arc;

use naginata::analysis::AnalyzerConfig;
use naginata::engine::{EngineConfig, SearchEngine};
use naginata::error::Result;
use naginata::index::merge::MergeConfig;
use naginata::index::{Index, IndexConfig};
use naginata::storage::{FileStorage, Storage, StorageConfig};

fn word_config() -> EngineConfig {
    EngineConfig {
        analyzer: AnalyzerConfig::word(),
        ..Default::default()
    }
}

fn file_storage(dir: &std::path::Path) -> Arc<dyn Storage> {
    Arc::new(FileStorage::new(dir, StorageConfig::default()).unwrap())
}

#[test]
fn optimize_merges_segments_and_keeps_results() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = SearchEngine::open(dir.path(), word_config())?;

    for doc_id in 1..=6u64 {
        engine.index(doc_id, &format!("shared word{doc_id}"), HashMap::new())?;
        engine.flush()?;
    }
    assert_eq!(engine.stats().index.segment_count, 6);

    engine.optimize()?;
    assert_eq!(engine.stats().index.segment_count, 1);

    let hits = engine.search("shared", 10)?;
    let ids: Vec<u64> = hits.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    Ok(())
}

#[test]
fn removed_documents_stay_removed_across_compaction_and_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;

    {
        let engine = SearchEngine::open(dir.path(), word_config())?;
        for doc_id in 1..=4u64 {
            engine.index(doc_id, "target", HashMap::new())?;
            engine.flush()?;
        }
        engine.remove(2)?;
        engine.remove(4)?;
        engine.optimize()?;

        let ids: Vec<u64> = engine.search("target", 10)?.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec![1, 3]);

        let stats = engine.stats();
        assert_eq!(stats.index.tombstone_count, 0);
        assert_eq!(stats.pending_removals, 0);
    }

    let engine = SearchEngine::open(dir.path(), EngineConfig::default())?;
    let ids: Vec<u64> = engine.search("target", 10)?.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert!(engine.get(2).is_none());
    Ok(())
}

#[test]
fn background_merge_reduces_segment_count() -> Result<()> {
    let dir = tempfile::tempdir()?;

    {
        let engine = SearchEngine::open(dir.path(), word_config())?;
        for doc_id in 1..=30u64 {
            engine.index(doc_id, &format!("bulk item{doc_id}"), HashMap::new())?;
            engine.flush()?;
        }
        assert_eq!(engine.stats().index.segment_count, 30);

        // The worker drains the trigger before the shutdown message, so the
        // merge has run by the time the engine is dropped.
        engine.trigger_merge();
    }

    let engine = SearchEngine::open(dir.path(), EngineConfig::default())?;
    assert!(engine.stats().index.segment_count < 30);

    let ids: Vec<u64> = engine.search("bulk", 50)?.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids.len(), 30);
    Ok(())
}

#[test]
fn open_sweeps_interrupted_publication_leftovers() -> Result<()> {
    let dir = tempfile::tempdir()?;

    {
        let engine = SearchEngine::open(dir.path(), word_config())?;
        engine.index(1, "survivor", HashMap::new())?;
        engine.flush()?;
    }

    // Simulate a crash between writing files and saving the manifest: a temp
    // file and an orphaned segment that no manifest references.
    std::fs::write(dir.path().join("seg_0000.tmp"), b"partial write")?;
    std::fs::write(dir.path().join("deadbeef.seg"), b"orphaned segment")?;

    let engine = SearchEngine::open(dir.path(), EngineConfig::default())?;
    let ids: Vec<u64> = engine.search("survivor", 10)?.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![1]);

    assert!(!dir.path().join("seg_0000.tmp").exists());
    assert!(!dir.path().join("deadbeef.seg").exists());
    Ok(())
}

#[test]
fn corrupt_segment_is_quarantined_not_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let victim = {
        let engine = SearchEngine::open(dir.path(), word_config())?;
        engine.index(1, "first", HashMap::new())?;
        engine.flush()?;
        engine.index(2, "second", HashMap::new())?;
        engine.flush()?;

        // Find the older segment file from the manifest.
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("manifest.json"))?)?;
        manifest["segments"][0]["file"].as_str().unwrap().to_string()
    };

    // Flip bytes in the middle of the file; the checksum must catch it.
    let path = dir.path().join(&victim);
    let mut data = std::fs::read(&path)?;
    let mid = data.len() / 2;
    data[mid] ^= 0xFF;
    std::fs::write(&path, data)?;

    let engine = SearchEngine::open(dir.path(), EngineConfig::default())?;
    let stats = engine.stats();
    assert_eq!(stats.index.quarantined_count, 1);
    assert_eq!(stats.index.segment_count, 1);

    // The intact segment still serves queries; the corrupt file is kept on
    // disk for inspection.
    let ids: Vec<u64> = engine.search("second", 10)?.iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![2]);
    assert!(path.exists());
    Ok(())
}

#[test]
fn partial_merge_preserves_tombstones_outside_inputs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = file_storage(dir.path());
    let config = IndexConfig {
        merge: MergeConfig {
            max_segments: 2,
            min_merge_segments: 2,
            segments_per_merge: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let index = Index::open(Arc::clone(&storage), config)?;

    for doc_id in 1..=3u64 {
        index.add_document(doc_id, [("tt", 0)])?;
        index.flush()?;
    }
    index.delete_document(3)?;

    // The merge window covers two of the three segments; the tombstone for
    // doc 3 must survive the partial merge regardless of which.
    assert!(index.maybe_merge()?);
    assert_eq!(index.segment_count(), 2);
    assert!(index.is_deleted(3));

    let snapshot = index.snapshot();
    let ids: Vec<u64> = snapshot
        .term_postings("tt")?
        .postings
        .iter()
        .map(|p| p.doc_id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
    Ok(())
}

#[test]
fn snapshot_survives_concurrent_optimize() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = file_storage(dir.path());
    let index = Index::open(storage, IndexConfig::default())?;

    for doc_id in 1..=3u64 {
        index.add_document(doc_id, [("ss", 0)])?;
        index.flush()?;
    }

    let snapshot = index.snapshot();
    assert_eq!(snapshot.segment_count(), 3);

    index.delete_document(2)?;
    index.optimize()?;
    assert_eq!(index.segment_count(), 1);

    // The pinned snapshot still reads its three segments, including the
    // now-deleted document, because it predates the tombstone.
    let ids: Vec<u64> = snapshot
        .term_postings("ss")?
        .postings
        .iter()
        .map(|p| p.doc_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    Ok(())
}
