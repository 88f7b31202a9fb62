//! Segment format checks against the file storage backend.

use std::sync::Arc;

use naginata::error::{NaginataError, Result};
use naginata::index::posting::{Posting, PostingList};
use naginata::index::segment::{SegmentReader, write_segment};
use naginata::storage::{FileStorage, Storage, StorageConfig};

fn file_storage(dir: &std::path::Path, use_mmap: bool) -> Arc<dyn Storage> {
    let config = StorageConfig {
        use_mmap,
        ..Default::default()
    };
    Arc::new(FileStorage::new(dir, config).unwrap())
}

fn sample_entries() -> Vec<(String, PostingList)> {
    let list = |postings: &[(u64, &[u32])]| {
        let mut out = PostingList::new();
        for &(doc_id, positions) in postings {
            out.push_posting(Posting::new(doc_id, positions.to_vec())).unwrap();
        }
        out
    };

    // Terms must be sorted; gaps exercise the delta encoding.
    vec![
        ("alpha".to_string(), list(&[(1, &[0, 7]), (1000, &[3])])),
        ("beta".to_string(), list(&[(2, &[0])])),
        ("gamma".to_string(), list(&[(1, &[1]), (2, &[5]), (3, &[9, 100000])])),
    ]
}

#[test]
fn segment_written_and_read_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = file_storage(dir.path(), false);

    let entries = sample_entries();
    let entry = write_segment(storage.as_ref(), &entries, 4)?;
    assert_eq!(entry.term_count, 3);
    assert_eq!(entry.doc_count, 4);

    let reader = SegmentReader::open(storage.as_ref(), &entry)?;
    for (term, expected) in &entries {
        let got = reader.postings(term)?.expect("term must be present");
        assert_eq!(&got, expected);
    }
    assert!(reader.postings("delta")?.is_none());

    let terms: Vec<&str> = reader.terms().collect();
    assert_eq!(terms, vec!["alpha", "beta", "gamma"]);
    Ok(())
}

#[test]
fn segment_readable_through_mmap() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let entry = {
        let storage = file_storage(dir.path(), false);
        write_segment(storage.as_ref(), &sample_entries(), 4)?
    };

    let storage = file_storage(dir.path(), true);
    let reader = SegmentReader::open(storage.as_ref(), &entry)?;
    let got = reader.postings("gamma")?.unwrap();
    assert_eq!(got.doc_frequency(), 3);
    Ok(())
}

#[test]
fn bit_flip_is_detected_as_corruption() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = file_storage(dir.path(), false);

    let entry = write_segment(storage.as_ref(), &sample_entries(), 4)?;

    let path = dir.path().join(&entry.file);
    let mut data = std::fs::read(&path)?;
    let mid = data.len() / 2;
    data[mid] ^= 0x01;
    std::fs::write(&path, &data)?;

    let result = SegmentReader::open(storage.as_ref(), &entry);
    assert!(matches!(result, Err(NaginataError::CorruptSegment(_))));
    Ok(())
}

#[test]
fn truncated_file_is_detected_as_corruption() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = file_storage(dir.path(), false);

    let entry = write_segment(storage.as_ref(), &sample_entries(), 4)?;

    let path = dir.path().join(&entry.file);
    let data = std::fs::read(&path)?;
    std::fs::write(&path, &data[..data.len() / 2])?;

    let result = SegmentReader::open(storage.as_ref(), &entry);
    assert!(matches!(result, Err(NaginataError::CorruptSegment(_))));
    Ok(())
}

#[test]
fn wrong_magic_is_detected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = file_storage(dir.path(), false);

    let entry = write_segment(storage.as_ref(), &sample_entries(), 4)?;

    let path = dir.path().join(&entry.file);
    let data = std::fs::read(&path)?;
    // A file of the right length that is not a segment at all.
    std::fs::write(&path, vec![0u8; data.len()])?;

    let result = SegmentReader::open(storage.as_ref(), &entry);
    assert!(matches!(result, Err(NaginataError::CorruptSegment(_))));
    Ok(())
}
