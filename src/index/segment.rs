//! On-disk segment format: writer and reader.
//!
//! A segment is one immutable file holding a sorted term dictionary and
//! delta-encoded posting blocks:
//!
//! ```text
//! +-----------------------------------------------------------+
//! | header: magic u32 | version u32 | term_count | doc_count  |
//! +-----------------------------------------------------------+
//! | posting blocks, one per term in lexicographic order:      |
//! |   doc_freq varint                                         |
//! |   per posting: doc_id delta varint, freq varint,          |
//! |                position delta varints                     |
//! +-----------------------------------------------------------+
//! | term index: per term, string | offset varint | len varint |
//! +-----------------------------------------------------------+
//! | footer: term_index_offset u64 | crc32 u32                 |
//! +-----------------------------------------------------------+
//! ```
//!
//! The CRC covers every byte before it. Writers always emit to a temporary
//! name and rename after fsync, so a partially written segment is never
//! visible under a published name. The format is versioned; readers accept
//! exactly the versions they know how to decode.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{NaginataError, Result};
use crate::index::manifest::SegmentEntry;
use crate::index::posting::{Posting, PostingList};
use crate::storage::structured::checksum_prefix;
use crate::storage::{Storage, StorageInput, StructReader, StructWriter};

/// Magic number identifying a segment file ("NGSG").
pub const SEGMENT_MAGIC: u32 = u32::from_le_bytes(*b"NGSG");

/// Current segment format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes: magic, version, term count, doc count.
const HEADER_LEN: u64 = 4 + 4 + 8 + 8;

/// Footer size in bytes: term index offset, checksum.
const FOOTER_LEN: u64 = 8 + 4;

/// File extension for published segments.
pub const SEGMENT_EXT: &str = "seg";

/// Generate a fresh segment ID.
pub fn new_segment_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// File name for a segment ID.
pub fn segment_file_name(id: &str) -> String {
    format!("{id}.{SEGMENT_EXT}")
}

/// Write a segment from term-sorted entries and publish it atomically.
///
/// Returns the manifest entry for the published file. On any error the
/// temporary file is removed and nothing becomes visible.
pub fn write_segment(
    storage: &dyn Storage,
    entries: &[(String, PostingList)],
    doc_count: u64,
) -> Result<SegmentEntry> {
    let id = new_segment_id();
    let file = segment_file_name(&id);
    let (temp_name, output) = storage.create_temp_output("seg_")?;

    let result = write_segment_body(output, entries, doc_count);
    if let Err(e) = result {
        // Best effort: the stray temp file is also swept at index open.
        let _ = storage.delete_file(&temp_name);
        return Err(e);
    }

    storage.rename_file(&temp_name, &file)?;
    let size_bytes = storage.file_size(&file)?;

    Ok(SegmentEntry {
        id,
        file,
        term_count: entries.len() as u64,
        doc_count,
        size_bytes,
    })
}

fn write_segment_body(
    output: Box<dyn crate::storage::StorageOutput>,
    entries: &[(String, PostingList)],
    doc_count: u64,
) -> Result<()> {
    let mut writer = StructWriter::new(output);

    writer.write_u32(SEGMENT_MAGIC)?;
    writer.write_u32(FORMAT_VERSION)?;
    writer.write_u64(entries.len() as u64)?;
    writer.write_u64(doc_count)?;

    let mut term_index = Vec::with_capacity(entries.len());
    for (term, list) in entries {
        let offset = writer.position();
        write_posting_block(&mut writer, list)?;
        let length = writer.position() - offset;
        term_index.push((term, offset, length));
    }

    let term_index_offset = writer.position();
    for (term, offset, length) in term_index {
        writer.write_string(term)?;
        writer.write_varint(offset)?;
        writer.write_varint(length)?;
    }

    writer.write_u64(term_index_offset)?;
    writer.close()
}

fn write_posting_block<W: crate::storage::StorageOutput>(
    writer: &mut StructWriter<W>,
    list: &PostingList,
) -> Result<()> {
    writer.write_varint(list.doc_frequency())?;

    let mut prev_doc = 0u64;
    for posting in &list.postings {
        writer.write_varint(posting.doc_id - prev_doc)?;
        prev_doc = posting.doc_id;

        writer.write_varint(posting.frequency() as u64)?;
        let mut prev_pos = 0u32;
        for &pos in &posting.positions {
            writer.write_varint((pos - prev_pos) as u64)?;
            prev_pos = pos;
        }
    }

    Ok(())
}

/// A reader over one published, validated segment file.
///
/// Opening validates the magic, version, and whole-file checksum; any
/// failure is a [`NaginataError::CorruptSegment`] so callers can exclude the
/// file and keep serving from the rest of the index. The term dictionary is
/// held in memory; posting blocks are read on demand.
pub struct SegmentReader {
    id: String,
    doc_count: u64,
    /// Sorted (term, offset, length) entries.
    terms: Vec<(String, u64, u64)>,
    reader: Mutex<StructReader<Box<dyn StorageInput>>>,
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("id", &self.id)
            .field("doc_count", &self.doc_count)
            .field("term_count", &self.terms.len())
            .finish_non_exhaustive()
    }
}

impl SegmentReader {
    /// Open and validate a segment.
    pub fn open(storage: &dyn Storage, entry: &SegmentEntry) -> Result<Arc<Self>> {
        let mut input = storage.open_input(&entry.file)?;
        let size = input.size()?;

        if size < HEADER_LEN + FOOTER_LEN {
            return Err(NaginataError::corrupt_segment(format!(
                "{}: file too short ({size} bytes)",
                entry.file
            )));
        }

        let mut reader = StructReader::new(input.clone_input()?)?;
        reader.seek(size - 4)?;
        let stored_crc = reader.read_u32()?;
        let actual_crc = checksum_prefix(&mut input, size - 4)?;
        if stored_crc != actual_crc {
            return Err(NaginataError::corrupt_segment(format!(
                "{}: checksum mismatch (stored {stored_crc:08x}, computed {actual_crc:08x})",
                entry.file
            )));
        }

        reader.seek(0)?;
        let magic = reader.read_u32()?;
        if magic != SEGMENT_MAGIC {
            return Err(NaginataError::corrupt_segment(format!(
                "{}: bad magic {magic:08x}",
                entry.file
            )));
        }
        let version = reader.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(NaginataError::corrupt_segment(format!(
                "{}: unsupported format version {version}",
                entry.file
            )));
        }
        let term_count = reader.read_u64()?;
        let doc_count = reader.read_u64()?;

        reader.seek(size - FOOTER_LEN)?;
        let term_index_offset = reader.read_u64()?;
        if term_index_offset < HEADER_LEN || term_index_offset > size - FOOTER_LEN {
            return Err(NaginataError::corrupt_segment(format!(
                "{}: term index offset {term_index_offset} out of bounds",
                entry.file
            )));
        }

        reader.seek(term_index_offset)?;
        let mut terms = Vec::with_capacity(term_count as usize);
        for _ in 0..term_count {
            let term = reader.read_string()?;
            let offset = reader.read_varint()?;
            let length = reader.read_varint()?;
            terms.push((term, offset, length));
        }

        Ok(Arc::new(SegmentReader {
            id: entry.id.clone(),
            doc_count,
            terms,
            reader: Mutex::new(reader),
        }))
    }

    /// The segment ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of distinct documents in this segment.
    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    /// Number of distinct terms in this segment.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// All terms in lexicographic order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(t, _, _)| t.as_str())
    }

    /// Look up the posting list for a term, or `None` if absent.
    pub fn postings(&self, term: &str) -> Result<Option<PostingList>> {
        let Ok(idx) = self.terms.binary_search_by(|(t, _, _)| t.as_str().cmp(term)) else {
            return Ok(None);
        };
        let (_, offset, _) = self.terms[idx];

        let mut reader = self.reader.lock();
        reader.seek(offset)?;
        read_posting_block(&mut *reader).map(Some)
    }
}

fn read_posting_block<R: StorageInput>(reader: &mut StructReader<R>) -> Result<PostingList> {
    let doc_freq = reader.read_varint()?;
    let mut list = PostingList::new();

    let mut doc_id = 0u64;
    for _ in 0..doc_freq {
        doc_id += reader.read_varint()?;

        let freq = reader.read_varint()? as usize;
        let mut positions = Vec::with_capacity(freq);
        let mut pos = 0u32;
        for _ in 0..freq {
            pos += reader.read_varint()? as u32;
            positions.push(pos);
        }

        list.push_posting(Posting::new(doc_id, positions))?;
    }

    Ok(list)
}
