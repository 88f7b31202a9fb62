//! Posting lists: the per-term occurrence data the index is made of.
//!
//! Two ordering invariants hold everywhere a posting list exists (in the
//! mutable batch, inside a segment, and in merged views): document IDs within
//! a list are strictly increasing, and positions within a posting are
//! strictly increasing.

use crate::error::{NaginataError, Result};

/// A single posting: one document's occurrences of one term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Document ID.
    pub doc_id: u64,
    /// Positions of the term in the document, strictly increasing.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting with positions.
    pub fn new(doc_id: u64, positions: Vec<u32>) -> Self {
        Posting { doc_id, positions }
    }

    /// Term frequency in the document.
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Append a position, enforcing strict ordering.
    pub fn add_position(&mut self, position: u32) -> Result<()> {
        if let Some(&last) = self.positions.last()
            && position <= last
        {
            return Err(NaginataError::index(format!(
                "position {position} not greater than previous {last} for doc {}",
                self.doc_id
            )));
        }
        self.positions.push(position);
        Ok(())
    }
}

/// A posting list for a single term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    /// The postings, sorted by strictly increasing document ID.
    pub postings: Vec<Posting>,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    /// Document frequency: number of documents containing the term.
    pub fn doc_frequency(&self) -> u64 {
        self.postings.len() as u64
    }

    /// Total term frequency across all documents.
    pub fn total_frequency(&self) -> u64 {
        self.postings.iter().map(|p| p.frequency() as u64).sum()
    }

    /// Whether the list has no postings.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Record an occurrence of the term at `position` in `doc_id`.
    ///
    /// Documents may arrive in any ID order; the list stays sorted. Positions
    /// of one document must still arrive in increasing order, which the
    /// analyzer guarantees within a single document.
    pub fn add_occurrence(&mut self, doc_id: u64, position: u32) -> Result<()> {
        if let Some(last) = self.postings.last_mut() {
            if last.doc_id == doc_id {
                return last.add_position(position);
            }
            if last.doc_id > doc_id {
                return match self.postings.binary_search_by_key(&doc_id, |p| p.doc_id) {
                    Ok(idx) => self.postings[idx].add_position(position),
                    Err(idx) => {
                        self.postings.insert(idx, Posting::new(doc_id, vec![position]));
                        Ok(())
                    }
                };
            }
        }
        self.postings.push(Posting::new(doc_id, vec![position]));
        Ok(())
    }

    /// Remove the posting for `doc_id`, if present.
    pub fn remove_doc(&mut self, doc_id: u64) -> bool {
        match self.postings.binary_search_by_key(&doc_id, |p| p.doc_id) {
            Ok(idx) => {
                self.postings.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Append a whole posting, enforcing strictly increasing document IDs.
    pub fn push_posting(&mut self, posting: Posting) -> Result<()> {
        if let Some(last) = self.postings.last()
            && posting.doc_id <= last.doc_id
        {
            return Err(NaginataError::index(format!(
                "doc {} not greater than previous {}",
                posting.doc_id, last.doc_id
            )));
        }
        self.postings.push(posting);
        Ok(())
    }

    /// Approximate heap footprint in bytes, used for batch budget accounting.
    pub fn memory_usage(&self) -> usize {
        self.postings
            .iter()
            .map(|p| std::mem::size_of::<Posting>() + p.positions.len() * 4)
            .sum()
    }
}
