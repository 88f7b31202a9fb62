//! Sorted-list set operations and positional phrase matching.
//!
//! Every operand is a doc-ID-ascending list of scored hits, so AND, OR and
//! NOT are single linear merges. Phrase matching walks the position lists of
//! consecutive terms.

use crate::index::PostingList;
use crate::query::searcher::SearchHit;

/// Intersect two sorted hit lists, summing scores of common documents.
pub(crate) fn intersect(a: Vec<SearchHit>, b: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(SearchHit {
                    doc_id: a[i].doc_id,
                    score: a[i].score + b[j].score,
                });
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Union two sorted hit lists, summing scores of common documents.
pub(crate) fn union(a: Vec<SearchHit>, b: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            std::cmp::Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(SearchHit {
                    doc_id: a[i].doc_id,
                    score: a[i].score + b[j].score,
                });
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Hits of `a` whose documents do not appear in `b`. Scores of `a` are kept.
pub(crate) fn difference(a: Vec<SearchHit>, b: &[SearchHit]) -> Vec<SearchHit> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for hit in a {
        while j < b.len() && b[j].doc_id < hit.doc_id {
            j += 1;
        }
        if j >= b.len() || b[j].doc_id != hit.doc_id {
            out.push(hit);
        }
    }
    out
}

/// Documents containing all phrase terms in consecutive positions, with the
/// number of occurrences per document. Input lists are in phrase order;
/// output is doc-ID ascending.
pub(crate) fn phrase_matches(lists: &[PostingList]) -> Vec<(u64, u32)> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };

    let mut matches = Vec::new();
    'docs: for posting in &first.postings {
        let mut followers = Vec::with_capacity(rest.len());
        for list in rest {
            match list
                .postings
                .binary_search_by_key(&posting.doc_id, |p| p.doc_id)
            {
                Ok(idx) => followers.push(&list.postings[idx].positions),
                Err(_) => continue 'docs,
            }
        }

        let occurrences = posting
            .positions
            .iter()
            .filter(|&&start| {
                followers
                    .iter()
                    .enumerate()
                    .all(|(offset, positions)| {
                        let want = start + offset as u32 + 1;
                        positions.binary_search(&want).is_ok()
                    })
            })
            .count() as u32;

        if occurrences > 0 {
            matches.push((posting.doc_id, occurrences));
        }
    }
    matches
}
