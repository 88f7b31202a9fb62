//! Query evaluation against one index snapshot.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::index::PostingList;
use crate::index::reader::Snapshot;
use crate::query::{Query, matcher, scorer};

/// A scored search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Matching document ID.
    pub doc_id: u64,
    /// Tf-idf relevance score. Documents matched only through `NOT` carry 0.
    pub score: f32,
}

/// Evaluates [`Query`] trees against a pinned snapshot.
///
/// The snapshot and the live-document domain are both captured at
/// construction, so one searcher answers one query consistently even while
/// writers keep publishing.
#[derive(Debug)]
pub struct Searcher {
    snapshot: Snapshot,
    /// Ascending IDs of all live documents; the domain for `NOT` and the
    /// `N` in idf.
    live_doc_ids: Arc<Vec<u64>>,
}

impl Searcher {
    /// Create a searcher over a snapshot and the live-document domain.
    pub fn new(snapshot: Snapshot, live_doc_ids: Arc<Vec<u64>>) -> Self {
        Searcher {
            snapshot,
            live_doc_ids,
        }
    }

    /// Evaluate a query and return up to `limit` hits, ordered by score
    /// descending with document ID ascending as the tie-break.
    pub fn search(&self, query: &Query, limit: usize) -> Result<Vec<SearchHit>> {
        let mut hits = self.eval(query)?;
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Evaluate a query to its full, doc-ID-ascending hit list.
    fn eval(&self, query: &Query) -> Result<Vec<SearchHit>> {
        match query {
            Query::Term(term) => {
                let list = self.snapshot.term_postings(term)?;
                Ok(self.score_term(&list))
            }
            Query::Phrase(terms) => {
                let lists = terms
                    .iter()
                    .map(|t| self.snapshot.term_postings(t))
                    .collect::<Result<Vec<PostingList>>>()?;
                Ok(self.score_phrase(&lists))
            }
            Query::And(subs) => {
                let mut iter = subs.iter();
                let Some(first) = iter.next() else {
                    return Ok(Vec::new());
                };
                let mut acc = self.eval(first)?;
                for sub in iter {
                    if acc.is_empty() {
                        return Ok(acc);
                    }
                    acc = matcher::intersect(acc, self.eval(sub)?);
                }
                Ok(acc)
            }
            Query::Or(subs) => {
                let mut acc = Vec::new();
                for sub in subs {
                    acc = matcher::union(acc, self.eval(sub)?);
                }
                Ok(acc)
            }
            Query::Not(inner) => {
                let excluded = self.eval(inner)?;
                let domain = self
                    .live_doc_ids
                    .iter()
                    .map(|&doc_id| SearchHit { doc_id, score: 0.0 })
                    .collect();
                Ok(matcher::difference(domain, &excluded))
            }
        }
    }

    fn score_term(&self, list: &PostingList) -> Vec<SearchHit> {
        let weight = scorer::idf(self.doc_count(), list.doc_frequency());
        list.postings
            .iter()
            .map(|p| SearchHit {
                doc_id: p.doc_id,
                score: scorer::tf_idf(p.frequency() as u64, weight),
            })
            .collect()
    }

    fn score_phrase(&self, lists: &[PostingList]) -> Vec<SearchHit> {
        let matches = matcher::phrase_matches(lists);
        let weight = scorer::idf(self.doc_count(), matches.len() as u64);
        matches
            .into_iter()
            .map(|(doc_id, occurrences)| SearchHit {
                doc_id,
                score: scorer::tf_idf(occurrences as u64, weight),
            })
            .collect()
    }

    fn doc_count(&self) -> u64 {
        self.live_doc_ids.len() as u64
    }
}
