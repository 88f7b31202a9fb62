//! Tf-idf scoring.
//!
//! The weight of a term in a document is `tf * idf`, where `tf` is the raw
//! occurrence count and `idf` is smoothed so that a term present in every
//! document still contributes a positive weight. Compound queries sum the
//! weights of their matching leaves.

/// Smoothed inverse document frequency.
///
/// `doc_count` is the number of live documents in the searched view,
/// `doc_frequency` the number of those containing the term.
pub fn idf(doc_count: u64, doc_frequency: u64) -> f32 {
    let n = doc_count as f32;
    let df = doc_frequency as f32;
    1.0 + ((n + 1.0) / (df + 1.0)).ln()
}

/// Term weight for a document with `term_frequency` occurrences.
pub fn tf_idf(term_frequency: u64, idf: f32) -> f32 {
    term_frequency as f32 * idf
}
