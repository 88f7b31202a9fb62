//! Query parsing and evaluation over index snapshots.
//!
//! A query expression combines terms and phrases with `AND`, `OR`, `NOT`,
//! and parentheses. Expressions are parsed into a [`Query`] tree with the
//! same analyzer that built the index, then evaluated by a
//! [`Searcher`](searcher::Searcher) against one snapshot.

pub mod matcher;
pub mod parser;
pub mod scorer;
pub mod searcher;

pub use parser::QueryParser;
pub use searcher::{SearchHit, Searcher};

/// A parsed query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// A single normalized term.
    Term(String),
    /// Normalized terms that must appear in consecutive positions.
    ///
    /// Under an n-gram policy every multi-gram word becomes a phrase over
    /// its grams, which is what gives substring-match semantics.
    Phrase(Vec<String>),
    /// All sub-queries must match (sorted intersection).
    And(Vec<Query>),
    /// At least one sub-query must match (sorted union).
    Or(Vec<Query>),
    /// Set difference against the domain of all live documents.
    Not(Box<Query>),
}

impl Query {
    /// A term query.
    pub fn term<S: Into<String>>(term: S) -> Self {
        Query::Term(term.into())
    }

    /// A phrase query over already-normalized terms.
    pub fn phrase<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Phrase(terms.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::Term(t) => write!(f, "{t}"),
            Query::Phrase(terms) => write!(f, "\"{}\"", terms.join(" ")),
            Query::And(subs) => {
                let parts: Vec<String> = subs.iter().map(|q| q.to_string()).collect();
                write!(f, "({})", parts.join(" AND "))
            }
            Query::Or(subs) => {
                let parts: Vec<String> = subs.iter().map(|q| q.to_string()).collect();
                write!(f, "({})", parts.join(" OR "))
            }
            Query::Not(inner) => write!(f, "(NOT {inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let query = Query::And(vec![
            Query::term("cat"),
            Query::Or(vec![Query::term("sat"), Query::Not(Box::new(Query::term("dog")))]),
        ]);
        assert_eq!(query.to_string(), "(cat AND (sat OR (NOT dog)))");

        let phrase = Query::phrase(["he", "el", "ll", "lo"]);
        assert_eq!(phrase.to_string(), "\"he el ll lo\"");
    }
}
