//! Text analysis: turning raw text into normalized, positioned terms.
//!
//! The analysis pipeline is deliberately small: a tokenizer splits text into
//! tokens with positions, and the [`Analyzer`](analyzer::Analyzer) applies
//! lowercase folding on top. The same analyzer instance is used for both
//! indexing and query parsing so that a given input always maps to the same
//! term sequence.

pub mod analyzer;
pub mod token;
pub mod tokenizer;

pub use analyzer::{Analyzer, AnalyzerConfig, NormalizationPolicy};
pub use token::{Token, TokenStream};
pub use tokenizer::Tokenizer;
