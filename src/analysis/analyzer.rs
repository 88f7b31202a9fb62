//! The analyzer: a configurable normalization policy over a tokenizer.
//!
//! The engine requires index/query symmetry: whatever policy analyzed the
//! documents must analyze query text too. [`Analyzer`] packages a tokenizer
//! choice and lowercase folding behind one deterministic entry point.
//!
//! # Examples
//!
//! ```
//! use naginata::analysis::analyzer::{Analyzer, AnalyzerConfig, NormalizationPolicy};
//!
//! let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
//! let terms: Vec<_> = analyzer.analyze("CaT").unwrap().map(|t| t.text).collect();
//! assert_eq!(terms, vec!["ca", "at"]);
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::{NgramTokenizer, Tokenizer, UnicodeWordTokenizer};
use crate::error::{NaginataError, Result};

/// The term normalization policy.
///
/// Whether to index fixed-width character grams or whole words is a policy
/// choice, not something the engine hard-codes. N-grams give substring-match
/// semantics and work for unsegmented scripts; word splitting gives classic
/// keyword search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Fixed-width character n-grams.
    Ngram {
        /// Gram width in characters.
        size: usize,
    },
    /// Unicode word segmentation (UAX #29).
    Word,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        NormalizationPolicy::Ngram { size: 2 }
    }
}

/// Configuration for the analyzer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// The normalization policy to apply.
    #[serde(flatten)]
    pub policy: NormalizationPolicy,
}

impl AnalyzerConfig {
    /// N-gram policy with the given gram width.
    pub fn ngram(size: usize) -> Self {
        AnalyzerConfig {
            policy: NormalizationPolicy::Ngram { size },
        }
    }

    /// Word-splitting policy.
    pub fn word() -> Self {
        AnalyzerConfig {
            policy: NormalizationPolicy::Word,
        }
    }
}

/// Analyzer combining a tokenizer with lowercase folding.
///
/// The same input always yields the same term sequence, and every call to
/// [`analyze`](Analyzer::analyze) produces a fresh restartable stream.
pub struct Analyzer {
    tokenizer: Box<dyn Tokenizer>,
    config: AnalyzerConfig,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("tokenizer", &self.tokenizer.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Analyzer {
    /// Create a new analyzer from the given configuration.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let tokenizer: Box<dyn Tokenizer> = match config.policy {
            NormalizationPolicy::Ngram { size } => Box::new(NgramTokenizer::new(size)?),
            NormalizationPolicy::Word => Box::new(UnicodeWordTokenizer::new()),
        };
        Ok(Analyzer { tokenizer, config })
    }

    /// The configuration this analyzer was built from.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze text into a stream of normalized, positioned terms.
    pub fn analyze(&self, text: &str) -> Result<TokenStream> {
        let tokens = self.tokenizer.tokenize(text)?;
        Ok(Box::new(tokens.map(|t| Token {
            text: t.text.to_lowercase(),
            ..t
        })))
    }

    /// Analyze raw bytes, validating the encoding first.
    ///
    /// Malformed UTF-8 is an analysis error, never a panic.
    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<TokenStream> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| NaginataError::analysis(format!("invalid UTF-8 input: {e}")))?;
        self.analyze(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_bigram() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.policy, NormalizationPolicy::Ngram { size: 2 });
    }

    #[test]
    fn test_lowercase_folding() {
        let analyzer = Analyzer::new(AnalyzerConfig::word()).unwrap();
        let terms: Vec<_> = analyzer
            .analyze("The Quick FOX")
            .unwrap()
            .map(|t| t.text)
            .collect();
        assert_eq!(terms, vec!["the", "quick", "fox"]);
    }

    #[test]
    fn test_ngram_policy() {
        let analyzer = Analyzer::new(AnalyzerConfig::ngram(3)).unwrap();
        let terms: Vec<_> = analyzer.analyze("AbCd").unwrap().map(|t| t.text).collect();
        assert_eq!(terms, vec!["abc", "bcd"]);
    }

    #[test]
    fn test_index_query_symmetry() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let doc: Vec<_> = analyzer.analyze("Tokyo").unwrap().map(|t| t.text).collect();
        let query: Vec<_> = analyzer.analyze("tokyo").unwrap().map(|t| t.text).collect();
        assert_eq!(doc, query);
    }

    #[test]
    fn test_invalid_utf8_is_analysis_error() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let result = analyzer.analyze_bytes(&[0x66, 0xFF, 0x67]);
        assert!(matches!(result, Err(NaginataError::Analysis(_))));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = AnalyzerConfig::ngram(3);
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalyzerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
