//! Character n-gram tokenizer implementation.

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::{NaginataError, Result};

/// A tokenizer that generates fixed-width character n-grams.
///
/// N-gram indexing gives substring-match semantics: a query string is
/// analyzed into the same grams as the indexed text, and matching the grams
/// in adjacent positions matches the substring. Inputs shorter than the gram
/// width produce a single token covering the whole input, so short documents
/// remain findable.
///
/// # Examples
///
/// ```
/// use naginata::analysis::tokenizer::ngram::NgramTokenizer;
/// use naginata::analysis::tokenizer::Tokenizer;
///
/// let tokenizer = NgramTokenizer::new(2).unwrap();
/// let tokens: Vec<_> = tokenizer.tokenize("hello").unwrap()
///     .map(|t| t.text.to_string())
///     .collect();
/// assert_eq!(tokens, vec!["he", "el", "ll", "lo"]);
/// ```
#[derive(Clone, Debug)]
pub struct NgramTokenizer {
    /// N-gram width in characters.
    gram_size: usize,
}

impl NgramTokenizer {
    /// Create a new n-gram tokenizer.
    ///
    /// # Errors
    ///
    /// Returns an error if `gram_size` is 0.
    pub fn new(gram_size: usize) -> Result<Self> {
        if gram_size == 0 {
            return Err(NaginataError::analysis(
                "gram_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { gram_size })
    }

    /// Create a bigram tokenizer (n=2).
    pub fn bigram() -> Self {
        Self { gram_size: 2 }
    }

    /// Create a trigram tokenizer (n=3).
    pub fn trigram() -> Self {
        Self { gram_size: 3 }
    }

    /// The configured gram width.
    pub fn gram_size(&self) -> usize {
        self.gram_size
    }
}

impl Tokenizer for NgramTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();

        if chars.is_empty() {
            return Ok(Box::new(tokens.into_iter()));
        }

        // Inputs shorter than one gram become a single whole-input token.
        if chars.len() < self.gram_size {
            tokens.push(Token::with_offsets(text, 0, 0, text.len()));
            return Ok(Box::new(tokens.into_iter()));
        }

        let mut start_offset = 0;
        for (position, start) in (0..=chars.len() - self.gram_size).enumerate() {
            let end = start + self.gram_size;
            let ngram: String = chars[start..end].iter().collect();
            let end_offset = start_offset + ngram.len();

            tokens.push(Token::with_offsets(
                &ngram,
                position as u32,
                start_offset,
                end_offset,
            ));
            start_offset += chars[start].len_utf8();
        }

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "ngram"
    }
}
