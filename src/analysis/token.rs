//! Token types for text analysis.
//!
//! # Examples
//!
//! ```
//! use naginata::analysis::token::Token;
//!
//! let token = Token::with_offsets("hello", 0, 0, 5);
//! assert_eq!(token.text, "hello");
//! assert_eq!(token.position, 0);
//! assert_eq!(token.end_offset, 5);
//! ```

use serde::{Deserialize, Serialize};

/// A token is a single unit of text after tokenization.
///
/// Positions are 0-based indexes in the token stream and are what phrase
/// queries compare; offsets are byte offsets into the original text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token.
    pub text: String,

    /// The position of the token in the token stream (0-based).
    pub position: u32,

    /// The byte offset where this token starts in the original text.
    pub start_offset: usize,

    /// The byte offset where this token ends in the original text.
    pub end_offset: usize,
}

impl Token {
    /// Create a new token with the given text and position.
    pub fn new<S: Into<String>>(text: S, position: u32) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset: 0,
            end_offset: 0,
        }
    }

    /// Create a new token with text, position, and byte offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: u32,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    /// Length of the token text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the token text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A stream of tokens produced by a tokenizer or analyzer.
///
/// Boxed iterator so tokenizers can be lazy; every call to
/// [`Tokenizer::tokenize`](crate::analysis::tokenizer::Tokenizer::tokenize)
/// yields a fresh, restartable stream.
pub type TokenStream = Box<dyn Iterator<Item = Token> + Send>;
