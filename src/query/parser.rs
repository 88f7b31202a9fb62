//! Query parser: expression strings to [`Query`] trees.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr     := and_expr (OR and_expr)*
//! and_expr := unary (AND? unary)*        -- adjacency means AND
//! unary    := NOT unary | atom
//! atom     := '(' expr ')' | '"' text '"' | word
//! ```
//!
//! `&&` and `||` are accepted as spellings of AND and OR, matching the
//! compound-search syntax of q-gram engines. Words and quoted text are run
//! through the index analyzer, so the parsed tree is always expressed in
//! normalized terms: a word that analyzes to several grams becomes a phrase
//! over those grams.

use std::sync::Arc;

use crate::analysis::Analyzer;
use crate::error::{NaginataError, Result};
use crate::query::Query;

/// Parser for query expressions.
#[derive(Debug)]
pub struct QueryParser {
    analyzer: Arc<Analyzer>,
}

impl QueryParser {
    /// Create a parser using the given analyzer for term normalization.
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        QueryParser { analyzer }
    }

    /// Parse an expression string.
    pub fn parse(&self, expression: &str) -> Result<Query> {
        let tokens = lex(expression)?;
        if tokens.is_empty() {
            return Err(NaginataError::query("empty query"));
        }

        let mut parser = Parser {
            tokens,
            position: 0,
            analyzer: &self.analyzer,
        };
        let query = parser.parse_or()?;

        if parser.position != parser.tokens.len() {
            return Err(NaginataError::query(format!(
                "unexpected trailing input near {:?}",
                parser.tokens[parser.position]
            )));
        }
        Ok(query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LexToken {
    Word(String),
    Quoted(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn lex(input: &str) -> Result<Vec<LexToken>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(LexToken::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(LexToken::RParen);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(NaginataError::query("unterminated quoted phrase"));
                }
                tokens.push(LexToken::Quoted(text));
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err(NaginataError::query("expected '&&'"));
                }
                tokens.push(LexToken::And);
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err(NaginataError::query("expected '||'"));
                }
                tokens.push(LexToken::Or);
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '&' | '|') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" | "and" => LexToken::And,
                    "OR" | "or" => LexToken::Or,
                    "NOT" | "not" => LexToken::Not,
                    _ => LexToken::Word(word),
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<LexToken>,
    position: usize,
    analyzer: &'a Analyzer,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&LexToken> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<LexToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Query> {
        let mut clauses = vec![self.parse_and()?];
        while self.peek() == Some(&LexToken::Or) {
            self.advance();
            clauses.push(self.parse_and()?);
        }
        Ok(flatten(clauses, Query::Or))
    }

    fn parse_and(&mut self) -> Result<Query> {
        let mut clauses = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                Some(LexToken::And) => {
                    self.advance();
                    clauses.push(self.parse_unary()?);
                }
                // Adjacency is an implicit AND.
                Some(LexToken::Word(_))
                | Some(LexToken::Quoted(_))
                | Some(LexToken::Not)
                | Some(LexToken::LParen) => {
                    clauses.push(self.parse_unary()?);
                }
                _ => break,
            }
        }
        Ok(flatten(clauses, Query::And))
    }

    fn parse_unary(&mut self) -> Result<Query> {
        if self.peek() == Some(&LexToken::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Query::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Query> {
        match self.advance() {
            Some(LexToken::LParen) => {
                let query = self.parse_or()?;
                if self.advance() != Some(LexToken::RParen) {
                    return Err(NaginataError::query("unbalanced parenthesis"));
                }
                Ok(query)
            }
            Some(LexToken::Word(word)) => self.analyze_text(&word),
            Some(LexToken::Quoted(text)) => self.analyze_text(&text),
            Some(token) => Err(NaginataError::query(format!(
                "expected a term, got {token:?}"
            ))),
            None => Err(NaginataError::query("unexpected end of query")),
        }
    }

    /// Normalize raw query text into a term or phrase.
    fn analyze_text(&self, text: &str) -> Result<Query> {
        let mut terms: Vec<String> = self.analyzer.analyze(text)?.map(|t| t.text).collect();
        match terms.len() {
            0 => Err(NaginataError::query(format!(
                "query text {text:?} normalizes to no terms"
            ))),
            1 => Ok(Query::Term(terms.remove(0))),
            _ => Ok(Query::Phrase(terms)),
        }
    }
}

fn flatten(mut clauses: Vec<Query>, combine: fn(Vec<Query>) -> Query) -> Query {
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        combine(clauses)
    }
}
