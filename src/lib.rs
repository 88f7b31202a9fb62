//! # Naginata
//!
//! A disk-backed inverted-index full-text search engine for Rust.
//!
//! ## Features
//!
//! - Pure Rust implementation
//! - Configurable analysis (character n-grams or Unicode words)
//! - Immutable on-disk segments with atomic publication
//! - Tombstone-based deletion with background compaction
//! - Boolean and phrase queries with tf-idf ranking
//! - Pluggable storage backends

pub mod analysis;
pub mod cli;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod query;
pub mod storage;
pub mod util;

pub use engine::{EngineConfig, SearchEngine};
pub use error::{NaginataError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
