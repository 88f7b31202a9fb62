//! Command line argument parsing for the Naginata CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Naginata - a disk-backed full-text search engine
#[derive(Parser, Debug, Clone)]
#[command(name = "naginata")]
#[command(about = "A disk-backed full-text search engine with substring search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct NaginataArgs {
    /// Verbosity level (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl NaginataArgs {
    /// Get the effective verbosity level.
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new index
    Create(CreateArgs),

    /// Add documents to an index
    Add(AddArgs),

    /// Search an index
    Search(SearchArgs),

    /// Fetch a stored document by ID
    Get(GetArgs),

    /// Remove a document by ID
    Remove(RemoveArgs),

    /// Flush buffered documents to disk
    Flush(FlushArgs),

    /// Merge all segments and reclaim removed documents
    Optimize(OptimizeArgs),

    /// Show index statistics
    Stats(StatsArgs),

    /// Remove every document from an index
    Clear(ClearArgs),
}

/// Output format options.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Term normalization policy options.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Fixed-width character n-grams (substring search)
    Ngram,
    /// Unicode word segmentation (keyword search)
    Word,
}

/// Arguments for creating an index.
#[derive(Parser, Debug, Clone)]
pub struct CreateArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Term normalization policy
    #[arg(long, default_value = "ngram")]
    pub policy: PolicyArg,

    /// Gram width in characters (n-gram policy only)
    #[arg(long, default_value = "2")]
    pub gram_size: usize,

    /// Fail if the directory already holds an index
    #[arg(long)]
    pub exclusive: bool,
}

/// Arguments for adding documents.
#[derive(Parser, Debug, Clone)]
pub struct AddArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Document ID (requires --text)
    #[arg(long, requires = "text", conflicts_with = "file")]
    pub id: Option<u64>,

    /// Document text (requires --id)
    #[arg(long, requires = "id")]
    pub text: Option<String>,

    /// JSONL file of documents, one {"id": .., "text": ..} object per line
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Don't flush after adding
    #[arg(long)]
    pub no_flush: bool,
}

/// Arguments for searching.
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Query expression (terms, quoted phrases, AND/OR/NOT, parentheses)
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Include stored document text in the results
    #[arg(long)]
    pub show_content: bool,
}

/// Arguments for fetching a document.
#[derive(Parser, Debug, Clone)]
pub struct GetArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Document ID
    #[arg(value_name = "DOC_ID")]
    pub doc_id: u64,
}

/// Arguments for removing a document.
#[derive(Parser, Debug, Clone)]
pub struct RemoveArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Document ID
    #[arg(value_name = "DOC_ID")]
    pub doc_id: u64,
}

/// Arguments for flushing.
#[derive(Parser, Debug, Clone)]
pub struct FlushArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,
}

/// Arguments for optimizing.
#[derive(Parser, Debug, Clone)]
pub struct OptimizeArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,
}

/// Arguments for statistics.
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,
}

/// Arguments for clearing an index.
#[derive(Parser, Debug, Clone)]
pub struct ClearArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}
