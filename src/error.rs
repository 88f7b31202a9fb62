//! Error types for the Naginata library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`NaginataError`] enum. The variants follow the engine's error taxonomy:
//! input problems (analysis, query syntax) are recoverable and reported to
//! the caller, I/O and disk-full conditions abort the current operation
//! leaving the last durable state intact, and corrupt segments degrade the
//! index without failing queries against the remaining segments.
//!
//! # Examples
//!
//! ```
//! use naginata::error::{NaginataError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(NaginataError::query("unbalanced parenthesis"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Naginata operations.
///
/// Uses the `thiserror` crate for automatic `Error` trait implementation and
/// provides convenient constructor methods for creating specific error types.
#[derive(Error, Debug)]
pub enum NaginataError {
    /// I/O errors (file operations, sync, rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The underlying device is out of space. The flush or compaction that
    /// hit this is aborted; prior durable state is untouched.
    #[error("Disk full: {0}")]
    DiskFull(String),

    /// A segment failed validation (bad magic, unsupported version, or
    /// checksum mismatch). The segment is excluded from queries and merges.
    #[error("Corrupt segment: {0}")]
    CorruptSegment(String),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Analysis-related errors (tokenization, malformed input encoding)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Query-related errors (parsing, invalid expressions)
    #[error("Query error: {0}")]
    Query(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A named file is missing from the storage backend.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with NaginataError.
pub type Result<T> = std::result::Result<T, NaginataError>;

impl NaginataError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        NaginataError::Index(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        NaginataError::Analysis(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        NaginataError::Query(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        NaginataError::Storage(msg.into())
    }

    /// Create a new file-not-found error.
    pub fn file_not_found<S: Into<String>>(name: S) -> Self {
        NaginataError::FileNotFound(name.into())
    }

    /// Create a new corrupt-segment error.
    pub fn corrupt_segment<S: Into<String>>(msg: S) -> Self {
        NaginataError::CorruptSegment(msg.into())
    }

    /// Create a new disk-full error.
    pub fn disk_full<S: Into<String>>(msg: S) -> Self {
        NaginataError::DiskFull(msg.into())
    }

    /// Create a new invalid-operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        NaginataError::InvalidOperation(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        NaginataError::SerializationError(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        NaginataError::Other(msg.into())
    }

    /// Classify an I/O error, promoting ENOSPC to [`NaginataError::DiskFull`].
    pub fn from_io(err: io::Error, context: &str) -> Self {
        // ENOSPC is the only errno we special-case; everything else stays Io.
        if err.raw_os_error() == Some(28) {
            NaginataError::DiskFull(format!("{context}: {err}"))
        } else {
            NaginataError::Io(err)
        }
    }

    /// Whether this error indicates a transient I/O condition worth a retry.
    pub fn is_transient(&self) -> bool {
        match self {
            NaginataError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
