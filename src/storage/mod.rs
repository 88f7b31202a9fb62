//! Storage abstraction and backends.
//!
//! The index builder and readers never touch the filesystem directly; they go
//! through the [`Storage`] trait so the same engine runs against real files
//! ([`FileStorage`]), anonymous memory ([`MemoryStorage`]) for tests, or
//! memory-mapped inputs for read-heavy workloads.
//!
//! The durability contract lives here: a segment or manifest is written to a
//! temporary name, synced, and then renamed into place. Readers can only ever
//! observe fully published files.

use std::io::{Read, Seek, Write};

use crate::error::Result;

pub mod file;
pub mod memory;
pub mod mmap;
pub mod structured;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use mmap::MmapInput;
pub use structured::{StructReader, StructWriter};

/// A trait for storage backends that can store and retrieve data.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any existing file.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Create a temporary file for writing, returning its name.
    ///
    /// Temporary files become durable only through [`Storage::rename_file`].
    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Atomically rename a file, replacing any existing target.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Sync all pending writes to durable storage.
    fn sync(&self) -> Result<()>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;

    /// Clone this input stream with an independent cursor.
    fn clone_input(&self) -> Result<Box<dyn StorageInput>>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Seek + Send + std::fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Get the current position in the output stream.
    fn position(&mut self) -> Result<u64>;
}

impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        self.as_ref().clone_input()
    }
}

impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn position(&mut self) -> Result<u64> {
        self.as_mut().position()
    }
}

/// Configuration for storage backends.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Whether to memory-map files opened for reading (if supported).
    pub use_mmap: bool,

    /// Buffer size for I/O operations.
    pub buffer_size: usize,

    /// Retry budget for transient I/O errors during publish operations.
    pub io_retries: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            use_mmap: false,
            buffer_size: 65536, // 64KB buffer
            io_retries: 3,
        }
    }
}

/// Run an I/O closure, retrying transient failures up to `attempts` times.
///
/// Only errors classified as transient by
/// [`NaginataError::is_transient`] are retried; everything else surfaces
/// immediately. Retries are bounded, never silent loops.
pub fn with_io_retries<T, F>(attempts: usize, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut remaining = attempts;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && remaining > 0 => {
                remaining -= 1;
            }
            Err(e) => return Err(e),
        }
    }
}
