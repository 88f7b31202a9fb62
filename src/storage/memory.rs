//! In-memory storage implementation for testing and temporary indexes.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::error::{NaginataError, Result};
use crate::storage::{Storage, StorageConfig, StorageInput, StorageOutput};

/// An in-memory storage implementation.
///
/// Files live in a shared map; outputs buffer locally and publish their
/// contents into the map on `flush_and_sync`, mirroring the visibility rules
/// of the file backend.
#[derive(Debug)]
pub struct MemoryStorage {
    /// The files stored in memory.
    files: Arc<Mutex<AHashMap<String, Arc<[u8]>>>>,
    /// Counter for generating unique temp file names.
    temp_counter: AtomicU64,
    /// Storage configuration (unused fields kept for parity with file storage).
    #[allow(dead_code)]
    config: StorageConfig,
}

impl MemoryStorage {
    /// Create a new memory storage.
    pub fn new(config: StorageConfig) -> Self {
        MemoryStorage {
            files: Arc::new(Mutex::new(AHashMap::new())),
            temp_counter: AtomicU64::new(0),
            config,
        }
    }

    /// Create a new memory storage with default configuration.
    pub fn new_default() -> Self {
        Self::new(StorageConfig::default())
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Get the total size of all files.
    pub fn total_size(&self) -> u64 {
        self.files.lock().values().map(|d| d.len() as u64).sum()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new_default()
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .cloned()
            .ok_or_else(|| NaginataError::file_not_found(name))?;
        Ok(Box::new(MemoryInput {
            name: name.to_string(),
            cursor: Cursor::new(data),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            files: Arc::clone(&self.files),
            cursor: Cursor::new(Vec::new()),
        }))
    }

    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)> {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = format!("{prefix}{n}.tmp");
        let output = self.create_output(&name)?;
        Ok((name, output))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| NaginataError::file_not_found(name))
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let files = self.files.lock();
        files
            .get(name)
            .map(|d| d.len() as u64)
            .ok_or_else(|| NaginataError::file_not_found(name))
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut files = self.files.lock();
        let data = files
            .remove(old_name)
            .ok_or_else(|| NaginataError::file_not_found(old_name))?;
        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// An input reading from an immutable in-memory snapshot of a file.
#[derive(Debug)]
struct MemoryInput {
    name: String,
    cursor: Cursor<Arc<[u8]>>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        Ok(Box::new(MemoryInput {
            name: self.name.clone(),
            cursor: Cursor::new(Arc::clone(self.cursor.get_ref())),
        }))
    }
}

/// An output buffering locally, published to the shared map on sync or drop.
#[derive(Debug)]
struct MemoryOutput {
    name: String,
    files: Arc<Mutex<AHashMap<String, Arc<[u8]>>>>,
    cursor: Cursor<Vec<u8>>,
}

impl MemoryOutput {
    fn publish(&mut self) {
        let data: Arc<[u8]> = Arc::from(self.cursor.get_ref().as_slice());
        self.files.lock().insert(self.name.clone(), data);
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryOutput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.cursor.position())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let storage = MemoryStorage::new_default();

        let mut out = storage.create_output("a.bin").unwrap();
        out.write_all(b"payload").unwrap();
        out.flush_and_sync().unwrap();
        drop(out);

        let mut input = storage.open_input("a.bin").unwrap();
        let mut buf = Vec::new();
        input.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"payload");
    }

    #[test]
    fn test_input_sees_snapshot() {
        let storage = MemoryStorage::new_default();

        let mut out = storage.create_output("a.bin").unwrap();
        out.write_all(b"v1").unwrap();
        out.flush_and_sync().unwrap();
        drop(out);

        let input = storage.open_input("a.bin").unwrap();

        // Overwrite after the input was opened; the input keeps the old data.
        let mut out = storage.create_output("a.bin").unwrap();
        out.write_all(b"v2-new").unwrap();
        out.flush_and_sync().unwrap();
        drop(out);

        let mut reader = input;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"v1");
    }

    #[test]
    fn test_rename_and_delete() {
        let storage = MemoryStorage::new_default();

        let mut out = storage.create_output("tmp.bin").unwrap();
        out.write_all(b"x").unwrap();
        out.flush_and_sync().unwrap();
        drop(out);

        storage.rename_file("tmp.bin", "live.bin").unwrap();
        assert!(storage.file_exists("live.bin"));
        assert!(!storage.file_exists("tmp.bin"));

        storage.delete_file("live.bin").unwrap();
        assert_eq!(storage.file_count(), 0);
        assert!(storage.delete_file("live.bin").is_err());
    }

    #[test]
    fn test_temp_output_names_unique() {
        let storage = MemoryStorage::new_default();
        let (a, _out_a) = storage.create_temp_output("seg_").unwrap();
        let (b, _out_b) = storage.create_temp_output("seg_").unwrap();
        assert_ne!(a, b);
    }
}
