//! Memory-mapped read-only input.
//!
//! Segments are immutable once published, so mapping them is safe for the
//! lifetime of the reader: the builder never mutates a published file, it
//! only renames whole files into and out of the live set.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{NaginataError, Result};
use crate::storage::StorageInput;

/// A read-only storage input backed by a memory-mapped file.
///
/// Clones share the same mapping but keep independent cursors.
#[derive(Debug)]
pub struct MmapInput {
    path: PathBuf,
    mmap: Arc<Mmap>,
    position: u64,
}

impl MmapInput {
    /// Map the file at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NaginataError::file_not_found(path.display().to_string())
            } else {
                NaginataError::Io(e)
            }
        })?;

        // Safety: published files are immutable for the life of the map.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| {
                NaginataError::storage(format!("Failed to mmap {}: {e}", path.display()))
            })?
        };

        Ok(MmapInput {
            path,
            mmap: Arc::new(mmap),
            position: 0,
        })
    }

    /// The full mapped contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl Read for MmapInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut cursor = Cursor::new(self.mmap.as_ref());
        cursor.set_position(self.position);
        let read = cursor.read(buf)?;
        self.position = cursor.position();
        Ok(read)
    }
}

impl Seek for MmapInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let mut cursor = Cursor::new(self.mmap.as_ref());
        cursor.set_position(self.position);
        self.position = cursor.seek(pos)?;
        Ok(self.position)
    }
}

impl StorageInput for MmapInput {
    fn size(&self) -> Result<u64> {
        Ok(self.mmap.len() as u64)
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        Ok(Box::new(MmapInput {
            path: self.path.clone(),
            mmap: Arc::clone(&self.mmap),
            position: 0,
        }))
    }
}
