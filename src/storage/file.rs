//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{NaginataError, Result};
use crate::storage::mmap::MmapInput;
use crate::storage::{Storage, StorageConfig, StorageInput, StorageOutput};

/// A file-based storage implementation rooted at a directory.
///
/// Renames within the directory are atomic on POSIX filesystems, which is
/// what the temp-then-rename publish protocol relies on.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
    /// Storage configuration.
    config: StorageConfig,
}

impl FileStorage {
    /// Create a new file storage in the given directory, creating it if
    /// necessary.
    pub fn new<P: AsRef<Path>>(directory: P, config: StorageConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            std::fs::create_dir_all(&directory)
                .map_err(|e| NaginataError::storage(format!("Failed to create directory: {e}")))?;
        }

        if !directory.is_dir() {
            return Err(NaginataError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory, config })
    }

    /// The root directory of this storage.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the full path for a file name.
    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Sync the directory entry itself so renames and deletes are durable.
    fn sync_directory(&self) -> Result<()> {
        let dir = File::open(&self.directory)?;
        dir.sync_all()
            .map_err(|e| NaginataError::from_io(e, "directory sync"))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let path = self.file_path(name);

        if self.config.use_mmap {
            return Ok(Box::new(MmapInput::open(&path)?));
        }

        let input = FileInput::open(path, self.config.buffer_size)?;
        Ok(Box::new(input))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let path = self.file_path(name);
        let output = FileOutput::create(path, self.config.buffer_size)?;
        Ok(Box::new(output))
    }

    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)> {
        let name = format!("{prefix}{}.tmp", Uuid::new_v4().simple());
        let output = self.create_output(&name)?;
        Ok((name, output))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).exists()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.file_path(name);
        std::fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NaginataError::file_not_found(name)
            } else {
                NaginataError::from_io(e, "delete")
            }
        })?;
        self.sync_directory()
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let metadata = std::fs::metadata(self.file_path(name)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NaginataError::file_not_found(name)
            } else {
                NaginataError::Io(e)
            }
        })?;
        Ok(metadata.len())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        std::fs::rename(self.file_path(old_name), self.file_path(new_name))
            .map_err(|e| NaginataError::from_io(e, "rename"))?;
        self.sync_directory()
    }

    fn sync(&self) -> Result<()> {
        self.sync_directory()
    }
}

/// A buffered file input with an independent cursor per clone.
#[derive(Debug)]
pub struct FileInput {
    path: PathBuf,
    reader: BufReader<File>,
    size: u64,
    buffer_size: usize,
}

impl FileInput {
    fn open(path: PathBuf, buffer_size: usize) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NaginataError::file_not_found(path.display().to_string())
            } else {
                NaginataError::Io(e)
            }
        })?;
        let size = file.metadata()?.len();
        Ok(FileInput {
            path,
            reader: BufReader::with_capacity(buffer_size, file),
            size,
            buffer_size,
        })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        let input = FileInput::open(self.path.clone(), self.buffer_size)?;
        Ok(Box::new(input))
    }
}

/// A buffered file output.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
}

impl FileOutput {
    fn create(path: PathBuf, buffer_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| NaginataError::from_io(e, "create"))?;
        Ok(FileOutput {
            writer: BufWriter::with_capacity(buffer_size, file),
        })
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Seek for FileOutput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.writer.seek(pos)
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| NaginataError::from_io(e, "flush"))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| NaginataError::from_io(e, "fsync"))?;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.writer.stream_position()?)
    }
}
