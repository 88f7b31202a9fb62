//! Structured binary I/O over storage streams.
//!
//! [`StructWriter`] and [`StructReader`] provide the fixed-width and
//! variable-length primitives the segment codec is built from, with a running
//! CRC32 over everything written so far. The writer appends the checksum when
//! closed; whole-file verification on the read side lives with the segment
//! reader, which knows the file layout.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{NaginataError, Result};
use crate::storage::{StorageInput, StorageOutput};
use crate::util::varint::{decode_u64, encode_u64};

/// A structured file writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured file writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.hasher.update(&[value]);
        self.position += 1;
        Ok(())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.hasher.update(&value.to_le_bytes());
        self.position += 4;
        Ok(())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.hasher.update(&value.to_le_bytes());
        self.position += 8;
        Ok(())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let encoded = encode_u64(value);
        self.writer.write_all(&encoded)?;
        self.hasher.update(&encoded);
        self.position += encoded.len() as u64;
        Ok(())
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write raw bytes with length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_varint(value.len() as u64)?;
        self.writer.write_all(value)?;
        self.hasher.update(value);
        self.position += value.len() as u64;
        Ok(())
    }

    /// Get the current write position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The CRC32 of everything written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Append the running checksum, then flush and sync the output.
    ///
    /// The checksum bytes themselves are not covered by the checksum.
    pub fn close(mut self) -> Result<()> {
        let checksum = self.hasher.finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush_and_sync()?;
        Ok(())
    }

    /// Flush and sync without appending a checksum.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush_and_sync()?;
        Ok(())
    }
}

/// A structured file reader for binary data.
pub struct StructReader<R: StorageInput> {
    reader: R,
    position: u64,
    file_size: u64,
}

impl<R: StorageInput> StructReader<R> {
    /// Create a new structured file reader.
    pub fn new(reader: R) -> Result<Self> {
        let file_size = reader.size()?;
        Ok(StructReader {
            reader,
            position: 0,
            file_size,
        })
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.reader.read_u64::<LittleEndian>()?;
        self.position += 8;
        Ok(value)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut bytes = Vec::new();
        loop {
            let byte = self.reader.read_u8()?;
            bytes.push(byte);
            if byte & 0x80 == 0 {
                break;
            }
        }

        let (value, _) = decode_u64(&bytes)?;
        self.position += bytes.len() as u64;
        Ok(value)
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_byte_vec()?;
        String::from_utf8(bytes)
            .map_err(|e| NaginataError::serialization(format!("invalid UTF-8 in string: {e}")))
    }

    /// Read length-prefixed bytes.
    pub fn read_byte_vec(&mut self) -> Result<Vec<u8>> {
        let length = self.read_varint()? as usize;
        if self.position + length as u64 > self.file_size {
            return Err(NaginataError::serialization(format!(
                "length prefix {length} exceeds remaining file size"
            )));
        }
        let mut bytes = vec![0u8; length];
        self.reader.read_exact(&mut bytes)?;
        self.position += length as u64;
        Ok(bytes)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.reader.seek(std::io::SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    /// Get the current read position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total size of the underlying file.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

/// Compute the CRC32 of the first `len` bytes of `input`, streaming.
pub fn checksum_prefix<R: StorageInput>(input: &mut R, len: u64) -> Result<u32> {
    input.seek(std::io::SeekFrom::Start(0))?;
    let mut hasher = crc32fast::Hasher::new();
    let mut remaining = len;
    let mut buf = [0u8; 8192];

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        input.read_exact(&mut buf[..want])?;
        hasher.update(&buf[..want]);
        remaining -= want as u64;
    }

    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};

    #[test]
    fn test_write_read_roundtrip() {
        let storage = MemoryStorage::new_default();

        let output = storage.create_output("s.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_u8(7).unwrap();
        writer.write_u32(1234).unwrap();
        writer.write_u64(u64::MAX).unwrap();
        writer.write_varint(300).unwrap();
        writer.write_string("term").unwrap();
        writer.write_bytes(b"raw").unwrap();
        writer.close().unwrap();

        let input = storage.open_input("s.bin").unwrap();
        let mut reader = StructReader::new(input).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u32().unwrap(), 1234);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_string().unwrap(), "term");
        assert_eq!(reader.read_byte_vec().unwrap(), b"raw");
    }

    #[test]
    fn test_checksum_matches_prefix() {
        let storage = MemoryStorage::new_default();

        let output = storage.create_output("c.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_u64(42).unwrap();
        writer.write_string("hello").unwrap();
        let expected = writer.checksum();
        let data_len = writer.position();
        writer.close().unwrap();

        let mut input = storage.open_input("c.bin").unwrap();
        let actual = checksum_prefix(&mut input, data_len).unwrap();
        assert_eq!(actual, expected);

        // The stored trailer equals the computed checksum.
        let mut reader = StructReader::new(input).unwrap();
        reader.seek(data_len).unwrap();
        assert_eq!(reader.read_u32().unwrap(), expected);
    }

    #[test]
    fn test_seek_and_position() {
        let storage = MemoryStorage::new_default();

        let output = storage.create_output("p.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_u32(1).unwrap();
        writer.write_u32(2).unwrap();
        assert_eq!(writer.position(), 8);
        writer.finish().unwrap();

        let input = storage.open_input("p.bin").unwrap();
        let mut reader = StructReader::new(input).unwrap();
        reader.seek(4).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let storage = MemoryStorage::new_default();

        let output = storage.create_output("bad.bin").unwrap();
        let mut writer = StructWriter::new(output);
        writer.write_varint(1_000_000).unwrap(); // length prefix with no payload
        writer.finish().unwrap();

        let input = storage.open_input("bad.bin").unwrap();
        let mut reader = StructReader::new(input).unwrap();
        assert!(reader.read_byte_vec().is_err());
    }
}
