//! Local byte buffer
//!
//! Every session owns one [`LocalBuffer`] holding all bytes written to it or
//! fetched for it. The buffer only ever grows: bytes are written at the
//! cursor (which in append mode is always the end) or appended at the end,
//! and the cursor moves. Nothing is ever cut away.
//!
//! The storage behind the buffer is pluggable. By default it is a spooled
//! temporary file that lives in memory until it outgrows a threshold and
//! then spills to disk.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::SpooledTempFile;

/// Default in-memory threshold of a spooled buffer (2 MiB)
pub const DEFAULT_SPOOL_THRESHOLD: usize = 2 * 1024 * 1024;

/// Byte storage a [`LocalBuffer`] can sit on
pub trait SeekableBuffer: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> SeekableBuffer for T {}

/// Creates the storage for a new session buffer
pub type BufferProvider = Arc<dyn Fn() -> io::Result<Box<dyn SeekableBuffer>> + Send + Sync>;

/// Built-in buffer storage choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferConfig {
    /// Plain growable vector
    Memory,
    /// In memory up to `max_memory` bytes, then a temporary file
    Spooled { max_memory: usize },
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::Spooled {
            max_memory: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

impl BufferConfig {
    /// Create empty storage of this kind
    pub fn create(&self) -> io::Result<Box<dyn SeekableBuffer>> {
        let storage: Box<dyn SeekableBuffer> = match *self {
            Self::Memory => Box::new(io::Cursor::new(Vec::new())),
            Self::Spooled { max_memory } => Box::new(SpooledTempFile::new(max_memory)),
        };
        Ok(storage)
    }
}

/// Point-in-time view of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStat {
    /// Total bytes held
    pub size: u64,
    /// Cursor offset
    pub position: u64,
}

/// Seekable, append-only byte buffer owned by a session.
///
/// Length and cursor are tracked here so that `tell`, `eof` and `len`
/// never touch the storage.
pub struct LocalBuffer {
    inner: Box<dyn SeekableBuffer>,
    len: u64,
    position: u64,
}

impl std::fmt::Debug for LocalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBuffer")
            .field("len", &self.len)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl LocalBuffer {
    /// Wrap empty storage.
    ///
    /// The storage must be empty; anything already in it is ignored and may
    /// be overwritten.
    pub fn new(mut inner: Box<dyn SeekableBuffer>) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            len: 0,
            position: 0,
        })
    }

    /// In-memory buffer
    pub fn in_memory() -> Self {
        Self {
            inner: Box::new(io::Cursor::new(Vec::new())),
            len: 0,
            position: 0,
        }
    }

    /// Total bytes held
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the buffer holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cursor offset
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Whether the cursor is at or past the end
    pub fn eof(&self) -> bool {
        self.position >= self.len
    }

    /// Bytes between the cursor and the end
    pub fn unread(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    pub fn stat(&self) -> BufferStat {
        BufferStat {
            size: self.len,
            position: self.position,
        }
    }

    /// Write at the cursor, moving it past the written bytes
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.inner.write_all(data)?;
        self.position += data.len() as u64;
        self.len = self.len.max(self.position);
        Ok(data.len())
    }

    /// Add bytes at the end without moving the cursor
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        self.inner.seek(SeekFrom::Start(self.len))?;
        let written = self.inner.write_all(data);
        // Put the storage cursor back even if the write failed part way.
        self.inner.seek(SeekFrom::Start(self.position))?;
        written?;

        self.len += data.len() as u64;
        Ok(())
    }

    /// Read from the cursor into `buf`, moving the cursor
    pub fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = usize::try_from(self.unread())
            .unwrap_or(usize::MAX)
            .min(buf.len());
        if n == 0 {
            return Ok(0);
        }

        self.inner.read_exact(&mut buf[..n])?;
        self.position += n as u64;
        Ok(n)
    }

    /// Read up to `count` bytes from the cursor, moving the cursor
    pub fn read_at_most(&mut self, count: usize) -> io::Result<Vec<u8>> {
        let n = usize::try_from(self.unread())
            .unwrap_or(usize::MAX)
            .min(count);
        let mut out = vec![0u8; n];
        let read = self.read_into(&mut out)?;
        out.truncate(read);
        Ok(out)
    }

    /// Copy every byte from `offset` to the end, leaving the cursor where it was
    pub fn read_from(&mut self, offset: u64) -> io::Result<Vec<u8>> {
        if offset >= self.len {
            return Ok(Vec::new());
        }

        let n = usize::try_from(self.len - offset)
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "buffer tail too large"))?;
        let mut out = vec![0u8; n];

        self.inner.seek(SeekFrom::Start(offset))?;
        let read = self.inner.read_exact(&mut out);
        self.inner.seek(SeekFrom::Start(self.position))?;
        read?;

        Ok(out)
    }

    /// Move the cursor; positions before the start are rejected
    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        }
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;

        self.inner.seek(SeekFrom::Start(target))?;
        self.position = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spooled(max_memory: usize) -> LocalBuffer {
        let storage = BufferConfig::Spooled { max_memory }.create().unwrap();
        LocalBuffer::new(storage).unwrap()
    }

    #[test]
    fn test_write_moves_cursor() {
        let mut buf = LocalBuffer::in_memory();
        assert_eq!(buf.write(b"hello").unwrap(), 5);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.tell(), 5);
        assert!(buf.eof());
    }

    #[test]
    fn test_append_keeps_cursor() {
        let mut buf = LocalBuffer::in_memory();
        buf.append(b"abc").unwrap();
        buf.append(b"def").unwrap();

        assert_eq!(buf.len(), 6);
        assert_eq!(buf.tell(), 0);
        assert_eq!(buf.unread(), 6);
        assert_eq!(buf.read_at_most(4).unwrap(), b"abcd");
        assert_eq!(buf.read_at_most(100).unwrap(), b"ef");
        assert!(buf.read_at_most(100).unwrap().is_empty());
    }

    #[test]
    fn test_read_from_restores_cursor() {
        let mut buf = LocalBuffer::in_memory();
        buf.write(b"committed|pending").unwrap();

        assert_eq!(buf.read_from(10).unwrap(), b"pending");
        assert_eq!(buf.tell(), 17);
        assert!(buf.read_from(17).unwrap().is_empty());

        buf.write(b"!").unwrap();
        assert_eq!(buf.read_from(0).unwrap(), b"committed|pending!");
    }

    #[test]
    fn test_seek_variants() {
        let mut buf = LocalBuffer::in_memory();
        buf.append(b"0123456789").unwrap();

        assert_eq!(buf.seek(SeekFrom::Start(3)).unwrap(), 3);
        assert_eq!(buf.seek(SeekFrom::Current(2)).unwrap(), 5);
        assert_eq!(buf.read_at_most(2).unwrap(), b"56");
        assert_eq!(buf.seek(SeekFrom::End(-1)).unwrap(), 9);
        assert_eq!(buf.read_at_most(5).unwrap(), b"9");
    }

    #[test]
    fn test_seek_before_start_fails() {
        let mut buf = LocalBuffer::in_memory();
        buf.append(b"abc").unwrap();

        let err = buf.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(buf.tell(), 0);
    }

    #[test]
    fn test_seek_past_end_is_eof() {
        let mut buf = LocalBuffer::in_memory();
        buf.append(b"abc").unwrap();

        buf.seek(SeekFrom::Start(10)).unwrap();
        assert!(buf.eof());
        assert_eq!(buf.unread(), 0);
        assert!(buf.read_at_most(4).unwrap().is_empty());
    }

    #[test]
    fn test_spooled_buffer_spills_transparently() {
        let mut buf = spooled(16);
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();

        buf.write(&data[..500]).unwrap();
        buf.append(&data[500..]).unwrap();

        assert_eq!(buf.len(), 1000);
        assert_eq!(buf.tell(), 500);
        assert_eq!(buf.read_from(0).unwrap(), data);
        assert_eq!(buf.read_at_most(1000).unwrap(), &data[500..]);
    }

    #[test]
    fn test_stat_reflects_state() {
        let mut buf = LocalBuffer::in_memory();
        assert!(buf.is_empty());
        buf.write(b"xyz").unwrap();
        buf.seek(SeekFrom::Start(1)).unwrap();

        assert_eq!(buf.stat(), BufferStat { size: 3, position: 1 });
    }

    #[test]
    fn test_buffer_config_default_is_spooled() {
        assert_eq!(
            BufferConfig::default(),
            BufferConfig::Spooled {
                max_memory: DEFAULT_SPOOL_THRESHOLD
            }
        );
    }
}
