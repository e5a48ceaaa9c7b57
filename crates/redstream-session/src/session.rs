//! Stream sessions
//!
//! A [`Session`] is one open handle on a stream. In append mode, writes go
//! to the local buffer and [`Session::flush`] commits everything not yet
//! committed as a single new entry. In read mode, [`Session::read`] fetches
//! every entry after the read cursor, keeps the bytes in the local buffer
//! and advances the cursor.
//!
//! Store failures on write, flush, read and delete are logged and reported
//! through neutral return values (`0`, `false`, `None`) so the caller can
//! retry. Only open and the unsupported operations return errors.

use std::io::{self, SeekFrom};

use bytes::{Bytes, BytesMut};
use redstream_store::{EntryId, LogStore, StoreError};
use tracing::{debug, instrument, trace, warn};

use crate::buffer::LocalBuffer;
use crate::config::{ClientFactory, ClientHandle, Hooks, StreamContext};
use crate::error::{Operation, SessionError};
use crate::mode::OpenMode;

/// Derive the store key for `path`: the prefix followed by everything
/// after the first `://`. A path without a scheme is used whole.
pub fn derive_key(prefix: &str, path: &str) -> String {
    let name = path.split_once("://").map_or(path, |(_, rest)| rest);
    format!("{prefix}{name}")
}

/// Snapshot returned by [`Session::stat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStat {
    pub mode: OpenMode,
    pub key: String,
    /// Bytes held in the local buffer
    pub size: u64,
    /// Local buffer cursor
    pub position: u64,
    /// Bytes already committed to the store (append mode)
    pub committed: u64,
    /// Last entry consumed (read mode)
    pub cursor: EntryId,
}

/// Acquire the session's client, creating it on first use
fn acquire<'a>(
    client: &'a mut Option<ClientHandle>,
    factory: &ClientFactory,
) -> Result<&'a mut (dyn LogStore + 'static), StoreError> {
    let handle = match client.take() {
        Some(handle) => handle,
        None => factory()?,
    };
    Ok(client.insert(handle).as_mut())
}

/// One open handle on a stream
pub struct Session {
    path: String,
    mode: OpenMode,
    key: String,
    buffer: LocalBuffer,
    /// Buffer offset up to which bytes are committed
    flush_cursor: u64,
    /// Id of the last entry consumed
    read_cursor: EntryId,
    client: Option<ClientHandle>,
    client_factory: ClientFactory,
    hooks: Hooks,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("key", &self.key)
            .field("buffer", &self.buffer)
            .field("flush_cursor", &self.flush_cursor)
            .field("read_cursor", &self.read_cursor)
            .field("connected", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open `path` in `mode`.
    ///
    /// No store call is made here; the client is created on first use.
    #[instrument(skip(ctx))]
    pub fn open(path: &str, mode: OpenMode, ctx: &StreamContext) -> Result<Self, SessionError> {
        let config = ctx.config();
        let read_cursor = config.start_cursor()?;
        let key = derive_key(&config.key_prefix, path);
        let buffer = LocalBuffer::new(ctx.create_buffer()?)?;

        debug!(key = %key, start = %read_cursor, "Opened stream session");

        Ok(Self {
            path: path.to_string(),
            mode,
            key,
            buffer,
            flush_cursor: 0,
            read_cursor,
            client: None,
            client_factory: ctx.client_factory().clone(),
            hooks: ctx.hooks().clone(),
        })
    }

    /// Open with a mode string (`"a"` or `"r"`)
    pub fn open_with_mode(path: &str, mode: &str, ctx: &StreamContext) -> Result<Self, SessionError> {
        Self::open(path, mode.parse()?, ctx)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Key of the backing stream
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Id of the last entry consumed
    pub fn read_cursor(&self) -> EntryId {
        self.read_cursor
    }

    /// Bytes written but not yet committed
    pub fn pending_len(&self) -> u64 {
        self.buffer.len().saturating_sub(self.flush_cursor)
    }

    /// Buffer `data` for the next flush. Returns the bytes accepted, which
    /// is 0 on a read-mode session.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.mode != OpenMode::Append {
            warn!(key = %self.key, "Write rejected on read-mode session");
            return 0;
        }

        match self.buffer.write(data) {
            Ok(written) => written,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Local buffer write failed");
                0
            }
        }
    }

    /// Commit every uncommitted byte as one new entry.
    ///
    /// On failure nothing is marked committed, so the next flush resends the
    /// same bytes. If the store kept the entry but the reply was lost, the
    /// retry produces a duplicate.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn flush(&mut self) -> bool {
        if self.mode != OpenMode::Append {
            warn!("Flush rejected on read-mode session");
            return false;
        }

        let pending = match self.buffer.read_from(self.flush_cursor) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Cannot read pending bytes from local buffer");
                return false;
            }
        };
        if pending.is_empty() {
            return true;
        }

        let end = self.buffer.len();
        let result = acquire(&mut self.client, &self.client_factory)
            .and_then(|client| client.append(&self.key, &pending));

        match result {
            Ok(id) => {
                self.flush_cursor = end;
                debug!(%id, bytes = pending.len(), "Committed pending bytes");
                true
            }
            Err(e) => {
                warn!(error = %e, bytes = pending.len(), "Flush failed, pending bytes kept for retry");
                false
            }
        }
    }

    /// Fetch every entry after the read cursor and return their bytes.
    ///
    /// `count` is advisory: whole entries are returned however large. The
    /// fetched bytes are also added to the end of the local buffer while the
    /// buffer cursor stays put, so `seek` and [`io::Read`] see everything
    /// read so far. An empty result means no new data. `None` means failure:
    /// wrong mode or a store error.
    pub fn read(&mut self, count: usize) -> Option<Bytes> {
        if self.mode != OpenMode::Read {
            warn!(key = %self.key, "Read rejected on append-mode session");
            return None;
        }

        match self.fetch() {
            Ok(fetched) => {
                trace!(key = %self.key, requested = count, returned = fetched.len(), "Read");
                Some(fetched)
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Fetch failed");
                None
            }
        }
    }

    /// Fetch every entry after the read cursor into the end of the local
    /// buffer, leaving the buffer cursor in place.
    #[instrument(skip(self), fields(key = %self.key, after = %self.read_cursor))]
    fn fetch(&mut self) -> Result<Bytes, SessionError> {
        let client = acquire(&mut self.client, &self.client_factory)?;
        let entries = client.read(&self.key, &self.read_cursor)?;

        let mut cursor = self.read_cursor;
        let mut out = BytesMut::new();
        for entry in &entries {
            if entry.id <= cursor {
                continue;
            }
            cursor = entry.id;
            for (_, value) in &entry.fields {
                out.extend_from_slice(value);
            }
        }

        self.buffer.append(&out)?;
        self.read_cursor = cursor;
        debug!(entries = entries.len(), bytes = out.len(), cursor = %cursor, "Fetched entries");

        if let Some(hook) = &self.hooks.after_read {
            hook(&self.read_cursor, &self.key, client);
        }

        Ok(out.freeze())
    }

    /// Move the local buffer cursor. Only read-mode sessions can seek.
    pub fn seek(&mut self, pos: SeekFrom) -> bool {
        if self.mode != OpenMode::Read {
            debug!(key = %self.key, "Seek rejected on append-mode session");
            return false;
        }

        match self.buffer.seek(pos) {
            Ok(_) => true,
            Err(e) => {
                debug!(key = %self.key, error = %e, "Seek failed");
                false
            }
        }
    }

    pub fn tell(&self) -> u64 {
        self.buffer.tell()
    }

    pub fn eof(&self) -> bool {
        self.buffer.eof()
    }

    pub fn stat(&self) -> StreamStat {
        let buffer = self.buffer.stat();
        StreamStat {
            mode: self.mode,
            key: self.key.clone(),
            size: buffer.size,
            position: buffer.position,
            committed: self.flush_cursor,
            cursor: self.read_cursor,
        }
    }

    /// Delete the backing stream. Returns whether a stream was removed;
    /// always `false` on a read-mode session.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn delete(&mut self) -> bool {
        if self.mode != OpenMode::Append {
            warn!("Delete rejected on read-mode session");
            return false;
        }

        match acquire(&mut self.client, &self.client_factory)
            .and_then(|client| client.delete(&self.key))
        {
            Ok(removed) => {
                debug!(removed, "Deleted stream");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Delete failed");
                false
            }
        }
    }

    /// Run the before-close hook, then release the client.
    ///
    /// Bytes that were never flushed are discarded.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn close(mut self) {
        if let Some(hook) = &self.hooks.before_close {
            match acquire(&mut self.client, &self.client_factory) {
                Ok(client) => hook(&self.key, client),
                Err(e) => warn!(error = %e, "No client for before_close hook"),
            }
        }

        if let Some(mut client) = self.client.take() {
            if client.is_connected() {
                if let Err(e) = client.close() {
                    warn!(error = %e, "Closing store client failed");
                }
            }
        }

        let discarded = self.pending_len();
        if self.mode == OpenMode::Append && discarded > 0 {
            debug!(bytes = discarded, "Discarding unflushed bytes");
        }
    }

    pub fn lock(&mut self, _exclusive: bool) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::Lock))
    }

    pub fn truncate(&mut self, _size: u64) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::Truncate))
    }

    pub fn set_option(&mut self, _option: &str, _value: &str) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::SetOption))
    }

    /// Metadata (timestamps, ownership) is not kept; always `false`
    pub fn set_metadata(&mut self, _option: &str, _value: &str) -> bool {
        false
    }
}

impl io::Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.mode != OpenMode::Read {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "session is not open for reading",
            ));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if self.buffer.unread() == 0 {
            // Fetched bytes land at the end; pull a past-the-end cursor back
            // so they are not skipped.
            let end = self.buffer.len();
            if self.buffer.tell() > end {
                self.buffer.seek(SeekFrom::Start(end))?;
            }
            self.fetch().map_err(io::Error::other)?;
        }
        self.buffer.read_into(buf)
    }
}

impl io::Write for Session {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode != OpenMode::Append {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "session is not open for appending",
            ));
        }
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if Session::flush(self) {
            Ok(())
        } else {
            Err(io::Error::other(format!("flush to {} failed", self.key)))
        }
    }
}

impl io::Seek for Session {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.mode != OpenMode::Read {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "append-mode sessions cannot seek",
            ));
        }
        self.buffer.seek(pos)
    }
}
