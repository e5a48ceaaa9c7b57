//! In-memory log store
//!
//! This module provides an in-process implementation of [`LogStore`],
//! suitable for tests, tooling and simulation. Clones of an
//! [`InMemoryLogStore`] share the same streams, so a test can hand one clone
//! to a session factory and keep another to inspect what was written.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::LogStore;
use crate::entry::{EntryId, StreamEntry, chunk_fields};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Stream {
    entries: Vec<StreamEntry>,
    last_id: EntryId,
    expires_at: Option<Instant>,
}

impl Stream {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

#[derive(Debug, Default)]
struct Shared {
    streams: Mutex<HashMap<String, Stream>>,
    available: AtomicBool,
    /// Appends that will be stored but reported as failed
    lossy_acks: AtomicUsize,
    append_calls: AtomicUsize,
    read_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

/// In-memory implementation of [`LogStore`]
///
/// Ids are `<unix ms>-<seq>`, strictly increasing per key, matching the
/// id scheme of a Redis Stream.
#[derive(Debug, Clone)]
pub struct InMemoryLogStore {
    shared: Arc<Shared>,
    connected: bool,
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        let shared = Shared {
            available: AtomicBool::new(true),
            ..Default::default()
        };
        Self {
            shared: Arc::new(shared),
            connected: false,
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// [`StoreError::Unavailable`] and nothing is stored.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `count` appends persist their entry but report failure,
    /// as if the acknowledgement was lost on the way back.
    pub fn fail_acks(&self, count: usize) {
        self.shared.lossy_acks.store(count, Ordering::SeqCst);
    }

    /// Number of append calls received (including failed ones)
    pub fn append_calls(&self) -> usize {
        self.shared.append_calls.load(Ordering::SeqCst)
    }

    /// Number of read calls received (including failed ones)
    pub fn read_calls(&self) -> usize {
        self.shared.read_calls.load(Ordering::SeqCst)
    }

    /// Number of delete calls received (including failed ones)
    pub fn delete_calls(&self) -> usize {
        self.shared.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of entries currently stored at `key`
    pub fn entry_count(&self, key: &str) -> usize {
        let now = Instant::now();
        self.shared
            .streams
            .lock()
            .get(key)
            .filter(|stream| !stream.is_expired(now))
            .map_or(0, |stream| stream.entries.len())
    }

    /// Snapshot of every entry stored at `key`
    pub fn entries(&self, key: &str) -> Vec<StreamEntry> {
        let now = Instant::now();
        self.shared
            .streams
            .lock()
            .get(key)
            .filter(|stream| !stream.is_expired(now))
            .map(|stream| stream.entries.clone())
            .unwrap_or_default()
    }

    fn check_available(&mut self) -> Result<(), StoreError> {
        if !self.shared.available.load(Ordering::SeqCst) {
            self.connected = false;
            return Err(StoreError::Unavailable);
        }
        self.connected = true;
        Ok(())
    }

    fn take_lossy_ack(&self) -> bool {
        self.shared
            .lossy_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn next_id(stream: &Stream) -> EntryId {
        let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let candidate = EntryId::new(now_ms, 0);
        if candidate > stream.last_id {
            candidate
        } else {
            stream.last_id.successor()
        }
    }
}

impl LogStore for InMemoryLogStore {
    fn append(&mut self, key: &str, payload: &[u8]) -> Result<EntryId, StoreError> {
        self.shared.append_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let now = Instant::now();
        let id = {
            let mut streams = self.shared.streams.lock();
            let stream = streams.entry(key.to_string()).or_default();
            if stream.is_expired(now) {
                *stream = Stream::default();
            }

            let id = Self::next_id(stream);
            stream
                .entries
                .push(StreamEntry::new(id, chunk_fields(payload)));
            stream.last_id = id;
            id
        };

        trace!(key, %id, len = payload.len(), "Appended entry");

        if self.take_lossy_ack() {
            debug!(key, %id, "Dropping acknowledgement for stored entry");
            return Err(StoreError::connection("acknowledgement lost"));
        }

        Ok(id)
    }

    fn read(&mut self, key: &str, after: &EntryId) -> Result<Vec<StreamEntry>, StoreError> {
        self.shared.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let now = Instant::now();
        let streams = self.shared.streams.lock();
        let entries = streams
            .get(key)
            .filter(|stream| !stream.is_expired(now))
            .map(|stream| {
                stream
                    .entries
                    .iter()
                    .filter(|entry| entry.id > *after)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        trace!(key, %after, count = entries.len(), "Read entries");
        Ok(entries)
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        self.shared.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let now = Instant::now();
        let removed = self
            .shared
            .streams
            .lock()
            .remove(key)
            .is_some_and(|stream| !stream.is_expired(now));

        debug!(key, removed, "Deleted stream");
        Ok(removed)
    }

    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        self.check_available()?;

        let now = Instant::now();
        Ok(self
            .shared
            .streams
            .lock()
            .get(key)
            .is_some_and(|stream| !stream.is_expired(now)))
    }

    fn expire(&mut self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        self.check_available()?;

        let now = Instant::now();
        let mut streams = self.shared.streams.lock();
        match streams.get_mut(key) {
            Some(stream) if !stream.is_expired(now) => {
                stream.expires_at = Some(now + Duration::from_secs(seconds));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.connected = false;
        Ok(())
    }
}
