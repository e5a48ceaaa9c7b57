//! # Redstream Store
//!
//! Append-only log store clients for redstream.
//!
//! A log store keeps, per key, an ordered sequence of entries. Each entry
//! gets a strictly increasing id from the store and carries an ordered list
//! of fields. This is the shape of a Redis Stream, and [`RedisLogStore`]
//! speaks to a real Redis server; [`InMemoryLogStore`] provides the same
//! contract in-process for tests and tooling.
//!
//! ## Features
//!
//! - **LogStore trait**: blocking client contract used by sessions
//! - **InMemoryLogStore**: shared in-process streams with outage simulation
//! - **RedisLogStore**: RESP2 client over a plain TCP socket
//!
//! ## Example
//!
//! ```rust
//! use redstream_store::{EntryId, InMemoryLogStore, LogStore};
//!
//! let mut store = InMemoryLogStore::new();
//! store.append("logs:app", b"hello").unwrap();
//!
//! let entries = store.read("logs:app", &EntryId::ZERO).unwrap();
//! assert_eq!(entries.len(), 1);
//! assert_eq!(&entries[0].payload()[..], b"hello");
//! ```

pub mod entry;
pub mod error;
pub mod memory;
pub mod redis;
pub mod resp;

// Re-exports
pub use entry::{EntryId, FIELD_CHUNK_SIZE, StreamEntry, chunk_fields};
pub use error::StoreError;
pub use memory::InMemoryLogStore;
pub use redis::{RedisConfig, RedisLogStore};

/// Blocking client contract for an append-only log store
///
/// Every call blocks until the round-trip completes or fails. Timeouts and
/// reconnection policy belong to the implementation's own settings.
pub trait LogStore: Send {
    /// Append `payload` to the stream at `key` as one new entry.
    ///
    /// Returns the id the store assigned to the entry.
    fn append(&mut self, key: &str, payload: &[u8]) -> Result<EntryId, StoreError>;

    /// Read every entry of `key` whose id is strictly greater than `after`.
    ///
    /// Entries are returned in increasing id order. A missing key reads as
    /// an empty stream.
    fn read(&mut self, key: &str, after: &EntryId) -> Result<Vec<StreamEntry>, StoreError>;

    /// Remove the stream at `key`, returning whether it existed
    fn delete(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Check whether a stream exists at `key`
    fn exists(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Set a time-to-live on `key`, returning whether the key exists
    fn expire(&mut self, key: &str, seconds: u64) -> Result<bool, StoreError>;

    /// Whether the client currently holds a live connection
    fn is_connected(&self) -> bool;

    /// Release the connection held by this client
    fn close(&mut self) -> Result<(), StoreError>;
}

impl<S: LogStore + ?Sized> LogStore for Box<S> {
    fn append(&mut self, key: &str, payload: &[u8]) -> Result<EntryId, StoreError> {
        (**self).append(key, payload)
    }

    fn read(&mut self, key: &str, after: &EntryId) -> Result<Vec<StreamEntry>, StoreError> {
        (**self).read(key, after)
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key)
    }

    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key)
    }

    fn expire(&mut self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        (**self).expire(key, seconds)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        (**self).close()
    }
}
