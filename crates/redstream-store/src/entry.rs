//! Stream entries and their identifiers
//!
//! An entry is one record in an append-only stream. Its id is assigned by
//! the store and is strictly increasing within a key. The payload of an
//! entry is carried as an ordered list of fields; concatenating the field
//! values in order gives back the bytes that were appended.

use std::fmt;
use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Maximum size of a single field when a payload is split for storage
pub const FIELD_CHUNK_SIZE: usize = 8192;

/// Identifier of a stream entry, `<ms>-<seq>`
///
/// Ordering is by milliseconds first, then by sequence number, which is
/// the order the store hands entries back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EntryId {
    /// Milliseconds part
    pub ms: u64,
    /// Sequence within the same millisecond
    pub seq: u64,
}

impl EntryId {
    /// The id that precedes every real entry ("read from the beginning")
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };

    /// Create a new entry id
    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Smallest id strictly greater than `self`
    pub fn successor(&self) -> Self {
        match self.seq.checked_add(1) {
            Some(seq) => Self { ms: self.ms, seq },
            None => Self {
                ms: self.ms.saturating_add(1),
                seq: 0,
            },
        }
    }

    /// Whether this is the "from the beginning" id
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidEntryId(s.to_string());

        let (ms, seq) = match s.split_once('-') {
            Some((ms, seq)) => (ms, Some(seq)),
            None => (s, None),
        };

        let ms = ms.parse::<u64>().map_err(|_| invalid())?;
        let seq = match seq {
            Some(seq) => seq.parse::<u64>().map_err(|_| invalid())?,
            None => 0,
        };

        Ok(Self { ms, seq })
    }
}

impl TryFrom<&[u8]> for EntryId {
    type Error = StoreError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(raw)
            .map_err(|_| StoreError::InvalidEntryId(String::from_utf8_lossy(raw).into_owned()))?
            .parse()
    }
}

/// A single entry read back from a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Store-assigned id
    pub id: EntryId,
    /// Field name / value pairs, in the order the store returned them
    pub fields: Vec<(String, Bytes)>,
}

impl StreamEntry {
    /// Create an entry from already-split fields
    pub fn new(id: EntryId, fields: Vec<(String, Bytes)>) -> Self {
        Self { id, fields }
    }

    /// Total number of value bytes across all fields
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|(_, value)| value.len()).sum()
    }

    /// Field values concatenated in field order
    pub fn payload(&self) -> Bytes {
        if let [(_, only)] = self.fields.as_slice() {
            return only.clone();
        }

        let mut out = BytesMut::with_capacity(self.payload_len());
        for (_, value) in &self.fields {
            out.extend_from_slice(value);
        }
        out.freeze()
    }
}

/// Split a payload into the fields stored for one entry.
///
/// Fields are named by their position (`"0"`, `"1"`, ...) and hold at most
/// [`FIELD_CHUNK_SIZE`] bytes each. An empty payload still yields a single
/// empty field, since an entry cannot be stored without one.
pub fn chunk_fields(payload: &[u8]) -> Vec<(String, Bytes)> {
    if payload.is_empty() {
        return vec![("0".to_string(), Bytes::new())];
    }

    payload
        .chunks(FIELD_CHUNK_SIZE)
        .enumerate()
        .map(|(i, chunk)| (i.to_string(), Bytes::copy_from_slice(chunk)))
        .collect()
}
