//! RESP2 wire protocol.
//!
//! The client side of the Redis serialization protocol: commands go out as
//! arrays of bulk strings, replies come back as any of the five RESP2
//! types.

mod codec;

pub use codec::{FrameScanner, ParseResult, RespParser, encode_command};

use bytes::Bytes;

/// Maximum nesting depth for arrays.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum bulk string size (512MB).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array elements.
pub const MAX_ELEMENTS: usize = 1_000_000;

/// A reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Bytes),
    /// Array (*2\r\n...)
    Array(Vec<RespValue>),
    /// Null bulk string or null array ($-1\r\n, *-1\r\n)
    Null,
}

impl RespValue {
    /// Short name of the value type, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SimpleString(_) => "simple string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::BulkString(_) => "bulk string",
            Self::Array(_) => "array",
            Self::Null => "null",
        }
    }

    /// Create a bulk string value.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Self::BulkString(data.into())
    }
}
