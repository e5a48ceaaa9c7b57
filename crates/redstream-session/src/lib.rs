//! # Redstream Session
//!
//! File-handle sessions over append-only streams.
//!
//! A session opens a virtual path such as `redis://app.log` for appending
//! or reading. Appended bytes collect in a local buffer and become one
//! stream entry per flush. Reads fetch every entry after the session's
//! cursor and hand back the concatenated bytes.
//!
//! ## Features
//!
//! - **Session**: open/write/flush/read/seek/close protocol, plus
//!   `std::io::{Read, Write, Seek}`
//! - **StreamContext**: explicit per-open configuration and hooks
//! - **SchemeRegistry**: scheme name to session factory lookup
//! - **LocalBuffer**: in-memory or spooled temporary-file storage
//!
//! ## Example
//!
//! ```rust
//! use redstream_session::{SchemeRegistry, StreamConfig, StreamContext};
//! use redstream_store::InMemoryLogStore;
//!
//! let registry = SchemeRegistry::with_scheme("redis");
//! let ctx = StreamContext::with_store(InMemoryLogStore::new())
//!     .with_config(StreamConfig::default().with_key_prefix("streams:"));
//!
//! let mut writer = registry.open("redis://app.log", "a", &ctx).unwrap();
//! writer.write(b"hello");
//! assert!(writer.flush());
//! writer.close();
//!
//! let mut reader = registry.open("redis://app.log", "r", &ctx).unwrap();
//! assert_eq!(&reader.read(8192).unwrap()[..], b"hello");
//! assert!(reader.read(8192).unwrap().is_empty());
//! reader.close();
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod mode;
pub mod registry;
pub mod session;

// Re-exports
pub use buffer::{BufferConfig, BufferProvider, BufferStat, LocalBuffer, SeekableBuffer};
pub use config::{
    AfterReadHook, BeforeCloseHook, ClientFactory, ClientHandle, Hooks, StreamConfig, StreamContext,
};
pub use error::{Operation, SessionError};
pub use mode::OpenMode;
pub use registry::{LogSessionFactory, SchemeRegistry, SessionFactory};
pub use session::{Session, StreamStat, derive_key};
