//! Error types for redstream-session
//!
//! Only failures that must reach the caller live here. Mode violations and
//! store failures during write/flush/read/delete are absorbed by the session
//! and reported through neutral return values instead.

use std::fmt;

use redstream_store::StoreError;
use thiserror::Error;

/// Operations a session or registry deliberately does not support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OpenDir,
    ReadDir,
    RewindDir,
    CloseDir,
    Rename,
    MakeDir,
    RemoveDir,
    Lock,
    Truncate,
    SetOption,
    UrlStat,
}

impl Operation {
    /// Name of the operation as reported in errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenDir => "opendir",
            Self::ReadDir => "readdir",
            Self::RewindDir => "rewinddir",
            Self::CloseDir => "closedir",
            Self::Rename => "rename",
            Self::MakeDir => "mkdir",
            Self::RemoveDir => "rmdir",
            Self::Lock => "lock",
            Self::Truncate => "truncate",
            Self::SetOption => "set_option",
            Self::UrlStat => "url_stat",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors surfaced by sessions and the scheme registry
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid mode, malformed configuration, unknown scheme
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation that a flat keyed log store cannot honor
    #[error("Unsupported operation: {0}")]
    Unsupported(Operation),

    /// Store failure on a path that does not absorb it
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Local buffer I/O failure
    #[error("Buffer I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}

impl SessionError {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new Unsupported error
    pub fn unsupported(operation: Operation) -> Self {
        Self::Unsupported(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_names_operation() {
        let err = SessionError::unsupported(Operation::RemoveDir);
        assert!(matches!(err, SessionError::Unsupported(Operation::RemoveDir)));
        assert_eq!(err.to_string(), "Unsupported operation: rmdir");
    }

    #[test]
    fn test_configuration_error() {
        let err = SessionError::configuration("unsupported mode \"w\"");
        assert!(err.to_string().contains("unsupported mode"));
    }

    #[test]
    fn test_store_error_conversion() {
        let err: SessionError = StoreError::Unavailable.into();
        assert!(matches!(err, SessionError::Store(StoreError::Unavailable)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: SessionError = io_err.into();
        assert!(matches!(err, SessionError::Io(_)));
    }
}
