//! Error types for redstream-store
//!
//! This module defines the error types returned by log store clients.

use thiserror::Error;

/// Errors that can occur while talking to a log store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach the store, or the connection dropped mid-command
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store answered with an error reply
    #[error("Server error: {0}")]
    Server(String),

    /// The store answered with something this client cannot interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An entry id could not be parsed
    #[error("Invalid entry id: {0}")]
    InvalidEntryId(String),

    /// The store is not accepting commands
    #[error("Store unavailable")]
    Unavailable,
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Connection(err.to_string())
    }
}

impl StoreError {
    /// Create a new Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new Server error
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Create a new Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether the error means the connection can no longer be used
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_))
    }
}
