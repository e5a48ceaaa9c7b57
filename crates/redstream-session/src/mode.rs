//! Open modes

use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// How a session was opened; fixed for the session's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `"a"`: bytes written locally, committed to the stream on flush
    Append,
    /// `"r"`: bytes fetched from the stream, after the read cursor
    Read,
}

impl OpenMode {
    /// The mode string this mode is opened with
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "a",
            Self::Read => "r",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpenMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Self::Append),
            "r" => Ok(Self::Read),
            other => Err(SessionError::configuration(format!(
                "unsupported mode {other:?}: only \"a\" or \"r\" are accepted"
            ))),
        }
    }
}
