//! Logging configuration
//!
//! The `[log]` table of a redstream settings file deserializes into
//! [`LogConfig`]; every field is optional.
//!
//! ```toml
//! [log]
//! level = "info"
//! directives = ["redstream_store=debug"]
//!
//! [log.console]
//! format = "json"
//!
//! [log.file]
//! directory = "/var/log/redstream"
//! rotation = "hourly"
//! keep = 48
//! ```

use std::io::IsTerminal;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target without its own directive.
    ///
    /// Ignored when `RUST_LOG` is set; that filter replaces the whole
    /// configured one.
    pub level: String,

    /// Per-target directives appended to the filter, e.g. `redstream_store=trace`
    pub directives: Vec<String>,

    pub console: ConsoleConfig,

    /// Rolling JSON log files; off unless set
    pub file: Option<FileConfig>,

    /// Fields included in every JSON line, on the console and in files
    pub json: JsonFields,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            console: ConsoleConfig::default(),
            file: None,
            json: JsonFields::default(),
        }
    }
}

impl LogConfig {
    /// Command line tool: warnings and errors only, readable on a terminal
    pub fn cli() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleConfig {
                format: ConsoleFormat::Pretty,
                color: std::io::stderr().is_terminal(),
                ..ConsoleConfig::default()
            },
            ..Self::default()
        }
    }

    /// Everything from debug up, with store round trips at trace
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            directives: vec!["redstream_store=trace".to_string()],
            console: ConsoleConfig {
                format: ConsoleFormat::Pretty,
                color: true,
                ..ConsoleConfig::default()
            },
            ..Self::default()
        }
    }

    /// Long-running services: JSON files under `log_dir`, nothing on the console
    pub fn production(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            console: ConsoleConfig {
                enabled: false,
                ..ConsoleConfig::default()
            },
            file: Some(FileConfig {
                directory: log_dir.into(),
                keep: Some(30),
                ..FileConfig::default()
            }),
            ..Self::default()
        }
    }

    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            ..Self::default()
        }
    }

    /// Add a per-target directive
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub(crate) fn console_filter(&self) -> String {
        let level = self.console.level.as_deref().unwrap_or(&self.level);
        self.filter_with(level)
    }

    pub(crate) fn file_filter(&self) -> String {
        self.filter_with(&self.level)
    }

    fn filter_with(&self, level: &str) -> String {
        std::iter::once(level)
            .chain(self.directives.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Console (stderr) output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: ConsoleFormat,
    /// ANSI colors; only honored by the pretty format
    pub color: bool,
    /// Overrides [`LogConfig::level`] for the console only
    pub level: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Json,
            color: false,
            level: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable multi-field lines
    Pretty,
}

/// Log file output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Created if missing
    pub directory: PathBuf,
    /// Base name; rotated files get a date suffix, e.g. `redstream.2026-10-16.log`
    pub file_name: String,
    pub rotation: FileRotation,
    /// Rotated files to keep; `None` keeps all of them
    pub keep: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "redstream".to_string(),
            rotation: FileRotation::Daily,
            keep: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    #[default]
    Daily,
    Hourly,
    /// One `<file_name>.log`, truncated at startup
    Never,
}

/// What each JSON line carries besides level, target, message and fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFields {
    /// Event fields at the top level instead of under `fields`
    pub flatten: bool,
    /// The full span stack, outermost first
    pub span_list: bool,
    /// The innermost span, e.g. the session key of a flush
    pub current_span: bool,
    pub threads: bool,
    pub source_location: bool,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            flatten: true,
            span_list: false,
            current_span: true,
            threads: false,
            source_location: true,
        }
    }
}
