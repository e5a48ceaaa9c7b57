//! Logging setup for redstream
//!
//! Builds a `tracing` subscriber from a [`LogConfig`]: a console layer
//! (JSON lines or pretty) and an optional JSON-lines file layer with rotation.
//!
//! # Quick Start
//!
//! ```ignore
//! use redstream_logging::{LogConfig, SubscriberBuilder};
//!
//! // JSONL to the console
//! let _guard = SubscriberBuilder::new().init();
//!
//! // Development mode with pretty human-readable output
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! Keep the returned guard alive for as long as logs should reach the file
//! writer; dropping it flushes and stops the background writer thread.

pub mod config;
pub mod layers;

pub use config::{ConsoleConfig, ConsoleFormat, FileConfig, FileRotation, JsonFields, LogConfig};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    /// A filter directive did not parse
    #[error("Invalid log filter {spec:?}: {message}")]
    Filter { spec: String, message: String },

    /// The log file or directory could not be created
    #[error("Log file error: {0}")]
    File(String),

    /// A global subscriber is already installed
    #[error("Subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// A type-erased layer, as returned by [`SubscriberBuilder::build_layers`]
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Builder for configuring and initializing the logging subscriber
///
/// By default the console gets JSON lines at `info`. [`LogConfig::cli`] and
/// [`LogConfig::development`] switch it to pretty output.
#[derive(Debug, Clone, Default)]
pub struct SubscriberBuilder {
    config: LogConfig,
}

impl SubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the configured layers without installing them.
    ///
    /// The returned guard, if any, belongs to the file writer.
    pub fn build_layers<S>(&self) -> Result<(Vec<BoxedLayer<S>>, Option<WorkerGuard>), LogError>
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup> + 'static,
    {
        let mut enabled: Vec<BoxedLayer<S>> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            let filter = env_filter(&self.config.console_filter())?;
            let layer = match self.config.console.format {
                ConsoleFormat::Pretty => layers::pretty_layer(self.config.console.color)
                    .with_filter(filter)
                    .boxed(),
                ConsoleFormat::Json => layers::jsonl_layer(std::io::stderr, &self.config.json)
                    .with_filter(filter)
                    .boxed(),
            };
            enabled.push(layer);
        }

        if let Some(file_config) = &self.config.file {
            let filter = env_filter(&self.config.file_filter())?;
            let (writer, file_guard) = file_writer(file_config)?;
            enabled.push(
                layers::jsonl_layer(writer, &self.config.json)
                    .with_filter(filter)
                    .boxed(),
            );
            guard = Some(file_guard);
        }

        Ok((enabled, guard))
    }

    /// Try to install the subscriber globally
    ///
    /// Returns an error if a global subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let (layers, guard) = self.build_layers::<Registry>()?;
        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    /// Install the subscriber globally, reporting setup problems on stderr
    ///
    /// Logging is best effort: a failure leaves the process without (or with
    /// the previously installed) subscriber instead of aborting it.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: failed to initialize logging: {e}");
                None
            }
        }
    }
}

/// Filter from `RUST_LOG` if set, otherwise from `spec`
fn env_filter(spec: &str) -> Result<EnvFilter, LogError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(spec).map_err(|e| LogError::Filter {
        spec: spec.to_string(),
        message: e.to_string(),
    })
}

/// Create the file writer; a `Never` rotation truncates a single file
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&config.directory)
        .map_err(|e| LogError::File(format!("{}: {e}", config.directory.display())))?;

    let rotation = match config.rotation {
        FileRotation::Never => {
            let path = config.directory.join(format!("{}.log", config.file_name));
            let file = File::create(&path)
                .map_err(|e| LogError::File(format!("{}: {e}", path.display())))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        FileRotation::Daily => Rotation::DAILY,
        FileRotation::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.file_name)
        .filename_suffix("log");
    if let Some(keep) = config.keep {
        builder = builder.max_log_files(keep);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LogError::File(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    SubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output, repeat calls are harmless)
pub fn init_testing() {
    let _ = SubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = SubscriberBuilder::new();
        assert_eq!(builder.config().level, "info");
        assert_eq!(builder.config().console.format, ConsoleFormat::Json);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = SubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config().level, "debug");
        assert_eq!(builder.config().console.format, ConsoleFormat::Pretty);
    }

    #[test]
    fn test_builder_with_level_and_console() {
        let builder = SubscriberBuilder::new().with_level("trace").with_console(false);
        assert_eq!(builder.config().level, "trace");
        assert!(!builder.config().console.enabled);
    }

    #[test]
    fn test_build_layers_console_only() {
        let (layers, guard) = SubscriberBuilder::new().build_layers::<Registry>().unwrap();
        assert_eq!(layers.len(), 1);
        assert!(guard.is_none());
    }

    #[test]
    fn test_build_layers_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let builder = SubscriberBuilder::new()
            .with_console(false)
            .with_file_output(FileConfig {
                directory: dir.path().join("logs"),
                rotation: FileRotation::Never,
                ..Default::default()
            });

        let (layers, guard) = builder.build_layers::<Registry>().unwrap();
        assert_eq!(layers.len(), 1);
        assert!(guard.is_some());
        assert!(dir.path().join("logs").join("redstream.log").exists());
    }

    #[test]
    fn test_init_testing_is_repeatable() {
        init_testing();
        init_testing();
    }
}
