use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use redstream_logging::LogConfig;
use redstream_session::StreamConfig;
use redstream_store::RedisConfig;
use serde::{Deserialize, Serialize};

/// Scheme served by the command line tool
pub const SCHEME: &str = "redis";

/// Settings file layout
///
/// ```toml
/// [redis]
/// host = "127.0.0.1"
/// port = 6379
///
/// [stream]
/// key_prefix = "streams:"
///
/// [log]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub redis: RedisConfig,
    pub stream: StreamConfig,
    pub log: LogConfig,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

#[derive(Parser)]
#[command(name = "redstream", about = "Redis Streams as append-only files")]
pub struct Cli {
    /// TOML settings file ([redis], [stream] and [log] tables)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server URL, redis://[[user]:password@]host[:port][/db]
    #[arg(long, global = true, conflicts_with_all = ["host", "port"])]
    pub url: Option<String>,

    /// Server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Prefix added to every stream key
    #[arg(long, global = true)]
    pub key_prefix: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Append stdin (or a file) to a stream as one entry
    Append {
        /// Stream path, e.g. redis://app.log or app.log
        path: String,
        /// Read from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        /// Expire the stream this many seconds after the append
        #[arg(long)]
        expire: Option<u64>,
    },
    /// Write every entry of a stream to stdout
    Cat {
        /// Stream path
        path: String,
        /// Only entries after this id
        #[arg(long)]
        start_id: Option<String>,
        /// Print the id of the last entry read to stderr
        #[arg(long)]
        print_cursor: bool,
    },
    /// Delete a stream
    Rm {
        /// Stream path
        path: String,
    },
    /// Report whether a stream exists
    Exists {
        /// Stream path
        path: String,
    },
}

impl Cli {
    /// Settings from the config file, overridden by flags
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings {
                log: LogConfig::cli(),
                ..Default::default()
            },
        };

        if let Some(url) = &self.url {
            settings.redis = RedisConfig::from_url(url)?;
        }
        if let Some(host) = &self.host {
            settings.redis.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.redis.port = port;
        }
        if let Some(prefix) = &self.key_prefix {
            settings.stream.key_prefix = prefix.clone();
        }
        if let Some(level) = &self.log_level {
            settings.log.level = level.clone();
            settings.log.console.level = Some(level.clone());
        }
        if let Command::Cat {
            start_id: Some(start_id),
            ..
        } = &self.command
        {
            settings.stream.start_id = start_id.clone();
        }

        Ok(settings)
    }
}

/// Add the default scheme to a bare stream name
pub fn qualify(path: &str) -> String {
    if path.contains("://") {
        path.to_string()
    } else {
        format!("{SCHEME}://{path}")
    }
}
