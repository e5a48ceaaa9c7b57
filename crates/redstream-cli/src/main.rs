mod commands;
mod config;

use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use redstream_logging::SubscriberBuilder;
use redstream_session::{SchemeRegistry, StreamContext};
use redstream_store::{EntryId, LogStore};
use tracing::warn;

use crate::config::{Cli, Command, SCHEME, qualify};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let _guard = SubscriberBuilder::new().with_config(settings.log.clone()).init();

    let registry = SchemeRegistry::with_scheme(SCHEME);
    let ctx = StreamContext::redis(settings.redis.clone()).with_config(settings.stream.clone());

    match cli.command {
        Command::Append { path, file, expire } => {
            let path = qualify(&path);
            let ctx = match expire {
                Some(seconds) => ctx.before_close(move |key, client| {
                    if let Err(e) = client.expire(key, seconds) {
                        warn!(key, error = %e, "Failed to set expiry");
                    }
                }),
                None => ctx,
            };

            match file {
                Some(file) => {
                    let mut input = File::open(&file)
                        .with_context(|| format!("Failed to open {}", file.display()))?;
                    commands::append(&registry, &ctx, &path, &mut input)?;
                }
                None => {
                    commands::append(&registry, &ctx, &path, &mut io::stdin().lock())?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Cat {
            path, print_cursor, ..
        } => {
            let path = qualify(&path);
            let cursor = Arc::new(Mutex::new(None::<EntryId>));
            let ctx = if print_cursor {
                let sink = Arc::clone(&cursor);
                ctx.after_read(move |id, _key, _client| *sink.lock() = Some(*id))
            } else {
                ctx
            };

            commands::cat(&registry, &ctx, &path, &mut io::stdout().lock())?;

            if let Some(id) = *cursor.lock() {
                eprintln!("{id}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Rm { path } => {
            let removed = commands::remove(&registry, &ctx, &qualify(&path))?;
            Ok(if removed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Exists { path } => {
            let found = commands::exists(&ctx, &qualify(&path))?;
            println!("{found}");
            Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
