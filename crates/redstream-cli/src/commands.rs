use std::io::{self, Read, Write};

use anyhow::{Context, bail};
use redstream_session::{SchemeRegistry, StreamContext, derive_key};
use redstream_store::LogStore;
use tracing::info;

/// Bytes requested per read; a read may return more
const READ_CHUNK: usize = 64 * 1024;

/// Append everything from `input` to `path` as one entry
pub fn append<R: Read + ?Sized>(
    registry: &SchemeRegistry,
    ctx: &StreamContext,
    path: &str,
    input: &mut R,
) -> anyhow::Result<u64> {
    let mut session = registry.open(path, "a", ctx)?;
    let copied = io::copy(input, &mut session).context("Failed to buffer input")?;

    let flushed = session.flush();
    session.close();
    if !flushed {
        bail!("Failed to append to {path}");
    }

    info!(path, bytes = copied, "Appended");
    Ok(copied)
}

/// Copy every entry after the start cursor to `out`
pub fn cat<W: Write + ?Sized>(
    registry: &SchemeRegistry,
    ctx: &StreamContext,
    path: &str,
    out: &mut W,
) -> anyhow::Result<u64> {
    let mut session = registry.open(path, "r", ctx)?;
    let mut total = 0u64;

    loop {
        let Some(chunk) = session.read(READ_CHUNK) else {
            session.close();
            bail!("Failed to read {path}");
        };
        if chunk.is_empty() {
            break;
        }
        out.write_all(&chunk)?;
        total += chunk.len() as u64;
    }

    session.close();
    out.flush()?;
    Ok(total)
}

/// Delete the stream behind `path`, returning whether it existed
pub fn remove(registry: &SchemeRegistry, ctx: &StreamContext, path: &str) -> anyhow::Result<bool> {
    Ok(registry.delete(path, ctx)?)
}

/// Whether a stream exists behind `path`
pub fn exists(ctx: &StreamContext, path: &str) -> anyhow::Result<bool> {
    let key = derive_key(&ctx.config().key_prefix, path);
    let mut client = (ctx.client_factory())()?;
    let found = client.exists(&key)?;
    client.close()?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redstream_session::StreamConfig;
    use redstream_store::InMemoryLogStore;

    fn setup() -> (InMemoryLogStore, SchemeRegistry, StreamContext) {
        let store = InMemoryLogStore::new();
        let ctx = StreamContext::with_store(store.clone())
            .with_config(StreamConfig::default().with_key_prefix("streams:"));
        (store, SchemeRegistry::with_scheme("redis"), ctx)
    }

    #[test]
    fn test_append_then_cat() {
        let (store, registry, ctx) = setup();

        let written = append(&registry, &ctx, "redis://app.log", &mut &b"line 1\n"[..]).unwrap();
        assert_eq!(written, 7);
        append(&registry, &ctx, "redis://app.log", &mut &b"line 2\n"[..]).unwrap();
        assert_eq!(store.entry_count("streams:app.log"), 2);

        let mut out = Vec::new();
        let read = cat(&registry, &ctx, "redis://app.log", &mut out).unwrap();
        assert_eq!(read, 14);
        assert_eq!(out, b"line 1\nline 2\n");
    }

    #[test]
    fn test_append_fails_when_store_down() {
        let (store, registry, ctx) = setup();
        store.set_available(false);

        let err = append(&registry, &ctx, "redis://app.log", &mut &b"data"[..]).unwrap_err();
        assert!(err.to_string().contains("Failed to append"));
    }

    #[test]
    fn test_cat_missing_stream_is_empty() {
        let (_store, registry, ctx) = setup();
        let mut out = Vec::new();
        assert_eq!(cat(&registry, &ctx, "redis://none", &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_remove_and_exists() {
        let (_store, registry, ctx) = setup();
        assert!(!exists(&ctx, "redis://app.log").unwrap());

        append(&registry, &ctx, "redis://app.log", &mut &b"x"[..]).unwrap();
        assert!(exists(&ctx, "redis://app.log").unwrap());

        assert!(remove(&registry, &ctx, "redis://app.log").unwrap());
        assert!(!remove(&registry, &ctx, "redis://app.log").unwrap());
        assert!(!exists(&ctx, "redis://app.log").unwrap());
    }
}
