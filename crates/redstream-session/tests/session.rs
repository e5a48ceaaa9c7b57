//! End-to-end session behavior against the in-memory store

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use redstream_session::{
    BufferConfig, OpenMode, SchemeRegistry, Session, SessionError, StreamConfig, StreamContext,
};
use redstream_store::{EntryId, FIELD_CHUNK_SIZE, InMemoryLogStore, LogStore};

fn prefixed(store: &InMemoryLogStore) -> StreamContext {
    StreamContext::with_store(store.clone())
        .with_config(StreamConfig::default().with_key_prefix("streams:"))
}

/// Read until an empty result, concatenating everything returned
fn drain(session: &mut Session) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let chunk = session.read(8192).expect("read failed");
        if chunk.is_empty() {
            return out;
        }
        out.extend_from_slice(&chunk);
    }
}

fn append_and_close(ctx: &StreamContext, path: &str, data: &[u8]) {
    let mut session = Session::open(path, OpenMode::Append, ctx).unwrap();
    assert_eq!(session.write(data), data.len());
    assert!(session.flush());
    session.close();
}

#[test]
fn test_mytest_scenario() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    let registry = SchemeRegistry::with_scheme("redis");
    let mut observer = store.clone();

    assert!(!registry.delete("redis://mytest.txt", &ctx).unwrap());
    assert!(!observer.exists("streams:mytest.txt").unwrap());

    // Close never flushes on its own, so the host-level close (flush, then
    // close) is spelled out.
    let mut writer = registry.open("redis://mytest.txt", "a", &ctx).unwrap();
    assert_eq!(writer.write(b"test-data"), 9);
    assert!(writer.flush());
    writer.close();
    assert!(observer.exists("streams:mytest.txt").unwrap());

    let mut reader = registry.open("redis://mytest.txt", "r", &ctx).unwrap();
    assert_eq!(drain(&mut reader), b"test-data");
    reader.close();
}

#[test]
fn test_round_trip_preserves_bytes() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    let data: Vec<u8> = (0..(FIELD_CHUNK_SIZE * 3 + 100))
        .map(|i| (i * 7 % 256) as u8)
        .collect();

    let mut writer = Session::open("redis://bin", OpenMode::Append, &ctx).unwrap();
    writer.write(&data[..1000]);
    assert!(writer.flush());
    writer.write(&data[1000..]);
    assert!(writer.flush());
    writer.close();

    let entries = store.entries("streams:bin");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].fields.len(), 3);

    let mut reader = Session::open("redis://bin", OpenMode::Read, &ctx).unwrap();
    assert_eq!(drain(&mut reader), data);
}

#[test]
fn test_delete_is_idempotent() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);

    let mut session = Session::open("redis://gone", OpenMode::Append, &ctx).unwrap();
    assert!(!session.delete());
    assert!(!session.delete());
    session.close();

    append_and_close(&ctx, "redis://gone", b"x");
    let mut session = Session::open("redis://gone", OpenMode::Append, &ctx).unwrap();
    assert!(session.delete());
    assert!(!session.delete());
}

#[test]
fn test_cursor_is_monotonic() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    let mut reader = Session::open("redis://log", OpenMode::Read, &ctx).unwrap();

    assert!(reader.read(10).unwrap().is_empty());
    assert_eq!(reader.read_cursor(), EntryId::ZERO);

    append_and_close(&ctx, "redis://log", b"first");
    assert_eq!(&reader.read(10).unwrap()[..], b"first");
    let after_first = reader.read_cursor();
    assert!(after_first > EntryId::ZERO);

    assert!(reader.read(10).unwrap().is_empty());
    assert_eq!(reader.read_cursor(), after_first);

    append_and_close(&ctx, "redis://log", b"second");
    assert_eq!(&reader.read(10).unwrap()[..], b"second");
    assert!(reader.read_cursor() > after_first);
}

#[test]
fn test_resume_from_captured_cursor() {
    let store = InMemoryLogStore::new();
    let captured = Arc::new(Mutex::new(EntryId::ZERO));

    let sink = Arc::clone(&captured);
    let ctx = prefixed(&store).after_read(move |cursor, key, _client| {
        assert_eq!(key, "streams:resume");
        *sink.lock() = *cursor;
    });

    append_and_close(&ctx, "redis://resume", b"B1");
    let mut reader = Session::open("redis://resume", OpenMode::Read, &ctx).unwrap();
    assert_eq!(drain(&mut reader), b"B1");
    reader.close();

    append_and_close(&ctx, "redis://resume", b"B2");

    let start_id = captured.lock().to_string();
    let resumed = prefixed(&store).with_config(
        StreamConfig::default()
            .with_key_prefix("streams:")
            .with_start_id(start_id),
    );
    let mut reader = Session::open("redis://resume", OpenMode::Read, &resumed).unwrap();
    assert_eq!(drain(&mut reader), b"B2");
}

#[test]
fn test_after_read_runs_on_empty_fetch() {
    let store = InMemoryLogStore::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&calls);
    let ctx = prefixed(&store).after_read(move |cursor, _key, _client| sink.lock().push(*cursor));

    let mut reader = Session::open("redis://empty", OpenMode::Read, &ctx).unwrap();
    assert!(reader.read(1).unwrap().is_empty());
    assert_eq!(*calls.lock(), vec![EntryId::ZERO]);
}

#[test]
fn test_modes_are_isolated() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);

    let mut reader = Session::open("redis://iso", OpenMode::Read, &ctx).unwrap();
    assert_eq!(reader.write(b"nope"), 0);
    assert!(!reader.flush());
    assert!(!reader.delete());
    assert_eq!(reader.stat().size, 0);

    let mut writer = Session::open("redis://iso", OpenMode::Append, &ctx).unwrap();
    writer.write(b"local");
    assert!(writer.read(10).is_none());

    assert_eq!(store.append_calls(), 0);
    assert_eq!(store.read_calls(), 0);
    assert_eq!(store.delete_calls(), 0);
}

#[test]
fn test_before_close_hook_can_delete() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store).before_close(|key, client| {
        client.delete(key).unwrap();
    });

    append_and_close(&ctx, "redis://temp", b"short-lived");

    assert_eq!(store.append_calls(), 1);
    assert!(!store.clone().exists("streams:temp").unwrap());
}

#[test]
fn test_before_close_hook_can_expire() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store).before_close(|key, client| {
        assert!(client.expire(key, 3600).unwrap());
    });

    append_and_close(&ctx, "redis://kept", b"data");
    assert_eq!(store.entry_count("streams:kept"), 1);
}

#[test]
fn test_failed_flush_keeps_pending_bytes() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    let mut writer = Session::open("redis://retry", OpenMode::Append, &ctx).unwrap();

    writer.write(b"payload");
    store.set_available(false);
    assert!(!writer.flush());
    assert_eq!(writer.pending_len(), 7);
    assert_eq!(store.entry_count("streams:retry"), 0);

    store.set_available(true);
    assert!(writer.flush());
    assert_eq!(writer.pending_len(), 0);

    let entries = store.entries("streams:retry");
    assert_eq!(entries.len(), 1);
    assert_eq!(&entries[0].payload()[..], b"payload");
}

#[test]
fn test_lost_ack_retry_duplicates() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    let mut writer = Session::open("redis://dup", OpenMode::Append, &ctx).unwrap();

    writer.write(b"once");
    store.fail_acks(1);
    assert!(!writer.flush());
    assert!(writer.flush());
    writer.close();

    let mut reader = Session::open("redis://dup", OpenMode::Read, &ctx).unwrap();
    assert_eq!(drain(&mut reader), b"onceonce");
}

#[test]
fn test_close_discards_unflushed_bytes() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);

    let mut writer = Session::open("redis://lost", OpenMode::Append, &ctx).unwrap();
    writer.write(b"committed");
    assert!(writer.flush());
    writer.write(b"dropped");
    writer.close();

    let mut reader = Session::open("redis://lost", OpenMode::Read, &ctx).unwrap();
    assert_eq!(drain(&mut reader), b"committed");
}

#[test]
fn test_read_failure_leaves_cursor() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    append_and_close(&ctx, "redis://outage", b"data");

    let mut reader = Session::open("redis://outage", OpenMode::Read, &ctx).unwrap();
    store.set_available(false);
    assert!(reader.read(10).is_none());
    assert_eq!(reader.read_cursor(), EntryId::ZERO);

    store.set_available(true);
    assert_eq!(drain(&mut reader), b"data");
}

#[test]
fn test_read_after_seek_fetches_new_entries() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    append_and_close(&ctx, "redis://tail", b"hello");

    let mut reader = Session::open("redis://tail", OpenMode::Read, &ctx).unwrap();
    assert_eq!(&reader.read(8192).unwrap()[..], b"hello");
    assert_eq!(reader.tell(), 0);

    append_and_close(&ctx, "redis://tail", b"world");
    let reads = store.read_calls();

    assert!(reader.seek(SeekFrom::Start(0)));
    assert_eq!(&reader.read(8192).unwrap()[..], b"world");
    assert_eq!(store.read_calls(), reads + 1);
    assert_eq!(reader.tell(), 0);
    assert_eq!(reader.stat().size, 10);

    // Everything fetched so far stays readable from the local buffer.
    let mut local = String::new();
    reader.read_to_string(&mut local).unwrap();
    assert_eq!(local, "helloworld");

    assert!(!reader.seek(SeekFrom::Current(-100)));
    assert_eq!(reader.tell(), 10);
}

#[test]
fn test_io_read_after_seek_past_end() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    append_and_close(&ctx, "redis://past", b"abc");

    let mut reader = Session::open("redis://past", OpenMode::Read, &ctx).unwrap();
    assert!(reader.seek(SeekFrom::Start(50)));

    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"abc");
    assert!(reader.read_cursor() > EntryId::ZERO);
    assert_eq!(reader.tell(), 3);
}

#[test]
fn test_stat_reports_buffer() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);

    let mut writer = Session::open("redis://stat", OpenMode::Append, &ctx).unwrap();
    writer.write(b"abcdef");
    let stat = writer.stat();
    assert_eq!(stat.key, "streams:stat");
    assert_eq!(stat.mode, OpenMode::Append);
    assert_eq!(stat.size, 6);
    assert_eq!(stat.position, 6);
    assert_eq!(stat.committed, 0);
}

#[test]
fn test_io_traits_compose_with_copy() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);
    let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();

    let mut writer = Session::open("redis://copy", OpenMode::Append, &ctx).unwrap();
    io::copy(&mut io::Cursor::new(&data), &mut writer).unwrap();
    Write::flush(&mut writer).unwrap();
    writer.close();

    let mut reader = Session::open("redis://copy", OpenMode::Read, &ctx).unwrap();
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);

    Seek::seek(&mut reader, SeekFrom::End(-4)).unwrap();
    let mut tail = [0u8; 4];
    reader.read_exact(&mut tail).unwrap();
    assert_eq!(&tail[..], &data[data.len() - 4..]);
}

#[test]
fn test_io_traits_respect_mode() {
    let store = InMemoryLogStore::new();
    let ctx = prefixed(&store);

    let mut reader = Session::open("redis://io", OpenMode::Read, &ctx).unwrap();
    let err = Write::write(&mut reader, b"x").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Unsupported);

    let mut writer = Session::open("redis://io", OpenMode::Append, &ctx).unwrap();
    let mut buf = [0u8; 4];
    let err = Read::read(&mut writer, &mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Unsupported);
}

#[test]
fn test_spooled_buffer_handles_large_streams() {
    let store = InMemoryLogStore::new();
    let config = StreamConfig::default()
        .with_key_prefix("streams:")
        .with_buffer(BufferConfig::Spooled { max_memory: 1024 });
    let ctx = StreamContext::with_store(store.clone()).with_config(config);
    let data = vec![0xabu8; 100_000];

    append_and_close(&ctx, "redis://big", &data);

    let mut reader = Session::open("redis://big", OpenMode::Read, &ctx).unwrap();
    assert_eq!(drain(&mut reader), data);
    assert_eq!(reader.stat().size, 100_000);
}

#[test]
fn test_custom_buffer_provider() {
    let store = InMemoryLogStore::new();
    let created = Arc::new(Mutex::new(0usize));

    let counter = Arc::clone(&created);
    let ctx = prefixed(&store).with_buffer_provider(move || {
        *counter.lock() += 1;
        Ok(Box::new(io::Cursor::new(Vec::new())))
    });

    append_and_close(&ctx, "redis://custom", b"abc");
    assert_eq!(*created.lock(), 1);
}

#[test]
fn test_unsupported_session_operations() {
    let store = InMemoryLogStore::new();
    let mut reader = Session::open("redis://u", OpenMode::Read, &prefixed(&store)).unwrap();

    assert!(matches!(reader.lock(false), Err(SessionError::Unsupported(_))));
    assert!(matches!(reader.truncate(0), Err(SessionError::Unsupported(_))));
}
