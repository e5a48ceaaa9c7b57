//! Redis Streams client
//!
//! A blocking [`LogStore`] implementation speaking RESP2 over a TCP socket.
//! Each appended payload becomes one stream entry (`XADD key * ...`), reads
//! use `XREAD STREAMS key <after>`. The connection is opened lazily on the
//! first command and dropped whenever the socket fails, so the next command
//! reconnects. There is no retry here: a failed command is reported to the
//! caller as-is.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::LogStore;
use crate::entry::{EntryId, StreamEntry, chunk_fields};
use crate::error::StoreError;
use crate::resp::{FrameScanner, ParseResult, RespParser, RespValue, encode_command};

/// Connection settings for a Redis server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Logical database selected after connecting
    pub db: u32,
    /// ACL user name (requires `password`)
    pub username: Option<String>,
    /// Password sent with AUTH after connecting
    pub password: Option<String>,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Socket read/write timeout in milliseconds (none = block indefinitely)
    pub io_timeout_ms: Option<u64>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            username: None,
            password: None,
            connect_timeout_ms: 2500,
            io_timeout_ms: None,
        }
    }
}

impl RedisConfig {
    /// Create a config for the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Parse `redis://[[user]:password@]host[:port][/db]`
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let invalid = |why: &str| StoreError::connection(format!("invalid redis url {url:?}: {why}"));

        let rest = url
            .strip_prefix("redis://")
            .ok_or_else(|| invalid("expected redis:// scheme"))?;

        let mut config = Self::default();

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (rest, None),
        };

        let host_port = match authority.rsplit_once('@') {
            Some((credentials, host_port)) => {
                match credentials.split_once(':') {
                    Some((user, password)) => {
                        if !user.is_empty() {
                            config.username = Some(user.to_string());
                        }
                        config.password = Some(password.to_string());
                    }
                    None => config.password = Some(credentials.to_string()),
                }
                host_port
            }
            None => authority,
        };

        match host_port.rsplit_once(':') {
            Some((host, port)) => {
                config.host = host.to_string();
                config.port = port.parse().map_err(|_| invalid("bad port"))?;
            }
            None if !host_port.is_empty() => config.host = host_port.to_string(),
            None => {}
        }

        if let Some(db) = path.filter(|p| !p.is_empty()) {
            config.db = db.parse().map_err(|_| invalid("bad database index"))?;
        }

        Ok(config)
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(|ms| Duration::from_millis(ms.max(1)))
    }
}

/// Socket read size
const READ_CHUNK: usize = 64 * 1024;

/// One open socket plus its unparsed input
#[derive(Debug)]
struct Connection {
    stream: TcpStream,
    pending: Vec<u8>,
    framer: FrameScanner,
    parser: RespParser,
}

impl Connection {
    fn open(config: &RedisConfig) -> Result<Self, StoreError> {
        let addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| StoreError::connection(format!("{}:{}: {e}", config.host, config.port)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(config.io_timeout())?;
                    stream.set_write_timeout(config.io_timeout())?;
                    return Ok(Self {
                        stream,
                        pending: Vec::new(),
                        framer: FrameScanner::new(),
                        parser: RespParser::new(),
                    });
                }
                Err(e) => {
                    debug!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => StoreError::connection(format!("{}:{}: {e}", config.host, config.port)),
            None => StoreError::connection(format!(
                "{}:{}: no addresses resolved",
                config.host, config.port
            )),
        })
    }

    fn request<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<RespValue, StoreError> {
        self.stream.write_all(&encode_command(args))?;
        self.stream.flush()?;
        self.read_reply()
    }

    /// Read one reply. The framer walks the input once as it arrives and
    /// the parser only runs on a complete frame.
    fn read_reply(&mut self) -> Result<RespValue, StoreError> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(len) = self.framer.scan(&self.pending).map_err(StoreError::protocol)? {
                let value = match self.parser.parse(&self.pending[..len]) {
                    ParseResult::Ok(value, _) => value,
                    ParseResult::Error(e) => return Err(StoreError::protocol(e)),
                    ParseResult::Incomplete => {
                        return Err(StoreError::protocol("reply frame ended early"));
                    }
                };
                self.pending.drain(..len);
                return Ok(value);
            }

            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(StoreError::connection("connection closed by server"));
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Blocking Redis Streams implementation of [`LogStore`]
#[derive(Debug)]
pub struct RedisLogStore {
    config: RedisConfig,
    conn: Option<Connection>,
}

impl RedisLogStore {
    /// Create a client; no connection is made until the first command
    pub fn new(config: RedisConfig) -> Self {
        Self { config, conn: None }
    }

    /// Connection settings of this client
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Open the connection now instead of on first use
    #[instrument(skip(self), fields(host = %self.config.host, port = self.config.port))]
    pub fn connect(&mut self) -> Result<(), StoreError> {
        if self.conn.is_some() {
            return Ok(());
        }

        let mut conn = Connection::open(&self.config)?;

        if let Some(password) = &self.config.password {
            let reply = match &self.config.username {
                Some(user) => conn.request(&["AUTH", user.as_str(), password.as_str()])?,
                None => conn.request(&["AUTH", password.as_str()])?,
            };
            expect_ok(reply)?;
        }

        if self.config.db != 0 {
            let db = self.config.db.to_string();
            expect_ok(conn.request(&["SELECT", db.as_str()])?)?;
        }

        info!("Connected to redis");
        self.conn = Some(conn);
        Ok(())
    }

    /// Send `PING` and check the answer
    pub fn ping(&mut self) -> Result<(), StoreError> {
        match self.command(&["PING"])? {
            RespValue::SimpleString(s) if s == "PONG" => Ok(()),
            other => Err(unexpected("PING", &other)),
        }
    }

    /// Run one command, reconnecting first if needed.
    ///
    /// Error replies become [`StoreError::Server`]; socket and protocol
    /// failures drop the connection.
    fn command<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<RespValue, StoreError> {
        self.connect()?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| StoreError::connection("not connected"))?;

        match conn.request(args) {
            Ok(RespValue::Error(message)) => Err(StoreError::Server(message)),
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_connection_lost() {
                    warn!(error = %e, "Dropping redis connection");
                    self.conn = None;
                }
                Err(e)
            }
        }
    }

    fn integer_command(&mut self, name: &str, args: &[&[u8]]) -> Result<i64, StoreError> {
        match self.command(args)? {
            RespValue::Integer(n) => Ok(n),
            other => Err(unexpected(name, &other)),
        }
    }
}

impl LogStore for RedisLogStore {
    fn append(&mut self, key: &str, payload: &[u8]) -> Result<EntryId, StoreError> {
        let fields = chunk_fields(payload);

        let mut args: Vec<&[u8]> = Vec::with_capacity(3 + fields.len() * 2);
        args.extend([b"XADD".as_slice(), key.as_bytes(), b"*".as_slice()]);
        for (name, value) in &fields {
            args.push(name.as_bytes());
            args.push(value);
        }

        match self.command(&args)? {
            RespValue::BulkString(id) => {
                let id = EntryId::try_from(id.as_ref())?;
                debug!(key, %id, len = payload.len(), "XADD");
                Ok(id)
            }
            other => Err(unexpected("XADD", &other)),
        }
    }

    fn read(&mut self, key: &str, after: &EntryId) -> Result<Vec<StreamEntry>, StoreError> {
        let after = after.to_string();
        let reply = self.command(&["XREAD", "STREAMS", key, after.as_str()])?;
        let entries = parse_xread_reply(key, reply)?;
        debug!(key, %after, count = entries.len(), "XREAD");
        Ok(entries)
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let removed = self.integer_command("DEL", &[b"DEL".as_slice(), key.as_bytes()])?;
        Ok(removed > 0)
    }

    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        let count = self.integer_command("EXISTS", &[b"EXISTS".as_slice(), key.as_bytes()])?;
        Ok(count > 0)
    }

    fn expire(&mut self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let seconds = seconds.to_string();
        let set = self.integer_command("EXPIRE", &[b"EXPIRE".as_slice(), key.as_bytes(), seconds.as_bytes()])?;
        Ok(set == 1)
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            // The peer may already be gone; nothing to recover either way.
            let _ = conn.stream.shutdown(Shutdown::Both);
            debug!("Closed redis connection");
        }
        Ok(())
    }
}

impl Drop for RedisLogStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn expect_ok(reply: RespValue) -> Result<(), StoreError> {
    match reply {
        RespValue::SimpleString(s) if s == "OK" => Ok(()),
        RespValue::Error(message) => Err(StoreError::Server(message)),
        other => Err(unexpected("handshake", &other)),
    }
}

fn unexpected(command: &str, value: &RespValue) -> StoreError {
    StoreError::protocol(format!("unexpected {} reply to {command}", value.kind()))
}

/// Decode an `XREAD` reply for a single key.
///
/// Shape: `[[key, [[id, [field, value, ...]], ...]]]`, or null when there is
/// nothing after the requested id.
fn parse_xread_reply(key: &str, reply: RespValue) -> Result<Vec<StreamEntry>, StoreError> {
    let streams = match reply {
        RespValue::Null => return Ok(Vec::new()),
        RespValue::Array(streams) => streams,
        other => return Err(unexpected("XREAD", &other)),
    };

    let mut entries = Vec::new();
    for stream in streams {
        let RespValue::Array(mut pair) = stream else {
            return Err(StoreError::protocol("XREAD stream is not an array"));
        };
        if pair.len() != 2 {
            return Err(StoreError::protocol("XREAD stream is not a [key, entries] pair"));
        }
        let raw_entries = pair.pop();
        let name = pair.pop();

        match name {
            Some(RespValue::BulkString(name)) if name.as_ref() == key.as_bytes() => {}
            _ => continue,
        }

        let Some(RespValue::Array(raw_entries)) = raw_entries else {
            return Err(StoreError::protocol("XREAD entries are not an array"));
        };

        for raw in raw_entries {
            entries.push(parse_entry(raw)?);
        }
    }

    Ok(entries)
}

fn parse_entry(raw: RespValue) -> Result<StreamEntry, StoreError> {
    let RespValue::Array(parts) = raw else {
        return Err(StoreError::protocol("stream entry is not an array"));
    };
    let mut parts = parts.into_iter();

    let id = match parts.next() {
        Some(RespValue::BulkString(id)) => EntryId::try_from(id.as_ref())?,
        _ => return Err(StoreError::protocol("stream entry has no id")),
    };

    let values = match parts.next() {
        Some(RespValue::Array(values)) => values,
        // Entries whose fields were trimmed away come back as null.
        Some(RespValue::Null) | None => Vec::new(),
        Some(other) => return Err(unexpected("XREAD entry", &other)),
    };

    if values.len() % 2 != 0 {
        return Err(StoreError::protocol("odd number of field values in entry"));
    }

    let mut fields = Vec::with_capacity(values.len() / 2);
    let mut values = values.into_iter();
    while let (Some(name), Some(value)) = (values.next(), values.next()) {
        let name = match name {
            RespValue::BulkString(name) => String::from_utf8_lossy(&name).into_owned(),
            other => return Err(unexpected("XREAD field name", &other)),
        };
        let value = match value {
            RespValue::BulkString(value) => value,
            RespValue::Null => Bytes::new(),
            other => return Err(unexpected("XREAD field value", &other)),
        };
        fields.push((name, value));
    }

    Ok(StreamEntry::new(id, fields))
}
