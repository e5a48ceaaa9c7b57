//! Per-open configuration
//!
//! A [`StreamContext`] is handed to every open call. It carries the client
//! factory, the serializable [`StreamConfig`] settings, an optional buffer
//! provider and the lifecycle [`Hooks`]. There are no process-wide
//! defaults: callers build the context they want and pass it explicitly.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use redstream_store::{EntryId, LogStore, RedisConfig, RedisLogStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferConfig, BufferProvider, SeekableBuffer};
use crate::error::SessionError;

/// A client handle owned by one session
pub type ClientHandle = Box<dyn LogStore>;

/// Creates a store client; called at most once per session
pub type ClientFactory = Arc<dyn Fn() -> Result<ClientHandle, StoreError> + Send + Sync>;

/// Called on close with `(store_key, client)`
pub type BeforeCloseHook = Arc<dyn Fn(&str, &mut dyn LogStore) + Send + Sync>;

/// Called after every fetch with `(read_cursor, store_key, client)`
pub type AfterReadHook = Arc<dyn Fn(&EntryId, &str, &mut dyn LogStore) + Send + Sync>;

/// Optional lifecycle callbacks
#[derive(Clone, Default)]
pub struct Hooks {
    /// Runs before the client is released on close
    pub before_close: Option<BeforeCloseHook>,
    /// Runs after each read, once the cursor has advanced
    pub after_read: Option<AfterReadHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_close", &self.before_close.is_some())
            .field("after_read", &self.after_read.is_some())
            .finish()
    }
}

impl Hooks {
    /// Set the before-close hook
    pub fn with_before_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &mut dyn LogStore) + Send + Sync + 'static,
    {
        self.before_close = Some(Arc::new(hook));
        self
    }

    /// Set the after-read hook
    pub fn with_after_read<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EntryId, &str, &mut dyn LogStore) + Send + Sync + 'static,
    {
        self.after_read = Some(Arc::new(hook));
        self
    }
}

/// Serializable session settings
///
/// # Example TOML
///
/// ```toml
/// key_prefix = "streams:"
/// start_id = "0"
///
/// [buffer]
/// kind = "spooled"
/// max_memory = 1048576
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Prepended to the scheme-less path to form the store key
    pub key_prefix: String,
    /// Read cursor a new read session starts after; `"0"` is the beginning
    pub start_id: String,
    /// Storage behind each session's local buffer
    pub buffer: BufferConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            start_id: "0".to_string(),
            buffer: BufferConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        toml::from_str(text).map_err(|e| SessionError::configuration(format!("invalid stream config: {e}")))
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SessionError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Set the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the starting read cursor
    pub fn with_start_id(mut self, start_id: impl Into<String>) -> Self {
        self.start_id = start_id.into();
        self
    }

    /// Set the buffer storage
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    /// The starting read cursor, parsed
    pub fn start_cursor(&self) -> Result<EntryId, SessionError> {
        self.start_id.parse().map_err(|e: StoreError| {
            SessionError::configuration(format!("invalid start_id {:?}: {e}", self.start_id))
        })
    }
}

/// Everything an open call needs
#[derive(Clone)]
pub struct StreamContext {
    client_factory: ClientFactory,
    config: StreamConfig,
    buffer_provider: Option<BufferProvider>,
    hooks: Hooks,
}

impl fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamContext")
            .field("config", &self.config)
            .field("buffer_provider", &self.buffer_provider.is_some())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl StreamContext {
    /// Create a context around a client factory, with default settings
    pub fn new(client_factory: ClientFactory) -> Self {
        Self {
            client_factory,
            config: StreamConfig::default(),
            buffer_provider: None,
            hooks: Hooks::default(),
        }
    }

    /// Context whose sessions each get a clone of `store`
    ///
    /// Useful with stores whose clones share state, such as
    /// [`redstream_store::InMemoryLogStore`].
    pub fn with_store<S>(store: S) -> Self
    where
        S: LogStore + Clone + Sync + 'static,
    {
        Self::new(Arc::new(move || Ok(Box::new(store.clone()) as ClientHandle)))
    }

    /// Context whose sessions each open their own Redis connection
    pub fn redis(config: RedisConfig) -> Self {
        Self::new(Arc::new(move || {
            Ok(Box::new(RedisLogStore::new(config.clone())) as ClientHandle)
        }))
    }

    /// Replace the settings
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the buffer storage with a custom provider
    pub fn with_buffer_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> std::io::Result<Box<dyn SeekableBuffer>> + Send + Sync + 'static,
    {
        self.buffer_provider = Some(Arc::new(provider));
        self
    }

    /// Replace all hooks
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the before-close hook
    pub fn before_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &mut dyn LogStore) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_before_close(hook);
        self
    }

    /// Set the after-read hook
    pub fn after_read<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EntryId, &str, &mut dyn LogStore) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_after_read(hook);
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn client_factory(&self) -> &ClientFactory {
        &self.client_factory
    }

    /// Create storage for a new session buffer
    pub fn create_buffer(&self) -> std::io::Result<Box<dyn SeekableBuffer>> {
        match &self.buffer_provider {
            Some(provider) => provider(),
            None => self.config.buffer.create(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redstream_store::InMemoryLogStore;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.key_prefix, "");
        assert_eq!(config.start_id, "0");
        assert_eq!(config.start_cursor().unwrap(), EntryId::ZERO);
        assert_eq!(config.buffer, BufferConfig::default());
    }

    #[test]
    fn test_config_from_toml() {
        let config = StreamConfig::from_toml_str(
            r#"
            key_prefix = "streams:"
            start_id = "1700000000000-3"

            [buffer]
            kind = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.key_prefix, "streams:");
        assert_eq!(config.start_cursor().unwrap(), EntryId::new(1_700_000_000_000, 3));
        assert_eq!(config.buffer, BufferConfig::Memory);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StreamConfig::from_toml_str("key_prefix = \"logs:\"").unwrap();
        assert_eq!(config.key_prefix, "logs:");
        assert_eq!(config.start_id, "0");
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = StreamConfig::from_toml_str("key_prefix = 5").unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.toml");
        std::fs::write(&path, "start_id = \"42\"\n").unwrap();

        let config = StreamConfig::load(&path).unwrap();
        assert_eq!(config.start_cursor().unwrap(), EntryId::new(42, 0));

        let missing = StreamConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, SessionError::Configuration(_)));
    }

    #[test]
    fn test_malformed_start_id() {
        let config = StreamConfig::default().with_start_id("not-an-id");
        assert!(matches!(
            config.start_cursor(),
            Err(SessionError::Configuration(_))
        ));
    }

    #[test]
    fn test_context_with_store_shares_state() {
        let store = InMemoryLogStore::new();
        let ctx = StreamContext::with_store(store.clone());

        let mut client = (ctx.client_factory())().unwrap();
        client.append("k", b"data").unwrap();
        assert_eq!(store.entry_count("k"), 1);
    }

    #[test]
    fn test_buffer_provider_overrides_config() {
        let ctx = StreamContext::with_store(InMemoryLogStore::new())
            .with_buffer_provider(|| Ok(Box::new(std::io::Cursor::new(Vec::new()))));
        assert!(ctx.create_buffer().is_ok());

        let debug = format!("{ctx:?}");
        assert!(debug.contains("buffer_provider: true"));
    }

    #[test]
    fn test_hooks_debug_shows_presence() {
        let hooks = Hooks::default().with_before_close(|_, _| {});
        assert_eq!(
            format!("{hooks:?}"),
            "Hooks { before_close: true, after_read: false }"
        );
    }
}
