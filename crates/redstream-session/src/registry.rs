//! Scheme registry
//!
//! Maps URL schemes (`redis` in `redis://app.log`) to the factories that
//! open sessions for them. A registry is an ordinary value: build one,
//! register schemes on it and pass it where paths get opened.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::StreamContext;
use crate::error::{Operation, SessionError};
use crate::mode::OpenMode;
use crate::session::Session;

/// Opens sessions for one scheme
pub trait SessionFactory: Send + Sync {
    /// Open a session on `path`
    fn open(&self, path: &str, mode: OpenMode, ctx: &StreamContext) -> Result<Session, SessionError>;

    /// Remove the stream behind `path`, returning whether one existed.
    ///
    /// Deletion goes through an append-mode session, so it runs the same
    /// hooks as any other append session.
    fn delete(&self, path: &str, ctx: &StreamContext) -> Result<bool, SessionError> {
        let mut session = self.open(path, OpenMode::Append, ctx)?;
        let removed = session.delete();
        session.close();
        Ok(removed)
    }
}

/// Factory producing plain [`Session`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSessionFactory;

impl SessionFactory for LogSessionFactory {
    fn open(&self, path: &str, mode: OpenMode, ctx: &StreamContext) -> Result<Session, SessionError> {
        Session::open(path, mode, ctx)
    }
}

/// Scheme of a `scheme://rest` path
pub fn scheme_of(path: &str) -> Option<&str> {
    path.split_once("://")
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.is_empty())
}

/// Lookup from scheme name to session factory
#[derive(Clone, Default)]
pub struct SchemeRegistry {
    factories: HashMap<String, Arc<dyn SessionFactory>>,
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

impl SchemeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `scheme` served by [`LogSessionFactory`]
    pub fn with_scheme(scheme: &str) -> Self {
        let mut registry = Self::new();
        registry.register(scheme, Arc::new(LogSessionFactory));
        registry
    }

    /// Register `factory` for `scheme`, returning the factory it replaced.
    ///
    /// Scheme names are case-insensitive.
    pub fn register(
        &mut self,
        scheme: &str,
        factory: Arc<dyn SessionFactory>,
    ) -> Option<Arc<dyn SessionFactory>> {
        debug!(scheme, "Registering scheme");
        self.factories.insert(scheme.to_ascii_lowercase(), factory)
    }

    /// Remove `scheme`, returning whether it was registered
    pub fn unregister(&mut self, scheme: &str) -> bool {
        self.factories.remove(&scheme.to_ascii_lowercase()).is_some()
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.factories.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Registered scheme names, sorted
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    fn resolve(&self, path: &str) -> Result<&Arc<dyn SessionFactory>, SessionError> {
        let scheme = scheme_of(path)
            .ok_or_else(|| SessionError::configuration(format!("path {path:?} has no scheme")))?;
        self.factories
            .get(&scheme.to_ascii_lowercase())
            .ok_or_else(|| SessionError::configuration(format!("no handler registered for scheme {scheme:?}")))
    }

    /// Open `path` with a mode string (`"a"` or `"r"`)
    pub fn open(&self, path: &str, mode: &str, ctx: &StreamContext) -> Result<Session, SessionError> {
        let factory = self.resolve(path)?;
        factory.open(path, mode.parse()?, ctx)
    }

    /// Remove the stream behind `path`
    pub fn delete(&self, path: &str, ctx: &StreamContext) -> Result<bool, SessionError> {
        self.resolve(path)?.delete(path, ctx)
    }

    pub fn opendir(&self, _path: &str) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::OpenDir))
    }

    pub fn readdir(&self, _path: &str) -> Result<Option<String>, SessionError> {
        Err(SessionError::unsupported(Operation::ReadDir))
    }

    pub fn rewinddir(&self, _path: &str) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::RewindDir))
    }

    pub fn closedir(&self, _path: &str) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::CloseDir))
    }

    pub fn rename(&self, _from: &str, _to: &str) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::Rename))
    }

    pub fn mkdir(&self, _path: &str, _recursive: bool) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::MakeDir))
    }

    pub fn rmdir(&self, _path: &str) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::RemoveDir))
    }

    /// Status by path; streams have no stat without an open session
    pub fn url_stat(&self, _path: &str) -> Result<(), SessionError> {
        Err(SessionError::unsupported(Operation::UrlStat))
    }
}
