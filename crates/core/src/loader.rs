//! Fetching bytes for external references
//!
//! The reader only ever asks a loader for the raw bytes at a location; parsing
//! and registration happen in the [`Workspace`](crate::workspace::Workspace).

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use tracing::debug;
use url::Url;

use crate::error::LoadError;

/// Source of external document bytes
#[async_trait]
pub trait ExternalLoader: Send + Sync + fmt::Debug {
    async fn load(&self, location: &Url) -> Result<Vec<u8>, LoadError>;
}

/// Loads `file://` locations from the local filesystem.
///
/// Uses `tokio::fs` when called inside a tokio runtime and blocking
/// `std::fs` otherwise, so it also works under a plain executor.
#[derive(Debug, Clone, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExternalLoader for FileLoader {
    async fn load(&self, location: &Url) -> Result<Vec<u8>, LoadError> {
        if location.scheme() != "file" {
            return Err(LoadError::UnsupportedScheme(location.scheme().to_string()));
        }
        let path = location
            .to_file_path()
            .map_err(|_| LoadError::Other(format!("not a file path: {}", location)))?;

        debug!(path = %path.display(), "reading external document");
        let result = if tokio::runtime::Handle::try_current().is_ok() {
            tokio::fs::read(&path).await
        } else {
            std::fs::read(&path)
        };

        result.map_err(|err| match err.kind() {
            ErrorKind::NotFound => LoadError::NotFound(location.clone()),
            _ => LoadError::from(err),
        })
    }
}

/// In-memory loader keyed by absolute location, mostly for tests and
/// embedding documents that are already at hand
#[derive(Debug, Default)]
pub struct MemoryLoader {
    documents: RwLock<HashMap<Url, Vec<u8>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(self, location: Url, content: impl Into<Vec<u8>>) -> Self {
        self.insert(location, content);
        self
    }

    pub fn insert(&self, location: Url, content: impl Into<Vec<u8>>) {
        let mut location = location;
        location.set_fragment(None);
        self.documents.write().insert(location, content.into());
    }
}

#[async_trait]
impl ExternalLoader for MemoryLoader {
    async fn load(&self, location: &Url) -> Result<Vec<u8>, LoadError> {
        let mut key = location.clone();
        key.set_fragment(None);
        self.documents
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(location.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_loader_ignores_fragment() {
        let location = Url::parse("file:///b.yaml").unwrap();
        let loader = MemoryLoader::new().with(location.clone(), "Widget: {}");

        let bytes = loader
            .load(&Url::parse("file:///b.yaml#/Widget").unwrap())
            .await
            .unwrap();
        assert_eq!(bytes, b"Widget: {}");

        let missing = loader.load(&Url::parse("file:///c.yaml").unwrap()).await;
        assert!(matches!(missing, Err(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_loader_rejects_other_schemes() {
        let result = FileLoader::new()
            .load(&Url::parse("https://example.com/api.yaml").unwrap())
            .await;
        assert!(matches!(result, Err(LoadError::UnsupportedScheme(s)) if s == "https"));
    }

    #[test]
    fn test_file_loader_without_runtime() {
        let path = std::env::temp_dir().join(format!("oasdoc-loader-{}.yaml", std::process::id()));
        std::fs::write(&path, "openapi: 3.1.0").unwrap();
        let location = Url::from_file_path(&path).unwrap();

        let bytes = futures::executor::block_on(FileLoader::new().load(&location)).unwrap();
        assert_eq!(bytes, b"openapi: 3.1.0");
        std::fs::remove_file(&path).unwrap();
    }
}
