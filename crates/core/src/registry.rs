//! Per-document component registry
//!
//! Keys are `{document-location}#{json-pointer}`. Schemas that declare a
//! `$id` are additionally indexed by that URI in a separate table owned by
//! the same document.

use indexmap::IndexMap;

use crate::error::{OpenApiError, Result};
use crate::model::AnyHandle;

/// A registered component and the pointer it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub handle: AnyHandle,
    pub pointer: String,
}

impl RegistryEntry {
    pub fn new(handle: AnyHandle, pointer: impl Into<String>) -> Self {
        Self {
            handle,
            pointer: pointer.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: IndexMap<String, RegistryEntry>,
    schema_ids: IndexMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component. An existing key is never replaced.
    pub fn register(&mut self, key: impl Into<String>, entry: RegistryEntry) -> Result<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(OpenApiError::DuplicateKey(key));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Index a schema by its absolute `$id`
    pub fn register_schema_id(&mut self, uri: impl Into<String>, entry: RegistryEntry) -> Result<()> {
        let uri = uri.into();
        if self.schema_ids.contains_key(&uri) {
            return Err(OpenApiError::DuplicateKey(uri));
        }
        self.schema_ids.insert(uri, entry);
        Ok(())
    }

    pub fn schema_by_id(&self, uri: &str) -> Option<&RegistryEntry> {
        self.schema_ids.get(uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
