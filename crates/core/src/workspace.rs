//! Shared registry of documents, fragments and raw artifacts
//!
//! Everything is keyed by absolute location. A location is registered at most
//! once across all three kinds and never replaced.

use futures::lock::Mutex;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::diagnostic::Diagnostics;
use crate::error::{OpenApiError, Result};
use crate::loader::ExternalLoader;
use crate::model::Document;
use crate::reader::{builder, format::Format, sniff_version};
use crate::reference::{escape_segment, registry_key};
use crate::resolver;

/// A node found in another document or fragment
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    pub location: Url,
    /// Pointer of `node` inside its document
    pub pointer: String,
    pub node: Value,
}

#[derive(Default)]
struct Locations {
    documents: HashMap<Url, Arc<Document>>,
    fragments: HashMap<Url, Value>,
    artifacts: HashMap<Url, Arc<[u8]>>,
}

impl Locations {
    fn contains(&self, location: &Url) -> bool {
        self.documents.contains_key(location)
            || self.fragments.contains_key(location)
            || self.artifacts.contains_key(location)
    }
}

#[derive(Default)]
pub struct Workspace {
    locations: RwLock<Locations>,
    /// Serializes external loads
    load_lock: Mutex<()>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locations = self.locations.read();
        f.debug_struct("Workspace")
            .field("documents", &locations.documents.keys().collect::<Vec<_>>())
            .field("fragments", &locations.fragments.keys().collect::<Vec<_>>())
            .field("artifacts", &locations.artifacts.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(location: &Url) -> Url {
    let mut location = location.clone();
    location.set_fragment(None);
    location
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, location: Url, document: Arc<Document>) -> Result<()> {
        let location = normalize(&location);
        let mut locations = self.locations.write();
        if locations.contains(&location) {
            return Err(OpenApiError::DuplicateLocation(location));
        }
        debug!(%location, "registered document");
        locations.documents.insert(location, document);
        Ok(())
    }

    pub fn add_fragment(&self, location: Url, fragment: Value) -> Result<()> {
        let location = normalize(&location);
        let mut locations = self.locations.write();
        if locations.contains(&location) {
            return Err(OpenApiError::DuplicateLocation(location));
        }
        debug!(%location, "registered fragment");
        locations.fragments.insert(location, fragment);
        Ok(())
    }

    pub fn add_artifact(&self, location: Url, bytes: impl Into<Arc<[u8]>>) -> Result<()> {
        let location = normalize(&location);
        let mut locations = self.locations.write();
        if locations.contains(&location) {
            return Err(OpenApiError::DuplicateLocation(location));
        }
        debug!(%location, "registered artifact");
        locations.artifacts.insert(location, bytes.into());
        Ok(())
    }

    pub fn contains(&self, location: &Url) -> bool {
        self.locations.read().contains(&normalize(location))
    }

    pub fn document(&self, location: &Url) -> Option<Arc<Document>> {
        self.locations.read().documents.get(&normalize(location)).cloned()
    }

    pub fn fragment(&self, location: &Url) -> Option<Value> {
        self.locations.read().fragments.get(&normalize(location)).cloned()
    }

    /// Readable stream over a registered artifact
    pub fn get_artifact(&self, location: &Url) -> Result<Cursor<Arc<[u8]>>> {
        self.locations
            .read()
            .artifacts
            .get(&normalize(location))
            .cloned()
            .map(Cursor::new)
            .ok_or_else(|| OpenApiError::NotFound(location.to_string()))
    }

    /// Every registered location
    pub fn locations(&self) -> Vec<Url> {
        let locations = self.locations.read();
        locations
            .documents
            .keys()
            .chain(locations.fragments.keys())
            .chain(locations.artifacts.keys())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        let locations = self.locations.read();
        locations.documents.len() + locations.fragments.len() + locations.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the raw node at `pointer` inside the document or fragment at
    /// `location`.
    ///
    /// For documents the registry is consulted first (component keys, then
    /// schema `$id`s) and the parse tree is walked as a fallback. The foreign
    /// node's own references are not followed.
    pub fn resolve_reference(&self, location: &Url, pointer: &str) -> Option<ResolvedNode> {
        let location = normalize(location);
        let (document, fragment) = {
            let locations = self.locations.read();
            (
                locations.documents.get(&location).cloned(),
                locations.fragments.get(&location).cloned(),
            )
        };

        if let Some(document) = document {
            let key = registry_key(&location, pointer);
            let registered = document.registry().get(&key).or_else(|| {
                if pointer.is_empty() {
                    document.registry().schema_by_id(location.as_str())
                } else {
                    document.registry().schema_by_id(&key)
                }
            });
            let pointer = registered.map(|entry| entry.pointer.clone()).unwrap_or_else(|| pointer.to_string());
            let node = document.raw().pointer(&pointer)?.clone();
            return Some(ResolvedNode {
                location,
                pointer,
                node,
            });
        }

        let fragment = fragment?;
        if !pointer.is_empty() && !pointer.starts_with('/') {
            let (pointer, node) = find_anchor(&fragment, pointer, String::new())?;
            return Some(ResolvedNode { location, pointer, node });
        }
        let node = fragment.pointer(pointer)?.clone();
        Some(ResolvedNode {
            location,
            pointer: pointer.to_string(),
            node,
        })
    }

    /// Load, parse and register `location` unless it is already present.
    ///
    /// Full documents (those with an `openapi` field) get a first pass and
    /// local-only resolution; anything else is kept as a fragment. Loads are
    /// serialized per workspace and raced against `cancel`.
    pub async fn ensure_loaded(
        &self,
        location: &Url,
        loader: &dyn ExternalLoader,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let location = normalize(location);
        let _guard = self.load_lock.lock().await;
        if self.contains(&location) {
            return Ok(());
        }

        let loaded = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(OpenApiError::Cancelled),
                    loaded = loader.load(&location) => loaded,
                }
            }
            None => loader.load(&location).await,
        };
        let bytes = loaded.map_err(|source| OpenApiError::ExternalLoad {
            location: location.clone(),
            source,
        })?;

        let raw = crate::reader::format::parse(&bytes, Format::infer(Some(&location), &bytes))?;
        if raw.get("openapi").is_some() {
            let version = sniff_version(&raw)?.unwrap_or_default();
            let mut diagnostics = Diagnostics::new();
            let mut document = builder::build_document(raw, location.clone(), version, &mut diagnostics);
            resolver::resolve_local(&mut document, &mut diagnostics);
            info!(%location, diagnostics = diagnostics.len(), "loaded external document");
            self.add_document(location, Arc::new(document))
        } else {
            info!(%location, "loaded external fragment");
            self.add_fragment(location, raw)
        }
    }

    /// Explicitly load a location into the workspace. Unlike resolution
    /// through the reader, an unreachable location is an error.
    pub async fn load_document(&self, location: &Url, loader: &dyn ExternalLoader) -> Result<()> {
        self.ensure_loaded(location, loader, None).await
    }
}

/// Depth-first search of a raw tree for the object declaring `$anchor: name`
fn find_anchor(node: &Value, name: &str, at: String) -> Option<(String, Value)> {
    match node {
        Value::Object(map) => {
            if map.get("$anchor").and_then(Value::as_str) == Some(name) {
                return Some((at, node.clone()));
            }
            map.iter()
                .find_map(|(key, child)| find_anchor(child, name, format!("{}/{}", at, escape_segment(key))))
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(index, child)| find_anchor(child, name, format!("{}/{}", at, index))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::model::SpecVersion;
    use serde_json::json;
    use std::io::Read;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_duplicate_location_keeps_first_value() {
        let workspace = Workspace::new();
        workspace.add_fragment(url("file:///b.yaml"), json!({"a": 1})).unwrap();

        let err = workspace
            .add_fragment(url("file:///b.yaml"), json!({"a": 2}))
            .unwrap_err();
        assert!(matches!(err, OpenApiError::DuplicateLocation(_)));

        let doc = Document::new(url("file:///b.yaml"), SpecVersion::V3_1);
        assert!(workspace.add_document(url("file:///b.yaml#/x"), Arc::new(doc)).is_err());
        assert_eq!(workspace.fragment(&url("file:///b.yaml")), Some(json!({"a": 1})));
        assert_eq!(workspace.len(), 1);
    }

    #[test]
    fn test_fragment_pointer_lookup() {
        let workspace = Workspace::new();
        workspace
            .add_fragment(url("file:///b.yaml"), json!({"Widget": {"type": "object"}}))
            .unwrap();

        let found = workspace.resolve_reference(&url("file:///b.yaml"), "/Widget").unwrap();
        assert_eq!(found.node, json!({"type": "object"}));
        assert!(workspace.resolve_reference(&url("file:///b.yaml"), "/Gadget").is_none());
        assert!(workspace.resolve_reference(&url("file:///c.yaml"), "/Widget").is_none());
    }

    #[test]
    fn test_fragment_anchor_lookup() {
        let workspace = Workspace::new();
        workspace
            .add_fragment(
                url("file:///tree.yaml"),
                json!({"Tree": {"properties": {"nodes": {"items": {"$anchor": "node", "type": "object"}}}}}),
            )
            .unwrap();

        let found = workspace.resolve_reference(&url("file:///tree.yaml"), "node").unwrap();
        assert_eq!(found.pointer, "/Tree/properties/nodes/items");
        assert_eq!(found.node["type"], "object");
        assert!(workspace.resolve_reference(&url("file:///tree.yaml"), "leaf").is_none());
    }

    #[test]
    fn test_artifacts() {
        let workspace = Workspace::new();
        workspace.add_artifact(url("file:///logo.png"), vec![1u8, 2, 3]).unwrap();

        let mut bytes = Vec::new();
        workspace
            .get_artifact(&url("file:///logo.png"))
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(matches!(
            workspace.get_artifact(&url("file:///missing.png")),
            Err(OpenApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_loaded_registers_documents_and_fragments() {
        let loader = MemoryLoader::new()
            .with(
                url("file:///common.yaml"),
                "openapi: 3.1.0\ninfo: {title: common, version: '1'}\ncomponents:\n  schemas:\n    Id: {type: string}\n",
            )
            .with(url("file:///widget.yaml"), "Widget: {type: object}\n");
        let workspace = Workspace::new();

        workspace
            .ensure_loaded(&url("file:///common.yaml"), &loader, None)
            .await
            .unwrap();
        workspace
            .ensure_loaded(&url("file:///widget.yaml"), &loader, None)
            .await
            .unwrap();
        // already present, no second load or registration
        workspace
            .ensure_loaded(&url("file:///widget.yaml"), &loader, None)
            .await
            .unwrap();

        assert!(workspace.document(&url("file:///common.yaml")).is_some());
        assert!(workspace.fragment(&url("file:///widget.yaml")).is_some());

        let id = workspace
            .resolve_reference(&url("file:///common.yaml"), "/components/schemas/Id")
            .unwrap();
        assert_eq!(id.node, json!({"type": "string"}));
    }

    #[tokio::test]
    async fn test_load_document_fails_hard_when_missing() {
        let workspace = Workspace::new();
        let err = workspace
            .load_document(&url("file:///missing.yaml"), &MemoryLoader::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiError::ExternalLoad { .. }));
        assert!(workspace.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_load() {
        let token = CancellationToken::new();
        token.cancel();
        let loader = MemoryLoader::new().with(url("file:///b.yaml"), "Widget: {}");

        let err = Workspace::new()
            .ensure_loaded(&url("file:///b.yaml"), &loader, Some(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiError::Cancelled));
    }
}
