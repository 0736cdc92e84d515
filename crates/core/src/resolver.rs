//! Second pass: linking placeholders to their targets
//!
//! The resolver walks the graph from the document roots and links every
//! unresolved placeholder it meets. Targets inside the document come from its
//! registry or, for bare JSON pointers, are built from the parse tree. Under
//! [`ResolutionPolicy::Full`] targets in other documents are loaded into the
//! workspace and imported into the local arenas. Failures become diagnostics;
//! only cancellation aborts.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{OpenApiError, Result};
use crate::loader::ExternalLoader;
use crate::model::{with_handle, AnyHandle, Component, Document, Handle, Tag};
use crate::reader::builder::{Builder, FromNode};
use crate::reader::{ResolutionPolicy, DEFAULT_MAX_EXTERNAL_DEPTH};
use crate::reference::{registry_key, ReferenceDescriptor, ReferenceType};
use crate::walk::Traversal;
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub policy: ResolutionPolicy,
    pub loader: Option<Arc<dyn ExternalLoader>>,
    pub max_external_depth: usize,
    pub cancellation: Option<CancellationToken>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            policy: ResolutionPolicy::LocalOnly,
            loader: None,
            max_external_depth: DEFAULT_MAX_EXTERNAL_DEPTH,
            cancellation: None,
        }
    }
}

/// What is left to do for a placeholder after looking inside the document
enum Step {
    Done,
    External(Url),
}

/// Reference state of a placeholder, copied out of its arena slot
struct Pending {
    descriptor: ReferenceDescriptor,
    origin: Url,
    site: String,
    depth: usize,
}

#[derive(Debug)]
pub struct Resolver {
    options: ResolveOptions,
    /// Locations that failed to load, with the cause
    failed: HashMap<Url, String>,
    linked: usize,
}

/// Link every reference that targets the document itself. Never loads.
pub(crate) fn resolve_local(document: &mut Document, diagnostics: &mut Diagnostics) {
    let mut resolver = Resolver::new(ResolveOptions::default());
    let mut traversal = Traversal::new(document.roots());
    while let Some(handle) = traversal.next() {
        if document.store.is_entry_unresolved(handle) {
            with_handle!(handle, |h| {
                resolver.resolve_in_document(document, h, diagnostics);
            });
        }
        traversal.descend(&document.store, handle);
    }
    debug!(location = %document.location, linked = resolver.linked, "resolved local references");
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            failed: HashMap::new(),
            linked: 0,
        }
    }

    /// Number of placeholders linked so far
    pub fn linked(&self) -> usize {
        self.linked
    }

    /// Resolve every reachable placeholder of `document`.
    ///
    /// Running it again on a resolved graph changes nothing. Returns
    /// `Err(Cancelled)` when the token fires; links made so far stay valid.
    pub async fn resolve(&mut self, document: &mut Document, diagnostics: &mut Diagnostics) -> Result<()> {
        let full = self.options.policy == ResolutionPolicy::Full;
        if full && document.workspace.is_none() {
            document.workspace = Some(Arc::new(Workspace::new()));
        }

        let mut traversal = Traversal::new(document.roots());
        while let Some(handle) = traversal.next() {
            self.check_cancelled()?;
            if document.store.is_entry_unresolved(handle) {
                with_handle!(handle, |h| {
                    if let Step::External(location) = self.resolve_in_document(document, h, diagnostics) {
                        if full {
                            self.resolve_external(document, h, location, diagnostics).await?;
                        }
                    }
                });
            }
            traversal.descend(&document.store, handle);
        }

        debug!(
            location = %document.location,
            linked = self.linked,
            policy = ?self.options.policy,
            "resolved references"
        );
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.options.cancellation {
            Some(token) if token.is_cancelled() => Err(OpenApiError::Cancelled),
            _ => Ok(()),
        }
    }

    fn pending<T: Component>(document: &Document, handle: Handle<T>) -> Option<Pending> {
        let entry = document.store.entry(handle);
        Some(Pending {
            descriptor: entry.reference()?.clone(),
            origin: entry.origin().cloned().unwrap_or_else(|| document.location.clone()),
            site: entry.site().unwrap_or("#").to_string(),
            depth: entry.depth(),
        })
    }

    /// Try the document's own registry, `$id` table and parse tree
    fn resolve_in_document<T: FromNode>(
        &mut self,
        document: &mut Document,
        handle: Handle<T>,
        diagnostics: &mut Diagnostics,
    ) -> Step {
        let Some(pending) = Self::pending(document, handle) else {
            return Step::Done;
        };
        let location = match pending.descriptor.target_location(&pending.origin) {
            Ok(location) => location,
            Err(err) => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::MalformedReference {
                        reference: pending.descriptor.to_string(),
                        reason: err.to_string(),
                    },
                    pending.site,
                ));
                return Step::Done;
            }
        };
        let pointer = pending.descriptor.fragment().unwrap_or("");

        if location == document.location {
            let key = registry_key(&location, pointer);
            let registered = match pending.descriptor.anchor() {
                Some(_) => document.registry.schema_by_id(&key),
                None => document.registry.get(&key),
            };
            if let Some(entry) = registered {
                let found = entry.handle;
                self.link_any(document, handle, found, &pending, diagnostics);
            } else if T::KIND == ReferenceType::Tag {
                self.undeclared_tag(document, handle, &pending, diagnostics);
            } else if let Some(target) = document.store.imported::<T>(&key) {
                self.link(document, handle, target, &pending, diagnostics);
            } else if let Some(node) = document.raw.pointer(pointer).cloned() {
                let base = document.location.clone();
                let version = document.version;
                let built = Builder::new(&mut document.store, diagnostics, base, version, pending.depth)
                    .component::<T>(&node, pointer);
                if let Some(target) = built {
                    document.store.record_import(key, target);
                    self.link(document, handle, target, &pending, diagnostics);
                }
            } else {
                unresolved(diagnostics, &pending, None);
            }
            return Step::Done;
        }

        if T::KIND == ReferenceType::Schema {
            let uri = match pending.descriptor.fragment() {
                Some(fragment) => registry_key(&location, fragment),
                None => location.to_string(),
            };
            if let Some(entry) = document.registry.schema_by_id(&uri) {
                let found = entry.handle;
                self.link_any(document, handle, found, &pending, diagnostics);
                return Step::Done;
            }
        }

        Step::External(location)
    }

    /// Load the target's document into the workspace and import the node
    async fn resolve_external<T: FromNode>(
        &mut self,
        document: &mut Document,
        handle: Handle<T>,
        location: Url,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let Some(pending) = Self::pending(document, handle) else {
            return Ok(());
        };

        let hops = pending.depth + usize::from(location != pending.origin);
        if hops > self.options.max_external_depth {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::ExternalDepthExceeded {
                    reference: pending.descriptor.to_string(),
                    max_depth: self.options.max_external_depth,
                },
                pending.site,
            ));
            return Ok(());
        }

        let workspace = match &document.workspace {
            Some(workspace) => workspace.clone(),
            None => return Ok(()),
        };

        if !workspace.contains(&location) {
            if let Some(cause) = self.failed.get(&location) {
                unresolved(diagnostics, &pending, Some(cause.clone()));
                return Ok(());
            }
            let Some(loader) = self.options.loader.clone() else {
                let cause = "no loader configured".to_string();
                self.failed.insert(location, cause.clone());
                unresolved(diagnostics, &pending, Some(cause));
                return Ok(());
            };

            let loaded = workspace
                .ensure_loaded(&location, loader.as_ref(), self.options.cancellation.as_ref())
                .await;
            match loaded {
                Ok(()) => {}
                Err(OpenApiError::Cancelled) => return Err(OpenApiError::Cancelled),
                Err(err) => {
                    let cause = match err {
                        OpenApiError::ExternalLoad { source, .. } => source.to_string(),
                        other => other.to_string(),
                    };
                    warn!(%location, %cause, "failed to load external document");
                    self.failed.insert(location, cause.clone());
                    unresolved(diagnostics, &pending, Some(cause));
                    return Ok(());
                }
            }
        }

        let pointer = pending.descriptor.fragment().unwrap_or("");
        match workspace.resolve_reference(&location, pointer) {
            Some(found) => {
                // Every reference to one foreign node shares the slot built for it
                let key = registry_key(&found.location, &found.pointer);
                if let Some(target) = document.store.imported::<T>(&key) {
                    self.link(document, handle, target, &pending, diagnostics);
                    return Ok(());
                }

                let version = workspace
                    .document(&found.location)
                    .map(|foreign| foreign.version)
                    .unwrap_or(document.version);
                let built = Builder::new(&mut document.store, diagnostics, found.location, version, hops)
                    .foreign()
                    .component::<T>(&found.node, &found.pointer);
                if let Some(target) = built {
                    document.store.record_import(key, target);
                    self.link(document, handle, target, &pending, diagnostics);
                }
            }
            None if T::KIND == ReferenceType::Tag => {
                self.undeclared_tag(document, handle, &pending, diagnostics)
            }
            None => unresolved(diagnostics, &pending, None),
        }
        Ok(())
    }

    fn link_any<T: Component>(
        &mut self,
        document: &mut Document,
        placeholder: Handle<T>,
        found: AnyHandle,
        pending: &Pending,
        diagnostics: &mut Diagnostics,
    ) {
        match T::from_any(found) {
            Some(target) => self.link(document, placeholder, target, pending, diagnostics),
            None => diagnostics.push(Diagnostic::error(
                DiagnosticKind::MalformedReference {
                    reference: pending.descriptor.to_string(),
                    reason: format!("expected a {}, found a {}", T::KIND, found.kind()),
                },
                pending.site.clone(),
            )),
        }
    }

    fn link<T: Component>(
        &mut self,
        document: &mut Document,
        placeholder: Handle<T>,
        target: Handle<T>,
        pending: &Pending,
        diagnostics: &mut Diagnostics,
    ) {
        if document.store.would_cycle(placeholder, target) {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::CircularAlias {
                    reference: pending.descriptor.to_string(),
                },
                pending.site.clone(),
            ));
            return;
        }
        document.store.link(placeholder, target);
        self.linked += 1;
    }

    /// Operations may name tags that were never declared. Link them to a
    /// bare tag so the name survives.
    fn undeclared_tag<T: Component>(
        &mut self,
        document: &mut Document,
        placeholder: Handle<T>,
        pending: &Pending,
        diagnostics: &mut Diagnostics,
    ) {
        let name = pending.descriptor.id().to_string();
        diagnostics.push(Diagnostic::warning(
            DiagnosticKind::UndeclaredTag { name: name.clone() },
            pending.site.clone(),
        ));
        let tag = document.store.insert(Tag::named(name));
        if let Some(target) = T::from_any(AnyHandle::Tag(tag)) {
            self.link(document, placeholder, target, pending, diagnostics);
        }
    }
}

fn unresolved(diagnostics: &mut Diagnostics, pending: &Pending, cause: Option<String>) {
    diagnostics.push(Diagnostic::error(
        DiagnosticKind::UnresolvedReference {
            reference: pending.descriptor.to_string(),
            cause,
        },
        pending.site.clone(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Schema, SpecVersion};
    use crate::reader::builder::build_document;
    use serde_json::json;

    fn local(raw: serde_json::Value) -> (Document, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let location = Url::parse("file:///api.yaml").unwrap();
        let mut document = build_document(raw, location, SpecVersion::V3_1, &mut diagnostics);
        resolve_local(&mut document, &mut diagnostics);
        (document, diagnostics)
    }

    fn spec(components: serde_json::Value) -> serde_json::Value {
        json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "components": components
        })
    }

    #[test]
    fn test_self_alias_is_circular() {
        let (doc, diagnostics) = local(spec(json!({"schemas": {
            "A": {"$ref": "#/components/schemas/A"}
        }})));

        assert_eq!(diagnostics.with_code("oas::circular_alias").count(), 1);
        assert!(doc.is_unresolved(doc.component::<Schema>("A").unwrap()));
    }

    #[test]
    fn test_alias_chain_loop_is_circular() {
        let (_, diagnostics) = local(spec(json!({"schemas": {
            "A": {"$ref": "#/components/schemas/B"},
            "B": {"$ref": "#/components/schemas/A"}
        }})));

        assert_eq!(diagnostics.with_code("oas::circular_alias").count(), 1);
    }

    #[test]
    fn test_alias_chain_resolves_to_content() {
        let (doc, diagnostics) = local(spec(json!({"schemas": {
            "A": {"$ref": "#/components/schemas/B"},
            "B": {"$ref": "#/components/schemas/C"},
            "C": {"title": "C"}
        }})));

        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let a = doc.component::<Schema>("A").unwrap();
        assert_eq!(doc.get(a).title.as_deref(), Some("C"));
        assert_eq!(doc.resolve(a), doc.component::<Schema>("C").unwrap());
    }

    #[test]
    fn test_bare_pointer_links_to_inline_component() {
        let (doc, diagnostics) = local(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/a": {"get": {"parameters": [
                {"name": "limit", "in": "query"},
                {"$ref": "#/paths/~1a/get/parameters/0"}
            ]}}}
        }));

        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let operation = doc.operation("/a", crate::model::OperationType::Get).unwrap();
        let params = &operation.parameters;
        assert_eq!(doc.resolve(params[1]), params[0]);
    }

    #[test]
    fn test_pointer_outside_registry_is_built_once() {
        let (doc, diagnostics) = local(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "x-types": {"Id": {"type": "string"}},
            "components": {"schemas": {
                "A": {"properties": {
                    "plain": {"$ref": "#/x-types/Id"},
                    "described": {"$ref": "#/x-types/Id", "description": "Identifier"}
                }}
            }}
        }));

        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let a = doc.get(doc.component::<Schema>("A").unwrap());
        let plain = a.properties["plain"];
        let described = a.properties["described"];
        assert_ne!(plain, described);
        assert_eq!(doc.resolve(plain), doc.resolve(described));
    }

    #[test]
    fn test_pointer_to_wrong_kind_is_malformed() {
        let (_, diagnostics) = local(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/a": {"get": {
                "parameters": [{"name": "limit", "in": "query"}],
                "responses": {"200": {"description": "ok", "content": {"application/json": {
                    "schema": {"$ref": "#/paths/~1a/get/parameters/0"}
                }}}}
            }}}
        }));

        assert_eq!(diagnostics.with_code("oas::malformed_reference").count(), 1);
    }

    #[test]
    fn test_missing_target_is_unresolved() {
        let (_, diagnostics) = local(spec(json!({"schemas": {
            "A": {"properties": {"b": {"$ref": "#/components/schemas/Missing"}}}
        }})));

        let unresolved: Vec<_> = diagnostics.with_code("oas::unresolved_reference").collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].pointer, "#/components/schemas/A/properties/b");
    }

    #[test]
    fn test_undeclared_tag_warns_and_keeps_name() {
        let (doc, diagnostics) = local(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "tags": [{"name": "pets", "description": "Pets"}],
            "paths": {"/a": {"get": {"tags": ["pets", "store"]}}}
        }));

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.warning_count(), 1);
        let operation = doc.operation("/a", crate::model::OperationType::Get).unwrap();
        assert_eq!(doc.get(operation.tags[0]).description.as_deref(), Some("Pets"));
        assert_eq!(doc.get(operation.tags[1]).name, "store");
    }

    #[test]
    fn test_schema_id_reference() {
        let (doc, diagnostics) = local(spec(json!({"schemas": {
            "Pet": {"$id": "https://example.com/pet.json", "title": "Pet"},
            "Owner": {"properties": {"pet": {"$ref": "https://example.com/pet.json"}}}
        }})));

        assert!(diagnostics.is_empty(), "{}", diagnostics);
        let owner = doc.get(doc.component::<Schema>("Owner").unwrap());
        assert_eq!(doc.get(owner.properties["pet"]).title.as_deref(), Some("Pet"));
    }

    #[test]
    fn test_anchor_reference() {
        let (doc, diagnostics) = local(spec(json!({"schemas": {
            "Tree": {"properties": {
                "root": {"$anchor": "node", "title": "Node"},
                "children": {"items": {"$ref": "#node"}}
            }},
            "Leaf": {"properties": {"parent": {"$ref": "#node"}}},
            "Lost": {"properties": {"other": {"$ref": "#missing"}}}
        }})));

        let tree = doc.get(doc.component::<Schema>("Tree").unwrap());
        let root = tree.properties["root"];
        let items = doc.get(tree.properties["children"]).items.unwrap();
        assert_eq!(doc.resolve(items), root);

        let leaf = doc.get(doc.component::<Schema>("Leaf").unwrap());
        assert_eq!(doc.resolve(leaf.properties["parent"]), root);

        let unresolved: Vec<_> = diagnostics.with_code("oas::unresolved_reference").collect();
        assert_eq!(unresolved.len(), 1, "{}", diagnostics);
        assert_eq!(diagnostics.len(), 1);
    }
}
