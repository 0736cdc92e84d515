use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use super::component::{AnyHandle, Component, ComponentStore, Entry, Extensions, Handle};
use super::path::{Callback, Example, Header, Link, Operation, OperationType, Parameter, PathItem, RequestBody, Response};
use super::schema::Schema;
use super::security::{SecurityRequirement, SecurityScheme};
use crate::reference::ReferenceType;
use crate::registry::Registry;
use crate::workspace::Workspace;

/// Specification version of a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpecVersion {
    #[default]
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "3.1")]
    V3_1,
}

impl SpecVersion {
    /// Version string written to the `openapi` field
    pub fn as_str(self) -> &'static str {
        match self {
            SpecVersion::V3_0 => "3.0.3",
            SpecVersion::V3_1 => "3.1.0",
        }
    }
}

impl FromStr for SpecVersion {
    type Err = String;

    /// Accepts `3.0`, `3.1` and full patch versions such as `3.0.3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        match (parts.next(), parts.next()) {
            (Some("3"), Some("0")) => Ok(SpecVersion::V3_0),
            (Some("3"), Some("1")) => Ok(SpecVersion::V3_1),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecVersion::V3_0 => f.write_str("3.0"),
            SpecVersion::V3_1 => f.write_str("3.1"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Info {
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub terms_of_service: Option<String>,
    pub contact: Option<Contact>,
    pub license: Option<License>,
    pub version: String,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub name: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct License {
    pub name: String,
    /// SPDX identifier (3.1)
    pub identifier: Option<String>,
    pub url: Option<String>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Server {
    pub url: String,
    pub description: Option<String>,
    pub variables: IndexMap<String, ServerVariable>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerVariable {
    pub default: String,
    pub enum_values: Vec<String>,
    pub description: Option<String>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalDocs {
    pub url: String,
    pub description: Option<String>,
    pub extensions: Extensions,
}

/// Top-level tag declaration. Operations refer to tags by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub name: String,
    pub description: Option<String>,
    pub external_docs: Option<ExternalDocs>,
    pub extensions: Extensions,
}

impl Tag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn collect_children(&self, _out: &mut Vec<AnyHandle>) {}
}

/// Named definitions under `#/components`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    pub schemas: IndexMap<String, Handle<Schema>>,
    pub responses: IndexMap<String, Handle<Response>>,
    pub parameters: IndexMap<String, Handle<Parameter>>,
    pub examples: IndexMap<String, Handle<Example>>,
    pub request_bodies: IndexMap<String, Handle<RequestBody>>,
    pub headers: IndexMap<String, Handle<Header>>,
    pub security_schemes: IndexMap<String, Handle<SecurityScheme>>,
    pub links: IndexMap<String, Handle<Link>>,
    pub callbacks: IndexMap<String, Handle<Callback>>,
    pub path_items: IndexMap<String, Handle<PathItem>>,
    pub extensions: Extensions,
}

impl Components {
    /// Look up a named definition of the given kind
    pub fn get(&self, kind: ReferenceType, name: &str) -> Option<AnyHandle> {
        match kind {
            ReferenceType::Schema => self.schemas.get(name).map(|h| AnyHandle::Schema(*h)),
            ReferenceType::Response => self.responses.get(name).map(|h| AnyHandle::Response(*h)),
            ReferenceType::Parameter => self.parameters.get(name).map(|h| AnyHandle::Parameter(*h)),
            ReferenceType::Example => self.examples.get(name).map(|h| AnyHandle::Example(*h)),
            ReferenceType::RequestBody => {
                self.request_bodies.get(name).map(|h| AnyHandle::RequestBody(*h))
            }
            ReferenceType::Header => self.headers.get(name).map(|h| AnyHandle::Header(*h)),
            ReferenceType::SecurityScheme => self
                .security_schemes
                .get(name)
                .map(|h| AnyHandle::SecurityScheme(*h)),
            ReferenceType::Link => self.links.get(name).map(|h| AnyHandle::Link(*h)),
            ReferenceType::Callback => self.callbacks.get(name).map(|h| AnyHandle::Callback(*h)),
            ReferenceType::PathItem => self.path_items.get(name).map(|h| AnyHandle::PathItem(*h)),
            ReferenceType::Tag => None,
        }
    }

    /// Every named definition in declaration order, grouped by kind
    pub fn definitions(&self) -> Vec<(String, AnyHandle)> {
        fn push<T>(
            out: &mut Vec<(String, AnyHandle)>,
            map: &IndexMap<String, Handle<T>>,
            wrap: fn(Handle<T>) -> AnyHandle,
        ) {
            out.extend(map.iter().map(|(name, h)| (name.clone(), wrap(*h))));
        }

        let mut out = Vec::new();
        push(&mut out, &self.schemas, AnyHandle::Schema);
        push(&mut out, &self.responses, AnyHandle::Response);
        push(&mut out, &self.parameters, AnyHandle::Parameter);
        push(&mut out, &self.examples, AnyHandle::Example);
        push(&mut out, &self.request_bodies, AnyHandle::RequestBody);
        push(&mut out, &self.headers, AnyHandle::Header);
        push(&mut out, &self.security_schemes, AnyHandle::SecurityScheme);
        push(&mut out, &self.links, AnyHandle::Link);
        push(&mut out, &self.callbacks, AnyHandle::Callback);
        push(&mut out, &self.path_items, AnyHandle::PathItem);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.definitions().is_empty() && self.extensions.is_empty()
    }
}

/// Root aggregate of a parsed OpenAPI description.
///
/// The typed fields hold handles into [`ComponentStore`]; read them through
/// [`Document::get`], which follows resolved references.
#[derive(Debug, Clone)]
pub struct Document {
    pub version: SpecVersion,
    pub info: Info,
    pub json_schema_dialect: Option<String>,
    pub servers: Vec<Server>,
    pub paths: IndexMap<String, Handle<PathItem>>,
    pub webhooks: IndexMap<String, Handle<PathItem>>,
    pub components: Components,
    pub security: Vec<SecurityRequirement>,
    pub tags: Vec<Handle<Tag>>,
    pub external_docs: Option<ExternalDocs>,
    pub extensions: Extensions,

    pub(crate) store: ComponentStore,
    pub(crate) registry: Registry,
    pub(crate) raw: Value,
    pub(crate) location: Url,
    pub(crate) workspace: Option<Arc<Workspace>>,
}

impl Document {
    /// An empty document at `location`
    pub fn new(location: Url, version: SpecVersion) -> Self {
        Self {
            version,
            info: Info::default(),
            json_schema_dialect: None,
            servers: Vec::new(),
            paths: IndexMap::new(),
            webhooks: IndexMap::new(),
            components: Components::default(),
            security: Vec::new(),
            tags: Vec::new(),
            external_docs: None,
            extensions: Extensions::new(),
            store: ComponentStore::new(),
            registry: Registry::new(),
            raw: Value::Null,
            location,
            workspace: None,
        }
    }

    /// Absolute location the document was read from
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// The parse tree the document was built from
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn workspace(&self) -> Option<&Arc<Workspace>> {
        self.workspace.as_ref()
    }

    /// Read a component, following resolved references
    pub fn get<T: Component>(&self, handle: Handle<T>) -> &T {
        self.store.get(handle)
    }

    pub fn get_mut<T: Component>(&mut self, handle: Handle<T>) -> &mut T {
        self.store.get_mut(handle)
    }

    /// The handle that actually holds the content behind `handle`
    pub fn resolve<T: Component>(&self, handle: Handle<T>) -> Handle<T> {
        self.store.resolve(handle)
    }

    pub fn entry<T: Component>(&self, handle: Handle<T>) -> &Entry<T> {
        self.store.entry(handle)
    }

    pub fn is_unresolved<T: Component>(&self, handle: Handle<T>) -> bool {
        self.store.is_unresolved(handle)
    }

    /// Named definition under `#/components`
    pub fn component<T: Component>(&self, name: &str) -> Option<Handle<T>> {
        self.components.get(T::KIND, name).and_then(T::from_any)
    }

    pub fn path_item(&self, path: &str) -> Option<&PathItem> {
        self.paths.get(path).map(|h| self.get(*h))
    }

    pub fn operation(&self, path: &str, method: OperationType) -> Option<&Operation> {
        self.path_item(path).and_then(|item| item.operation(method))
    }

    /// Top-level tag declaration by name
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().map(|h| self.get(*h)).find(|tag| tag.name == name)
    }

    /// Starting points of every walk over the object graph
    pub fn roots(&self) -> Vec<AnyHandle> {
        let mut roots: Vec<AnyHandle> = Vec::new();
        roots.extend(self.paths.values().map(|h| AnyHandle::PathItem(*h)));
        roots.extend(self.webhooks.values().map(|h| AnyHandle::PathItem(*h)));
        roots.extend(self.components.definitions().into_iter().map(|(_, h)| h));
        roots.extend(self.tags.iter().map(|h| AnyHandle::Tag(*h)));
        for requirement in &self.security {
            requirement.collect_children(&mut roots);
        }
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_version_parses_patch_versions() {
        assert_eq!("3.0.3".parse::<SpecVersion>(), Ok(SpecVersion::V3_0));
        assert_eq!("3.1.0".parse::<SpecVersion>(), Ok(SpecVersion::V3_1));
        assert_eq!("3.1".parse::<SpecVersion>(), Ok(SpecVersion::V3_1));
        assert!("2.0".parse::<SpecVersion>().is_err());
    }

    #[test]
    fn test_component_lookup_by_kind() {
        let mut doc = Document::new(Url::parse("file:///api.yaml").unwrap(), SpecVersion::V3_1);
        let pet = doc.store.insert(Schema::default());
        doc.components.schemas.insert("Pet".to_string(), pet);

        assert_eq!(doc.component::<Schema>("Pet"), Some(pet));
        assert_eq!(doc.component::<Response>("Pet"), None);
        assert_eq!(doc.roots(), vec![AnyHandle::Schema(pet)]);
    }
}
