//! First pass: node tree to typed components
//!
//! Every object that carries `$ref` becomes a shared placeholder; everything
//! else is built into the component arenas. Definitions under `#/components`
//! and every concrete component are registered by pointer so the second pass
//! can link placeholders to them. Problems are pushed as diagnostics and the
//! offending field is treated as absent.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;
use url::Url;

use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::OpenApiError;
use crate::model::{
    AdditionalProperties, Callback, Component, ComponentStore, Components, Contact, Discriminator,
    Document, Encoding, Example, ExternalDocs, Handle, Header, Info, License, Link,
    MediaType, OAuthFlow, OAuthFlows, Operation, OperationType, Parameter, PathItem, RequestBody,
    Response, Schema, SchemaType, SecurityRequirement, SecurityScheme, Server, ServerVariable,
    SpecVersion, Tag,
};
use crate::reference::{escape_segment, is_anchor_name, registry_key, ReferenceDescriptor, ReferenceType};
use crate::registry::{Registry, RegistryEntry};

/// Components that can be built from an object node
pub(crate) trait FromNode: Component {
    fn from_node(builder: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self;

    /// Boolean form of the component, if the kind has one
    fn from_bool(_builder: &mut Builder<'_>, _value: bool) -> Option<Self> {
        None
    }

    /// `$id` to index the component by
    fn schema_id(&self) -> Option<&str> {
        None
    }

    /// `$anchor` to index the component by, relative to its `$id`
    fn schema_anchor(&self) -> Option<&str> {
        None
    }
}

pub(crate) struct Builder<'a> {
    store: &'a mut ComponentStore,
    registry: Option<&'a mut Registry>,
    diagnostics: &'a mut Diagnostics,
    base: Url,
    version: SpecVersion,
    depth: usize,
    /// Prefix diagnostic pointers with the base location
    foreign: bool,
}

/// Build the typed graph of a whole document. References stay unresolved.
pub(crate) fn build_document(
    raw: Value,
    location: Url,
    version: SpecVersion,
    diagnostics: &mut Diagnostics,
) -> Document {
    let mut store = ComponentStore::new();
    let mut registry = Registry::new();
    let mut document = Document::new(location.clone(), version);

    match raw.as_object() {
        Some(root) => {
            let mut builder =
                Builder::new(&mut store, diagnostics, location, version, 0).with_registry(&mut registry);
            builder.fill_document(&mut document, root);
        }
        None => diagnostics.push(Diagnostic::error(
            DiagnosticKind::TypeMismatch {
                field: "document".to_string(),
                expected: "object".to_string(),
                got: kind_of(&raw).to_string(),
            },
            "#",
        )),
    }

    document.store = store;
    document.registry = registry;
    document.raw = raw;
    document
}

impl<'a> Builder<'a> {
    pub(crate) fn new(
        store: &'a mut ComponentStore,
        diagnostics: &'a mut Diagnostics,
        base: Url,
        version: SpecVersion,
        depth: usize,
    ) -> Self {
        Self {
            store,
            registry: None,
            diagnostics,
            base,
            version,
            depth,
            foreign: false,
        }
    }

    /// Register definitions, concrete components and `$id`s while building
    pub(crate) fn with_registry(mut self, registry: &'a mut Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Content comes from another document than the one being built
    pub(crate) fn foreign(mut self) -> Self {
        self.foreign = true;
        self
    }

    /// Build a component of kind `T` from `node`, found at pointer `at`
    pub(crate) fn component<T: FromNode>(&mut self, node: &Value, at: &str) -> Option<Handle<T>> {
        let value = match node {
            Value::Object(map) => {
                if let Some(raw) = map.get("$ref") {
                    return self.reference::<T>(map, raw, at);
                }
                T::from_node(self, map, at)
            }
            Value::Bool(flag) => match T::from_bool(self, *flag) {
                Some(value) => value,
                None => {
                    self.mismatch(at, "object", node);
                    return None;
                }
            },
            other => {
                self.mismatch(at, "object", other);
                return None;
            }
        };

        let id = value.schema_id().map(str::to_string);
        let anchor = value.schema_anchor().map(str::to_string);
        let handle = self.store.insert(value);
        self.register(at, T::into_any(handle));
        if let Some(id) = &id {
            self.register_schema_id(id, T::into_any(handle), at);
        }
        if let Some(anchor) = anchor {
            self.register_anchor(id.as_deref(), &anchor, T::into_any(handle), at);
        }
        Some(handle)
    }

    fn reference<T: FromNode>(&mut self, map: &Map<String, Value>, raw: &Value, at: &str) -> Option<Handle<T>> {
        let site = self.locate(at);
        let Some(raw) = raw.as_str() else {
            self.mismatch(&format!("{}/$ref", at), "string", raw);
            return None;
        };

        let descriptor = match ReferenceDescriptor::parse(raw, T::KIND) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.malformed(raw, err, &site);
                return None;
            }
        };

        // Reference-object overrides only exist from 3.1 on
        let descriptor = if self.version == SpecVersion::V3_1 {
            let summary = map.get("summary").and_then(Value::as_str).map(str::to_string);
            let description = map.get("description").and_then(Value::as_str).map(str::to_string);
            descriptor.with_overrides(summary, description)
        } else {
            descriptor
        };

        match self
            .store
            .get_or_create_placeholder::<T>(descriptor, &self.base, &site, self.depth)
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                self.malformed(raw, err, &site);
                None
            }
        }
    }

    /// Placeholder for a component referred to by name only (tags, security schemes)
    fn named_reference<T: Component>(&mut self, name: &str, at: &str) -> Option<Handle<T>> {
        let site = self.locate(at);
        let descriptor = ReferenceDescriptor::local(T::KIND, name);
        match self
            .store
            .get_or_create_placeholder::<T>(descriptor, &self.base, &site, self.depth)
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                self.malformed(name, err, &site);
                None
            }
        }
    }

    fn register(&mut self, at: &str, handle: crate::model::AnyHandle) {
        let Some(registry) = self.registry.as_deref_mut() else {
            return;
        };
        let key = registry_key(&self.base, at);
        if registry.register(key.clone(), RegistryEntry::new(handle, at)).is_err() {
            let pointer = self.locate(at);
            self.diagnostics
                .push(Diagnostic::error(DiagnosticKind::DuplicateKey { key }, pointer));
        }
    }

    fn register_schema_id(&mut self, id: &str, handle: crate::model::AnyHandle, at: &str) {
        if self.registry.is_none() {
            return;
        }
        let uri = match self.base.join(id) {
            Ok(uri) => uri.to_string(),
            Err(_) => {
                self.invalid(&format!("{}/$id", at), "not a valid URI reference");
                return;
            }
        };
        let pointer = self.locate(at);
        if let Some(registry) = self.registry.as_deref_mut() {
            if registry.register_schema_id(uri.clone(), RegistryEntry::new(handle, at)).is_err() {
                self.diagnostics
                    .push(Diagnostic::error(DiagnosticKind::DuplicateKey { key: uri }, pointer));
            }
        }
    }

    /// Anchors resolve against the schema's own `$id`, or the document
    fn register_anchor(&mut self, id: Option<&str>, anchor: &str, handle: crate::model::AnyHandle, at: &str) {
        if self.registry.is_none() {
            return;
        }
        if !is_anchor_name(anchor) {
            self.invalid(&format!("{}/$anchor", at), "not a valid anchor name");
            return;
        }
        let resource = match id.map(|id| self.base.join(id)) {
            Some(Ok(resource)) => resource,
            Some(Err(_)) => return,
            None => self.base.clone(),
        };
        let uri = registry_key(&resource, anchor);
        let pointer = self.locate(at);
        if let Some(registry) = self.registry.as_deref_mut() {
            if registry.register_schema_id(uri.clone(), RegistryEntry::new(handle, at)).is_err() {
                self.diagnostics
                    .push(Diagnostic::error(DiagnosticKind::DuplicateKey { key: uri }, pointer));
            }
        }
    }

    fn fill_document(&mut self, document: &mut Document, root: &Map<String, Value>) {
        if !root.contains_key("info") {
            self.missing("", "info");
        }

        for (key, value) in root {
            let at = child("", key);
            match key.as_str() {
                "openapi" => {}
                "info" => {
                    if let Some(info) = self.object(value, &at) {
                        document.info = self.info(info, &at);
                    }
                }
                "jsonSchemaDialect" => document.json_schema_dialect = self.text(value, &at),
                "servers" => document.servers = self.servers(value, &at),
                "paths" => document.paths = self.map_of::<PathItem>(value, &at),
                "webhooks" => document.webhooks = self.map_of::<PathItem>(value, &at),
                "components" => {
                    if let Some(components) = self.object(value, &at) {
                        document.components = self.components(components, &at);
                    }
                }
                "security" => document.security = self.security(value, &at),
                "tags" => document.tags = self.tag_declarations(value, &at),
                "externalDocs" => document.external_docs = self.external_docs(value, &at),
                k if k.starts_with("x-") => {
                    document.extensions.insert(key.clone(), value.clone());
                }
                _ => trace!(pointer = %at, "ignoring unknown document field"),
            }
        }
    }

    fn info(&mut self, node: &Map<String, Value>, at: &str) -> Info {
        let mut info = Info::default();
        for field in ["title", "version"] {
            if !node.contains_key(field) {
                self.missing(at, field);
            }
        }
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "title" => info.title = self.text(value, &at).unwrap_or_default(),
                "summary" => info.summary = self.text(value, &at),
                "description" => info.description = self.text(value, &at),
                "termsOfService" => info.terms_of_service = self.text(value, &at),
                "version" => info.version = self.text(value, &at).unwrap_or_default(),
                "contact" => {
                    if let Some(node) = self.object(value, &at) {
                        let mut contact = Contact::default();
                        for (key, value) in node {
                            let at = child(&at, key);
                            match key.as_str() {
                                "name" => contact.name = self.text(value, &at),
                                "url" => contact.url = self.text(value, &at),
                                "email" => contact.email = self.text(value, &at),
                                k if k.starts_with("x-") => {
                                    contact.extensions.insert(key.clone(), value.clone());
                                }
                                _ => {}
                            }
                        }
                        info.contact = Some(contact);
                    }
                }
                "license" => {
                    if let Some(node) = self.object(value, &at) {
                        if !node.contains_key("name") {
                            self.missing(&at, "name");
                        }
                        let mut license = License::default();
                        for (key, value) in node {
                            let at = child(&at, key);
                            match key.as_str() {
                                "name" => license.name = self.text(value, &at).unwrap_or_default(),
                                "identifier" => license.identifier = self.text(value, &at),
                                "url" => license.url = self.text(value, &at),
                                k if k.starts_with("x-") => {
                                    license.extensions.insert(key.clone(), value.clone());
                                }
                                _ => {}
                            }
                        }
                        info.license = Some(license);
                    }
                }
                k if k.starts_with("x-") => {
                    info.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        info
    }

    fn components(&mut self, node: &Map<String, Value>, at: &str) -> Components {
        let mut components = Components::default();
        for (key, value) in node {
            let at = child(at, key);
            match ReferenceType::from_component_key(key) {
                Some(ReferenceType::Schema) => components.schemas = self.definitions(value, &at),
                Some(ReferenceType::Response) => components.responses = self.definitions(value, &at),
                Some(ReferenceType::Parameter) => components.parameters = self.definitions(value, &at),
                Some(ReferenceType::Example) => components.examples = self.definitions(value, &at),
                Some(ReferenceType::RequestBody) => {
                    components.request_bodies = self.definitions(value, &at)
                }
                Some(ReferenceType::Header) => components.headers = self.definitions(value, &at),
                Some(ReferenceType::SecurityScheme) => {
                    components.security_schemes = self.definitions(value, &at)
                }
                Some(ReferenceType::Link) => components.links = self.definitions(value, &at),
                Some(ReferenceType::Callback) => components.callbacks = self.definitions(value, &at),
                Some(ReferenceType::PathItem) => components.path_items = self.definitions(value, &at),
                Some(ReferenceType::Tag) | None if key.starts_with("x-") => {
                    components.extensions.insert(key.clone(), value.clone());
                }
                Some(ReferenceType::Tag) | None => {
                    trace!(pointer = %at, "ignoring unknown components field")
                }
            }
        }
        components
    }

    /// Named definitions. Aliases (`$ref` definitions) are registered too, so
    /// a reference to an alias links to the alias's own placeholder.
    fn definitions<T: FromNode>(&mut self, value: &Value, at: &str) -> IndexMap<String, Handle<T>> {
        let mut out = IndexMap::new();
        let Some(node) = self.object(value, at) else {
            return out;
        };
        for (name, value) in node {
            let at = child(at, name);
            if let Some(handle) = self.component::<T>(value, &at) {
                if self.store.entry(handle).is_reference() {
                    self.register(&at, T::into_any(handle));
                }
                out.insert(name.clone(), handle);
            }
        }
        out
    }

    /// Top-level tag list, registered by name at `/tags/<name>`
    fn tag_declarations(&mut self, value: &Value, at: &str) -> Vec<Handle<Tag>> {
        let mut out = Vec::new();
        for (index, node) in self.array(value, at).iter().enumerate() {
            let at = format!("{}/{}", at, index);
            let Some(map) = self.object(node, &at) else {
                continue;
            };
            let tag = Tag::from_node(self, map, &at);
            let pointer = ReferenceType::Tag.definition_pointer(&tag.name);
            let handle = self.store.insert(tag);
            if let Some(registry) = self.registry.as_deref_mut() {
                let key = registry_key(&self.base, &pointer);
                if registry
                    .register(key.clone(), RegistryEntry::new(Tag::into_any(handle), at.clone()))
                    .is_err()
                {
                    let located = self.locate(&at);
                    self.diagnostics
                        .push(Diagnostic::error(DiagnosticKind::DuplicateKey { key }, located));
                }
            }
            out.push(handle);
        }
        out
    }

    fn map_of<T: FromNode>(&mut self, value: &Value, at: &str) -> IndexMap<String, Handle<T>> {
        let mut out = IndexMap::new();
        if let Some(node) = self.object(value, at) {
            for (key, value) in node {
                if let Some(handle) = self.component::<T>(value, &child(at, key)) {
                    out.insert(key.clone(), handle);
                }
            }
        }
        out
    }

    fn list_of<T: FromNode>(&mut self, value: &Value, at: &str) -> Vec<Handle<T>> {
        let mut out = Vec::new();
        for (index, item) in self.array(value, at).iter().enumerate() {
            if let Some(handle) = self.component::<T>(item, &format!("{}/{}", at, index)) {
                out.push(handle);
            }
        }
        out
    }

    fn operation(&mut self, node: &Map<String, Value>, at: &str) -> Operation {
        let mut operation = Operation::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "tags" => {
                    for (index, name) in self.texts(value, &at).into_iter().enumerate() {
                        let site = format!("{}/{}", at, index);
                        if let Some(handle) = self.named_reference::<Tag>(&name, &site) {
                            operation.tags.push(handle);
                        }
                    }
                }
                "summary" => operation.summary = self.text(value, &at),
                "description" => operation.description = self.text(value, &at),
                "externalDocs" => operation.external_docs = self.external_docs(value, &at),
                "operationId" => operation.operation_id = self.text(value, &at),
                "parameters" => operation.parameters = self.list_of::<Parameter>(value, &at),
                "requestBody" => operation.request_body = self.component::<RequestBody>(value, &at),
                "responses" => operation.responses = self.map_of::<Response>(value, &at),
                "callbacks" => operation.callbacks = self.map_of::<Callback>(value, &at),
                "deprecated" => operation.deprecated = self.flag(value, &at).unwrap_or(false),
                "security" => operation.security = Some(self.security(value, &at)),
                "servers" => operation.servers = self.servers(value, &at),
                k if k.starts_with("x-") => {
                    operation.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        operation
    }

    fn media_types(&mut self, value: &Value, at: &str) -> IndexMap<String, MediaType> {
        let mut out = IndexMap::new();
        let Some(node) = self.object(value, at) else {
            return out;
        };
        for (media_type, value) in node {
            let at = child(at, media_type);
            let Some(node) = self.object(value, &at) else {
                continue;
            };
            let mut media = MediaType::default();
            for (key, value) in node {
                let at = child(&at, key);
                match key.as_str() {
                    "schema" => media.schema = self.component::<Schema>(value, &at),
                    "example" => media.example = Some(value.clone()),
                    "examples" => media.examples = self.map_of::<Example>(value, &at),
                    "encoding" => {
                        if let Some(node) = self.object(value, &at) {
                            for (property, value) in node {
                                let at = child(&at, property);
                                if let Some(node) = self.object(value, &at) {
                                    let encoding = self.encoding(node, &at);
                                    media.encoding.insert(property.clone(), encoding);
                                }
                            }
                        }
                    }
                    k if k.starts_with("x-") => {
                        media.extensions.insert(key.clone(), value.clone());
                    }
                    _ => {}
                }
            }
            out.insert(media_type.clone(), media);
        }
        out
    }

    fn encoding(&mut self, node: &Map<String, Value>, at: &str) -> Encoding {
        let mut encoding = Encoding::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "contentType" => encoding.content_type = self.text(value, &at),
                "headers" => encoding.headers = self.map_of::<Header>(value, &at),
                "style" => encoding.style = self.text(value, &at),
                "explode" => encoding.explode = self.flag(value, &at),
                k if k.starts_with("x-") => {
                    encoding.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        encoding
    }

    fn servers(&mut self, value: &Value, at: &str) -> Vec<Server> {
        let mut out = Vec::new();
        for (index, item) in self.array(value, at).iter().enumerate() {
            let at = format!("{}/{}", at, index);
            if let Some(node) = self.object(item, &at) {
                out.push(self.server(node, &at));
            }
        }
        out
    }

    fn server(&mut self, node: &Map<String, Value>, at: &str) -> Server {
        if !node.contains_key("url") {
            self.missing(at, "url");
        }
        let mut server = Server::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "url" => server.url = self.text(value, &at).unwrap_or_default(),
                "description" => server.description = self.text(value, &at),
                "variables" => {
                    if let Some(node) = self.object(value, &at) {
                        for (name, value) in node {
                            let at = child(&at, name);
                            if let Some(node) = self.object(value, &at) {
                                let variable = self.server_variable(node, &at);
                                server.variables.insert(name.clone(), variable);
                            }
                        }
                    }
                }
                k if k.starts_with("x-") => {
                    server.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        server
    }

    fn server_variable(&mut self, node: &Map<String, Value>, at: &str) -> ServerVariable {
        if !node.contains_key("default") {
            self.missing(at, "default");
        }
        let mut variable = ServerVariable::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "default" => variable.default = self.text(value, &at).unwrap_or_default(),
                "enum" => variable.enum_values = self.texts(value, &at),
                "description" => variable.description = self.text(value, &at),
                k if k.starts_with("x-") => {
                    variable.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        variable
    }

    fn external_docs(&mut self, value: &Value, at: &str) -> Option<ExternalDocs> {
        let node = self.object(value, at)?;
        if !node.contains_key("url") {
            self.missing(at, "url");
        }
        let mut docs = ExternalDocs::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "url" => docs.url = self.text(value, &at).unwrap_or_default(),
                "description" => docs.description = self.text(value, &at),
                k if k.starts_with("x-") => {
                    docs.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        Some(docs)
    }

    fn security(&mut self, value: &Value, at: &str) -> Vec<SecurityRequirement> {
        let mut out = Vec::new();
        for (index, item) in self.array(value, at).iter().enumerate() {
            let at = format!("{}/{}", at, index);
            let Some(node) = self.object(item, &at) else {
                continue;
            };
            let mut requirement = SecurityRequirement::default();
            for (name, scopes) in node {
                let at = child(&at, name);
                let scopes = self.texts(scopes, &at);
                if let Some(handle) = self.named_reference::<SecurityScheme>(name, &at) {
                    requirement.schemes.push((handle, scopes));
                }
            }
            out.push(requirement);
        }
        out
    }

    fn oauth_flow(&mut self, node: &Map<String, Value>, at: &str) -> OAuthFlow {
        let mut flow = OAuthFlow::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "authorizationUrl" => flow.authorization_url = self.text(value, &at),
                "tokenUrl" => flow.token_url = self.text(value, &at),
                "refreshUrl" => flow.refresh_url = self.text(value, &at),
                "scopes" => {
                    if let Some(node) = self.object(value, &at) {
                        for (scope, description) in node {
                            let text = self.text(description, &child(&at, scope)).unwrap_or_default();
                            flow.scopes.insert(scope.clone(), text);
                        }
                    }
                }
                k if k.starts_with("x-") => {
                    flow.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        flow
    }

    fn schema_types(&mut self, value: &Value, at: &str) -> Vec<SchemaType> {
        let names = match value {
            Value::String(name) => vec![name.clone()],
            Value::Array(_) => self.texts(value, at),
            other => {
                self.mismatch(at, "string or array", other);
                return Vec::new();
            }
        };
        let mut out = Vec::new();
        for name in names {
            match name.parse::<SchemaType>() {
                Ok(schema_type) => out.push(schema_type),
                Err(message) => self.invalid(at, &message),
            }
        }
        out
    }

    // Scalar helpers. A wrong type is reported and the field treated as absent.

    fn text(&mut self, value: &Value, at: &str) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                self.mismatch(at, "string", other);
                None
            }
        }
    }

    fn texts(&mut self, value: &Value, at: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (index, item) in self.array(value, at).iter().enumerate() {
            if let Some(text) = self.text(item, &format!("{}/{}", at, index)) {
                out.push(text);
            }
        }
        out
    }

    fn flag(&mut self, value: &Value, at: &str) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            other => {
                self.mismatch(at, "boolean", other);
                None
            }
        }
    }

    fn number(&mut self, value: &Value, at: &str) -> Option<f64> {
        match value.as_f64() {
            Some(n) => Some(n),
            None => {
                self.mismatch(at, "number", value);
                None
            }
        }
    }

    fn count(&mut self, value: &Value, at: &str) -> Option<u64> {
        match value.as_u64() {
            Some(n) => Some(n),
            None => {
                self.mismatch(at, "non-negative integer", value);
                None
            }
        }
    }

    fn object<'v>(&mut self, value: &'v Value, at: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.mismatch(at, "object", other);
                None
            }
        }
    }

    fn array<'v>(&mut self, value: &'v Value, at: &str) -> &'v [Value] {
        match value {
            Value::Array(items) => items,
            other => {
                self.mismatch(at, "array", other);
                &[]
            }
        }
    }

    // Diagnostics

    fn locate(&self, at: &str) -> String {
        if self.foreign {
            registry_key(&self.base, at)
        } else {
            format!("#{}", at)
        }
    }

    fn mismatch(&mut self, at: &str, expected: &str, got: &Value) {
        let pointer = self.locate(at);
        self.diagnostics.push(Diagnostic::error(
            DiagnosticKind::TypeMismatch {
                field: field_name(at),
                expected: expected.to_string(),
                got: kind_of(got).to_string(),
            },
            pointer,
        ));
    }

    fn missing(&mut self, at: &str, field: &str) {
        let pointer = self.locate(at);
        self.diagnostics.push(Diagnostic::error(
            DiagnosticKind::MissingField {
                field: field.to_string(),
            },
            pointer,
        ));
    }

    fn invalid(&mut self, at: &str, message: &str) {
        let pointer = self.locate(at);
        self.diagnostics.push(Diagnostic::error(
            DiagnosticKind::InvalidValue {
                field: field_name(at),
                message: message.to_string(),
            },
            pointer,
        ));
    }

    fn malformed(&mut self, raw: &str, err: OpenApiError, site: &str) {
        let (reference, reason) = match err {
            OpenApiError::MalformedReference { reference, reason } => (reference, reason),
            other => (raw.to_string(), other.to_string()),
        };
        self.diagnostics.push(Diagnostic::error(
            DiagnosticKind::MalformedReference { reference, reason },
            site.to_string(),
        ));
    }
}

impl FromNode for Schema {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut schema = Schema::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "$id" => schema.id = b.text(value, &at),
                "$anchor" => schema.anchor = b.text(value, &at),
                "$schema" => schema.dialect = b.text(value, &at),
                "title" => schema.title = b.text(value, &at),
                "description" => schema.description = b.text(value, &at),
                "type" => schema.schema_type = b.schema_types(value, &at),
                "format" => schema.format = b.text(value, &at),
                "nullable" => schema.nullable = b.flag(value, &at).unwrap_or(false),
                "required" => schema.required = b.texts(value, &at),
                "properties" => schema.properties = b.map_of::<Schema>(value, &at),
                "additionalProperties" => {
                    schema.additional_properties = match value {
                        Value::Bool(allowed) => Some(AdditionalProperties::Allowed(*allowed)),
                        other => b.component::<Schema>(other, &at).map(AdditionalProperties::Schema),
                    }
                }
                "items" => schema.items = b.component::<Schema>(value, &at),
                "allOf" => schema.all_of = b.list_of::<Schema>(value, &at),
                "anyOf" => schema.any_of = b.list_of::<Schema>(value, &at),
                "oneOf" => schema.one_of = b.list_of::<Schema>(value, &at),
                "not" => schema.not = b.component::<Schema>(value, &at),
                "discriminator" => {
                    if let Some(node) = b.object(value, &at) {
                        let mut discriminator = Discriminator::default();
                        for (key, value) in node {
                            let at = child(&at, key);
                            match key.as_str() {
                                "propertyName" => {
                                    discriminator.property_name = b.text(value, &at).unwrap_or_default()
                                }
                                "mapping" => {
                                    if let Some(node) = b.object(value, &at) {
                                        for (name, target) in node {
                                            if let Some(target) = b.text(target, &child(&at, name)) {
                                                discriminator.mapping.insert(name.clone(), target);
                                            }
                                        }
                                    }
                                }
                                _ => {}
                            }
                        }
                        schema.discriminator = Some(discriminator);
                    }
                }
                "enum" => schema.enum_values = b.array(value, &at).to_vec(),
                "default" => schema.default = Some(value.clone()),
                "example" => schema.example = Some(value.clone()),
                "readOnly" => schema.read_only = b.flag(value, &at).unwrap_or(false),
                "writeOnly" => schema.write_only = b.flag(value, &at).unwrap_or(false),
                "deprecated" => schema.deprecated = b.flag(value, &at).unwrap_or(false),
                "minimum" => schema.minimum = b.number(value, &at),
                "maximum" => schema.maximum = b.number(value, &at),
                "minLength" => schema.min_length = b.count(value, &at),
                "maxLength" => schema.max_length = b.count(value, &at),
                "minItems" => schema.min_items = b.count(value, &at),
                "maxItems" => schema.max_items = b.count(value, &at),
                "pattern" => schema.pattern = b.text(value, &at),
                k if k.starts_with("x-") => {
                    schema.extensions.insert(key.clone(), value.clone());
                }
                _ => {
                    schema.keywords.insert(key.clone(), value.clone());
                }
            }
        }
        schema
    }

    /// `true` accepts anything, `false` nothing
    fn from_bool(b: &mut Builder<'_>, value: bool) -> Option<Self> {
        if value {
            return Some(Schema::default());
        }
        let anything = b.store.insert(Schema::default());
        Some(Schema {
            not: Some(anything),
            ..Default::default()
        })
    }

    fn schema_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn schema_anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }
}

impl FromNode for PathItem {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut item = PathItem::default();
        for (key, value) in node {
            let at = child(at, key);
            if let Ok(method) = key.parse::<OperationType>() {
                if let Some(node) = b.object(value, &at) {
                    let operation = b.operation(node, &at);
                    item.operations.insert(method, operation);
                }
                continue;
            }
            match key.as_str() {
                "summary" => item.summary = b.text(value, &at),
                "description" => item.description = b.text(value, &at),
                "servers" => item.servers = b.servers(value, &at),
                "parameters" => item.parameters = b.list_of::<Parameter>(value, &at),
                k if k.starts_with("x-") => {
                    item.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        item
    }
}

impl FromNode for Parameter {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        for field in ["name", "in"] {
            if !node.contains_key(field) {
                b.missing(at, field);
            }
        }
        let mut parameter = Parameter::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "name" => parameter.name = b.text(value, &at).unwrap_or_default(),
                "in" => {
                    if let Some(location) = b.text(value, &at) {
                        match location.parse() {
                            Ok(location) => parameter.location = Some(location),
                            Err(message) => b.invalid(&at, &message),
                        }
                    }
                }
                "description" => parameter.description = b.text(value, &at),
                "required" => parameter.required = b.flag(value, &at).unwrap_or(false),
                "deprecated" => parameter.deprecated = b.flag(value, &at).unwrap_or(false),
                "allowEmptyValue" => parameter.allow_empty_value = b.flag(value, &at).unwrap_or(false),
                "style" => parameter.style = b.text(value, &at),
                "explode" => parameter.explode = b.flag(value, &at),
                "schema" => parameter.schema = b.component::<Schema>(value, &at),
                "example" => parameter.example = Some(value.clone()),
                "examples" => parameter.examples = b.map_of::<Example>(value, &at),
                "content" => parameter.content = b.media_types(value, &at),
                k if k.starts_with("x-") => {
                    parameter.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        parameter
    }
}

impl FromNode for RequestBody {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut body = RequestBody::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "description" => body.description = b.text(value, &at),
                "content" => body.content = b.media_types(value, &at),
                "required" => body.required = b.flag(value, &at).unwrap_or(false),
                k if k.starts_with("x-") => {
                    body.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        body
    }
}

impl FromNode for Response {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut response = Response::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "description" => response.description = b.text(value, &at),
                "headers" => response.headers = b.map_of::<Header>(value, &at),
                "content" => response.content = b.media_types(value, &at),
                "links" => response.links = b.map_of::<Link>(value, &at),
                k if k.starts_with("x-") => {
                    response.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        response
    }
}

impl FromNode for Header {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut header = Header::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "description" => header.description = b.text(value, &at),
                "required" => header.required = b.flag(value, &at).unwrap_or(false),
                "deprecated" => header.deprecated = b.flag(value, &at).unwrap_or(false),
                "style" => header.style = b.text(value, &at),
                "explode" => header.explode = b.flag(value, &at),
                "schema" => header.schema = b.component::<Schema>(value, &at),
                "example" => header.example = Some(value.clone()),
                "examples" => header.examples = b.map_of::<Example>(value, &at),
                "content" => header.content = b.media_types(value, &at),
                k if k.starts_with("x-") => {
                    header.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        header
    }
}

impl FromNode for Example {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut example = Example::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "summary" => example.summary = b.text(value, &at),
                "description" => example.description = b.text(value, &at),
                "value" => example.value = Some(value.clone()),
                "externalValue" => example.external_value = b.text(value, &at),
                k if k.starts_with("x-") => {
                    example.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        example
    }
}

impl FromNode for Link {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut link = Link::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "operationRef" => link.operation_ref = b.text(value, &at),
                "operationId" => link.operation_id = b.text(value, &at),
                "parameters" => {
                    if let Some(node) = b.object(value, &at) {
                        link.parameters = node.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    }
                }
                "requestBody" => link.request_body = Some(value.clone()),
                "description" => link.description = b.text(value, &at),
                "server" => {
                    if let Some(node) = b.object(value, &at) {
                        link.server = Some(b.server(node, &at));
                    }
                }
                k if k.starts_with("x-") => {
                    link.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        link
    }
}

impl FromNode for Callback {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        let mut callback = Callback::default();
        for (key, value) in node {
            let at = child(at, key);
            if key.starts_with("x-") {
                callback.extensions.insert(key.clone(), value.clone());
            } else if let Some(handle) = b.component::<PathItem>(value, &at) {
                callback.expressions.insert(key.clone(), handle);
            }
        }
        callback
    }
}

impl FromNode for SecurityScheme {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        if !node.contains_key("type") {
            b.missing(at, "type");
        }
        let mut scheme = SecurityScheme::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "type" => {
                    if let Some(name) = b.text(value, &at) {
                        match name.parse() {
                            Ok(scheme_type) => scheme.scheme_type = Some(scheme_type),
                            Err(message) => b.invalid(&at, &message),
                        }
                    }
                }
                "description" => scheme.description = b.text(value, &at),
                "name" => scheme.name = b.text(value, &at),
                "in" => scheme.location = b.text(value, &at),
                "scheme" => scheme.scheme = b.text(value, &at),
                "bearerFormat" => scheme.bearer_format = b.text(value, &at),
                "openIdConnectUrl" => scheme.open_id_connect_url = b.text(value, &at),
                "flows" => {
                    if let Some(node) = b.object(value, &at) {
                        let mut flows = OAuthFlows::default();
                        for (key, value) in node {
                            let at = child(&at, key);
                            if key.starts_with("x-") {
                                flows.extensions.insert(key.clone(), value.clone());
                                continue;
                            }
                            let Some(node) = b.object(value, &at) else {
                                continue;
                            };
                            let flow = b.oauth_flow(node, &at);
                            match key.as_str() {
                                "implicit" => flows.implicit = Some(flow),
                                "password" => flows.password = Some(flow),
                                "clientCredentials" => flows.client_credentials = Some(flow),
                                "authorizationCode" => flows.authorization_code = Some(flow),
                                _ => {}
                            }
                        }
                        scheme.flows = Some(flows);
                    }
                }
                k if k.starts_with("x-") => {
                    scheme.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        scheme
    }
}

impl FromNode for Tag {
    fn from_node(b: &mut Builder<'_>, node: &Map<String, Value>, at: &str) -> Self {
        if !node.contains_key("name") {
            b.missing(at, "name");
        }
        let mut tag = Tag::default();
        for (key, value) in node {
            let at = child(at, key);
            match key.as_str() {
                "name" => tag.name = b.text(value, &at).unwrap_or_default(),
                "description" => tag.description = b.text(value, &at),
                "externalDocs" => tag.external_docs = b.external_docs(value, &at),
                k if k.starts_with("x-") => {
                    tag.extensions.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        tag
    }
}

fn child(at: &str, key: &str) -> String {
    format!("{}/{}", at, escape_segment(key))
}

fn field_name(at: &str) -> String {
    at.rsplit('/')
        .next()
        .unwrap_or_default()
        .replace("~1", "/")
        .replace("~0", "~")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(raw: Value) -> (Document, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let location = Url::parse("file:///api.yaml").unwrap();
        let document = build_document(raw, location, SpecVersion::V3_1, &mut diagnostics);
        (document, diagnostics)
    }

    #[test]
    fn test_same_reference_shares_one_placeholder() {
        let (doc, diagnostics) = build(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "components": {"schemas": {
                "Pet": {"type": "object"},
                "Owner": {"properties": {
                    "a": {"$ref": "#/components/schemas/Pet"},
                    "b": {"$ref": "#/components/schemas/Pet"}
                }}
            }}
        }));
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let owner = doc.get(doc.component::<Schema>("Owner").unwrap());
        assert_eq!(owner.properties["a"], owner.properties["b"]);
        assert!(doc.is_unresolved(owner.properties["a"]));
        assert!(doc
            .registry()
            .get("file:///api.yaml#/components/schemas/Pet")
            .is_some());
    }

    #[test]
    fn test_malformed_reference_is_reported_and_skipped() {
        let (doc, diagnostics) = build(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "components": {"schemas": {
                "Broken": {"$ref": ""},
                "Fine": {"type": "string"}
            }}
        }));

        assert_eq!(diagnostics.with_code("oas::malformed_reference").count(), 1);
        assert!(doc.component::<Schema>("Broken").is_none());
        assert!(doc.component::<Schema>("Fine").is_some());
    }

    #[test]
    fn test_duplicate_schema_id_is_reported() {
        let (_, diagnostics) = build(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "components": {"schemas": {
                "A": {"$id": "https://example.com/pet.json"},
                "B": {"$id": "https://example.com/pet.json"}
            }}
        }));

        let duplicates: Vec<_> = diagnostics.with_code("oas::duplicate_key").collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].pointer, "#/components/schemas/B");
    }

    #[test]
    fn test_missing_required_fields() {
        let (_, diagnostics) = build(json!({
            "openapi": "3.1.0",
            "info": {"title": "t"},
            "paths": {"/a": {"get": {"parameters": [{"in": "query"}]}}}
        }));

        let fields: Vec<String> = diagnostics
            .iter()
            .map(|d| d.kind.clone())
            .filter_map(|kind| match kind {
                DiagnosticKind::MissingField { field } => Some(field),
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec!["version".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_type_mismatch_leaves_field_absent() {
        let (doc, diagnostics) = build(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "components": {"schemas": {"Pet": {"required": "id", "minLength": -1}}}
        }));

        assert_eq!(diagnostics.with_code("oas::type_mismatch").count(), 2);
        let pet = doc.get(doc.component::<Schema>("Pet").unwrap());
        assert!(pet.required.is_empty());
        assert!(pet.min_length.is_none());
    }

    #[test]
    fn test_unknown_schema_keywords_are_kept() {
        let (doc, _) = build(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "components": {"schemas": {"Pet": {"type": ["string", "null"], "contentEncoding": "base64"}}}
        }));

        let pet = doc.get(doc.component::<Schema>("Pet").unwrap());
        assert_eq!(pet.schema_type, vec![SchemaType::String, SchemaType::Null]);
        assert_eq!(pet.keywords.get("contentEncoding"), Some(&json!("base64")));
    }
}
