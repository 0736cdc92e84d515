//! Serializing documents back to OpenAPI text
//!
//! The writer renders a [`Document`] into an order-preserving JSON value for
//! the requested [`SpecVersion`], then into JSON or YAML text. References are
//! written as `$ref` unless inlining is enabled for their kind; inlining
//! falls back to `$ref` whenever the target is already being written, so
//! cyclic graphs always terminate.

mod emit;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use tracing::debug;
use url::Url;

use crate::error::{OpenApiError, Result};
use crate::model::{AnyHandle, Component, Document, Entry, Handle, SecurityScheme, SpecVersion, Tag};
use crate::reader::Format;
use crate::reference::ReferenceDescriptor;

pub(crate) use emit::Emit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct WriterSettings {
    pub target: SpecVersion,
    pub format: Format,
    /// Replace resolved references within the document by their content
    pub inline_local_references: bool,
    /// Replace resolved references into other documents by their content
    pub inline_external_references: bool,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            target: SpecVersion::V3_1,
            format: Format::Json,
            inline_local_references: false,
            inline_external_references: false,
        }
    }
}

impl WriterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: SpecVersion) -> Self {
        self.target = target;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_inline_local_references(mut self, inline: bool) -> Self {
        self.inline_local_references = inline;
        self
    }

    pub fn with_inline_external_references(mut self, inline: bool) -> Self {
        self.inline_external_references = inline;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenApiWriter {
    settings: WriterSettings,
}

impl OpenApiWriter {
    pub fn new(settings: WriterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Render the document as a JSON value, keys in document order
    pub fn to_value(&self, document: &Document) -> Value {
        let mut emitter = Emitter::new(document, &self.settings);
        let root = emitter.document();
        debug!(
            location = %document.location(),
            target = %self.settings.target,
            "rendered document"
        );
        Value::Object(root)
    }

    pub fn write_string(&self, document: &Document) -> Result<String> {
        let value = self.to_value(document);
        match self.settings.format {
            Format::Json => {
                serde_json::to_string_pretty(&value).map_err(|e| OpenApiError::Serialize(e.to_string()))
            }
            Format::Yaml => serde_yaml::to_string(&value).map_err(|e| OpenApiError::Serialize(e.to_string())),
        }
    }

    pub fn write<W: Write>(&self, document: &Document, mut output: W) -> Result<()> {
        let text = self.write_string(document)?;
        output.write_all(text.as_bytes())?;
        if self.settings.format == Format::Json {
            output.write_all(b"\n")?;
        }
        output.flush()?;
        Ok(())
    }
}

/// Rendering state for one document
pub(crate) struct Emitter<'d> {
    document: &'d Document,
    settings: &'d WriterSettings,
    /// Content slots currently being written, innermost last
    stack: Vec<AnyHandle>,
}

impl<'d> Emitter<'d> {
    fn new(document: &'d Document, settings: &'d WriterSettings) -> Self {
        Self {
            document,
            settings,
            stack: Vec::new(),
        }
    }

    pub(crate) fn document_ref(&self) -> &'d Document {
        self.document
    }

    pub(crate) fn is_3_1(&self) -> bool {
        self.settings.target == SpecVersion::V3_1
    }

    /// Write the slot behind `handle`: its content, or a `$ref` object
    pub(crate) fn handle<T: Emit>(&mut self, handle: Handle<T>) -> Value {
        let document = self.document;
        let store = document.store();
        let entry = store.entry(handle);
        let Some(descriptor) = entry.reference() else {
            return self.content(handle);
        };

        let location = self.target_location(entry, descriptor);
        let external = location.as_ref() != Some(document.location());
        let wanted = if external {
            self.settings.inline_external_references
        } else {
            self.settings.inline_local_references
        };
        let resolved = store.resolve(handle);
        if wanted && !store.is_unresolved(handle) && !self.stack.contains(&T::into_any(resolved)) {
            return self.content(resolved);
        }
        self.reference(entry, descriptor, location)
    }

    fn content<T: Emit>(&mut self, handle: Handle<T>) -> Value {
        let document = self.document;
        let value = document.get(handle);
        self.stack.push(T::into_any(handle));
        let map = value.emit(self);
        self.stack.pop();
        Value::Object(map)
    }

    fn target_location<T: Component>(&self, entry: &Entry<T>, descriptor: &ReferenceDescriptor) -> Option<Url> {
        let origin = entry.origin().unwrap_or_else(|| self.document.location());
        descriptor.target_location(origin).ok()
    }

    fn reference<T: Component>(
        &self,
        entry: &Entry<T>,
        descriptor: &ReferenceDescriptor,
        location: Option<Url>,
    ) -> Value {
        let mut map = Map::new();
        map.insert("$ref".to_string(), Value::String(self.reference_text(entry, descriptor, location)));
        if self.is_3_1() {
            if let Some(summary) = descriptor.summary() {
                map.insert("summary".to_string(), Value::String(summary.to_string()));
            }
            if let Some(description) = descriptor.description() {
                map.insert("description".to_string(), Value::String(description.to_string()));
            }
        }
        Value::Object(map)
    }

    /// `$ref` text as seen from the document being written. References that
    /// were imported from other documents are rewritten relative to it.
    fn reference_text<T: Component>(
        &self,
        entry: &Entry<T>,
        descriptor: &ReferenceDescriptor,
        location: Option<Url>,
    ) -> String {
        let base = self.document.location();
        let origin = entry.origin().unwrap_or(base);
        match location {
            Some(location) if &location == base => {
                format!("#{}", descriptor.fragment().unwrap_or_default())
            }
            Some(location) if origin != base => {
                let mut text = base
                    .make_relative(&location)
                    .filter(|relative| !relative.is_empty())
                    .unwrap_or_else(|| location.to_string());
                if let Some(fragment) = descriptor.fragment() {
                    text.push('#');
                    text.push_str(fragment);
                }
                text
            }
            _ => descriptor.to_string(),
        }
    }

    /// Operations and requirements name tags and security schemes
    pub(crate) fn tag_name(&self, handle: Handle<Tag>) -> String {
        let document = self.document;
        match document.entry(handle).reference() {
            Some(descriptor) if document.is_unresolved(handle) => descriptor.id().to_string(),
            _ => document.get(handle).name.clone(),
        }
    }

    pub(crate) fn scheme_name(&self, handle: Handle<SecurityScheme>) -> String {
        let document = self.document;
        if let Some(descriptor) = document.entry(handle).reference() {
            return descriptor.id().to_string();
        }
        document
            .components
            .security_schemes
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::OpenApiReader;
    use serde_json::json;

    fn read(text: &str) -> Document {
        let result = OpenApiReader::default().read_str(text).unwrap();
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        result.document
    }

    const NULLABLE: &str = r##"{
        "openapi": "3.0.3",
        "info": {"title": "Pets", "version": "1"},
        "paths": {},
        "components": {"schemas": {
            "Name": {"type": "string", "nullable": true},
            "Pet": {"properties": {"name": {"$ref": "#/components/schemas/Name"}}}
        }}
    }"##;

    #[test]
    fn test_nullable_forms_per_target() {
        let document = read(NULLABLE);

        let v30 = OpenApiWriter::new(WriterSettings::new().with_target(SpecVersion::V3_0)).to_value(&document);
        assert_eq!(v30["openapi"], "3.0.3");
        assert_eq!(
            v30["components"]["schemas"]["Name"],
            json!({"type": "string", "nullable": true})
        );

        let v31 = OpenApiWriter::new(WriterSettings::new().with_target(SpecVersion::V3_1)).to_value(&document);
        assert_eq!(v31["openapi"], "3.1.0");
        assert_eq!(v31["components"]["schemas"]["Name"], json!({"type": ["string", "null"]}));
    }

    #[test]
    fn test_references_are_kept_unless_inlined() {
        let document = read(NULLABLE);

        let plain = OpenApiWriter::default().to_value(&document);
        assert_eq!(
            plain["components"]["schemas"]["Pet"]["properties"]["name"],
            json!({"$ref": "#/components/schemas/Name"})
        );

        let inlined = OpenApiWriter::new(WriterSettings::new().with_inline_local_references(true)).to_value(&document);
        assert_eq!(
            inlined["components"]["schemas"]["Pet"]["properties"]["name"],
            json!({"type": ["string", "null"]})
        );
    }

    #[test]
    fn test_inlining_a_cycle_terminates() {
        let document = read(
            r##"{
                "openapi": "3.1.0",
                "info": {"title": "t", "version": "1"},
                "components": {"schemas": {
                    "A": {"allOf": [{"$ref": "#/components/schemas/B"}]},
                    "B": {"allOf": [{"$ref": "#/components/schemas/A"}]}
                }}
            }"##,
        );

        let value = OpenApiWriter::new(WriterSettings::new().with_inline_local_references(true)).to_value(&document);
        assert_eq!(
            value["components"]["schemas"]["A"],
            json!({"allOf": [{"allOf": [{"$ref": "#/components/schemas/A"}]}]})
        );
    }

    #[test]
    fn test_3_0_drops_3_1_only_content() {
        let document = read(
            r##"{
                "openapi": "3.1.0",
                "info": {"title": "t", "version": "1", "summary": "short"},
                "webhooks": {"ping": {"post": {"responses": {"200": {"description": "ok"}}}}},
                "components": {
                    "schemas": {
                        "Id": {"type": "string"},
                        "Ref": {"properties": {"id": {"$ref": "#/components/schemas/Id", "description": "The id"}}}
                    },
                    "pathItems": {"Ping": {"get": {"responses": {"200": {"description": "ok"}}}}}
                }
            }"##,
        );

        let v31 = OpenApiWriter::default().to_value(&document);
        assert_eq!(v31["info"]["summary"], "short");
        assert!(v31["webhooks"].is_object());
        assert_eq!(
            v31["components"]["schemas"]["Ref"]["properties"]["id"],
            json!({"$ref": "#/components/schemas/Id", "description": "The id"})
        );

        let v30 = OpenApiWriter::new(WriterSettings::new().with_target(SpecVersion::V3_0)).to_value(&document);
        assert!(v30["info"].get("summary").is_none());
        assert!(v30.get("webhooks").is_none());
        assert!(v30["components"].get("pathItems").is_none());
        assert_eq!(
            v30["components"]["schemas"]["Ref"]["properties"]["id"],
            json!({"$ref": "#/components/schemas/Id"})
        );
    }

    #[test]
    fn test_tags_and_security_are_written_by_name() {
        let document = read(
            r##"{
                "openapi": "3.1.0",
                "info": {"title": "t", "version": "1"},
                "tags": [{"name": "pets"}],
                "paths": {"/pets": {"get": {
                    "tags": ["pets"],
                    "security": [{"key": []}],
                    "responses": {"200": {"description": "ok"}}
                }}},
                "components": {"securitySchemes": {"key": {"type": "apiKey", "name": "X-Key", "in": "header"}}}
            }"##,
        );

        let value = OpenApiWriter::default().to_value(&document);
        let get = &value["paths"]["/pets"]["get"];
        assert_eq!(get["tags"], json!(["pets"]));
        assert_eq!(get["security"], json!([{"key": []}]));
        assert_eq!(value["tags"], json!([{"name": "pets"}]));
    }

    #[test]
    fn test_yaml_output() {
        let document = read(NULLABLE);
        let writer = OpenApiWriter::new(WriterSettings::new().with_format(Format::Yaml));

        let mut out = Vec::new();
        writer.write(&document, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("openapi: 3.1.0\n"), "{}", text);
        assert!(text.contains("$ref: '#/components/schemas/Name'"), "{}", text);
    }
}
