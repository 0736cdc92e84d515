//! `$ref` descriptors
//!
//! A reference is written as `[resource]#[pointer]`:
//!
//! ```
//! use oasdoc_core::{ReferenceDescriptor, ReferenceType};
//!
//! let local = ReferenceDescriptor::parse("#/components/schemas/Pet", ReferenceType::Schema).unwrap();
//! assert_eq!(local.id(), "Pet");
//! assert!(local.external().is_none());
//!
//! let external = ReferenceDescriptor::parse("common.yaml#/Widget", ReferenceType::Schema).unwrap();
//! assert_eq!(external.external(), Some("common.yaml"));
//! assert_eq!(external.fragment(), Some("/Widget"));
//! assert!(external.is_pointer_only());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::OpenApiError;

/// The kind of component a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceType {
    Schema,
    Response,
    Parameter,
    Example,
    RequestBody,
    Header,
    SecurityScheme,
    Link,
    Callback,
    PathItem,
    Tag,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 11] = [
        ReferenceType::Schema,
        ReferenceType::Response,
        ReferenceType::Parameter,
        ReferenceType::Example,
        ReferenceType::RequestBody,
        ReferenceType::Header,
        ReferenceType::SecurityScheme,
        ReferenceType::Link,
        ReferenceType::Callback,
        ReferenceType::PathItem,
        ReferenceType::Tag,
    ];

    /// The key of this kind under `#/components`, or `None` for tags, which
    /// are declared at the top level.
    pub fn component_key(self) -> Option<&'static str> {
        match self {
            Self::Schema => Some("schemas"),
            Self::Response => Some("responses"),
            Self::Parameter => Some("parameters"),
            Self::Example => Some("examples"),
            Self::RequestBody => Some("requestBodies"),
            Self::Header => Some("headers"),
            Self::SecurityScheme => Some("securitySchemes"),
            Self::Link => Some("links"),
            Self::Callback => Some("callbacks"),
            Self::PathItem => Some("pathItems"),
            Self::Tag => None,
        }
    }

    pub fn from_component_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.component_key() == Some(key))
    }

    /// JSON pointer at which a named component of this kind is declared
    pub fn definition_pointer(self, name: &str) -> String {
        match self.component_key() {
            Some(key) => format!("/components/{}/{}", key, escape_segment(name)),
            None => format!("/tags/{}", escape_segment(name)),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Response => "response",
            Self::Parameter => "parameter",
            Self::Example => "example",
            Self::RequestBody => "request body",
            Self::Header => "header",
            Self::SecurityScheme => "security scheme",
            Self::Link => "link",
            Self::Callback => "callback",
            Self::PathItem => "path item",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An immutable description of a reference target.
///
/// `id` is the component name for `#/components/<kind>/<name>` references and
/// empty for raw JSON-pointer references. `external` is the resource part as
/// written; when absent the reference targets the document containing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceDescriptor {
    kind: ReferenceType,
    id: String,
    external: Option<String>,
    fragment: Option<String>,
    summary: Option<String>,
    description: Option<String>,
}

impl ReferenceDescriptor {
    /// Parse a `$ref` value, expecting a target of the given kind
    pub fn parse(raw: &str, expected: ReferenceType) -> Result<Self, OpenApiError> {
        let malformed = |reason: &str| OpenApiError::MalformedReference {
            reference: raw.to_string(),
            reason: reason.to_string(),
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(malformed("reference is empty"));
        }

        let (resource, fragment) = match raw.split_once('#') {
            Some((resource, fragment)) => (resource, Some(fragment)),
            None => (raw, None),
        };

        let external = if resource.is_empty() {
            None
        } else {
            validate_resource(resource).map_err(|reason| malformed(&reason))?;
            Some(resource.to_string())
        };

        let fragment = match fragment {
            None | Some("") => None,
            // Plain-name fragments address a schema `$anchor`
            Some(f) if !f.starts_with('/') && expected == ReferenceType::Schema => {
                if !is_anchor_name(f) {
                    return Err(malformed(&format!("'{}' is not a valid anchor name", f)));
                }
                Some(f.to_string())
            }
            Some(f) if !f.starts_with('/') => {
                return Err(malformed("fragment must be a JSON pointer starting with '/'"));
            }
            Some(f) => {
                let decoded = percent_decode(f).map_err(|reason| malformed(&reason))?;
                validate_pointer(&decoded).map_err(|reason| malformed(&reason))?;
                Some(decoded)
            }
        };

        if external.is_none() && fragment.is_none() {
            return Err(malformed("reference has neither a resource nor a fragment"));
        }

        let mut id = String::new();
        if let Some(pointer) = fragment.as_ref().filter(|f| f.starts_with('/')) {
            let segments = split_pointer(pointer);
            match segments.as_slice() {
                [components, key, name] if components == "components" => {
                    let kind = ReferenceType::from_component_key(key).ok_or_else(|| {
                        malformed(&format!("unknown component type '{}'", key))
                    })?;
                    if kind != expected {
                        return Err(malformed(&format!(
                            "expected a {} reference, found a {} reference",
                            expected, kind
                        )));
                    }
                    id = name.clone();
                }
                _ => {}
            }
        }

        Ok(Self {
            kind: expected,
            id,
            external,
            fragment,
            summary: None,
            description: None,
        })
    }

    /// A reference to a named component in the same document
    pub fn local(kind: ReferenceType, name: &str) -> Self {
        Self {
            kind,
            id: name.to_string(),
            external: None,
            fragment: Some(kind.definition_pointer(name)),
            summary: None,
            description: None,
        }
    }

    /// Attach the reference-object `summary`/`description` overrides
    pub fn with_overrides(mut self, summary: Option<String>, description: Option<String>) -> Self {
        self.summary = summary;
        self.description = description;
        self
    }

    pub fn kind(&self) -> ReferenceType {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn external(&self) -> Option<&str> {
        self.external.as_deref()
    }

    /// The decoded JSON pointer, e.g. `/components/schemas/Pet`
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The fragment when it names a schema `$anchor` rather than a pointer
    pub fn anchor(&self) -> Option<&str> {
        self.fragment.as_deref().filter(|f| !f.starts_with('/'))
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }

    /// True when the target is addressed purely by JSON pointer
    pub fn is_pointer_only(&self) -> bool {
        self.id.is_empty()
    }

    pub fn has_overrides(&self) -> bool {
        self.summary.is_some() || self.description.is_some()
    }

    /// Absolute location of the target resource, relative references being
    /// resolved against `origin`. The fragment is stripped.
    pub fn target_location(&self, origin: &Url) -> Result<Url, OpenApiError> {
        let mut location = match &self.external {
            Some(resource) => origin
                .join(resource)
                .map_err(|_| OpenApiError::InvalidLocation(resource.clone()))?,
            None => origin.clone(),
        };
        location.set_fragment(None);
        Ok(location)
    }

    /// Registry key of the target: `{absolute location}#{pointer}`
    pub fn target_key(&self, origin: &Url) -> Result<String, OpenApiError> {
        let location = self.target_location(origin)?;
        Ok(registry_key(&location, self.fragment.as_deref().unwrap_or("")))
    }
}

impl fmt::Display for ReferenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(external) = &self.external {
            f.write_str(external)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// Build a registry key from a location and a JSON pointer
pub fn registry_key(location: &Url, pointer: &str) -> String {
    let mut base = location.clone();
    base.set_fragment(None);
    format!("{}#{}", base, pointer)
}

/// Escape a single JSON pointer segment (`~` → `~0`, `/` → `~1`)
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Split a JSON pointer into unescaped segments
pub fn split_pointer(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Join unescaped segments into a JSON pointer
pub fn join_pointer<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", escape_segment(s.as_ref())))
        .collect()
}

/// JSON Schema anchor names: a letter or `_`, then letters, digits, `-`,
/// `_`, `.` or `:`
pub fn is_anchor_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

fn validate_pointer(pointer: &str) -> Result<(), String> {
    let mut chars = pointer.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') | Some('1') => {}
                _ => return Err("invalid '~' escape in JSON pointer".to_string()),
            }
        }
    }
    Ok(())
}

fn validate_resource(resource: &str) -> Result<(), String> {
    if resource.chars().any(char::is_whitespace) {
        return Err("resource location contains whitespace".to_string());
    }
    match Url::parse(resource) {
        Ok(_) => Ok(()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            // Relative references are checked against a throwaway base.
            let base = Url::parse("file:///").map_err(|e| e.to_string())?;
            base.join(resource).map(|_| ()).map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

fn percent_decode(input: &str) -> Result<String, String> {
    if !input.contains('%') {
        return Ok(input.to_string());
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .ok_or_else(|| "truncated percent-encoding".to_string())?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| format!("invalid percent-encoding '%{}'", hex))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| "percent-encoding is not valid UTF-8".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("file:///specs/api.yaml").unwrap()
    }

    #[test]
    fn test_parse_component_reference() {
        let r = ReferenceDescriptor::parse("#/components/schemas/Pet", ReferenceType::Schema).unwrap();
        assert_eq!(r.kind(), ReferenceType::Schema);
        assert_eq!(r.id(), "Pet");
        assert_eq!(r.fragment(), Some("/components/schemas/Pet"));
        assert!(!r.is_external());
        assert!(!r.is_pointer_only());
        assert_eq!(r.to_string(), "#/components/schemas/Pet");
    }

    #[test]
    fn test_parse_escaped_component_name() {
        let r = ReferenceDescriptor::parse("#/components/schemas/a~1b~0c", ReferenceType::Schema).unwrap();
        assert_eq!(r.id(), "a/b~c");
    }

    #[test]
    fn test_parse_external_reference() {
        let r = ReferenceDescriptor::parse("common/types.yaml#/Widget", ReferenceType::Schema).unwrap();
        assert_eq!(r.external(), Some("common/types.yaml"));
        assert_eq!(r.fragment(), Some("/Widget"));
        assert!(r.is_pointer_only());
        assert_eq!(
            r.target_location(&base()).unwrap().as_str(),
            "file:///specs/common/types.yaml"
        );
        assert_eq!(
            r.target_key(&base()).unwrap(),
            "file:///specs/common/types.yaml#/Widget"
        );
    }

    #[test]
    fn test_parse_whole_document_reference() {
        let r = ReferenceDescriptor::parse("pet.json", ReferenceType::Schema).unwrap();
        assert_eq!(r.external(), Some("pet.json"));
        assert_eq!(r.fragment(), None);
        assert_eq!(r.target_key(&base()).unwrap(), "file:///specs/pet.json#");
    }

    #[test]
    fn test_local_key_uses_origin() {
        let r = ReferenceDescriptor::parse("#/components/responses/NotFound", ReferenceType::Response).unwrap();
        assert_eq!(
            r.target_key(&base()).unwrap(),
            "file:///specs/api.yaml#/components/responses/NotFound"
        );
    }

    #[test]
    fn test_percent_encoded_pointer() {
        let r = ReferenceDescriptor::parse("#/paths/~1users~1%7Bid%7D/get", ReferenceType::PathItem).unwrap();
        assert_eq!(r.fragment(), Some("/paths/~1users~1{id}/get"));
        assert_eq!(split_pointer(r.fragment().unwrap())[1], "/users/{id}");
    }

    #[test]
    fn test_malformed_references() {
        let cases = [
            "",
            "#",
            "#components/schemas/Pet",
            "#/components/schemas/~2bad",
            "#/paths/%zz",
            "file with space.yaml#/A",
        ];
        for case in cases {
            let result = ReferenceDescriptor::parse(case, ReferenceType::Schema);
            assert!(
                matches!(result, Err(OpenApiError::MalformedReference { .. })),
                "expected '{}' to be malformed",
                case
            );
        }
    }

    #[test]
    fn test_anchor_fragments() {
        let r = ReferenceDescriptor::parse("tree.yaml#node", ReferenceType::Schema).unwrap();
        assert_eq!(r.anchor(), Some("node"));
        assert_eq!(r.target_key(&base()).unwrap(), "file:///specs/tree.yaml#node");
        assert_eq!(r.to_string(), "tree.yaml#node");

        let pointer = ReferenceDescriptor::parse("#/components/schemas/Pet", ReferenceType::Schema).unwrap();
        assert_eq!(pointer.anchor(), None);

        // Only schemas have anchors
        assert!(ReferenceDescriptor::parse("#node", ReferenceType::Parameter).is_err());
        assert!(ReferenceDescriptor::parse("#9lives", ReferenceType::Schema).is_err());
    }

    #[test]
    fn test_kind_mismatch_is_malformed() {
        let result = ReferenceDescriptor::parse("#/components/parameters/Limit", ReferenceType::Schema);
        assert!(matches!(result, Err(OpenApiError::MalformedReference { .. })));
    }

    #[test]
    fn test_pointer_helpers() {
        assert_eq!(join_pointer(&["paths", "/items", "get"]), "/paths/~1items/get");
        assert_eq!(split_pointer("/paths/~1items/get"), vec!["paths", "/items", "get"]);
        assert_eq!(
            ReferenceType::Schema.definition_pointer("A/B"),
            "/components/schemas/A~1B"
        );
        assert_eq!(ReferenceType::Tag.definition_pointer("pets"), "/tags/pets");
    }
}
