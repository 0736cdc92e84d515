use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::component::{AnyHandle, Extensions, Handle};
use super::document::{ExternalDocs, Server};
use super::schema::Schema;
use super::security::SecurityRequirement;
use super::Tag;

/// Operations available on a single path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathItem {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operations: IndexMap<OperationType, Operation>,
    pub servers: Vec<Server>,
    pub parameters: Vec<Handle<Parameter>>,
    pub extensions: Extensions,
}

impl PathItem {
    pub fn operation(&self, method: OperationType) -> Option<&Operation> {
        self.operations.get(&method)
    }

    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.parameters.iter().map(|h| AnyHandle::Parameter(*h)));
        for operation in self.operations.values() {
            operation.collect_children(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl OperationType {
    pub const ALL: [OperationType; 8] = [
        OperationType::Get,
        OperationType::Put,
        OperationType::Post,
        OperationType::Delete,
        OperationType::Options,
        OperationType::Head,
        OperationType::Patch,
        OperationType::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Get => "get",
            OperationType::Put => "put",
            OperationType::Post => "post",
            OperationType::Delete => "delete",
            OperationType::Options => "options",
            OperationType::Head => "head",
            OperationType::Patch => "patch",
            OperationType::Trace => "trace",
        }
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationType::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    /// Tag references, resolved against the top-level `tags` list
    pub tags: Vec<Handle<Tag>>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub external_docs: Option<ExternalDocs>,
    pub operation_id: Option<String>,
    pub parameters: Vec<Handle<Parameter>>,
    pub request_body: Option<Handle<RequestBody>>,
    /// Keyed by status code or `default`
    pub responses: IndexMap<String, Handle<Response>>,
    pub callbacks: IndexMap<String, Handle<Callback>>,
    pub deprecated: bool,
    /// `None` inherits the document-level requirements
    pub security: Option<Vec<SecurityRequirement>>,
    pub servers: Vec<Server>,
    pub extensions: Extensions,
}

impl Operation {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.tags.iter().map(|h| AnyHandle::Tag(*h)));
        out.extend(self.parameters.iter().map(|h| AnyHandle::Parameter(*h)));
        out.extend(self.request_body.iter().map(|h| AnyHandle::RequestBody(*h)));
        out.extend(self.responses.values().map(|h| AnyHandle::Response(*h)));
        out.extend(self.callbacks.values().map(|h| AnyHandle::Callback(*h)));
        for requirement in self.security.iter().flatten() {
            requirement.collect_children(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl FromStr for ParameterLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "path" => Ok(ParameterLocation::Path),
            "cookie" => Ok(ParameterLocation::Cookie),
            other => Err(format!("unknown parameter location '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: Option<ParameterLocation>,
    pub description: Option<String>,
    pub required: bool,
    pub deprecated: bool,
    pub allow_empty_value: bool,
    pub style: Option<String>,
    pub explode: Option<bool>,
    pub schema: Option<Handle<Schema>>,
    pub example: Option<Value>,
    pub examples: IndexMap<String, Handle<Example>>,
    pub content: IndexMap<String, MediaType>,
    pub extensions: Extensions,
}

impl Parameter {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.schema.iter().map(|h| AnyHandle::Schema(*h)));
        out.extend(self.examples.values().map(|h| AnyHandle::Example(*h)));
        for media in self.content.values() {
            media.collect_children(out);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaType {
    pub schema: Option<Handle<Schema>>,
    pub example: Option<Value>,
    pub examples: IndexMap<String, Handle<Example>>,
    pub encoding: IndexMap<String, Encoding>,
    pub extensions: Extensions,
}

impl MediaType {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.schema.iter().map(|h| AnyHandle::Schema(*h)));
        out.extend(self.examples.values().map(|h| AnyHandle::Example(*h)));
        for encoding in self.encoding.values() {
            out.extend(encoding.headers.values().map(|h| AnyHandle::Header(*h)));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encoding {
    pub content_type: Option<String>,
    pub headers: IndexMap<String, Handle<Header>>,
    pub style: Option<String>,
    pub explode: Option<bool>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody {
    pub description: Option<String>,
    pub content: IndexMap<String, MediaType>,
    pub required: bool,
    pub extensions: Extensions,
}

impl RequestBody {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        for media in self.content.values() {
            media.collect_children(out);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub description: Option<String>,
    pub headers: IndexMap<String, Handle<Header>>,
    pub content: IndexMap<String, MediaType>,
    pub links: IndexMap<String, Handle<Link>>,
    pub extensions: Extensions,
}

impl Response {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.headers.values().map(|h| AnyHandle::Header(*h)));
        for media in self.content.values() {
            media.collect_children(out);
        }
        out.extend(self.links.values().map(|h| AnyHandle::Link(*h)));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub description: Option<String>,
    pub required: bool,
    pub deprecated: bool,
    pub style: Option<String>,
    pub explode: Option<bool>,
    pub schema: Option<Handle<Schema>>,
    pub example: Option<Value>,
    pub examples: IndexMap<String, Handle<Example>>,
    pub content: IndexMap<String, MediaType>,
    pub extensions: Extensions,
}

impl Header {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.schema.iter().map(|h| AnyHandle::Schema(*h)));
        out.extend(self.examples.values().map(|h| AnyHandle::Example(*h)));
        for media in self.content.values() {
            media.collect_children(out);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Example {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub value: Option<Value>,
    pub external_value: Option<String>,
    pub extensions: Extensions,
}

impl Example {
    pub(crate) fn collect_children(&self, _out: &mut Vec<AnyHandle>) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    pub operation_ref: Option<String>,
    pub operation_id: Option<String>,
    pub parameters: IndexMap<String, Value>,
    pub request_body: Option<Value>,
    pub description: Option<String>,
    pub server: Option<Server>,
    pub extensions: Extensions,
}

impl Link {
    pub(crate) fn collect_children(&self, _out: &mut Vec<AnyHandle>) {}
}

/// Map of runtime expressions to the path items they call back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Callback {
    pub expressions: IndexMap<String, Handle<PathItem>>,
    pub extensions: Extensions,
}

impl Callback {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.expressions.values().map(|h| AnyHandle::PathItem(*h)));
    }
}
