//! Typed document object graph

mod component;
mod document;
mod path;
mod schema;
mod security;

pub(crate) use component::with_handle;
pub use component::{AnyHandle, Arena, Component, ComponentStore, Entry, Extensible, Extensions, Handle};
pub use document::{
    Components, Contact, Document, ExternalDocs, Info, License, Server, ServerVariable, SpecVersion, Tag,
};
pub use path::{
    Callback, Encoding, Example, Header, Link, MediaType, Operation, OperationType, Parameter,
    ParameterLocation, PathItem, RequestBody, Response,
};
pub use schema::{AdditionalProperties, Discriminator, Schema, SchemaType};
pub use security::{OAuthFlow, OAuthFlows, SecurityRequirement, SecurityScheme, SecuritySchemeType};
