//! OpenAPI 3.0 / 3.1 document model
//!
//! Descriptions are read in two passes: the first builds typed components
//! into per-kind arenas, with a shared placeholder for every `$ref`; the
//! second links placeholders to their targets, loading other documents
//! through a [`Workspace`] when full resolution is requested. Problems in the
//! content are collected as [`Diagnostics`] and never abort a read.
//!
//! ```
//! use oasdoc_core::{OpenApiReader, Schema, SchemaType};
//!
//! let text = r#"
//! openapi: 3.1.0
//! info: {title: Pets, version: '1'}
//! components:
//!   schemas:
//!     Pet:
//!       properties:
//!         name: {$ref: '#/components/schemas/Name'}
//!     Name: {type: string}
//! "#;
//!
//! let result = OpenApiReader::default().read_str(text).unwrap();
//! assert!(result.diagnostics.is_empty());
//!
//! let doc = &result.document;
//! let pet = doc.get(doc.component::<Schema>("Pet").unwrap());
//! assert!(doc.get(pet.properties["name"]).has_type(SchemaType::String));
//! ```

pub mod diagnostic;
pub mod error;
pub mod graph;
pub mod loader;
pub mod model;
pub mod reader;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod walk;
pub mod workspace;
pub mod writer;

pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{LoadError, OpenApiError, Result};
pub use graph::{Definition, ReferenceGraph};
pub use loader::{ExternalLoader, FileLoader, MemoryLoader};
pub use model::{
    AdditionalProperties, AnyHandle, Callback, Component, ComponentStore, Components, Contact,
    Discriminator, Document, Encoding, Entry, Example, Extensible, Extensions, ExternalDocs, Handle,
    Header, Info, License, Link, MediaType, OAuthFlow, OAuthFlows, Operation, OperationType,
    Parameter, ParameterLocation, PathItem, RequestBody, Response, Schema, SchemaType,
    SecurityRequirement, SecurityScheme, SecuritySchemeType, Server, ServerVariable, SpecVersion,
    Tag,
};
pub use reader::{Format, OpenApiReader, ReadResult, ReaderSettings, ResolutionPolicy};
pub use reference::{ReferenceDescriptor, ReferenceType};
pub use registry::{Registry, RegistryEntry};
pub use resolver::{ResolveOptions, Resolver};
pub use walk::{ReferenceSummary, Visitor, Walker};
pub use workspace::{ResolvedNode, Workspace};
pub use writer::{OpenApiWriter, WriterSettings};

// Re-exported so callers can build settings without naming the crates
pub use tokio_util::sync::CancellationToken;
pub use url::Url;
