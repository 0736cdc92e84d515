//! Error types for document loading, registration and resolution
//!
//! Only structural failures live here. Problems found in document content are
//! reported as [`Diagnostic`](crate::diagnostic::Diagnostic)s instead.

use thiserror::Error;
use url::Url;

/// Main error type for the OpenAPI document model
#[derive(Error, Debug)]
pub enum OpenApiError {
    #[error("Duplicate registry key: {0}")]
    DuplicateKey(String),

    #[error("Location already registered in workspace: {0}")]
    DuplicateLocation(Url),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to load external resource '{location}': {source}")]
    ExternalLoad {
        location: Url,
        #[source]
        source: LoadError,
    },

    #[error("Malformed reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported specification version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid location '{0}'")]
    InvalidLocation(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Errors raised by an [`ExternalLoader`](crate::loader::ExternalLoader)
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("resource not found: {0}")]
    NotFound(Url),

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err.to_string())
    }
}

/// Convenience result type
pub type Result<T> = std::result::Result<T, OpenApiError>;
