//! Reading OpenAPI descriptions
//!
//! Reading is two passes over the parse tree: the builder creates typed
//! components with shared placeholders for every `$ref`, then the resolver
//! links placeholders to their targets according to the configured
//! [`ResolutionPolicy`].

pub(crate) mod builder;
pub mod format;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{OpenApiError, Result};
use crate::loader::{ExternalLoader, FileLoader};
use crate::model::{Document, SpecVersion};
use crate::resolver::{ResolveOptions, Resolver};
use crate::workspace::Workspace;

pub use format::Format;

/// Location used when the input has none
pub const DEFAULT_LOCATION: &str = "memory:///openapi";

/// Default bound on external document hops while following a reference chain
pub const DEFAULT_MAX_EXTERNAL_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Link references within the document; leave external ones unresolved
    #[default]
    #[serde(rename = "local", alias = "local_only")]
    LocalOnly,
    /// Also load and link external documents through the workspace
    Full,
}

/// Reader configuration.
///
/// The declarative part deserializes from YAML or JSON; the loader, workspace
/// and cancellation token are runtime-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReaderSettings {
    pub resolution: ResolutionPolicy,
    pub base_location: Option<Url>,
    pub max_external_depth: usize,
    /// Accepted for compatibility. Input ownership decides whether a stream
    /// stays open: `read` takes `impl Read`, so pass `&mut reader` to keep it.
    pub leave_input_open: bool,
    pub format: Option<Format>,
    pub version: Option<SpecVersion>,

    #[serde(skip)]
    pub loader: Option<Arc<dyn ExternalLoader>>,
    #[serde(skip)]
    pub workspace: Option<Arc<Workspace>>,
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            resolution: ResolutionPolicy::LocalOnly,
            base_location: None,
            max_external_depth: DEFAULT_MAX_EXTERNAL_DEPTH,
            leave_input_open: false,
            format: None,
            version: None,
            loader: None,
            workspace: None,
            cancellation: None,
        }
    }
}

impl ReaderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from YAML or JSON text
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn with_resolution(mut self, resolution: ResolutionPolicy) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_base_location(mut self, location: Url) -> Self {
        self.base_location = Some(location);
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ExternalLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_workspace(mut self, workspace: Arc<Workspace>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn with_max_external_depth(mut self, depth: usize) -> Self {
        self.max_external_depth = depth;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_version(mut self, version: SpecVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_leave_input_open(mut self, leave_open: bool) -> Self {
        self.leave_input_open = leave_open;
        self
    }
}

/// A best-effort document plus everything found wrong with it
#[derive(Debug)]
pub struct ReadResult {
    pub document: Document,
    pub diagnostics: Diagnostics,
}

impl ReadResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenApiReader {
    settings: ReaderSettings,
}

impl OpenApiReader {
    pub fn new(settings: ReaderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// Read from a stream, blocking the calling thread until external
    /// references are loaded
    pub fn read<R: Read>(&self, mut input: R) -> Result<ReadResult> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        self.read_bytes(&bytes)
    }

    pub fn read_str(&self, text: &str) -> Result<ReadResult> {
        self.read_bytes(text.as_bytes())
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> Result<ReadResult> {
        futures::executor::block_on(self.read_async(bytes))
    }

    /// Read a local file. Its location becomes the base for relative references
    /// and a [`FileLoader`] is used when no loader is configured.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<ReadResult> {
        let location = file_location(path.as_ref())?;
        futures::executor::block_on(self.load_async(&location))
    }

    /// Read bytes, suspending only while external documents load
    pub async fn read_async(&self, bytes: &[u8]) -> Result<ReadResult> {
        let location = match &self.settings.base_location {
            Some(location) => location.clone(),
            None => Url::parse(DEFAULT_LOCATION).map_err(|e| OpenApiError::InvalidLocation(e.to_string()))?,
        };
        self.read_at(bytes, location, self.settings.loader.clone()).await
    }

    /// Fetch `location` through the configured loader, then read it with that
    /// location as base
    pub async fn load_async(&self, location: &Url) -> Result<ReadResult> {
        let loader: Arc<dyn ExternalLoader> = match &self.settings.loader {
            Some(loader) => loader.clone(),
            None => Arc::new(FileLoader::new()),
        };
        let bytes = loader
            .load(location)
            .await
            .map_err(|source| OpenApiError::ExternalLoad {
                location: location.clone(),
                source,
            })?;
        self.read_at(&bytes, location.clone(), Some(loader)).await
    }

    async fn read_at(
        &self,
        bytes: &[u8],
        location: Url,
        loader: Option<Arc<dyn ExternalLoader>>,
    ) -> Result<ReadResult> {
        let settings = &self.settings;
        check_cancelled(settings.cancellation.as_ref())?;

        let format = settings
            .format
            .unwrap_or_else(|| Format::infer(Some(&location), bytes));
        let raw = format::parse(bytes, format)?;

        let mut diagnostics = Diagnostics::new();
        let version = match settings.version {
            Some(version) => version,
            None => match sniff_version(&raw)? {
                Some(version) => version,
                None => {
                    diagnostics.push(Diagnostic::error(DiagnosticKind::MissingVersion, "#"));
                    SpecVersion::V3_0
                }
            },
        };
        debug!(%location, %format, %version, "parsed document");

        let mut document = builder::build_document(raw, location, version, &mut diagnostics);
        document.workspace = match (&settings.workspace, settings.resolution) {
            (Some(workspace), _) => Some(workspace.clone()),
            (None, ResolutionPolicy::Full) => Some(Arc::new(Workspace::new())),
            (None, ResolutionPolicy::LocalOnly) => None,
        };
        check_cancelled(settings.cancellation.as_ref())?;

        let options = ResolveOptions {
            policy: settings.resolution,
            loader,
            max_external_depth: settings.max_external_depth,
            cancellation: settings.cancellation.clone(),
        };
        Resolver::new(options)
            .resolve(&mut document, &mut diagnostics)
            .await?;

        info!(
            location = %document.location(),
            errors = diagnostics.error_count(),
            warnings = diagnostics.warning_count(),
            "read document"
        );
        Ok(ReadResult {
            document,
            diagnostics,
        })
    }
}

/// Version declared by the `openapi` field. Swagger 2.0 and unknown versions
/// are rejected; a missing field yields `None`.
pub(crate) fn sniff_version(raw: &Value) -> Result<Option<SpecVersion>> {
    if let Some(swagger) = raw.get("swagger") {
        return Err(OpenApiError::UnsupportedVersion(format!("swagger {}", scalar(swagger))));
    }
    match raw.get("openapi") {
        None => Ok(None),
        Some(value) => {
            let declared = scalar(value);
            declared
                .parse::<SpecVersion>()
                .map(Some)
                .map_err(OpenApiError::UnsupportedVersion)
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) if token.is_cancelled() => Err(OpenApiError::Cancelled),
        _ => Ok(()),
    }
}

/// Absolute `file://` location for a local path
pub fn file_location(path: &Path) -> Result<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute).map_err(|_| OpenApiError::InvalidLocation(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sniff_version() {
        assert_eq!(sniff_version(&json!({"openapi": "3.0.3"})).unwrap(), Some(SpecVersion::V3_0));
        assert_eq!(sniff_version(&json!({"openapi": 3.1})).unwrap(), Some(SpecVersion::V3_1));
        assert_eq!(sniff_version(&json!({})).unwrap(), None);
        assert!(matches!(
            sniff_version(&json!({"swagger": "2.0"})),
            Err(OpenApiError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            sniff_version(&json!({"openapi": "4.0.0"})),
            Err(OpenApiError::UnsupportedVersion(v)) if v == "4.0.0"
        ));
    }

    #[test]
    fn test_settings_from_yaml() {
        let settings = ReaderSettings::from_yaml("resolution: full\nmax_external_depth: 2\nformat: json\n").unwrap();
        assert_eq!(settings.resolution, ResolutionPolicy::Full);
        assert_eq!(settings.max_external_depth, 2);
        assert_eq!(settings.format, Some(Format::Json));
        assert!(settings.loader.is_none());

        let defaults = ReaderSettings::from_yaml("{}").unwrap();
        assert_eq!(defaults.max_external_depth, DEFAULT_MAX_EXTERNAL_DEPTH);
        assert_eq!(defaults.resolution, ResolutionPolicy::LocalOnly);
    }

    #[test]
    fn test_missing_version_assumes_3_0() {
        let result = OpenApiReader::default()
            .read_str("info: {title: t, version: '1'}\npaths: {}\n")
            .unwrap();
        assert_eq!(result.document.version, SpecVersion::V3_0);
        assert_eq!(result.diagnostics.with_code("oas::missing_version").count(), 1);
    }

    #[test]
    fn test_unparseable_text_is_an_error() {
        let err = OpenApiReader::default().read_str("{\"openapi\": ").unwrap_err();
        assert!(matches!(err, OpenApiError::Json(_)));
    }

    #[test]
    fn test_read_from_stream() {
        let text = "openapi: 3.1.0\ninfo: {title: t, version: '1'}\n";
        let mut input = std::io::Cursor::new(text.as_bytes().to_vec());
        let result = OpenApiReader::default().read(&mut input).unwrap();
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.document.info.title, "t");
        // a borrowed reader stays usable
        assert_eq!(input.position() as usize, text.len());
    }
}
