use miette::Severity;
use std::error::Error;
use std::fmt::{self, Display};

/// An ordered collection of diagnostics produced while reading and resolving
/// a document.
///
/// Content problems never abort a read; callers must inspect this list even
/// when a read "succeeds".
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the end of the list
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Move every diagnostic from `other` into this list
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if there are any errors (vs warnings)
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|d| d.severity == Severity::Error).count()
    }

    /// Get the number of warnings
    pub fn warning_count(&self) -> usize {
        self.entries.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    /// Diagnostics whose kind carries the given code (e.g. `oas::unresolved_reference`)
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |d| d.kind.code() == code)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error_count = self.error_count();
        let warning_count = self.warning_count();

        match (error_count, warning_count) {
            (0, 0) => write!(f, "No diagnostics"),
            (0, w) => write!(f, "Found {} warning{}", w, if w == 1 { "" } else { "s" }),
            (e, 0) => write!(f, "Found {} error{}", e, if e == 1 { "" } else { "s" }),
            (e, w) => write!(
                f,
                "Found {} error{} and {} warning{}",
                e,
                if e == 1 { "" } else { "s" },
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

impl Error for Diagnostics {}

impl miette::Diagnostic for Diagnostics {
    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        Some(Box::new(
            self.entries.iter().map(|d| d as &dyn miette::Diagnostic),
        ))
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A single problem found in a document, located by a JSON pointer
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,

    /// Where the problem was found, e.g. `#/paths/~1items/get`.
    /// Problems inside another document are prefixed with its location.
    pub pointer: String,

    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, pointer: impl Into<String>) -> Self {
        Self {
            kind,
            pointer: pointer.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(kind: DiagnosticKind, pointer: impl Into<String>) -> Self {
        Self {
            kind,
            pointer: pointer.into(),
            severity: Severity::Warning,
        }
    }

    pub fn message(&self) -> String {
        self.kind.message()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.kind.message(), self.pointer)
    }
}

impl Error for Diagnostic {}

impl miette::Diagnostic for Diagnostic {
    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.kind.help().map(|s| Box::new(s) as Box<dyn Display>)
    }

    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }
}

/// Different kinds of problems found while reading or resolving a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnresolvedReference { reference: String, cause: Option<String> },
    MalformedReference { reference: String, reason: String },
    CircularAlias { reference: String },
    ExternalDepthExceeded { reference: String, max_depth: usize },
    UndeclaredTag { name: String },
    DuplicateKey { key: String },
    MissingField { field: String },
    TypeMismatch { field: String, expected: String, got: String },
    InvalidValue { field: String, message: String },
    MissingVersion,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvedReference { .. } => "oas::unresolved_reference",
            Self::MalformedReference { .. } => "oas::malformed_reference",
            Self::CircularAlias { .. } => "oas::circular_alias",
            Self::ExternalDepthExceeded { .. } => "oas::external_depth_exceeded",
            Self::UndeclaredTag { .. } => "oas::undeclared_tag",
            Self::DuplicateKey { .. } => "oas::duplicate_key",
            Self::MissingField { .. } => "oas::missing_field",
            Self::TypeMismatch { .. } => "oas::type_mismatch",
            Self::InvalidValue { .. } => "oas::invalid_value",
            Self::MissingVersion => "oas::missing_version",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::UnresolvedReference { reference, cause: None } => {
                format!("Unresolved reference: '{}'", reference)
            }
            Self::UnresolvedReference { reference, cause: Some(cause) } => {
                format!("Unresolved reference: '{}' ({})", reference, cause)
            }
            Self::MalformedReference { reference, reason } => {
                format!("Malformed reference '{}': {}", reference, reason)
            }
            Self::CircularAlias { reference } => {
                format!("Reference '{}' resolves to itself", reference)
            }
            Self::ExternalDepthExceeded { reference, max_depth } => format!(
                "Reference '{}' exceeds the maximum of {} external document hop{}",
                reference,
                max_depth,
                if *max_depth == 1 { "" } else { "s" }
            ),
            Self::UndeclaredTag { name } => format!("Tag '{}' is not declared", name),
            Self::DuplicateKey { key } => format!("Duplicate key: '{}'", key),
            Self::MissingField { field } => format!("Missing required field: '{}'", field),
            Self::TypeMismatch { field, expected, got } => {
                format!("Invalid type for '{}': expected {}, got {}", field, expected, got)
            }
            Self::InvalidValue { field, message } => {
                format!("Invalid value for '{}': {}", field, message)
            }
            Self::MissingVersion => "Document does not declare an 'openapi' version".to_string(),
        }
    }

    pub fn help(&self) -> Option<String> {
        match self {
            Self::UnresolvedReference { .. } => {
                Some("Check that the target exists and, for external documents, that full resolution and a loader are configured".to_string())
            }
            Self::MalformedReference { .. } => {
                Some("References look like '#/components/schemas/Name' or 'other.yaml#/Name'".to_string())
            }
            Self::CircularAlias { .. } => {
                Some("A component cannot be defined only as a reference to itself".to_string())
            }
            Self::ExternalDepthExceeded { .. } => {
                Some("Raise max_external_depth or bundle the referenced documents".to_string())
            }
            Self::UndeclaredTag { name } => Some(format!("Add '{}' to the top-level tags list", name)),
            Self::DuplicateKey { .. } => Some("Each component and $id must be unique".to_string()),
            Self::MissingField { field } => Some(format!("Add the '{}' field", field)),
            Self::TypeMismatch { expected, .. } => {
                Some(format!("Change this value to be of type '{}'", expected))
            }
            Self::InvalidValue { .. } => None,
            Self::MissingVersion => Some("Add e.g. 'openapi: 3.1.0' at the top level".to_string()),
        }
    }
}
