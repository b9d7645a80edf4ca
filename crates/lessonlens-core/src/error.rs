//! Error types for LessonLens.
//!
//! This module defines the error hierarchy for every pipeline stage:
//! configuration loading, standards lookup, document extraction, request
//! assembly and the generation service boundary.

use std::path::PathBuf;

use crate::client::ServiceError;

/// A specialized `Result` type for LessonLens operations.
pub type Result<T> = std::result::Result<T, LessonLensError>;

/// Errors that can occur while preparing or running a lesson analysis.
///
/// Variants are grouped by pipeline stage and carry an actionable suggestion
/// where one exists.
#[derive(Debug, thiserror::Error)]
pub enum LessonLensError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your lessonlens.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Standards Errors
    // ========================================================================
    /// The requested standard id is not in the registry.
    #[error("Unknown standard: '{id}'\n\nSuggestion: Run 'lessonlens standards' to list the available ids")]
    StandardNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// The standard id does not have the three leading segments of a domain key.
    #[error("Malformed standard id: '{id}' (expected at least subject.grade.domain)")]
    MalformedId {
        /// The offending id.
        id: String,
    },

    /// The shipped standards table could not be parsed.
    #[error("Standards registry is corrupted: {message}")]
    RegistryCorrupted {
        /// Description of the parse failure.
        message: String,
    },

    // ========================================================================
    // Document Errors
    // ========================================================================
    /// Document file was not found.
    #[error("Document not found: '{path}'\n\nSuggestion: Check the path or the referenceDocuments table in lessonlens.json")]
    DocumentNotFound {
        /// Path where the document was expected.
        path: PathBuf,
    },

    /// Document exceeds the size limit.
    #[error("Document exceeds size limit ({limit_mb}MB): '{source_name}' is {size_kb}KB")]
    DocumentTooLarge {
        /// Name of the oversized document.
        source_name: String,
        /// Actual size in kilobytes.
        size_kb: u64,
        /// Limit in megabytes.
        limit_mb: u64,
    },

    /// The document's extension does not map to a supported format.
    #[error("Unsupported document format: '{path}'\n\nSuggestion: Use a .pdf, .docx or .txt file")]
    UnsupportedFormat {
        /// Path of the document.
        path: PathBuf,
    },

    /// The PDF or DOCX reader could not parse the byte stream.
    #[error("Could not extract text from '{source_name}': {message}\n\nSuggestion: The file may be corrupt or encrypted; re-export it and try again")]
    Extraction {
        /// Name of the document.
        source_name: String,
        /// Reader error description.
        message: String,
    },

    /// A plain-text document is not valid UTF-8.
    #[error("Document has invalid encoding: '{source_name}'\n\nSuggestion: Convert the file to UTF-8 encoding")]
    Encoding {
        /// Name of the document.
        source_name: String,
    },

    // ========================================================================
    // Request Assembly Errors
    // ========================================================================
    /// Assembly was attempted without any lesson text.
    #[error("No lesson text to analyze\n\nSuggestion: Provide a lesson PDF that contains extractable text")]
    MissingLesson,

    /// The assembled request is larger than the configured budget.
    #[error("Assembled request is {size} characters, over the {budget} character budget\n\nSuggestion: Set truncation limits in lessonlens.json or select fewer standards")]
    RequestTooLarge {
        /// Actual request size in characters.
        size: usize,
        /// Configured budget in characters.
        budget: usize,
    },

    // ========================================================================
    // Generation Service Errors
    // ========================================================================
    /// The generation service reported a failure.
    #[error(transparent)]
    Service(#[from] ServiceError),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a failed analysis, used by reports and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No credential configured for the generation service.
    MissingCredential,
    /// No lesson text was available.
    MissingLesson,
    /// A document could not be read or parsed.
    Extraction,
    /// Unknown or malformed standard selection, or an oversized request.
    InvalidSelection,
    /// The generation service failed.
    Service,
    /// Configuration could not be loaded.
    Configuration,
    /// Other I/O failure.
    Io,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "missing_credential"),
            Self::MissingLesson => write!(f, "missing_lesson"),
            Self::Extraction => write!(f, "extraction"),
            Self::InvalidSelection => write!(f, "invalid_selection"),
            Self::Service => write!(f, "service"),
            Self::Configuration => write!(f, "configuration"),
            Self::Io => write!(f, "io"),
        }
    }
}

impl LessonLensError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `StandardNotFound` error.
    #[must_use]
    pub fn standard_not_found(id: impl Into<String>) -> Self {
        Self::StandardNotFound { id: id.into() }
    }

    /// Creates a new `MalformedId` error.
    #[must_use]
    pub fn malformed_id(id: impl Into<String>) -> Self {
        Self::MalformedId { id: id.into() }
    }

    /// Creates a new `DocumentNotFound` error.
    #[must_use]
    pub fn document_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DocumentNotFound { path: path.into() }
    }

    /// Creates a new `UnsupportedFormat` error.
    #[must_use]
    pub fn unsupported_format(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    /// Creates a new `Extraction` error.
    #[must_use]
    pub fn extraction(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(source_name: impl Into<String>) -> Self {
        Self::Encoding {
            source_name: source_name.into(),
        }
    }

    /// Returns the failure class used when reporting this error.
    #[must_use]
    pub const fn failure_class(&self) -> FailureClass {
        match self {
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. } => {
                FailureClass::Configuration
            }
            Self::StandardNotFound { .. }
            | Self::MalformedId { .. }
            | Self::RequestTooLarge { .. }
            | Self::UnsupportedFormat { .. } => FailureClass::InvalidSelection,
            Self::DocumentNotFound { .. }
            | Self::DocumentTooLarge { .. }
            | Self::Extraction { .. }
            | Self::Encoding { .. } => FailureClass::Extraction,
            Self::MissingLesson => FailureClass::MissingLesson,
            Self::Service(ServiceError::MissingCredential { .. }) => {
                FailureClass::MissingCredential
            }
            Self::Service(_) => FailureClass::Service,
            Self::RegistryCorrupted { .. } | Self::Io(_) | Self::Json(_) => FailureClass::Io,
        }
    }

    /// Returns `true` if the error must stop the request before any network call.
    ///
    /// Per-document extraction failures are not fatal while combining reference
    /// documents; the assembler records them and continues.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::StandardNotFound { .. }
                | Self::MalformedId { .. }
                | Self::RegistryCorrupted { .. }
                | Self::MissingLesson
                | Self::RequestTooLarge { .. }
                | Self::Service(ServiceError::MissingCredential { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = LessonLensError::standard_not_found("MA.9.XX.1.1");
        let msg = err.to_string();
        assert!(msg.contains("Unknown standard"));
        assert!(msg.contains("MA.9.XX.1.1"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_failure_class_display() {
        assert_eq!(FailureClass::MissingCredential.to_string(), "missing_credential");
        assert_eq!(FailureClass::Extraction.to_string(), "extraction");
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(
            LessonLensError::MissingLesson.failure_class(),
            FailureClass::MissingLesson
        );
        assert_eq!(
            LessonLensError::encoding("notes.txt").failure_class(),
            FailureClass::Extraction
        );
        assert_eq!(
            LessonLensError::malformed_id("MA.6").failure_class(),
            FailureClass::InvalidSelection
        );

        let missing: LessonLensError = ServiceError::missing_credential("GOOGLE_API_KEY").into();
        assert_eq!(missing.failure_class(), FailureClass::MissingCredential);

        let timeout: LessonLensError = ServiceError::Timeout { timeout_secs: 5 }.into();
        assert_eq!(timeout.failure_class(), FailureClass::Service);
    }

    #[test]
    fn test_is_fatal() {
        assert!(LessonLensError::MissingLesson.is_fatal());

        let missing: LessonLensError = ServiceError::missing_credential("GOOGLE_API_KEY").into();
        assert!(missing.is_fatal());

        assert!(!LessonLensError::extraction("unit.pdf", "bad xref").is_fatal());

        let rejected: LessonLensError = ServiceError::rejected("quota exceeded").into();
        assert!(!rejected.is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LessonLensError = io_err.into();
        assert!(matches!(err, LessonLensError::Io(_)));
    }

    #[test]
    fn test_service_error_is_transparent() {
        let err: LessonLensError = ServiceError::rejected("prompt blocked").into();
        assert_eq!(
            err.to_string(),
            ServiceError::rejected("prompt blocked").to_string()
        );
    }
}
