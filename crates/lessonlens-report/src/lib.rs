//! LessonLens Report Generation
//!
//! Types and generators for recording one lesson analysis run. Reports can be
//! serialized to JSON for programmatic access or rendered to Markdown for
//! teachers and curriculum reviewers.
//!
//! # Types
//!
//! - [`AnalysisReport`] - Everything known about one analysis run
//! - [`ReportStatus`] - Final outcome, including the classified failure reason
//! - [`ReferenceEntry`] - A reference document and whether it reached the request
//! - [`RequestStats`] - Size metadata of the assembled request
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Compact or pretty JSON
//! - [`MarkdownGenerator`] - Human-readable Markdown
//!
//! # Example
//!
//! ```rust
//! use lessonlens_report::{AnalysisReport, ReportStatus, RequestStats};
//! use lessonlens_report::json::JsonGenerator;
//!
//! let report = AnalysisReport::builder()
//!     .lesson_name("6.02.06.pdf")
//!     .lesson_path("lessons/6.02.06.pdf")
//!     .status(ReportStatus::Completed)
//!     .standard("MA.6.NSO.1.1")
//!     .request(RequestStats {
//!         total_chars: 4200,
//!         standards_included: 1,
//!         references_included: 0,
//!     })
//!     .analysis("The lesson addresses MA.6.NSO.1.1 directly.")
//!     .build()
//!     .unwrap();
//!
//! let json = JsonGenerator::new(&report).generate_pretty().unwrap();
//! assert!(json.contains("\"status\": \"completed\""));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Report Status (local copy to avoid cross-crate dependency)
// ============================================================================

/// Outcome of an analysis run.
///
/// The failure variants mirror `FailureClass` from the core crate so reports
/// can be read without depending on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// The generation service returned an analysis.
    Completed,
    /// No credential configured for the generation service.
    MissingCredential,
    /// No lesson text was available.
    MissingLesson,
    /// The lesson document could not be read or parsed.
    Extraction,
    /// Unknown or malformed standards, or an oversized request.
    InvalidSelection,
    /// The generation service failed.
    ServiceError,
    /// Configuration could not be loaded.
    Configuration,
    /// Any other failure.
    #[default]
    Error,
}

impl ReportStatus {
    /// Returns `true` if the analysis completed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` if the run failed before a request was sent.
    #[must_use]
    pub const fn failed_before_request(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::MissingLesson
                | Self::Extraction
                | Self::InvalidSelection
                | Self::Configuration
        )
    }

    /// Returns a human-readable description of the status.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Completed => "Analysis completed",
            Self::MissingCredential => "No service credential configured",
            Self::MissingLesson => "No lesson text to analyze",
            Self::Extraction => "Lesson document could not be read",
            Self::InvalidSelection => "Invalid standards selection",
            Self::ServiceError => "Generation service failed",
            Self::Configuration => "Invalid configuration",
            Self::Error => "Unexpected error",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// AnalysisReport
// ============================================================================

/// Report for one lesson analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// File name of the lesson.
    pub lesson_name: String,

    /// Path the lesson was read from.
    pub lesson_path: String,

    /// Final outcome.
    pub status: ReportStatus,

    /// Generation provider used, if one was reached.
    pub provider: Option<String>,

    /// Selected standard ids, in request order.
    pub standards: Vec<String>,

    /// Reference documents considered for the request.
    pub references: Vec<ReferenceEntry>,

    /// Size metadata of the assembled request, if assembly succeeded.
    pub request: Option<RequestStats>,

    /// Generated analysis text.
    pub analysis: Option<String>,

    /// Error message when the run failed.
    pub failure: Option<String>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Creates a new report builder.
    #[must_use]
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    /// Serializes the report to JSON.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Serialization` if JSON serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Wall-clock duration of the run in whole seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        u64::try_from((self.ended_at - self.started_at).num_seconds()).unwrap_or(0)
    }

    /// Reference documents that were replaced by an unavailable marker.
    #[must_use]
    pub fn unavailable_references(&self) -> Vec<&ReferenceEntry> {
        self.references.iter().filter(|r| !r.included).collect()
    }
}

// ============================================================================
// ReportBuilder
// ============================================================================

/// Builder for constructing [`AnalysisReport`] instances.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    lesson_name: Option<String>,
    lesson_path: Option<String>,
    status: Option<ReportStatus>,
    provider: Option<String>,
    standards: Vec<String>,
    references: Vec<ReferenceEntry>,
    request: Option<RequestStats>,
    analysis: Option<String>,
    failure: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl ReportBuilder {
    /// Sets the lesson file name.
    #[must_use]
    pub fn lesson_name(mut self, name: impl Into<String>) -> Self {
        self.lesson_name = Some(name.into());
        self
    }

    /// Sets the lesson path.
    #[must_use]
    pub fn lesson_path(mut self, path: impl Into<String>) -> Self {
        self.lesson_path = Some(path.into());
        self
    }

    /// Sets the final status.
    #[must_use]
    pub const fn status(mut self, status: ReportStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the generation provider.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Adds a standard id.
    #[must_use]
    pub fn standard(mut self, id: impl Into<String>) -> Self {
        self.standards.push(id.into());
        self
    }

    /// Sets all standard ids at once.
    #[must_use]
    pub fn standards(mut self, ids: Vec<String>) -> Self {
        self.standards = ids;
        self
    }

    /// Adds a reference document entry.
    #[must_use]
    pub fn reference(mut self, entry: ReferenceEntry) -> Self {
        self.references.push(entry);
        self
    }

    /// Sets the request metadata.
    #[must_use]
    pub const fn request(mut self, stats: RequestStats) -> Self {
        self.request = Some(stats);
        self
    }

    /// Sets the generated analysis.
    #[must_use]
    pub fn analysis(mut self, text: impl Into<String>) -> Self {
        self.analysis = Some(text.into());
        self
    }

    /// Sets the failure message.
    #[must_use]
    pub fn failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sets the start and end times. Both default to now.
    #[must_use]
    pub const fn timing(mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self.ended_at = Some(ended_at);
        self
    }

    /// Builds the report.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidData` if required fields are missing, if a
    /// completed report has no analysis, or if a failed report has no failure message.
    pub fn build(self) -> Result<AnalysisReport> {
        let lesson_name = self
            .lesson_name
            .ok_or_else(|| ReportError::InvalidData("lesson_name is required".to_string()))?;

        let status = self
            .status
            .ok_or_else(|| ReportError::InvalidData("status is required".to_string()))?;

        if status.is_success() && self.analysis.is_none() {
            return Err(ReportError::InvalidData(
                "a completed report requires the analysis text".to_string(),
            ));
        }
        if !status.is_success() && self.failure.is_none() {
            return Err(ReportError::InvalidData(
                "a failed report requires a failure message".to_string(),
            ));
        }

        let now = Utc::now();
        let started_at = self.started_at.unwrap_or(now);
        let ended_at = self.ended_at.unwrap_or(now);

        Ok(AnalysisReport {
            lesson_path: self.lesson_path.unwrap_or_else(|| lesson_name.clone()),
            lesson_name,
            status,
            provider: self.provider,
            standards: self.standards,
            references: self.references,
            request: self.request,
            analysis: self.analysis,
            failure: self.failure,
            started_at,
            ended_at,
        })
    }
}

// ============================================================================
// ReferenceEntry
// ============================================================================

/// A reference document considered for the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Document name.
    pub name: String,

    /// Whether the document's text reached the request.
    pub included: bool,

    /// Why the document was left out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReferenceEntry {
    /// A document whose text was included.
    #[must_use]
    pub fn included(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included: true,
            reason: None,
        }
    }

    /// A document replaced by an unavailable marker.
    #[must_use]
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included: false,
            reason: Some(reason.into()),
        }
    }
}

// ============================================================================
// RequestStats
// ============================================================================

/// Size metadata of the assembled request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStats {
    /// Request length in characters.
    pub total_chars: usize,

    /// Standards formatted into the request.
    pub standards_included: usize,

    /// Reference documents that contributed text.
    pub references_included: usize,
}

// ============================================================================
// Tests
// ============================================================================
