//! Request assembly.
//!
//! Composes the text sent to the generation service from four sections in a
//! fixed order: instructions, standards, reference material and the lesson.
//! Each section is bounded on its own before concatenation so a truncation
//! marker never lands inside another section.

use std::borrow::Cow;

use crate::document::SourceDocument;
use crate::error::{LessonLensError, Result};
use crate::standards::StandardsRegistry;

/// Appended to a section that was cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// Header of the standards section.
pub const STANDARDS_HEADER: &str = "STANDARDS:";

/// Header of the reference section.
pub const REFERENCE_HEADER: &str = "REFERENCE:";

/// Header of the lesson section.
pub const LESSON_HEADER: &str = "LESSON:";

/// Stands in for the reference section when no document yielded text.
pub const NO_REFERENCES_SENTINEL: &str = "No reference documents available";

/// Per-section length policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    /// Keep the whole text.
    Unbounded,
    /// Keep at most this many characters, then append [`TRUNCATION_MARKER`].
    Chars(usize),
}

impl Truncation {
    /// `None` means unbounded.
    #[must_use]
    pub const fn from_limit(limit: Option<usize>) -> Self {
        match limit {
            Some(chars) => Self::Chars(chars),
            None => Self::Unbounded,
        }
    }

    /// Applies the policy. The marker is added only when text was removed.
    #[must_use]
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match *self {
            Self::Unbounded => Cow::Borrowed(text),
            Self::Chars(limit) => match text.char_indices().nth(limit) {
                Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
                None => Cow::Borrowed(text),
            },
        }
    }
}

/// Size policy for one assembled request.
///
/// There is no default: completeness against request size is a deployment
/// decision, so callers pick [`AssembleOptions::unbounded`],
/// [`AssembleOptions::legacy`] or their own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Limit applied to each reference document.
    pub reference_truncation: Truncation,
    /// Limit applied to the lesson text.
    pub lesson_truncation: Truncation,
    /// Upper bound on the whole request; exceeding it fails assembly.
    pub max_total_chars: Option<usize>,
}

impl AssembleOptions {
    /// No truncation and no overall budget.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            reference_truncation: Truncation::Unbounded,
            lesson_truncation: Truncation::Unbounded,
            max_total_chars: None,
        }
    }

    /// 1000 characters per reference document and 3000 for the lesson.
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            reference_truncation: Truncation::Chars(1000),
            lesson_truncation: Truncation::Chars(3000),
            max_total_chars: None,
        }
    }
}

/// A reference document left out of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFailure {
    /// Display name of the document.
    pub name: String,
    /// First line of the extraction error.
    pub reason: String,
}

impl ReferenceFailure {
    fn from_error(name: String, err: &LessonLensError) -> Self {
        let message = err.to_string();
        let reason = message.lines().next().unwrap_or_default().to_string();
        Self { name, reason }
    }

    /// Visible marker substituted for the document's text.
    #[must_use]
    pub fn marker(&self) -> String {
        format!("[unavailable: {}: {}]", self.name, self.reason)
    }
}

/// The assembled payload and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Text sent to the generation service.
    pub text: String,
    /// Length of `text` in characters.
    pub total_chars: usize,
    /// Number of standards formatted into the request.
    pub standards_included: usize,
    /// Number of reference documents that contributed text.
    pub references_included: usize,
    /// Names of the contributing reference documents, in input order.
    pub reference_names: Vec<String>,
    /// Reference documents replaced by an unavailable marker.
    pub reference_failures: Vec<ReferenceFailure>,
}

impl AnalysisRequest {
    /// Returns `true` if any reference document failed to extract.
    #[must_use]
    pub fn has_reference_failures(&self) -> bool {
        !self.reference_failures.is_empty()
    }
}

/// Builds [`AnalysisRequest`]s against a standards registry.
#[derive(Debug, Clone, Copy)]
pub struct RequestAssembler<'a> {
    registry: &'a StandardsRegistry,
    options: AssembleOptions,
}

impl<'a> RequestAssembler<'a> {
    /// Creates an assembler with the given size policy.
    #[must_use]
    pub const fn new(registry: &'a StandardsRegistry, options: AssembleOptions) -> Self {
        Self { registry, options }
    }

    /// The size policy in use.
    #[must_use]
    pub const fn options(&self) -> &AssembleOptions {
        &self.options
    }

    /// Assembles one request.
    ///
    /// Standards appear in the order given. Reference documents are extracted
    /// here; one that fails is replaced by a visible marker and recorded in
    /// [`AnalysisRequest::reference_failures`] without aborting the rest.
    ///
    /// # Errors
    ///
    /// - `MissingLesson` if `lesson_text` is empty or whitespace, checked first.
    /// - `StandardNotFound` if an id is not in the registry.
    /// - `RequestTooLarge` if the result exceeds `max_total_chars`.
    pub fn assemble<S: AsRef<str>>(
        &self,
        instructions: &str,
        standard_ids: &[S],
        references: &[SourceDocument],
        lesson_text: &str,
    ) -> Result<AnalysisRequest> {
        if lesson_text.trim().is_empty() {
            return Err(LessonLensError::MissingLesson);
        }

        let mut standards = String::new();
        for id in standard_ids {
            standards.push_str(&self.registry.format_for_analysis(id.as_ref())?);
        }

        let mut reference_blocks = Vec::new();
        let mut reference_names = Vec::new();
        let mut reference_failures = Vec::new();
        for document in references {
            let name = document.display_name();
            match document.extract_text() {
                Ok(content) if content.trim().is_empty() => {
                    tracing::debug!(document = %name, "Reference document is empty, skipping");
                }
                Ok(content) => {
                    let body = self.options.reference_truncation.apply(&content);
                    reference_blocks.push(format!("--- {name} ---\n{}\n\n", body.trim_end()));
                    reference_names.push(name);
                }
                Err(err) => {
                    tracing::warn!(document = %name, error = %err, "Reference document unavailable");
                    let failure = ReferenceFailure::from_error(name, &err);
                    reference_blocks.push(format!("{}\n\n", failure.marker()));
                    reference_failures.push(failure);
                }
            }
        }

        let mut text = String::new();
        if !instructions.trim().is_empty() {
            text.push_str(instructions.trim_end());
            text.push_str("\n\n");
        }

        text.push_str(STANDARDS_HEADER);
        text.push('\n');
        text.push_str(&standards);

        if reference_names.is_empty() {
            text.push_str(NO_REFERENCES_SENTINEL);
            text.push_str("\n\n");
        } else {
            text.push_str(REFERENCE_HEADER);
            text.push('\n');
        }
        for block in &reference_blocks {
            text.push_str(block);
        }

        text.push_str(LESSON_HEADER);
        text.push('\n');
        text.push_str(self.options.lesson_truncation.apply(lesson_text.trim_end()).as_ref());
        text.push('\n');

        let total_chars = text.chars().count();
        if let Some(budget) = self.options.max_total_chars {
            if total_chars > budget {
                return Err(LessonLensError::RequestTooLarge {
                    size: total_chars,
                    budget,
                });
            }
        }

        tracing::info!(
            standards = standard_ids.len(),
            references = reference_names.len(),
            failed_references = reference_failures.len(),
            chars = total_chars,
            "Assembled analysis request"
        );

        Ok(AnalysisRequest {
            text,
            total_chars,
            standards_included: standard_ids.len(),
            references_included: reference_names.len(),
            reference_names,
            reference_failures,
        })
    }
}
