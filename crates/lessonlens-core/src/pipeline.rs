//! One lesson analysis from selection to generated text.
//!
//! The flow is linear: resolve the reference documents for the selected
//! standards, extract the lesson, assemble the request, then make exactly one
//! call to the generation service. Every call owns its buffers; the registry is
//! the only shared state and it is read-only.

use crate::assembler::{AnalysisRequest, AssembleOptions, RequestAssembler};
use crate::client::AnalysisClient;
use crate::document::SourceDocument;
use crate::domain::ReferenceTable;
use crate::error::Result;
use crate::standards::StandardsRegistry;

/// What the user selected for one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    /// Standards in the order they should appear.
    pub standard_ids: Vec<String>,
    /// The lesson document.
    pub lesson: SourceDocument,
    /// Reference documents supplied alongside the lesson, added after the
    /// documents resolved from the domain table.
    pub extra_references: Vec<SourceDocument>,
    /// Instructions placed at the top of the request.
    pub instructions: String,
}

/// A completed analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The request that was sent.
    pub request: AnalysisRequest,
    /// Text returned by the generation service.
    pub text: String,
}

/// Runs analyses against one registry, reference table and client.
pub struct AnalysisPipeline<'a, C> {
    registry: &'a StandardsRegistry,
    references: ReferenceTable,
    options: AssembleOptions,
    client: C,
}

impl<'a, C: AnalysisClient> AnalysisPipeline<'a, C> {
    /// Creates a pipeline.
    ///
    /// The client already holds its credential, so a missing credential is
    /// reported before any document is read.
    #[must_use]
    pub const fn new(
        registry: &'a StandardsRegistry,
        references: ReferenceTable,
        options: AssembleOptions,
        client: C,
    ) -> Self {
        Self {
            registry,
            references,
            options,
            client,
        }
    }

    /// The generation client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Builds the request without calling the generation service.
    ///
    /// # Errors
    ///
    /// - `MalformedId` if a standard id has no domain key.
    /// - `UnsupportedFormat` if a mapped reference document has an unknown extension.
    /// - Any extraction error for the lesson itself.
    /// - Any assembly error (`MissingLesson`, `StandardNotFound`, `RequestTooLarge`).
    pub fn prepare(&self, input: &AnalysisInput) -> Result<AnalysisRequest> {
        let mut references = Vec::new();
        for path in self
            .references
            .required_reference_documents(&input.standard_ids)?
        {
            references.push(SourceDocument::from_path(path)?);
        }
        references.extend(input.extra_references.iter().cloned());

        tracing::debug!(
            lesson = %input.lesson.display_name(),
            standards = input.standard_ids.len(),
            references = references.len(),
            "Preparing analysis request"
        );

        let lesson_text = input.lesson.extract_text()?;

        RequestAssembler::new(self.registry, self.options).assemble(
            &input.instructions,
            input.standard_ids.as_slice(),
            &references,
            &lesson_text,
        )
    }

    /// Prepares the request and sends it to the generation service once.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::prepare`], or `LessonLensError::Service`
    /// with the client's error unchanged. Nothing is retried.
    pub async fn run(&self, input: &AnalysisInput) -> Result<Analysis> {
        let request = self.prepare(input)?;
        let text = self.generate(&request).await?;
        Ok(Analysis { request, text })
    }

    /// Sends an already assembled request to the generation service once.
    ///
    /// Callers that need the request even when the service fails call
    /// [`Self::prepare`] and then this.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::Service` with the client's error unchanged.
    pub async fn generate(&self, request: &AnalysisRequest) -> Result<String> {
        tracing::info!(chars = request.total_chars, "Sending analysis request");

        match self.client.generate(&request.text).await {
            Ok(text) => {
                tracing::info!(chars = text.chars().count(), "Analysis received");
                Ok(text)
            }
            Err(e) => {
                tracing::warn!(
                    kind = %e.kind(),
                    transient = e.is_transient(),
                    "Generation service failed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::assembler::{NO_REFERENCES_SENTINEL, REFERENCE_HEADER};
    use crate::client::ServiceError;
    use crate::document::DocumentFormat;
    use crate::error::LessonLensError;
    use crate::standards::DomainKey;

    struct FakeClient {
        response: std::result::Result<String, ServiceError>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn replying(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: ServiceError) -> Self {
            Self {
                response: Err(err),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnalysisClient for FakeClient {
        async fn generate(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.response.clone()
        }
    }

    fn lesson(text: &str) -> SourceDocument {
        SourceDocument::from_bytes("6.02.06.txt", text.as_bytes().to_vec(), DocumentFormat::PlainText)
    }

    fn input(standard_ids: &[&str], lesson: SourceDocument) -> AnalysisInput {
        AnalysisInput {
            standard_ids: standard_ids.iter().map(ToString::to_string).collect(),
            lesson,
            extra_references: Vec::new(),
            instructions: "Analyze.".to_string(),
        }
    }

    fn pipeline(references: ReferenceTable, client: FakeClient) -> AnalysisPipeline<'static, FakeClient> {
        AnalysisPipeline::new(
            StandardsRegistry::builtin().unwrap(),
            references,
            AssembleOptions::unbounded(),
            client,
        )
    }

    #[tokio::test]
    async fn test_run_calls_client_once_with_request_text() {
        let pipeline = pipeline(ReferenceTable::new(), FakeClient::replying("Strong alignment."));
        let analysis = pipeline
            .run(&input(&["MA.6.NSO.1.1"], lesson("Students plot integers.")))
            .await
            .unwrap();

        assert_eq!(analysis.text, "Strong alignment.");
        assert_eq!(analysis.request.standards_included, 1);
        let calls = pipeline.client().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], analysis.request.text);
        assert!(calls[0].contains(NO_REFERENCES_SENTINEL));
    }

    #[tokio::test]
    async fn test_missing_lesson_never_reaches_client() {
        let pipeline = pipeline(ReferenceTable::new(), FakeClient::replying("unused"));
        let err = pipeline
            .run(&input(&["MA.6.NSO.1.1"], lesson("  \n")))
            .await
            .unwrap_err();

        assert!(matches!(err, LessonLensError::MissingLesson));
        assert!(pipeline.client().calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_id_never_reaches_client() {
        let pipeline = pipeline(ReferenceTable::new(), FakeClient::replying("unused"));
        let err = pipeline
            .run(&input(&["MA.6"], lesson("Lesson")))
            .await
            .unwrap_err();

        assert!(matches!(err, LessonLensError::MalformedId { .. }));
        assert!(pipeline.client().calls().is_empty());
    }

    #[test]
    fn test_service_error_surfaced_verbatim() {
        let pipeline = pipeline(
            ReferenceTable::new(),
            FakeClient::failing(ServiceError::Timeout { timeout_secs: 120 }),
        );
        let err = tokio_test::block_on(pipeline.run(&input(&["MA.6.NSO.1.1"], lesson("Lesson"))))
            .unwrap_err();

        assert!(matches!(
            err,
            LessonLensError::Service(ServiceError::Timeout { timeout_secs: 120 })
        ));
        assert_eq!(pipeline.client().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_request_kept_when_generation_fails() {
        let pipeline = pipeline(
            ReferenceTable::new(),
            FakeClient::failing(ServiceError::rejected("quota exceeded")),
        );
        let request = pipeline
            .prepare(&input(&["MA.6.NSO.1.1", "MA.6.NSO.1.2"], lesson("Lesson")))
            .unwrap();

        let err = pipeline.generate(&request).await.unwrap_err();

        assert!(matches!(
            err,
            LessonLensError::Service(ServiceError::RequestRejected { .. })
        ));
        assert_eq!(request.standards_included, 2);
        assert_eq!(pipeline.client().calls(), vec![request.text.clone()]);
    }

    #[test]
    fn test_prepare_resolves_domain_references() {
        let dir = tempfile::tempdir().unwrap();
        let nso = dir.path().join("NSO Progression.txt");
        std::fs::write(&nso, "Integers extend whole numbers.").unwrap();

        let mut table = ReferenceTable::new();
        table.insert(DomainKey::parse("MA.6.NSO").unwrap(), nso);
        table.insert(
            DomainKey::parse("MA.6.AR").unwrap(),
            dir.path().join("AR Progression.txt"),
        );

        let pipeline = pipeline(table, FakeClient::replying("unused"));
        let request = pipeline
            .prepare(&input(&["MA.6.NSO.1.1", "MA.6.NSO.1.2"], lesson("Lesson")))
            .unwrap();

        assert!(request.text.contains(REFERENCE_HEADER));
        assert!(request.text.contains("--- NSO Progression.txt ---\nIntegers extend whole numbers."));
        assert_eq!(request.reference_names, vec!["NSO Progression.txt"]);
        assert!(request.reference_failures.is_empty());
    }

    #[test]
    fn test_prepare_records_missing_reference_file() {
        let mut table = ReferenceTable::new();
        table.insert(
            DomainKey::parse("MA.6.AR").unwrap(),
            PathBuf::from("/nonexistent/AR Progression.docx"),
        );

        let pipeline = pipeline(table, FakeClient::replying("unused"));
        let mut input = input(&["MA.6.AR.1.1"], lesson("Lesson"));
        input.extra_references.push(SourceDocument::from_bytes(
            "User Uploaded Progression Document",
            b"Teacher notes".to_vec(),
            DocumentFormat::PlainText,
        ));

        let request = pipeline.prepare(&input).unwrap();
        assert_eq!(request.references_included, 1);
        assert_eq!(request.reference_failures.len(), 1);
        assert_eq!(request.reference_failures[0].name, "AR Progression.docx");
        assert!(request.text.contains("[unavailable: AR Progression.docx: Document not found"));
        assert!(request.text.contains("--- User Uploaded Progression Document ---\nTeacher notes"));
    }

    #[test]
    fn test_prepare_lesson_extraction_failure_is_fatal() {
        let pipeline = pipeline(ReferenceTable::new(), FakeClient::replying("unused"));
        let broken = SourceDocument::from_bytes("6.01.01.pdf", b"not a pdf".to_vec(), DocumentFormat::Pdf);

        let err = pipeline.prepare(&input(&["MA.6.NSO.1.1"], broken)).unwrap_err();
        assert!(matches!(err, LessonLensError::Extraction { .. }));
    }
}
