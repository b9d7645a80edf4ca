//! End-to-end integration tests for LessonLens
//!
//! These tests build a lesson workspace on disk (configuration, DOCX
//! progression documents, lesson files), run the pipeline against it and
//! render the resulting reports.

use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use docx_rs::{Docx, Paragraph, Run};
use lessonlens_core::{
    scan_lessons, AnalysisClient, AnalysisInput, AnalysisPipeline, Config, Credential,
    DocumentFormat, FailureClass, LessonLensError, ServiceError, SourceDocument,
    StandardsRegistry, NO_REFERENCES_SENTINEL, REFERENCE_HEADER,
};
use lessonlens_report::{
    json::JsonGenerator, AnalysisReport, MarkdownGenerator, ReferenceEntry, ReportStatus,
    RequestStats,
};
use tempfile::TempDir;

const CONFIG: &str = r#"{
    "lessonDir": "lessons",
    "referenceDocuments": {
        "MA.6.NSO": "data/6-8 NSO Progression.docx",
        "MA.6.AR": "data/6-8 AR Progression.docx"
    },
    "truncation": { "referenceChars": 1000 }
}"#;

/// Records every prompt and answers with a fixed analysis.
struct RecordingClient {
    prompts: Mutex<Vec<String>>,
}

impl RecordingClient {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl AnalysisClient for RecordingClient {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        Ok("The lesson addresses integer ordering well.".to_string())
    }
}

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let mut docx = Docx::new();
    for text in paragraphs {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
    }
    let mut buf = Cursor::new(Vec::new());
    docx.build().pack(&mut buf).expect("Failed to build DOCX fixture");
    std::fs::write(path, buf.into_inner()).expect("Failed to write DOCX fixture");
}

/// Creates a lesson workspace with the NSO progression document only.
fn workspace() -> (TempDir, Config) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path();

    std::fs::create_dir_all(root.join("data")).expect("Failed to create data dir");
    std::fs::create_dir_all(root.join("lessons")).expect("Failed to create lessons dir");

    write_docx(
        &root.join("data/6-8 NSO Progression.docx"),
        &[
            "Number Sense and Operations Progression",
            "Grade 6 extends the number system to include negative numbers.",
        ],
    );
    std::fs::write(
        root.join("lessons/6.02.06.txt"),
        "Students place integers on a number line and compare them.",
    )
    .expect("Failed to write lesson");
    std::fs::write(root.join("lessonlens.json"), CONFIG).expect("Failed to write config");

    let config = Config::load_from_dir(root).expect("Failed to load config");
    (dir, config)
}

fn input(root: &Path, ids: &[&str]) -> AnalysisInput {
    AnalysisInput {
        standard_ids: ids.iter().map(ToString::to_string).collect(),
        lesson: SourceDocument::from_path(root.join("lessons/6.02.06.txt"))
            .expect("Lesson format not recognized"),
        extra_references: Vec::new(),
        instructions: "Analyze the lesson.".to_string(),
    }
}

fn pipeline<C: AnalysisClient>(
    root: &Path,
    config: &Config,
    client: C,
) -> AnalysisPipeline<'static, C> {
    AnalysisPipeline::new(
        StandardsRegistry::builtin().expect("Built-in registry failed to load"),
        config.reference_table(root).expect("Invalid reference table"),
        config.assemble_options(),
        client,
    )
}

/// Tests the full flow from configuration to rendered reports.
#[tokio::test]
async fn test_config_to_report() {
    let (dir, config) = workspace();
    let pipeline = pipeline(dir.path(), &config, RecordingClient::new());

    let analysis = pipeline
        .run(&input(dir.path(), &["MA.6.NSO.1.1", "MA.6.NSO.1.2"]))
        .await
        .expect("Analysis failed");

    let prompts = pipeline.client().prompts();
    assert_eq!(prompts.len(), 1, "Exactly one generation call expected");
    let prompt = &prompts[0];
    assert!(prompt.starts_with("Analyze the lesson.\n\nSTANDARDS:\nMA.6.NSO.1.1: "));
    assert!(prompt.contains(REFERENCE_HEADER));
    assert!(prompt.contains(
        "--- 6-8 NSO Progression.docx ---\nNumber Sense and Operations Progression\nGrade 6 extends"
    ));
    assert!(prompt
        .ends_with("LESSON:\nStudents place integers on a number line and compare them.\n"));

    let request = &analysis.request;
    assert_eq!(request.standards_included, 2);
    assert_eq!(request.references_included, 1);

    let report = AnalysisReport::builder()
        .lesson_name("6.02.06.txt")
        .status(ReportStatus::Completed)
        .provider(config.llm_command().program)
        .standards(vec!["MA.6.NSO.1.1".to_string(), "MA.6.NSO.1.2".to_string()])
        .reference(ReferenceEntry::included(&request.reference_names[0]))
        .request(RequestStats {
            total_chars: request.total_chars,
            standards_included: request.standards_included,
            references_included: request.references_included,
        })
        .analysis(&analysis.text)
        .build()
        .expect("Report should build");

    let markdown = MarkdownGenerator::new(&report).generate();
    assert!(markdown.contains("# Lesson Analysis Report: 6.02.06.txt"));
    assert!(markdown.contains("| Reference Documents | 1 included |"));
    assert!(markdown.contains("The lesson addresses integer ordering well."));

    let report_path = dir.path().join("lessonlens-report.json");
    JsonGenerator::new(&report)
        .write_to_file(&report_path, true)
        .expect("Failed to write JSON report");
    let value: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(&report_path).expect("Failed to read JSON report"),
    )
    .expect("Report is not valid JSON");
    assert_eq!(value["status"], "completed");
    assert_eq!(value["request"]["standards_included"], 2);
}

/// Tests that a missing progression document is marked, not fatal.
#[tokio::test]
async fn test_missing_reference_document_is_marked() {
    let (dir, config) = workspace();
    let pipeline = pipeline(dir.path(), &config, RecordingClient::new());

    let analysis = pipeline
        .run(&input(dir.path(), &["MA.6.AR.1.1"]))
        .await
        .expect("Analysis should survive a missing reference");

    let request = &analysis.request;
    assert_eq!(request.references_included, 0);
    assert_eq!(request.reference_failures.len(), 1);
    assert_eq!(request.reference_failures[0].name, "6-8 AR Progression.docx");
    assert!(request.text.contains(NO_REFERENCES_SENTINEL));
    assert!(request
        .text
        .contains("[unavailable: 6-8 AR Progression.docx: Document not found"));
}

/// Tests that domains without a mapped document add no reference section.
#[test]
fn test_unmapped_domain_uses_sentinel() {
    let (dir, config) = workspace();
    let pipeline = pipeline(dir.path(), &config, RecordingClient::new());

    let request = pipeline
        .prepare(&input(dir.path(), &["MA.7.GR.1.1"]))
        .expect("Prepare failed");

    assert!(!request.text.contains(REFERENCE_HEADER));
    assert!(request.text.contains(NO_REFERENCES_SENTINEL));
    assert!(!request.has_reference_failures());
}

/// Tests that the configured reference limit applies to each document.
#[test]
fn test_reference_truncation_from_config() {
    let (dir, config) = workspace();
    let long_paragraph = "ratio ".repeat(400);
    write_docx(
        &dir.path().join("data/6-8 NSO Progression.docx"),
        &[long_paragraph.as_str()],
    );
    let pipeline = pipeline(dir.path(), &config, RecordingClient::new());

    let request = pipeline
        .prepare(&input(dir.path(), &["MA.6.NSO.1.1"]))
        .expect("Prepare failed");

    let expected = format!(
        "--- 6-8 NSO Progression.docx ---\n{}...\n\nLESSON:",
        &long_paragraph[..1000]
    );
    assert!(request.text.contains(&expected));
}

/// Tests that an uploaded reference document is added after mapped ones.
#[test]
fn test_extra_reference_document() {
    let (dir, config) = workspace();
    let pipeline = pipeline(dir.path(), &config, RecordingClient::new());

    let mut input = input(dir.path(), &["MA.6.NSO.1.1"]);
    input.extra_references.push(SourceDocument::from_bytes(
        "Teacher Notes",
        b"Focus on absolute value next week.".to_vec(),
        DocumentFormat::PlainText,
    ));

    let request = pipeline.prepare(&input).expect("Prepare failed");
    let mapped = request
        .text
        .find("--- 6-8 NSO Progression.docx ---")
        .expect("Mapped reference missing");
    let uploaded = request
        .text
        .find("--- Teacher Notes ---\nFocus on absolute value next week.")
        .expect("Uploaded reference missing");
    assert!(mapped < uploaded);
    assert_eq!(
        request.reference_names,
        vec!["6-8 NSO Progression.docx", "Teacher Notes"]
    );
}

/// Tests that an empty lesson fails before the client is called.
#[tokio::test]
async fn test_empty_lesson_never_reaches_client() {
    let (dir, config) = workspace();
    std::fs::write(dir.path().join("lessons/6.02.06.txt"), "").expect("Failed to write lesson");
    let pipeline = pipeline(dir.path(), &config, RecordingClient::new());

    let err = pipeline
        .run(&input(dir.path(), &["MA.6.NSO.1.1"]))
        .await
        .expect_err("Empty lesson must fail");

    assert!(matches!(err, LessonLensError::MissingLesson));
    assert_eq!(err.failure_class(), FailureClass::MissingLesson);
    assert!(pipeline.client().prompts().is_empty());
}

/// Tests that a missing credential is reported as a configuration failure.
#[test]
fn test_missing_credential() {
    let err: LessonLensError = Credential::from_env("LESSONLENS_INTEGRATION_UNSET_KEY")
        .expect_err("Variable should not be set")
        .into();

    assert!(err.is_fatal());
    assert_eq!(err.failure_class(), FailureClass::MissingCredential);
    assert!(err.to_string().contains("LESSONLENS_INTEGRATION_UNSET_KEY"));
}

/// Tests lesson discovery in the configured lesson directory.
#[test]
fn test_lesson_scan() {
    let (dir, config) = workspace();
    let lessons_dir = dir.path().join(&config.lesson_dir);
    for name in ["6.10.01.pdf", "6.02.06.pdf", "lesson_final.pdf"] {
        std::fs::write(lessons_dir.join(name), b"%PDF-1.4").expect("Failed to write lesson");
    }

    let lessons = scan_lessons(&lessons_dir).expect("Scan failed");
    let found: Vec<(u32, u32, u32)> = lessons
        .iter()
        .map(|l| (l.grade, l.unit, l.lesson))
        .collect();
    assert_eq!(found, vec![(6, 2, 6), (6, 10, 1)]);
}

/// Tests the command adapter end to end with `cat` standing in for a provider CLI.
#[cfg(unix)]
#[tokio::test]
async fn test_command_client_round_trip() {
    use std::time::Duration;

    use lessonlens_core::{CommandClient, LlmCommand};

    let (dir, config) = workspace();
    let client = CommandClient::with_command(
        &LlmCommand {
            program: "cat".to_string(),
            args: Vec::new(),
        },
        Credential::new("LESSONLENS_TEST_KEY", "test-secret"),
        Duration::from_secs(10),
    );
    let pipeline = pipeline(dir.path(), &config, client);

    let analysis = pipeline
        .run(&input(dir.path(), &["MA.6.NSO.1.1"]))
        .await
        .expect("Analysis failed");

    assert_eq!(analysis.text, analysis.request.text.trim());
}
