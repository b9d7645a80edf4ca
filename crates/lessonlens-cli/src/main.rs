//! LessonLens CLI
//!
//! Main entry point for analyzing lessons against curriculum standards.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use lessonlens_core::{
    group_by_grade, load_instructions, parse_ids, scan_lessons, AnalysisClient, AnalysisInput,
    AnalysisPipeline, AnalysisRequest, CommandClient, Config, Credential, FailureClass, LessonLensError,
    SourceDocument, StandardsRegistry,
};
use lessonlens_report::{
    json::JsonGenerator, AnalysisReport, MarkdownGenerator, ReferenceEntry, ReportStatus,
    RequestStats,
};
use tracing_subscriber::EnvFilter;

/// File name of the Markdown report.
const MARKDOWN_REPORT: &str = "lessonlens-report.md";

/// File name of the JSON report.
const JSON_REPORT: &str = "lessonlens-report.json";

/// LessonLens - Lesson Standards Analysis
///
/// Pairs a lesson with the curriculum standards it targets and the progression
/// documents for those standards, then asks a text-generation service how well
/// the lesson addresses them.
#[derive(Parser, Debug)]
#[command(name = "lessonlens")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: lessonlens.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available standards
    Standards {
        /// Only ids under this prefix, e.g. MA.7 or MA.6.GR
        #[arg(long)]
        prefix: Option<String>,

        /// Print clarifications and examples as well
        #[arg(long)]
        full: bool,
    },

    /// List the lesson PDFs found in the lesson directory, grouped by grade
    Lessons {
        /// Lesson directory (default: lessonDir from the configuration)
        #[arg(value_name = "DIR")]
        dir: Option<String>,
    },

    /// Show which reference documents the given standards pull in
    References {
        /// Standard ids
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,
    },

    /// Print the assembled request without sending it
    Prompt {
        #[command(flatten)]
        selection: Selection,
    },

    /// Analyze a lesson and write Markdown and JSON reports
    Analyze {
        #[command(flatten)]
        selection: Selection,

        /// Output directory for reports (default: outputDir from the configuration)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<String>,
    },
}

/// Lesson, standards and extra references for one analysis.
#[derive(clap::Args, Debug)]
struct Selection {
    /// Lesson document (.pdf, .docx or .txt)
    #[arg(short, long, value_name = "FILE")]
    lesson: PathBuf,

    /// Standard id to analyze against; repeat for several
    #[arg(short, long = "standard", value_name = "ID")]
    standards: Vec<String>,

    /// Read standard ids from a file of formatted standard blocks
    #[arg(long, value_name = "FILE")]
    standards_from: Option<PathBuf>,

    /// Additional reference document; repeat for several
    #[arg(short, long = "reference", value_name = "FILE")]
    references: Vec<PathBuf>,

    /// Instructions file (default: instructions from the configuration)
    #[arg(long, value_name = "FILE")]
    instructions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let base_dir = config_base_dir(args.config.as_deref());

    match args.command {
        Command::Standards { prefix, full } => {
            list_standards(prefix.as_deref(), full)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Lessons { dir } => {
            let dir = dir.map_or_else(|| base_dir.join(&config.lesson_dir), PathBuf::from);
            list_lessons(&dir)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::References { ids } => {
            list_references(&config, &base_dir, &ids)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Prompt { selection } => {
            print_prompt(&config, &base_dir, &selection)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze {
            selection,
            output_dir,
        } => {
            let output_dir = output_dir.map_or_else(|| base_dir.join(&config.output_dir), PathBuf::from);
            analyze(&config, &base_dir, &selection, &output_dir).await
        }
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Relative paths in the configuration resolve against the config file's directory.
fn config_base_dir(config_path: Option<&str>) -> PathBuf {
    config_path
        .and_then(|p| Path::new(p).parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn list_standards(prefix: Option<&str>, full: bool) -> anyhow::Result<()> {
    let registry = StandardsRegistry::builtin()?;
    let ids = prefix.map_or_else(|| registry.all_ids(), |p| registry.ids_with_prefix(p));

    if ids.is_empty() {
        println!("No standards match '{}'", prefix.unwrap_or_default());
        return Ok(());
    }

    for id in ids {
        if full {
            print!("{}", registry.format_for_analysis(id)?);
        } else {
            println!("{}", registry.format_for_display(id)?);
        }
    }
    Ok(())
}

fn list_lessons(dir: &Path) -> anyhow::Result<()> {
    let lessons = scan_lessons(dir)?;
    if lessons.is_empty() {
        println!("No lessons found in {}", dir.display());
        println!("Lesson files are named <grade>.<unit>.<lesson>.pdf, e.g. 6.02.06.pdf");
        return Ok(());
    }

    for (grade, lessons) in group_by_grade(&lessons) {
        println!("Grade {grade}:");
        for lesson in lessons {
            println!(
                "  {}  (Unit {}, Lesson {})",
                lesson.file_name(),
                lesson.unit,
                lesson.lesson
            );
        }
    }
    Ok(())
}

fn list_references(config: &Config, base_dir: &Path, ids: &[String]) -> anyhow::Result<()> {
    let table = config.reference_table(base_dir)?;
    let documents = table.required_reference_documents(ids)?;

    if documents.is_empty() {
        println!("No reference documents are mapped to these standards");
        return Ok(());
    }

    for path in documents {
        let marker = if path.exists() { "" } else { "  (missing)" };
        println!("{}{marker}", path.display());
    }
    Ok(())
}

/// Collects the selected standard ids, command-line ids first.
fn selected_ids(selection: &Selection) -> anyhow::Result<Vec<String>> {
    let mut ids = selection.standards.clone();
    if let Some(path) = &selection.standards_from {
        let blob = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read standards file '{}': {e}", path.display())
        })?;
        ids.extend(parse_ids(&blob));
    }

    if ids.is_empty() {
        anyhow::bail!(
            "No standards selected\n\nSuggestion: Pass --standard ID (run 'lessonlens standards' to list ids)"
        );
    }
    Ok(ids)
}

fn analysis_input(
    config: &Config,
    base_dir: &Path,
    selection: &Selection,
    standard_ids: Vec<String>,
) -> lessonlens_core::Result<AnalysisInput> {
    let instructions_path = selection
        .instructions
        .clone()
        .unwrap_or_else(|| base_dir.join(&config.instructions));

    let extra_references = selection
        .references
        .iter()
        .map(SourceDocument::from_path)
        .collect::<lessonlens_core::Result<Vec<_>>>()?;

    Ok(AnalysisInput {
        standard_ids,
        lesson: SourceDocument::from_path(&selection.lesson)?,
        extra_references,
        instructions: load_instructions(&instructions_path)?,
    })
}

/// Prints the request that `analyze` would send.
fn print_prompt(config: &Config, base_dir: &Path, selection: &Selection) -> anyhow::Result<()> {
    let ids = selected_ids(selection)?;
    let input = analysis_input(config, base_dir, selection, ids)?;

    // No credential is needed to assemble; the client is never called.
    let client = CommandClient::with_command(
        &config.llm_command(),
        Credential::new(&config.credential_env, ""),
        config.timeout(),
    );
    let pipeline = build_pipeline(config, base_dir, client)?;
    let request = pipeline.prepare(&input)?;

    print!("{}", request.text);
    tracing::info!(
        chars = request.total_chars,
        standards = request.standards_included,
        references = request.references_included,
        "Request assembled"
    );
    for failure in &request.reference_failures {
        tracing::warn!(document = %failure.name, reason = %failure.reason, "Reference left out");
    }
    Ok(())
}

/// Runs one analysis and writes reports whatever the outcome.
async fn analyze(
    config: &Config,
    base_dir: &Path,
    selection: &Selection,
    output_dir: &Path,
) -> anyhow::Result<ExitCode> {
    let started_at = Utc::now();

    // The credential is checked before any document is read.
    let credential = Credential::from_env(&config.credential_env).map_err(LessonLensError::from);
    let standard_ids = selected_ids(selection)?;

    print_config(config, selection);

    let outcome = match credential {
        Ok(credential) => {
            run_analysis(config, base_dir, selection, standard_ids.clone(), credential).await
        }
        Err(e) => Outcome::failed(e),
    };

    let report = build_report(
        config,
        selection,
        standard_ids,
        &outcome,
        started_at,
        Utc::now(),
    )?;
    generate_reports(&report, output_dir)?;

    match outcome.result {
        Ok(text) => {
            println!();
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(ExitCode::from(1))
        }
    }
}

/// What one `analyze` run produced.
///
/// `request` is present whenever assembly succeeded, including when the
/// generation service then failed.
struct Outcome {
    request: Option<AnalysisRequest>,
    result: lessonlens_core::Result<String>,
}

impl Outcome {
    const fn failed(error: LessonLensError) -> Self {
        Self {
            request: None,
            result: Err(error),
        }
    }
}

fn build_pipeline<C: AnalysisClient>(
    config: &Config,
    base_dir: &Path,
    client: C,
) -> lessonlens_core::Result<AnalysisPipeline<'static, C>> {
    Ok(AnalysisPipeline::new(
        StandardsRegistry::builtin()?,
        config.reference_table(base_dir)?,
        config.assemble_options(),
        client,
    ))
}

/// Prepares and sends the request as two steps so a service failure still
/// leaves the request for the report.
async fn run_analysis(
    config: &Config,
    base_dir: &Path,
    selection: &Selection,
    standard_ids: Vec<String>,
    credential: Credential,
) -> Outcome {
    let client = CommandClient::with_command(&config.llm_command(), credential, config.timeout());
    let prepared = build_pipeline(config, base_dir, client).and_then(|pipeline| {
        let input = analysis_input(config, base_dir, selection, standard_ids)?;
        tracing::info!(
            lesson = %input.lesson.display_name(),
            program = %pipeline.client().program(),
            "Analyzing lesson"
        );
        let request = pipeline.prepare(&input)?;
        Ok((pipeline, request))
    });

    match prepared {
        Ok((pipeline, request)) => {
            let result = pipeline.generate(&request).await;
            Outcome {
                request: Some(request),
                result,
            }
        }
        Err(e) => Outcome::failed(e),
    }
}

/// Prints the settings that shape this analysis.
fn print_config(config: &Config, selection: &Selection) {
    println!("Configuration loaded:");
    println!("  Lesson: {}", selection.lesson.display());
    println!("  LLM provider: {}", config.llm_provider);
    println!("  Credential variable: {}", config.credential_env);
    println!("  Timeout: {}s", config.timeout_seconds);
    if let Some(limit) = config.truncation.reference_chars {
        println!("  Reference limit: {limit} characters");
    }
    if let Some(limit) = config.truncation.lesson_chars {
        println!("  Lesson limit: {limit} characters");
    }
}

fn build_report(
    config: &Config,
    selection: &Selection,
    standard_ids: Vec<String>,
    outcome: &Outcome,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
) -> anyhow::Result<AnalysisReport> {
    let lesson_name = selection.lesson.file_name().map_or_else(
        || selection.lesson.display().to_string(),
        |n| n.to_string_lossy().to_string(),
    );

    let mut builder = AnalysisReport::builder()
        .lesson_name(lesson_name)
        .lesson_path(selection.lesson.display().to_string())
        .provider(config.llm_command().program)
        .standards(standard_ids)
        .timing(started_at, ended_at);

    if let Some(request) = &outcome.request {
        for name in &request.reference_names {
            builder = builder.reference(ReferenceEntry::included(name));
        }
        for failure in &request.reference_failures {
            builder = builder.reference(ReferenceEntry::unavailable(&failure.name, &failure.reason));
        }
        builder = builder.request(RequestStats {
            total_chars: request.total_chars,
            standards_included: request.standards_included,
            references_included: request.references_included,
        });
    }

    match &outcome.result {
        Ok(text) => {
            builder = builder.status(ReportStatus::Completed).analysis(text);
        }
        Err(e) => {
            builder = builder
                .status(convert_status(e.failure_class()))
                .failure(e.to_string());
        }
    }

    Ok(builder.build()?)
}

/// Writes the Markdown and JSON reports into `output_dir`.
fn generate_reports(report: &AnalysisReport, output_dir: &Path) -> anyhow::Result<()> {
    println!();
    println!("Generating reports...");

    std::fs::create_dir_all(output_dir)?;

    let markdown = MarkdownGenerator::new(report).generate();
    let md_path = output_dir.join(MARKDOWN_REPORT);
    std::fs::write(&md_path, markdown)?;
    println!("  Markdown report: {}", md_path.display());

    let json_path = output_dir.join(JSON_REPORT);
    JsonGenerator::new(report).write_to_file(&json_path, true)?;
    println!("  JSON report: {}", json_path.display());

    let unavailable = report.unavailable_references();
    if !unavailable.is_empty() {
        println!();
        println!("Reference documents left out: {}", unavailable.len());
        for entry in unavailable {
            println!("  {}", entry.name);
        }
    }

    Ok(())
}

const fn convert_status(class: FailureClass) -> ReportStatus {
    match class {
        FailureClass::MissingCredential => ReportStatus::MissingCredential,
        FailureClass::MissingLesson => ReportStatus::MissingLesson,
        FailureClass::Extraction => ReportStatus::Extraction,
        FailureClass::InvalidSelection => ReportStatus::InvalidSelection,
        FailureClass::Service => ReportStatus::ServiceError,
        FailureClass::Configuration => ReportStatus::Configuration,
        FailureClass::Io => ReportStatus::Error,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let args = Args::try_parse_from([
            "lessonlens",
            "analyze",
            "--lesson",
            "lessons/6.02.06.pdf",
            "--standard",
            "MA.6.NSO.1.1",
            "-s",
            "MA.6.NSO.1.2",
            "--reference",
            "notes.docx",
            "--verbose",
        ])
        .unwrap();

        assert!(args.verbose);
        let Command::Analyze {
            selection,
            output_dir,
        } = args.command
        else {
            panic!("expected analyze");
        };
        assert_eq!(selection.lesson, PathBuf::from("lessons/6.02.06.pdf"));
        assert_eq!(selection.standards, vec!["MA.6.NSO.1.1", "MA.6.NSO.1.2"]);
        assert_eq!(selection.references, vec![PathBuf::from("notes.docx")]);
        assert!(output_dir.is_none());
    }

    #[test]
    fn test_references_requires_ids() {
        assert!(Args::try_parse_from(["lessonlens", "references"]).is_err());
    }

    #[test]
    fn test_config_base_dir() {
        assert_eq!(config_base_dir(None), PathBuf::from("."));
        assert_eq!(config_base_dir(Some("lessonlens.json")), PathBuf::from("."));
        assert_eq!(
            config_base_dir(Some("school/lessonlens.json")),
            PathBuf::from("school")
        );
    }

    #[test]
    fn test_convert_status() {
        assert_eq!(
            convert_status(FailureClass::MissingCredential),
            ReportStatus::MissingCredential
        );
        assert_eq!(convert_status(FailureClass::Service), ReportStatus::ServiceError);
        assert_eq!(convert_status(FailureClass::Io), ReportStatus::Error);
    }

    #[test]
    fn test_build_report_for_missing_credential() {
        let args = Args::try_parse_from([
            "lessonlens",
            "analyze",
            "--lesson",
            "lessons/6.02.06.pdf",
            "--standard",
            "MA.6.NSO.1.1",
        ])
        .unwrap();
        let Command::Analyze { selection, .. } = args.command else {
            panic!("expected analyze");
        };

        let outcome = Outcome::failed(LessonLensError::Service(
            lessonlens_core::ServiceError::missing_credential("GOOGLE_API_KEY"),
        ));
        let now = Utc::now();
        let report = build_report(
            &Config::default(),
            &selection,
            vec!["MA.6.NSO.1.1".to_string()],
            &outcome,
            now,
            now,
        )
        .unwrap();

        assert_eq!(report.lesson_name, "6.02.06.pdf");
        assert_eq!(report.status, ReportStatus::MissingCredential);
        assert_eq!(report.provider.as_deref(), Some("gemini"));
        assert!(report.failure.unwrap().contains("GOOGLE_API_KEY"));
        assert!(report.request.is_none());
    }

    #[test]
    fn test_build_report_keeps_request_on_service_failure() {
        let args = Args::try_parse_from([
            "lessonlens",
            "analyze",
            "--lesson",
            "lessons/6.02.06.pdf",
            "--standard",
            "MA.6.AR.1.1",
        ])
        .unwrap();
        let Command::Analyze { selection, .. } = args.command else {
            panic!("expected analyze");
        };

        let outcome = Outcome {
            request: Some(AnalysisRequest {
                text: "STANDARDS:\n".to_string(),
                total_chars: 4_200,
                standards_included: 1,
                references_included: 1,
                reference_names: vec!["6-8 NSO Progression.docx".to_string()],
                reference_failures: vec![lessonlens_core::ReferenceFailure {
                    name: "6-8 AR Progression.docx".to_string(),
                    reason: "Document not found".to_string(),
                }],
            }),
            result: Err(LessonLensError::Service(
                lessonlens_core::ServiceError::Timeout { timeout_secs: 120 },
            )),
        };
        let now = Utc::now();
        let report = build_report(
            &Config::default(),
            &selection,
            vec!["MA.6.AR.1.1".to_string()],
            &outcome,
            now,
            now,
        )
        .unwrap();

        assert_eq!(report.status, ReportStatus::ServiceError);
        assert_eq!(report.request.as_ref().unwrap().total_chars, 4_200);
        assert_eq!(report.references.len(), 2);
        assert!(report.references[0].included);
        assert_eq!(report.unavailable_references()[0].name, "6-8 AR Progression.docx");
        assert!(report.analysis.is_none());
        assert!(report.failure.unwrap().contains("120"));
    }
}
