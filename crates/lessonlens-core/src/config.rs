//! Configuration types for LessonLens.
//!
//! Configuration lives in `lessonlens.json` next to the lessons. It selects the
//! lesson directory, the domain reference table, the truncation policy and the
//! generation provider. Every field has a default, so an absent file is valid.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assembler::{AssembleOptions, Truncation};
use crate::document::DocumentFormat;
use crate::domain::ReferenceTable;
use crate::error::{LessonLensError, Result};
use crate::standards::DomainKey;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "lessonlens.json";

/// Default directory scanned for `<grade>.<unit>.<lesson>.pdf` files.
fn default_lesson_dir() -> String {
    "lessons".to_string()
}

/// Default instructions file.
fn default_instructions() -> String {
    "instructions.txt".to_string()
}

/// Default environment variable holding the service credential.
fn default_credential_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

/// Default timeout in seconds for one generation call.
const fn default_timeout_seconds() -> u32 {
    120
}

/// Default output directory for reports.
fn default_output_dir() -> String {
    ".".to_string()
}

/// Default domain reference table: one progression document per grade 6 domain.
fn default_reference_documents() -> BTreeMap<String, String> {
    [
        ("MA.6.NSO", "data/6-8 NSO Progression.docx"),
        ("MA.6.AR", "data/6-8 AR Progression.docx"),
        ("MA.6.GR", "data/6-8 GR Progression.docx"),
        ("MA.6.DP", "data/6-8 DP Progression.docx"),
    ]
    .into_iter()
    .map(|(key, path)| (key.to_string(), path.to_string()))
    .collect()
}

/// Main configuration for LessonLens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding lesson PDFs.
    #[serde(default = "default_lesson_dir")]
    pub lesson_dir: String,

    /// Path to the instructions file sent ahead of the standards.
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// Domain key (e.g. `MA.6.NSO`) to reference document path.
    #[serde(default = "default_reference_documents")]
    pub reference_documents: BTreeMap<String, String>,

    /// Environment variable that holds the service credential.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,

    /// Generation provider.
    #[serde(default)]
    pub llm_provider: LlmProvider,

    /// Explicit command line overriding the provider default.
    #[serde(default)]
    pub llm_command: Option<LlmCommand>,

    /// Timeout for one generation call in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,

    /// Output directory for generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Per-section truncation limits.
    #[serde(default)]
    pub truncation: TruncationConfig,

    /// Upper bound on the assembled request, in characters.
    #[serde(default)]
    pub max_request_chars: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lesson_dir: default_lesson_dir(),
            instructions: default_instructions(),
            reference_documents: default_reference_documents(),
            credential_env: default_credential_env(),
            llm_provider: LlmProvider::default(),
            llm_command: None,
            timeout_seconds: default_timeout_seconds(),
            output_dir: default_output_dir(),
            truncation: TruncationConfig::default(),
            max_request_chars: None,
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `lessonlens.json`; returns defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            LessonLensError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `lessonlens.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::ConfigParseError` if the file exists but
    /// contains invalid JSON or invalid enum values.
    ///
    /// Returns `LessonLensError::ConfigValidationError` if the values are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(LessonLensError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| LessonLensError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.lesson_dir.trim().is_empty() {
            return Err(LessonLensError::config_validation(
                "lessonDir must not be empty",
                "Provide a lesson directory in your lessonlens.json (use '.' for current directory)",
            ));
        }

        if self.instructions.trim().is_empty() {
            return Err(LessonLensError::config_validation(
                "instructions path must not be empty",
                "Provide a valid instructions file path in your lessonlens.json",
            ));
        }

        if self.credential_env.trim().is_empty() {
            return Err(LessonLensError::config_validation(
                "credentialEnv must not be empty",
                "Set credentialEnv to the variable holding your API key, e.g. GOOGLE_API_KEY",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(LessonLensError::config_validation(
                "timeoutSeconds must be greater than 0",
                "Set timeoutSeconds to at least 1 second in your lessonlens.json",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(LessonLensError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your lessonlens.json (use '.' for current directory)",
            ));
        }

        for (field, limit) in [
            ("truncation.referenceChars", self.truncation.reference_chars),
            ("truncation.lessonChars", self.truncation.lesson_chars),
            ("maxRequestChars", self.max_request_chars),
        ] {
            if limit == Some(0) {
                return Err(LessonLensError::config_validation(
                    format!("{field} must be greater than 0"),
                    format!("Remove {field} or set it to null for no limit"),
                ));
            }
        }

        if let Some(command) = &self.llm_command {
            if command.program.trim().is_empty() {
                return Err(LessonLensError::config_validation(
                    "llmCommand.program must not be empty",
                    "Name the provider CLI to run, or remove llmCommand to use the provider default",
                ));
            }
        }

        for (key, path) in &self.reference_documents {
            if DomainKey::parse(key).is_err() {
                return Err(LessonLensError::config_validation(
                    format!("referenceDocuments key '{key}' is not a domain key"),
                    "Use three dot-separated segments such as MA.6.NSO",
                ));
            }
            if path.trim().is_empty() {
                return Err(LessonLensError::config_validation(
                    format!("referenceDocuments path for '{key}' must not be empty"),
                    "Remove the entry or point it at a .docx, .pdf or .txt file",
                ));
            }
            if DocumentFormat::from_path(Path::new(path)).is_none() {
                return Err(LessonLensError::config_validation(
                    format!("referenceDocuments path '{path}' has an unsupported extension"),
                    "Point the entry at a .docx, .pdf or .txt file",
                ));
            }
        }

        Ok(())
    }

    /// Builds the assembler options described by this configuration.
    #[must_use]
    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            reference_truncation: Truncation::from_limit(self.truncation.reference_chars),
            lesson_truncation: Truncation::from_limit(self.truncation.lesson_chars),
            max_total_chars: self.max_request_chars,
        }
    }

    /// Builds the domain reference table, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::MalformedId` if a key is not a domain key.
    pub fn reference_table(&self, base_dir: &Path) -> Result<ReferenceTable> {
        let mut table = ReferenceTable::new();
        for (key, path) in &self.reference_documents {
            table.insert(DomainKey::parse(key)?, base_dir.join(path));
        }
        Ok(table)
    }

    /// The command line used to reach the generation service.
    #[must_use]
    pub fn llm_command(&self) -> LlmCommand {
        self.llm_command
            .clone()
            .unwrap_or_else(|| self.llm_provider.default_command())
    }

    /// Timeout for one generation call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }
}

/// Per-section truncation limits, in characters. `null` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncationConfig {
    /// Limit applied to each reference document.
    #[serde(default)]
    pub reference_chars: Option<usize>,

    /// Limit applied to the lesson text.
    #[serde(default)]
    pub lesson_chars: Option<usize>,
}

/// A program and its arguments; the prompt is written to its stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmCommand {
    /// Program to run.
    pub program: String,

    /// Arguments passed before the prompt is piped in.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Supported generation providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProvider {
    /// Google Gemini (default).
    #[default]
    Gemini,
    /// Anthropic Claude.
    Claude,
    /// `OpenAI` `Codex`.
    Codex,
}

impl LlmProvider {
    /// Parses a string into an `LlmProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "claude" => Some(Self::Claude),
            "codex" => Some(Self::Codex),
            _ => None,
        }
    }

    /// Lowercase provider name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }

    /// The provider CLI invocation that reads a prompt from stdin.
    #[must_use]
    pub fn default_command(&self) -> LlmCommand {
        let (program, args): (&str, &[&str]) = match self {
            Self::Gemini => ("gemini", &[]),
            Self::Claude => ("claude", &["-p"]),
            Self::Codex => ("codex", &["exec", "-"]),
        };
        LlmCommand {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LlmProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid LLM provider '{s}': expected one of 'gemini', 'claude', 'codex'"
            ))
        })
    }
}

impl Serialize for LlmProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
