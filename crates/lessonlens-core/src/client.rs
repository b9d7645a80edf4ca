//! Boundary to the hosted text-generation service.
//!
//! The core only needs one capability from the service: turn a prompt into
//! generated text. [`AnalysisClient`] captures that, [`ServiceError`]
//! classifies the ways it can fail, and [`CommandClient`] is the adapter used
//! by the CLI, which hands the prompt to a provider's own command-line tool.
//! Neither the trait nor the adapter retries; retry policy belongs to the
//! external tool.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::{LlmCommand, LlmProvider};

/// Failures reported by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service credential is not configured.
    #[error("No credential found in environment variable '{variable}'\n\nSuggestion: Set {variable} in your environment or .env file")]
    MissingCredential {
        /// Name of the environment variable that was checked.
        variable: String,
    },

    /// The service refused the request (authentication, quota, content policy).
    #[error("Generation request rejected: {message}\n\nSuggestion: Check your API key, quota and the provider's content policy")]
    RequestRejected {
        /// Message returned by the service.
        message: String,
    },

    /// The service did not answer in time.
    #[error("Generation service timed out after {timeout_secs}s\n\nSuggestion: Raise timeoutSeconds in lessonlens.json or retry later")]
    Timeout {
        /// Timeout that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// Any other failure.
    #[error("Generation service error: {message}\n\nSuggestion: Check that the provider CLI is installed and on your PATH")]
    Unknown {
        /// Description of the failure.
        message: String,
    },
}

/// Kind of a [`ServiceError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// No credential configured.
    MissingCredential,
    /// Request refused by the service.
    Rejected,
    /// Request timed out.
    Timeout,
    /// Unclassified failure.
    Unknown,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "missing_credential"),
            Self::Rejected => write!(f, "request_rejected"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl ServiceError {
    /// Creates a new `MissingCredential` error.
    #[must_use]
    pub fn missing_credential(variable: impl Into<String>) -> Self {
        Self::MissingCredential {
            variable: variable.into(),
        }
    }

    /// Creates a new `RequestRejected` error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::RequestRejected {
            message: message.into(),
        }
    }

    /// Creates a new `Unknown` error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ServiceErrorKind {
        match self {
            Self::MissingCredential { .. } => ServiceErrorKind::MissingCredential,
            Self::RequestRejected { .. } => ServiceErrorKind::Rejected,
            Self::Timeout { .. } => ServiceErrorKind::Timeout,
            Self::Unknown { .. } => ServiceErrorKind::Unknown,
        }
    }

    /// Returns `true` if a later attempt could succeed unchanged.
    ///
    /// This is informational only; nothing in the pipeline retries.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unknown { .. })
    }
}

/// The generation service, seen from the pipeline.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Sends one prompt and returns the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// The single service credential, read from the process environment.
#[derive(Clone)]
pub struct Credential {
    variable: String,
    secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("variable", &self.variable)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Creates a credential from an explicit value.
    #[must_use]
    pub fn new(variable: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            secret: secret.into(),
        }
    }

    /// Reads the credential from the named environment variable.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MissingCredential` if the variable is unset or blank.
    pub fn from_env(variable: &str) -> Result<Self, ServiceError> {
        match std::env::var(variable) {
            Ok(secret) if !secret.trim().is_empty() => Ok(Self::new(variable, secret)),
            _ => Err(ServiceError::missing_credential(variable)),
        }
    }

    /// Name of the environment variable the credential came from.
    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// The credential value.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Runs a provider CLI, writing the prompt to its stdin and reading the
/// generated text from its stdout.
#[derive(Debug, Clone)]
pub struct CommandClient {
    program: String,
    args: Vec<String>,
    credential: Credential,
    timeout: Duration,
}

impl CommandClient {
    /// Creates a client for the given provider's default command line.
    #[must_use]
    pub fn new(provider: LlmProvider, credential: Credential, timeout: Duration) -> Self {
        Self::with_command(&provider.default_command(), credential, timeout)
    }

    /// Creates a client for an explicit command line.
    #[must_use]
    pub fn with_command(command: &LlmCommand, credential: Credential, timeout: Duration) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.clone(),
            credential,
            timeout,
        }
    }

    /// The program this client runs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl AnalysisClient for CommandClient {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        tracing::debug!(
            program = %self.program,
            prompt_chars = prompt.chars().count(),
            "Invoking generation command"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(self.credential.variable(), self.credential.secret())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ServiceError::unknown(format!("failed to start '{}': {e}", self.program)))?;

        // Feed stdin concurrently so a chatty child cannot fill its stdout pipe
        // while we are still writing.
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = prompt.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&bytes).await {
                    tracing::debug!(error = %e, "Generation command closed stdin early");
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                ServiceError::unknown(format!("failed waiting for '{}': {e}", self.program))
            })?,
            Err(_) => {
                tracing::warn!(program = %self.program, "Generation command timed out");
                return Err(ServiceError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("'{}' exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(ServiceError::rejected(message));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ServiceError::unknown(format!(
                "'{}' returned an empty response",
                self.program
            )));
        }

        Ok(text)
    }
}
