//! Markdown report generation for lesson analyses.
//!
//! The generated report has a summary table, the selected standards, the
//! reference documents and whether each reached the request, then either the
//! generated analysis or the failure.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{AnalysisReport, ReferenceEntry};

/// Generates Markdown reports from analysis results.
pub struct MarkdownGenerator<'a> {
    report: &'a AnalysisReport,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a AnalysisReport) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_standards(&mut output);
        self.write_references(&mut output);
        self.write_outcome(&mut output);
        Self::write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Lesson Analysis Report: {}\n",
            escape_markdown(&self.report.lesson_name)
        );
    }

    fn write_summary(&self, output: &mut String) {
        let report = self.report;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Status | {} |", report.status.description());
        let _ = writeln!(
            output,
            "| Lesson | {} |",
            escape_markdown(&report.lesson_path)
        );
        if let Some(provider) = &report.provider {
            let _ = writeln!(output, "| Provider | {} |", escape_markdown(provider));
        }
        let _ = writeln!(output, "| Standards | {} |", report.standards.len());
        let _ = writeln!(
            output,
            "| Reference Documents | {} |",
            format_reference_counts(&report.references)
        );
        if let Some(request) = &report.request {
            let _ = writeln!(
                output,
                "| Request Size | {} characters |",
                format_thousands(request.total_chars)
            );
        }
        let _ = writeln!(
            output,
            "| Duration | {} |",
            format_duration(report.duration_seconds())
        );
        let _ = writeln!(output);
    }

    fn write_standards(&self, output: &mut String) {
        let _ = writeln!(output, "## Standards\n");

        if self.report.standards.is_empty() {
            let _ = writeln!(output, "*No standards selected.*\n");
            return;
        }

        for id in &self.report.standards {
            let _ = writeln!(output, "- `{}`", id.replace('`', "'"));
        }
        let _ = writeln!(output);
    }

    fn write_references(&self, output: &mut String) {
        let _ = writeln!(output, "## Reference Documents\n");

        if self.report.references.is_empty() {
            let _ = writeln!(output, "*No reference documents used.*\n");
            return;
        }

        let _ = writeln!(output, "| Document | Included | Note |");
        let _ = writeln!(output, "|----------|----------|------|");
        for entry in &self.report.references {
            let included = if entry.included { "Yes" } else { "No" };
            let note = entry
                .reason
                .as_deref()
                .map(escape_markdown)
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "| {} | {included} | {note} |",
                escape_markdown(&entry.name)
            );
        }
        let _ = writeln!(output);
    }

    /// The analysis is already Markdown from the generation service, so it is
    /// written as-is.
    fn write_outcome(&self, output: &mut String) {
        if let Some(analysis) = &self.report.analysis {
            let _ = writeln!(output, "## Analysis\n");
            let _ = writeln!(output, "{}\n", analysis.trim_end());
        }

        if let Some(failure) = &self.report.failure {
            let _ = writeln!(output, "## Failure\n");
            let _ = writeln!(output, "```text\n{}\n```\n", failure.trim_end());
        }
    }

    fn write_footer(output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&Utc::now());
        let _ = writeln!(output, "*Generated by LessonLens at {timestamp}*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a duration in seconds to a human-readable string.
///
/// Examples:
/// - 65 seconds -> "1m 5s"
/// - 45 seconds -> "45s"
fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();

    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// 12345 -> "12,345"
fn format_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result
}

fn format_reference_counts(references: &[ReferenceEntry]) -> String {
    let included = references.iter().filter(|r| r.included).count();
    let unavailable = references.len() - included;
    if unavailable == 0 {
        format!("{included} included")
    } else {
        format!("{included} included, {unavailable} unavailable")
    }
}

/// Escapes special Markdown characters in text.
///
/// This prevents user content from being interpreted as Markdown formatting.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            // Table cells cannot hold raw newlines
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
