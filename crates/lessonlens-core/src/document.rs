//! Plain-text extraction from lesson and reference documents.
//!
//! A [`SourceDocument`] pairs a location (file path or uploaded buffer) with a
//! [`DocumentFormat`]. Extraction dispatches on the format with one routine per
//! variant, so adding a format means adding a match arm the compiler checks.
//!
//! Nothing is cached: every [`SourceDocument::extract_text`] call reads and
//! parses the document again. Lesson files are small and read once per
//! analysis.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LessonLensError, Result};

/// Maximum accepted document size in bytes (20MB).
pub const MAX_DOCUMENT_SIZE: u64 = 20 * 1024 * 1024;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// UTF-8 plain text.
    #[serde(rename = "txt")]
    PlainText,
}

impl DocumentFormat {
    /// Detects the format from a file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Detects the format from a file path.
    ///
    /// Returns `None` if the path has no extension or the extension is not recognized.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Docx => write!(f, "docx"),
            Self::PlainText => write!(f, "txt"),
        }
    }
}

/// Where a document's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    /// A file on local storage.
    Path(PathBuf),
    /// An uploaded buffer.
    Memory {
        /// Name shown in reports and section headers.
        name: String,
        /// Raw document bytes.
        bytes: Vec<u8>,
    },
}

/// A lesson or reference document awaiting extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Where the bytes come from.
    pub location: DocumentLocation,
    /// Declared format.
    pub format: DocumentFormat,
}

impl SourceDocument {
    /// Creates a document for a file, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::UnsupportedFormat` if the extension is not recognized.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format =
            DocumentFormat::from_path(&path).ok_or_else(|| LessonLensError::unsupported_format(&path))?;
        Ok(Self::with_format(path, format))
    }

    /// Creates a document for a file with an explicit format.
    #[must_use]
    pub fn with_format(path: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            location: DocumentLocation::Path(path.into()),
            format,
        }
    }

    /// Creates a document from an in-memory buffer.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>, format: DocumentFormat) -> Self {
        Self {
            location: DocumentLocation::Memory {
                name: name.into(),
                bytes,
            },
            format,
        }
    }

    /// File name or buffer name, for headers and reports.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.location {
            DocumentLocation::Path(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string()),
            DocumentLocation::Memory { name, .. } => name.clone(),
        }
    }

    /// Reads the document and returns its plain text.
    ///
    /// # Errors
    ///
    /// - `DocumentNotFound` if the file does not exist.
    /// - `DocumentTooLarge` if the document exceeds [`MAX_DOCUMENT_SIZE`].
    /// - `Extraction` if the PDF or DOCX reader cannot parse the bytes.
    /// - `Encoding` if a plain-text document is not valid UTF-8.
    pub fn extract_text(&self) -> Result<String> {
        let name = self.display_name();
        let bytes = self.read_bytes()?;

        let text = match self.format {
            DocumentFormat::Pdf => extract_pdf(&name, &bytes)?,
            DocumentFormat::Docx => extract_docx(&name, &bytes)?,
            DocumentFormat::PlainText => decode_utf8(&name, bytes)?,
        };

        tracing::debug!(
            document = %name,
            format = %self.format,
            chars = text.chars().count(),
            "Extracted document text"
        );
        Ok(text)
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.location {
            DocumentLocation::Path(path) => {
                let metadata = std::fs::metadata(path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        LessonLensError::document_not_found(path)
                    } else {
                        LessonLensError::Io(e)
                    }
                })?;
                check_size(&self.display_name(), metadata.len())?;
                Ok(std::fs::read(path)?)
            }
            DocumentLocation::Memory { name, bytes } => {
                check_size(name, bytes.len() as u64)?;
                Ok(bytes.clone())
            }
        }
    }
}

fn check_size(name: &str, size: u64) -> Result<()> {
    if size > MAX_DOCUMENT_SIZE {
        return Err(LessonLensError::DocumentTooLarge {
            source_name: name.to_string(),
            size_kb: size / 1024,
            limit_mb: MAX_DOCUMENT_SIZE / (1024 * 1024),
        });
    }
    Ok(())
}

/// Text of every page in page order, one newline between pages.
fn extract_pdf(name: &str, bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| LessonLensError::extraction(name, e.to_string()))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        let text = document
            .extract_text(&[*page_number])
            .map_err(|e| LessonLensError::extraction(name, format!("page {page_number}: {e}")))?;
        pages.push(text);
    }

    Ok(join_pages(&pages))
}

/// lopdf ends each page's text with a newline; strip it so pages are
/// separated by exactly one.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|page| page.trim_end_matches(['\r', '\n']))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of every body paragraph in document order, one newline between paragraphs.
fn extract_docx(name: &str, bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| LessonLensError::extraction(name, format!("{e:?}")))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

/// Runs in a paragraph are parts of the same sentence: no separator.
fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    push_paragraph_children(&mut text, &paragraph.children);
    text
}

fn push_paragraph_children(text: &mut String, children: &[docx_rs::ParagraphChild]) {
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run(text, run),
            docx_rs::ParagraphChild::Hyperlink(link) => push_paragraph_children(text, &link.children),
            _ => {}
        }
    }
}

/// Tabs and line breaks keep the words around them apart.
fn push_run(text: &mut String, run: &docx_rs::Run) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(t) => text.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => text.push('\t'),
            docx_rs::RunChild::Break(_) | docx_rs::RunChild::CarriageReturn(_) => text.push('\n'),
            _ => {}
        }
    }
}

fn decode_utf8(name: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| LessonLensError::encoding(name))
}
