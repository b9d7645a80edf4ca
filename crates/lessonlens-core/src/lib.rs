//! LessonLens core
//!
//! Selects curriculum standards and reference documents for a lesson,
//! extracts text from PDF, DOCX and plain-text sources, and assembles the
//! bounded request sent to a text-generation service.

pub mod assembler;
pub mod client;
pub mod config;
pub mod document;
pub mod domain;
pub mod error;
pub mod instructions;
pub mod lessons;
pub mod pipeline;
pub mod standards;

pub use assembler::{
    AnalysisRequest, AssembleOptions, ReferenceFailure, RequestAssembler, Truncation,
    LESSON_HEADER, NO_REFERENCES_SENTINEL, REFERENCE_HEADER, STANDARDS_HEADER, TRUNCATION_MARKER,
};
pub use client::{
    AnalysisClient, CommandClient, Credential, ServiceError, ServiceErrorKind,
};
pub use config::{Config, LlmCommand, LlmProvider, TruncationConfig};
pub use document::{DocumentFormat, DocumentLocation, SourceDocument, MAX_DOCUMENT_SIZE};
pub use domain::ReferenceTable;
pub use error::{FailureClass, LessonLensError, Result};
pub use instructions::{load_instructions, DEFAULT_INSTRUCTIONS};
pub use lessons::{group_by_grade, parse_file_name, scan_lessons, LessonFile};
pub use pipeline::{Analysis, AnalysisInput, AnalysisPipeline};
pub use standards::{
    parse_id, parse_ids, DomainKey, StandardEntry, StandardsRegistry, DISPLAY_DESCRIPTION_CHARS,
};
