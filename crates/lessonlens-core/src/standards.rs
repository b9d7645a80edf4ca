//! Curriculum standards registry.
//!
//! The registry is a read-only table from standard id (`MA.6.NSO.1.1`) to its
//! description, clarifications and examples. The built-in table is parsed from
//! `data/standards.json` once per process and shared by every request.
//!
//! [`format_for_analysis`](StandardsRegistry::format_for_analysis) renders an
//! entry in the block layout the assembler concatenates, and [`parse_id`]
//! recovers the id from that layout.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{LessonLensError, Result};

/// The shipped standards table.
const BUILTIN_STANDARDS: &str = include_str!("../data/standards.json");

/// Longest description shown by [`StandardsRegistry::format_for_display`].
pub const DISPLAY_DESCRIPTION_CHARS: usize = 80;

static BUILTIN: OnceCell<StandardsRegistry> = OnceCell::new();

/// One curriculum benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardEntry {
    /// Dot-delimited id, e.g. `MA.6.NSO.1.1`.
    pub id: String,

    /// Canonical benchmark text.
    pub description: String,

    /// Clarification notes, in order.
    #[serde(default)]
    pub clarifications: Vec<String>,

    /// Worked examples, in order.
    #[serde(default)]
    pub examples: Vec<String>,
}

impl StandardEntry {
    /// Creates an entry with no clarifications or examples.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            clarifications: Vec::new(),
            examples: Vec::new(),
        }
    }

    /// Adds a clarification.
    #[must_use]
    pub fn with_clarification(mut self, text: impl Into<String>) -> Self {
        self.clarifications.push(text.into());
        self
    }

    /// Adds an example.
    #[must_use]
    pub fn with_example(mut self, text: impl Into<String>) -> Self {
        self.examples.push(text.into());
        self
    }

    /// Renders the entry as an analysis block.
    ///
    /// ```text
    /// MA.6.NSO.1.1: <description>
    /// Clarifications:
    ///   1. <clarification>
    /// Examples:
    ///   1. <example>
    ///
    /// ```
    ///
    /// Empty sub-lists are omitted. The block always ends with a blank line.
    #[must_use]
    pub fn format_for_analysis(&self) -> String {
        let mut formatted = format!("{}: {}\n", self.id, self.description);

        if !self.clarifications.is_empty() {
            formatted.push_str("Clarifications:\n");
            push_numbered(&mut formatted, &self.clarifications);
        }

        if !self.examples.is_empty() {
            formatted.push_str("Examples:\n");
            push_numbered(&mut formatted, &self.examples);
        }

        formatted.push('\n');
        formatted
    }

    /// Renders a one-line label, cutting long descriptions.
    #[must_use]
    pub fn format_for_display(&self) -> String {
        if self.description.chars().count() > DISPLAY_DESCRIPTION_CHARS {
            let cut: String = self
                .description
                .chars()
                .take(DISPLAY_DESCRIPTION_CHARS)
                .collect();
            format!("{}: {cut}...", self.id)
        } else {
            format!("{}: {}", self.id, self.description)
        }
    }
}

fn push_numbered(out: &mut String, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("  {}. {item}\n", i + 1));
    }
}

/// The first three segments of a standard id: subject, grade and domain.
///
/// Used only to select supplementary reference documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKey(String);

impl DomainKey {
    /// Derives the domain key of a standard id.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::MalformedId` if the id has fewer than three
    /// segments or one of the first three is empty.
    pub fn from_id(id: &str) -> Result<Self> {
        let segments: Vec<&str> = id.split('.').take(3).collect();
        if segments.len() < 3 || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(LessonLensError::malformed_id(id));
        }
        Ok(Self(segments.join(".")))
    }

    /// Parses a bare domain key such as `MA.6.NSO`.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::MalformedId` unless the key is exactly three
    /// non-empty segments.
    pub fn parse(key: &str) -> Result<Self> {
        if key.split('.').count() != 3 {
            return Err(LessonLensError::malformed_id(key));
        }
        Self::from_id(key)
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recovers the standard id from the first line of a formatted block.
///
/// Returns the text before the first colon, trimmed, or `None` if the line has
/// no colon or nothing before it.
#[must_use]
pub fn parse_id(formatted: &str) -> Option<String> {
    let (id, _) = formatted.split_once(':')?;
    let id = id.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Recovers every standard id from a concatenation of formatted blocks.
///
/// Header lines and numbered sub-list lines are skipped, so colons inside
/// clarifications or examples never produce spurious ids.
#[must_use]
pub fn parse_ids(blob: &str) -> Vec<String> {
    blob.lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .filter(|line| !matches!(*line, "Clarifications:" | "Examples:"))
        .filter_map(parse_id)
        .filter(|id| !id.contains(char::is_whitespace) && DomainKey::from_id(id).is_ok())
        .collect()
}

/// Raw JSON shape of one registry entry; the id is the map key.
#[derive(Deserialize)]
struct RawEntry {
    description: String,
    #[serde(default)]
    clarifications: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
}

/// Immutable lookup table of standards.
#[derive(Debug, Clone, Default)]
pub struct StandardsRegistry {
    entries: BTreeMap<String, StandardEntry>,
}

impl StandardsRegistry {
    /// Returns the registry shipped with the crate.
    ///
    /// Parsed on first use and shared for the life of the process.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::RegistryCorrupted` if the shipped table is invalid.
    pub fn builtin() -> Result<&'static Self> {
        BUILTIN.get_or_try_init(|| {
            let registry = Self::from_json(BUILTIN_STANDARDS).map_err(|e| {
                LessonLensError::RegistryCorrupted {
                    message: e.to_string(),
                }
            })?;
            tracing::debug!(standards = registry.len(), "Loaded built-in standards");
            Ok(registry)
        })
    }

    /// Builds a registry from a JSON object keyed by standard id.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::Json` for invalid JSON and
    /// `LessonLensError::MalformedId` for ids without a domain key.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(json)?;
        Self::from_entries(raw.into_iter().map(|(id, entry)| StandardEntry {
            id,
            description: entry.description,
            clarifications: entry.clarifications,
            examples: entry.examples,
        }))
    }

    /// Builds a registry from entries. Later duplicates replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::MalformedId` for ids without a domain key.
    pub fn from_entries(entries: impl IntoIterator<Item = StandardEntry>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            DomainKey::from_id(&entry.id)?;
            map.insert(entry.id.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    /// Number of standards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a standard.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::StandardNotFound` if the id is absent.
    pub fn lookup(&self, id: &str) -> Result<&StandardEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| LessonLensError::standard_not_found(id))
    }

    /// All ids in lexicographic order.
    #[must_use]
    pub fn all_ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Ids starting with `prefix` (e.g. `MA.7` or `MA.6.GR`), in lexicographic order.
    ///
    /// Matches whole segments only, so `MA.6.A` does not match `MA.6.AR.1.1`.
    #[must_use]
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.trim_end_matches('.');
        self.entries
            .keys()
            .filter(|id| {
                id.as_str() == prefix
                    || id
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('.'))
            })
            .map(String::as_str)
            .collect()
    }

    /// Derives the domain key of an id. The id need not be in the registry.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::MalformedId` if the id has fewer than three segments.
    pub fn domain_key_of(&self, id: &str) -> Result<DomainKey> {
        DomainKey::from_id(id)
    }

    /// Renders a standard as an analysis block.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::StandardNotFound` if the id is absent.
    pub fn format_for_analysis(&self, id: &str) -> Result<String> {
        Ok(self.lookup(id)?.format_for_analysis())
    }

    /// Renders a one-line label for a standard.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::StandardNotFound` if the id is absent.
    pub fn format_for_display(&self, id: &str) -> Result<String> {
        Ok(self.lookup(id)?.format_for_display())
    }
}
