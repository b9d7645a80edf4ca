//! Domain-to-reference-document resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::standards::DomainKey;

/// Static mapping from domain key to the reference document that covers it.
///
/// Built once from configuration and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    documents: BTreeMap<DomainKey, PathBuf>,
}

impl ReferenceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `key` to `path`, replacing any earlier mapping.
    pub fn insert(&mut self, key: DomainKey, path: PathBuf) {
        self.documents.insert(key, path);
    }

    /// The document mapped to `key`, if any.
    #[must_use]
    pub fn get(&self, key: &DomainKey) -> Option<&Path> {
        self.documents.get(key).map(PathBuf::as_path)
    }

    /// Number of mapped domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if no domain is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterates over mappings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&DomainKey, &Path)> {
        self.documents.iter().map(|(k, v)| (k, v.as_path()))
    }

    /// Reference documents needed to analyze the given standards.
    ///
    /// Each id contributes the document mapped to its domain key; unmapped
    /// domains contribute nothing and several ids in one domain contribute
    /// once. The result does not depend on input order.
    ///
    /// # Errors
    ///
    /// Returns `LessonLensError::MalformedId` if an id has no domain key.
    pub fn required_reference_documents<I, S>(&self, ids: I) -> Result<BTreeSet<PathBuf>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut required = BTreeSet::new();
        for id in ids {
            let key = DomainKey::from_id(id.as_ref())?;
            match self.documents.get(&key) {
                Some(path) => {
                    required.insert(path.clone());
                }
                None => tracing::debug!(domain = %key, "No reference document mapped"),
            }
        }
        Ok(required)
    }
}
