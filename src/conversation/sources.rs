//! Citation records and the source deduplicator.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A grounding source backing part of a generated answer.
///
/// `uri` is the identity; `title` is display-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationRecord {
    /// Unique key of the source.
    pub uri: String,
    /// Human-readable title, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CitationRecord {
    /// Create a record without a title.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: None,
        }
    }

    /// Attach a display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Collapse `records` to one entry per `uri`, keeping first-seen order.
///
/// Later duplicates are dropped even when their title differs.
pub fn dedupe(records: &[CitationRecord]) -> Vec<CitationRecord> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|record| seen.insert(record.uri.as_str()))
        .cloned()
        .collect()
}
