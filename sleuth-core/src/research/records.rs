//! Collected search results for one research session.
//!
//! `CollectedData` is append-only: entries keep query-submission order and
//! identifiers stay unique so report citations map back to exactly one result.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// One executed search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The query that produced this result.
    pub query: String,
    /// Opaque identifier naming the retrieval, unique within a session.
    pub identifier: String,
    /// Retrieved text. Never empty.
    pub content: String,
    /// Source URL, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SearchResult {
    pub fn new(
        query: impl Into<String>,
        identifier: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            identifier: identifier.into(),
            content: content.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Deterministic identifier for `input`: `<prefix>_<first 16 hex of sha256>`.
///
/// Stable across processes and retries, unlike time- or address-based ids.
pub fn stable_id(prefix: &str, input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{prefix}_{hex}")
}

/// Ordered, append-only store of search results.
#[derive(Debug, Clone, Default)]
pub struct CollectedData {
    entries: Vec<SearchResult>,
    identifiers: HashSet<String>,
}

impl CollectedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result, suffixing its identifier (`#2`, `#3`, ...) if that
    /// identifier was already collected. Returns the stored entry.
    pub fn append(&mut self, mut result: SearchResult) -> &SearchResult {
        if self.identifiers.contains(&result.identifier) {
            let base = result.identifier.clone();
            let mut n = 2;
            while self.identifiers.contains(&format!("{base}#{n}")) {
                n += 1;
            }
            result.identifier = format!("{base}#{n}");
        }
        self.identifiers.insert(result.identifier.clone());
        self.entries.push(result);
        &self.entries[self.entries.len() - 1]
    }

    /// Append a whole batch in order.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = SearchResult>) {
        for result in batch {
            self.append(result);
        }
    }

    pub fn entries(&self) -> &[SearchResult] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON rendering embedded into stage prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Serialize for CollectedData {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a CollectedData {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
