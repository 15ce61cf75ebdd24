//! File catalog
//!
//! Immutable key → file metadata mapping assembled once at startup from one or
//! more JSON sources. Later sources override earlier ones; every collision is
//! logged.

use crate::config::DEFAULT_CATEGORY;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while parsing a catalog source
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The source is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The source is valid JSON but not an object of entries
    #[error("catalog must be a JSON object keyed by file key")]
    NotAnObject,
    /// An entry has neither `direct_link` nor `file_id`
    #[error("entry {0} has neither direct_link nor file_id")]
    MissingSource(String),
}

/// How the platform should present a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Generic document
    #[default]
    Document,
    /// Playable video
    Video,
    /// Playable audio
    Audio,
}

impl MediaKind {
    /// Emoji used in captions
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Document => "📄",
            Self::Video => "🎬",
            Self::Audio => "🎵",
        }
    }
}

/// Where a file's content comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// URL fetched and re-uploaded on every delivery
    DirectLink(String),
    /// Provider-side file reference resent as is
    ProviderRef(String),
}

/// A deliverable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Unique catalog key
    pub key: String,
    /// Display name
    pub name: String,
    /// Human-readable size label
    pub size: String,
    /// Free-form description
    pub description: String,
    /// Presentation kind
    pub kind: MediaKind,
    /// Content source
    pub source: FileSource,
    /// Category selecting the required channel set
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type", default)]
    kind: MediaKind,
    direct_link: Option<String>,
    file_id: Option<String>,
    category: Option<String>,
}

impl RawEntry {
    fn into_entry(self, key: String) -> Result<FileEntry, CatalogError> {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        let source = match (non_empty(self.file_id), non_empty(self.direct_link)) {
            (Some(file_id), _) => FileSource::ProviderRef(file_id),
            (None, Some(link)) => FileSource::DirectLink(link),
            (None, None) => return Err(CatalogError::MissingSource(key)),
        };
        Ok(FileEntry {
            key,
            name: self.name,
            size: self.size,
            description: self.description,
            kind: self.kind,
            source,
            category: non_empty(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        })
    }
}

/// Parses one catalog blob.
///
/// Individual malformed entries are skipped with a warning; only a source that
/// is not a JSON object at all is an error.
///
/// # Errors
///
/// Returns `CatalogError` if `raw` is not a JSON object.
pub fn parse_source(raw: &str) -> Result<Vec<FileEntry>, CatalogError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(map) = value else {
        return Err(CatalogError::NotAnObject);
    };
    Ok(parse_entries(map))
}

fn parse_entries(map: Map<String, Value>) -> Vec<FileEntry> {
    map.into_iter()
        .filter_map(|(key, value)| {
            let parsed = serde_json::from_value::<RawEntry>(value)
                .map_err(CatalogError::from)
                .and_then(|raw| raw.into_entry(key.clone()));
            match parsed {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping malformed catalog entry");
                    None
                }
            }
        })
        .collect()
}

/// Immutable file catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<FileEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from sources in merge order.
    ///
    /// A source that fails to parse contributes nothing; the rest still load.
    ///
    /// # Examples
    ///
    /// ```
    /// use filegate_bot::catalog::Catalog;
    ///
    /// let catalog = Catalog::from_sources(&[
    ///     r#"{"f1": {"name": "Doc", "type": "document", "direct_link": "https://example.com/a.pdf"}}"#,
    ///     "not json",
    /// ]);
    /// assert_eq!(catalog.len(), 1);
    /// assert!(catalog.get("f1").is_some());
    /// ```
    #[must_use]
    pub fn from_sources(sources: &[&str]) -> Self {
        let mut catalog = Self::default();
        for (position, raw) in sources.iter().enumerate() {
            match parse_source(raw) {
                Ok(entries) => {
                    for entry in entries {
                        catalog.insert(entry, position);
                    }
                }
                Err(e) => {
                    warn!(source = position, error = %e, "Catalog source is malformed, ignoring it");
                }
            }
        }
        info!(files = catalog.len(), "Catalog loaded");
        catalog
    }

    fn insert(&mut self, entry: FileEntry, source: usize) {
        if let Some(&idx) = self.index.get(&entry.key) {
            warn!(key = %entry.key, source, "Catalog key defined twice, later source wins");
            self.entries[idx] = entry;
        } else {
            self.index.insert(entry.key.clone(), self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Look up an entry by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    /// Look up an entry by its listing position
    #[must_use]
    pub fn get_by_index(&self, idx: usize) -> Option<&FileEntry> {
        self.entries.get(idx)
    }

    /// Listing position of `key`
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Entries in listing order
    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
