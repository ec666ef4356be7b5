//! Library index parsing and queries
//!
//! The Arduino library index (`library_index.json`) lists every released
//! version of every library as a flat array. Entries sharing a name are
//! different versions of the same library.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use super::version::LooseVersion;
use crate::error::{Error, Result};

/// The full library index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// All library entries, in index order
    #[serde(default)]
    pub libraries: Vec<CatalogEntry>,
}

/// One released version of a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Library name
    pub name: String,

    /// Version string (loosely ordered)
    pub version: String,

    /// Download URL of the zip archive
    pub url: String,

    /// File name of the archive, used for the staging copy
    pub archive_file_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,

    /// One-line summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Supported architectures ("*" for all)
    #[serde(default)]
    pub architectures: Vec<String>,

    /// Library types (e.g. "Arduino", "Contributed")
    #[serde(default)]
    pub types: Vec<String>,

    /// Source repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Archive size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Archive digest, e.g. "SHA-256:4b7c..."
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Other libraries this version depends on
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// A dependency declared by a library entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    /// Exact version, when the dependency pins one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Catalog {
    /// Create a catalog from a list of entries
    pub fn new(libraries: Vec<CatalogEntry>) -> Self {
        Self { libraries }
    }

    /// Parse a catalog from JSON text; `source` only labels errors
    pub fn from_json(content: &str, source: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Parse {
            path: source.to_path_buf(),
            source: e,
        })
    }

    /// Load a catalog from a decompressed index file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&content, path)
    }

    /// Iterate over all entries with the given name
    pub fn entries_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a CatalogEntry> + 'n
    where
        'a: 'n,
    {
        self.libraries.iter().filter(move |e| e.name == name)
    }

    /// All versions of a library, highest first
    pub fn versions(&self, name: &str) -> Vec<&CatalogEntry> {
        let mut versions: Vec<&CatalogEntry> = self.entries_named(name).collect();
        // Stable sort keeps index order among equal versions
        versions.sort_by(|a, b| b.loose_version().cmp(&a.loose_version()));
        versions
    }

    /// Search libraries by query string
    ///
    /// Matches against name, sentence and category (case-insensitive).
    /// Returns the highest version of each matching library, sorted by name.
    pub fn search(&self, query: &str) -> Vec<&CatalogEntry> {
        let query_lower = query.to_lowercase();

        let mut results: Vec<&CatalogEntry> = self
            .library_names()
            .into_iter()
            .filter_map(|name| highest_of(self.entries_named(name)))
            .filter(|latest| {
                let matches_name = latest.name.to_lowercase().contains(&query_lower);
                let matches_sentence = latest
                    .sentence
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&query_lower));
                let matches_category = latest
                    .category
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&query_lower));
                matches_name || matches_sentence || matches_category
            })
            .collect();

        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    }

    /// Distinct library names, in first-seen index order
    pub fn library_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.libraries
            .iter()
            .map(|e| e.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Number of distinct libraries
    pub fn library_count(&self) -> usize {
        self.library_names().len()
    }

    /// Total number of entries across all libraries
    pub fn entry_count(&self) -> usize {
        self.libraries.len()
    }
}

impl CatalogEntry {
    /// Minimal entry with only the fields the installer needs
    pub fn new(name: &str, version: &str, url: &str, archive_file_name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            url: url.to_string(),
            archive_file_name: archive_file_name.to_string(),
            author: None,
            maintainer: None,
            sentence: None,
            paragraph: None,
            website: None,
            category: None,
            architectures: Vec::new(),
            types: Vec::new(),
            repository: None,
            size: None,
            checksum: None,
            dependencies: Vec::new(),
        }
    }

    pub fn loose_version(&self) -> LooseVersion {
        LooseVersion::parse(&self.version)
    }

    /// Archive file name without its extension
    pub fn archive_stem(&self) -> &str {
        Path::new(&self.archive_file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.archive_file_name)
    }

    /// Expected SHA-256 digest in lowercase hex, if the index publishes one
    pub fn sha256(&self) -> Option<String> {
        let checksum = self.checksum.as_deref()?;
        let (algorithm, digest) = checksum.split_once(':')?;
        if algorithm.eq_ignore_ascii_case("SHA-256") {
            Some(digest.trim().to_ascii_lowercase())
        } else {
            None
        }
    }

    /// Summary line for display
    pub fn short_description(&self) -> &str {
        self.sentence
            .as_deref()
            .and_then(|s| s.lines().next())
            .unwrap_or("")
            .trim()
    }
}

/// Pick the entry with the highest version; the first one wins among equals
pub(crate) fn highest_of<'a>(
    entries: impl IntoIterator<Item = &'a CatalogEntry>,
) -> Option<&'a CatalogEntry> {
    let mut best: Option<(&CatalogEntry, LooseVersion)> = None;
    for entry in entries {
        let version = entry.loose_version();
        let replace = match &best {
            None => true,
            Some((_, current)) => version.cmp(current) == Ordering::Greater,
        };
        if replace {
            best = Some((entry, version));
        }
    }
    best.map(|(entry, _)| entry)
}
