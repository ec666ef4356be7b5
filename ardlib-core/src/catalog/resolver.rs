//! Library resolution
//!
//! Turns a (name, selector) request into a single catalog entry.

use std::fmt;
use std::str::FromStr;

use super::index::{highest_of, Catalog, CatalogEntry};
use crate::error::{Error, Result};

/// Selector text for "highest version in the index"
pub const HIGHEST_SELECTOR: &str = "version-latest";

/// Selector text for "skip the index and use source control"
pub const DEFERRED_SELECTOR: &str = "latest";

/// How to pick an entry among the versions of a library
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// Exactly this version string
    Exact(String),

    /// Highest version published for the name
    #[default]
    Highest,

    /// Retrieval is left to an external source-control checkout
    Deferred,
}

impl FromStr for VersionSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "" | HIGHEST_SELECTOR => VersionSelector::Highest,
            DEFERRED_SELECTOR => VersionSelector::Deferred,
            exact => VersionSelector::Exact(exact.to_string()),
        })
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Exact(version) => f.write_str(version),
            VersionSelector::Highest => f.write_str(HIGHEST_SELECTOR),
            VersionSelector::Deferred => f.write_str(DEFERRED_SELECTOR),
        }
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The entry to download
    Entry(&'a CatalogEntry),

    /// The caller must retrieve the library out of band
    Deferred,
}

impl<'a> Resolution<'a> {
    pub fn entry(&self) -> Option<&'a CatalogEntry> {
        match self {
            Resolution::Entry(entry) => Some(entry),
            Resolution::Deferred => None,
        }
    }
}

/// Resolve a library request against the catalog
///
/// Duplicate exact matches fall back to the highest-version tie-break so the
/// pick is stable for a given index snapshot.
pub fn resolve<'a>(
    catalog: &'a Catalog,
    name: &str,
    selector: &VersionSelector,
) -> Result<Resolution<'a>> {
    let not_found = || Error::NotFound {
        name: name.to_string(),
        selector: selector.to_string(),
    };

    match selector {
        VersionSelector::Deferred => {
            tracing::debug!("Resolution of '{}' deferred to source control", name);
            Ok(Resolution::Deferred)
        }
        VersionSelector::Highest => {
            let entry = highest_of(catalog.entries_named(name)).ok_or_else(not_found)?;
            tracing::debug!("Resolved {} -> {}", name, entry.version);
            Ok(Resolution::Entry(entry))
        }
        VersionSelector::Exact(version) => {
            let matches: Vec<&CatalogEntry> = catalog
                .entries_named(name)
                .filter(|e| e.version == *version)
                .collect();

            if matches.len() > 1 {
                tracing::warn!(
                    "Index lists {} entries for {} {}; picking deterministically",
                    matches.len(),
                    name,
                    version
                );
            }

            let entry = highest_of(matches).ok_or_else(not_found)?;
            Ok(Resolution::Entry(entry))
        }
    }
}
