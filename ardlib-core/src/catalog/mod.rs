//! Arduino library catalog - index loading and library resolution
//!
//! # Overview
//!
//! ```text
//! downloads.arduino.cc
//!     │
//!     └── library_index.json.gz  ← every release of every library
//!            │
//!            ▼
//!     IndexStore                 ← <sdk>/library_index.json cache
//!            │
//!            ▼
//!     resolve(name, selector)    ← one CatalogEntry (or Deferred)
//! ```

mod index;
mod resolver;
mod store;
mod version;

pub use index::{Catalog, CatalogEntry, Dependency};
pub use resolver::{resolve, Resolution, VersionSelector, DEFERRED_SELECTOR, HIGHEST_SELECTOR};
pub use store::{IndexStore, COMPRESSED_INDEX_FILE, INDEX_FILE};
pub use version::LooseVersion;
