//! Local cache of the library index
//!
//! The index is downloaded gzip-compressed, kept next to its decompressed
//! form under the SDK root, and reused on later runs until it is refreshed
//! explicitly or exceeds the configured maximum age.

use flate2::read::GzDecoder;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::Catalog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Raw download, as served
pub const COMPRESSED_INDEX_FILE: &str = "library_index.json.gz";

/// Decompressed index, as parsed
pub const INDEX_FILE: &str = "library_index.json";

/// Loads and caches the library index under an SDK root
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
    index_url: String,
    max_age: Option<Duration>,
}

impl IndexStore {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            index_url: config.index_url.clone(),
            max_age: config.index_max_age(),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn compressed_path(&self) -> PathBuf {
        self.root.join(COMPRESSED_INDEX_FILE)
    }

    /// Load the catalog, downloading it if there is no usable cached copy
    ///
    /// Set `force_refresh` to discard the cached copy first.
    pub async fn load(&self, transport: &dyn Transport, force_refresh: bool) -> Result<Catalog> {
        if force_refresh {
            tracing::debug!("Discarding cached index (forced refresh)");
            self.clear_cache()?;
        }

        if self.has_fresh_cache() {
            tracing::debug!("Using cached index {}", self.index_path().display());
            return Catalog::from_file(&self.index_path());
        }

        self.refresh(transport).await
    }

    /// Whether a cached index exists and is within the maximum age
    pub fn has_fresh_cache(&self) -> bool {
        let path = self.index_path();
        let Ok(metadata) = std::fs::metadata(&path) else {
            return false;
        };

        let Some(max_age) = self.max_age else {
            return true;
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);

        if age > max_age {
            tracing::debug!("Cached index expired (age: {:?})", age);
            return false;
        }
        true
    }

    /// Remove both cached index files
    pub fn clear_cache(&self) -> Result<()> {
        for path in [self.index_path(), self.compressed_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(path, e)),
            }
        }
        Ok(())
    }

    /// Download, decompress, validate and persist the index
    async fn refresh(&self, transport: &dyn Transport) -> Result<Catalog> {
        tracing::info!("Downloading library index from {}", self.index_url);

        let compressed = transport.get(&self.index_url).await?.bytes().await?;

        std::fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;

        let compressed_path = self.compressed_path();
        std::fs::write(&compressed_path, &compressed)
            .map_err(|e| Error::io(&compressed_path, e))?;

        let mut content = String::new();
        GzDecoder::new(&compressed[..])
            .read_to_string(&mut content)
            .map_err(|e| Error::Decompress {
                path: compressed_path.clone(),
                source: e,
            })?;

        // Parse before persisting so a malformed index is never cached
        let index_path = self.index_path();
        let catalog = Catalog::from_json(&content, &index_path)?;

        let mut staged =
            tempfile::NamedTempFile::new_in(&self.root).map_err(|e| Error::io(&self.root, e))?;
        staged
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(staged.path(), e))?;
        staged
            .persist(&index_path)
            .map_err(|e| Error::io(&index_path, e.error))?;

        tracing::info!(
            "Cached library index: {} libraries, {} entries",
            catalog.library_count(),
            catalog.entry_count()
        );
        Ok(catalog)
    }
}
