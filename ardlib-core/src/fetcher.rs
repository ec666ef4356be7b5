//! Archive download into the staging directory
//!
//! Archives are streamed to `<name>.part` and renamed into place once the
//! body has fully drained and its checksum (when published) matches, so a
//! file under its final name is always a complete download.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::catalog::CatalogEntry;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Receives download progress
///
/// All methods default to doing nothing.
pub trait FetchObserver: Send + Sync {
    /// A download is about to start; `total_bytes` is known when the server
    /// sent a content length
    fn started(&self, _entry: &CatalogEntry, _total_bytes: Option<u64>) {}

    /// `written` of `total` bytes are on disk
    fn progressed(&self, _written: u64, _total: u64) {}

    /// The archive is complete at `path`
    fn finished(&self, _path: &Path) {}

    /// The download of `entry` was abandoned; nothing was kept
    fn failed(&self, _entry: &CatalogEntry) {}
}

/// Observer that ignores all progress
pub struct NoProgress;

impl FetchObserver for NoProgress {}

/// Downloads library archives into a staging directory
#[derive(Debug, Clone)]
pub struct Fetcher {
    staging_dir: PathBuf,
}

impl Fetcher {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    /// Where the archive for `entry` is staged
    pub fn archive_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.staging_dir.join(&entry.archive_file_name)
    }

    /// Download the archive for `entry`, or reuse the staged copy
    ///
    /// An existing archive is returned without touching the network unless
    /// `force_refresh` is set, in which case it is deleted and downloaded again.
    pub async fn fetch(
        &self,
        transport: &dyn Transport,
        entry: &CatalogEntry,
        force_refresh: bool,
        observer: &dyn FetchObserver,
    ) -> Result<PathBuf> {
        validate_file_name(entry)?;
        let path = self.archive_path(entry);

        if path.exists() {
            if !force_refresh {
                tracing::info!("{} already downloaded", entry.archive_file_name);
                return Ok(path);
            }
            tracing::debug!("Removing staged {} (forced refresh)", path.display());
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| Error::io(&path, e))?;
        }

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| Error::io(&self.staging_dir, e))?;

        tracing::info!("Downloading {} from {}", entry.archive_file_name, entry.url);

        let part = part_path(&path);
        if let Err(e) = self.download_verified(transport, entry, &part, &path, observer).await {
            let _ = tokio::fs::remove_file(&part).await;
            observer.failed(entry);
            return Err(e);
        }

        observer.finished(&path);
        tracing::info!("Downloaded {}", path.display());
        Ok(path)
    }

    /// Download to `part`, check the published digest, then move it to `path`
    async fn download_verified(
        &self,
        transport: &dyn Transport,
        entry: &CatalogEntry,
        part: &Path,
        path: &Path,
        observer: &dyn FetchObserver,
    ) -> Result<()> {
        let digest = self.download(transport, entry, part, observer).await?;

        if let Some(expected) = entry.sha256() {
            if digest != expected {
                return Err(Error::ChecksumMismatch {
                    path: path.to_path_buf(),
                    expected,
                    actual: digest,
                });
            }
            tracing::debug!("Verified SHA-256 {}", digest);
        } else if entry.checksum.is_some() {
            tracing::debug!(
                "Skipping verification of unsupported checksum {:?}",
                entry.checksum
            );
        }

        tokio::fs::rename(part, path)
            .await
            .map_err(|e| Error::io(path, e))
    }

    /// Stream the body to `part`, returning its SHA-256 in lowercase hex
    async fn download(
        &self,
        transport: &dyn Transport,
        entry: &CatalogEntry,
        part: &Path,
        observer: &dyn FetchObserver,
    ) -> Result<String> {
        let write_err = |e: std::io::Error| Error::FetchWrite {
            url: entry.url.clone(),
            path: part.to_path_buf(),
            source: e,
        };

        let mut body = transport.get(&entry.url).await?;
        let total = body.content_length();
        observer.started(entry, total);

        let mut file = tokio::fs::File::create(part).await.map_err(write_err)?;
        let mut hasher = Sha256::new();

        match total {
            Some(total) => {
                let mut written: u64 = 0;
                while let Some(chunk) = body.chunk().await? {
                    file.write_all(&chunk).await.map_err(write_err)?;
                    hasher.update(&chunk);
                    written += chunk.len() as u64;
                    observer.progressed(written, total);
                }
            }
            None => {
                let data = body.bytes().await?;
                file.write_all(&data).await.map_err(write_err)?;
                hasher.update(&data);
            }
        }

        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;

        Ok(hex::encode(hasher.finalize()))
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// The archive name must be a bare file name; it is joined onto the staging dir
fn validate_file_name(entry: &CatalogEntry) -> Result<()> {
    let name = Path::new(&entry.archive_file_name);
    let is_plain = name.file_name().map(|f| f == name.as_os_str()).unwrap_or(false);
    if !is_plain {
        return Err(Error::Fetch {
            url: entry.url.clone(),
            reason: format!("invalid archive file name '{}'", entry.archive_file_name),
        });
    }
    Ok(())
}
