//! Archive extraction into the library destination
//!
//! A library is installed at `<destination>/<library name>`. Arduino
//! archives carry a single root folder named after the archive
//! (`Servo-1.1.2/`), which is renamed to the library name once unpacked.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogEntry;
use crate::error::{Error, Result};

/// Unpacks staged archives into a destination directory
#[derive(Debug, Clone)]
pub struct Extractor {
    destination: PathBuf,
}

impl Extractor {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    /// Install directory for `entry`
    pub fn target_dir(&self, entry: &CatalogEntry) -> PathBuf {
        self.destination.join(&entry.name)
    }

    /// Unpack `archive` as the install directory of `entry`
    ///
    /// An existing install directory is left untouched unless `force_refresh`
    /// is set, in which case it is removed and unpacked again.
    pub fn extract(&self, archive: &Path, entry: &CatalogEntry, force_refresh: bool) -> Result<PathBuf> {
        validate_library_name(archive, entry)?;
        let target = self.target_dir(entry);

        if target.exists() {
            if !force_refresh {
                tracing::info!("{} already extracted at {}", entry.name, target.display());
                return Ok(target);
            }
            tracing::debug!("Removing {} (forced refresh)", target.display());
            remove_path(&target)?;
        }

        std::fs::create_dir_all(&self.destination).map_err(|e| Error::io(&self.destination, e))?;

        tracing::info!(
            "Extracting {} to {}",
            entry.archive_file_name,
            self.destination.display()
        );

        // Unpack next to the target so the final move is a same-filesystem rename
        let scratch = tempfile::Builder::new()
            .prefix(".ardlib-extract-")
            .tempdir_in(&self.destination)
            .map_err(|e| Error::io(&self.destination, e))?;

        unpack_zip(archive, scratch.path())?;

        let root = archive_root(scratch.path(), entry.archive_stem()).map_err(|e| Error::ExtractIo {
            archive: archive.to_path_buf(),
            target: target.clone(),
            source: e,
        })?;

        std::fs::rename(&root, &target).map_err(|e| Error::ExtractIo {
            archive: archive.to_path_buf(),
            target: target.clone(),
            source: e,
        })?;

        tracing::info!("Installed {} {} to {}", entry.name, entry.version, target.display());
        Ok(target)
    }

}

/// Unpack every member of a zip archive under `dest`
fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let corrupt = |reason: String| Error::Extract {
        archive: archive_path.to_path_buf(),
        reason,
    };
    let io_err = |path: &Path, e: std::io::Error| Error::ExtractIo {
        archive: archive_path.to_path_buf(),
        target: path.to_path_buf(),
        source: e,
    };

    let file = File::open(archive_path).map_err(|e| corrupt(format!("cannot open archive: {e}")))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(|e| corrupt(e.to_string()))?;

        let relative = member
            .enclosed_name()
            .ok_or_else(|| corrupt(format!("unsafe path in archive: {}", member.name())))?;
        let outpath = dest.join(relative);

        if member.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| io_err(&outpath, e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| io_err(&outpath, e))?;
        std::io::copy(&mut member, &mut outfile).map_err(|e| {
            // zip reports CRC and inflate failures as io errors
            if e.kind() == std::io::ErrorKind::InvalidData {
                corrupt(e.to_string())
            } else {
                io_err(&outpath, e)
            }
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = member.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                    .map_err(|e| io_err(&outpath, e))?;
            }
        }
    }

    Ok(())
}

/// Pick the directory that becomes the install directory
///
/// Prefers the folder named after the archive, then a sole top-level folder,
/// then the whole scratch directory.
fn archive_root(scratch: &Path, stem: &str) -> std::io::Result<PathBuf> {
    let named = scratch.join(stem);
    if named.is_dir() {
        return Ok(named);
    }

    let top_level: Vec<PathBuf> = std::fs::read_dir(scratch)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();

    match top_level.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(scratch.to_path_buf()),
    }
}

fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| Error::io(path, e))
}

/// The library name becomes a directory name under the destination
fn validate_library_name(archive: &Path, entry: &CatalogEntry) -> Result<()> {
    let name = Path::new(&entry.name);
    let is_plain = !entry.name.is_empty()
        && entry.name != "."
        && entry.name != ".."
        && name.file_name().map(|f| f == name.as_os_str()).unwrap_or(false);
    if !is_plain {
        return Err(Error::Extract {
            archive: archive.to_path_buf(),
            reason: format!("library name '{}' is not a valid directory name", entry.name),
        });
    }
    Ok(())
}
