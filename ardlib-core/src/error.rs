//! Error types for the install pipeline
//!
//! Every variant names the stage it came from (index, resolve, fetch,
//! extract) and carries the URL or path involved, so a failed run can be
//! diagnosed from the message alone.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the ardlib core
#[derive(Error, Debug)]
pub enum Error {
    /// A network request failed or returned a non-success status
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Writing a downloaded body to disk failed
    #[error("Failed to write download from {url} to {path}")]
    FetchWrite {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The downloaded archive does not match the digest published in the index
    #[error("Checksum mismatch for {path}\nExpected: {expected}\nActual:   {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The catalog document is not well-formed
    #[error("Failed to parse library index {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The compressed index could not be decompressed
    #[error("Failed to decompress library index {path}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No catalog entry matches the request
    #[error("No library named '{name}' matching version '{selector}' found in the index")]
    NotFound { name: String, selector: String },

    /// The archive is corrupt or unreadable
    #[error("Failed to extract {archive}: {reason}")]
    Extract { archive: PathBuf, reason: String },

    /// Filesystem failure while unpacking an archive
    #[error("Failed to extract {archive} into {target}")]
    ExtractIo {
        archive: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be read or parsed
    #[error("Invalid configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Cache or staging housekeeping failed
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short name of the pipeline stage that produced this error
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Fetch { .. } | Error::FetchWrite { .. } | Error::ChecksumMismatch { .. } => {
                "fetch"
            }
            Error::Parse { .. } | Error::Decompress { .. } => "index",
            Error::NotFound { .. } => "resolve",
            Error::Extract { .. } | Error::ExtractIo { .. } => "extract",
            Error::Config { .. } => "config",
            Error::Io { .. } => "io",
        }
    }

    /// Wrap an `std::io::Error` with the path it occurred on
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
