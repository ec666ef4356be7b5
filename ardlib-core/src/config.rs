//! Installer configuration
//!
//! Read from `config.yaml` in the platform config directory (or a path
//! given on the command line). A missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Official Arduino library index
pub const DEFAULT_INDEX_URL: &str = "https://downloads.arduino.cc/libraries/library_index.json.gz";

/// Staging directory for downloaded archives, relative to the SDK root
pub const DEFAULT_STAGING_DIR: &str = "staging/libraries";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL of the gzip-compressed library index
    pub index_url: String,

    /// Where archives are staged, relative to the SDK root
    pub staging_dir: PathBuf,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Cached index older than this is refetched; unset means never
    pub index_max_age_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            user_agent: concat!("ardlib/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            index_max_age_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => {
                tracing::debug!("No config directory available; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file {} not found; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = serde_yaml_ng::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate(path)?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("cc", "arduino", "ardlib")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(|| dirs::config_dir().map(|d| d.join("ardlib")))
            .map(|dir| dir.join("config.yaml"))
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if !self.index_url.starts_with("http://") && !self.index_url.starts_with("https://") {
            return Err(Error::Config {
                path: path.to_path_buf(),
                reason: format!("index_url must start with http:// or https://, got '{}'", self.index_url),
            });
        }
        if self.staging_dir.is_absolute() {
            return Err(Error::Config {
                path: path.to_path_buf(),
                reason: "staging_dir must be relative to the SDK root".to_string(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn index_max_age(&self) -> Option<Duration> {
        self.index_max_age_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from_path(&temp_dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.index_url, DEFAULT_INDEX_URL);
        assert!(config.index_max_age().is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "index_url: https://mirror.example.com/library_index.json.gz\nindex_max_age_secs: 3600\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.index_url, "https://mirror.example.com/library_index.json.gz");
        assert_eq!(config.index_max_age(), Some(Duration::from_secs(3600)));
        assert_eq!(config.staging_dir, PathBuf::from(DEFAULT_STAGING_DIR));
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "timeout_secs: [not, a, number]\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_rejects_non_http_index_url() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "index_url: ftp://example.com/index.json.gz\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_rejects_absolute_staging_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "staging_dir: /var/tmp/staging\n").unwrap();

        assert!(Config::load_from_path(&path).is_err());
    }
}
