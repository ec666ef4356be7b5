//! Library installation pipeline
//!
//! Runs the stages in order: load the index, resolve the request, fetch the
//! archive, extract it. Each stage is skipped when its output already exists
//! unless the request forces a refresh, so re-running an install is cheap.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::catalog::{resolve, Catalog, CatalogEntry, IndexStore, Resolution, VersionSelector};
use crate::config::Config;
use crate::error::Result;
use crate::extractor::Extractor;
use crate::fetcher::{FetchObserver, Fetcher};
use crate::transport::{HttpTransport, Transport};

/// One install invocation
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Library name as listed in the index
    pub name: String,

    pub selector: VersionSelector,

    /// Directory the library folder is created in
    pub destination: PathBuf,

    /// Redo every stage even when its output exists
    pub force_refresh: bool,

    /// Also install the libraries the resolved entry depends on
    pub with_dependencies: bool,
}

impl InstallRequest {
    pub fn new(name: impl Into<String>, selector: VersionSelector, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            selector,
            destination: destination.into(),
            force_refresh: false,
            with_dependencies: false,
        }
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn with_dependencies(mut self, with_dependencies: bool) -> Self {
        self.with_dependencies = with_dependencies;
        self
    }
}

/// A library placed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledLibrary {
    pub name: String,
    pub version: String,
    /// Staged archive
    pub archive: PathBuf,
    /// Install directory
    pub path: PathBuf,
}

/// Result of an install run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The requested library first, then its dependencies
    Installed(Vec<InstalledLibrary>),

    /// The selector asked for source control; nothing was downloaded
    Deferred { name: String },
}

/// Installs libraries from the index under an SDK root
pub struct Installer {
    transport: Box<dyn Transport>,
    store: IndexStore,
    fetcher: Fetcher,
}

impl Installer {
    /// Create an installer that talks HTTP
    pub fn new(root: &Path, config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(root, config, Box::new(transport)))
    }

    /// Create an installer with a custom transport
    pub fn with_transport(root: &Path, config: &Config, transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            store: IndexStore::new(root, config),
            fetcher: Fetcher::new(root.join(&config.staging_dir)),
        }
    }

    pub fn index_store(&self) -> &IndexStore {
        &self.store
    }

    /// Load the library index, refreshing it when forced
    pub async fn load_catalog(&self, force_refresh: bool) -> Result<Catalog> {
        self.store.load(self.transport.as_ref(), force_refresh).await
    }

    /// Run the full pipeline for `request`
    pub async fn install(
        &self,
        request: &InstallRequest,
        observer: &dyn FetchObserver,
    ) -> Result<InstallOutcome> {
        let catalog = self.load_catalog(request.force_refresh).await?;
        self.install_from(&catalog, request, observer).await
    }

    /// Run the resolve, fetch and extract stages against a loaded catalog
    pub async fn install_from(
        &self,
        catalog: &Catalog,
        request: &InstallRequest,
        observer: &dyn FetchObserver,
    ) -> Result<InstallOutcome> {
        let root = match resolve(catalog, &request.name, &request.selector)? {
            Resolution::Entry(entry) => entry,
            Resolution::Deferred => {
                tracing::info!("Install of '{}' deferred to source control", request.name);
                return Ok(InstallOutcome::Deferred {
                    name: request.name.clone(),
                });
            }
        };

        let extractor = Extractor::new(&request.destination);
        let mut visited: HashSet<&str> = HashSet::from([root.name.as_str()]);
        let mut pending: Vec<&CatalogEntry> = vec![root];
        let mut installed = Vec::new();

        while let Some(entry) = pending.pop() {
            installed.push(self.install_entry(&extractor, entry, request.force_refresh, observer).await?);

            if !request.with_dependencies {
                continue;
            }

            // Reverse so the first declared dependency is installed next
            for dependency in entry.dependencies.iter().rev() {
                if !visited.insert(dependency.name.as_str()) {
                    continue;
                }
                let selector = dependency
                    .version
                    .clone()
                    .map(VersionSelector::Exact)
                    .unwrap_or(VersionSelector::Highest);

                tracing::debug!("{} depends on {} ({})", entry.name, dependency.name, selector);
                if let Some(dep_entry) = resolve(catalog, &dependency.name, &selector)?.entry() {
                    pending.push(dep_entry);
                }
            }
        }

        Ok(InstallOutcome::Installed(installed))
    }

    async fn install_entry(
        &self,
        extractor: &Extractor,
        entry: &CatalogEntry,
        force_refresh: bool,
        observer: &dyn FetchObserver,
    ) -> Result<InstalledLibrary> {
        tracing::info!("Installing {} {}", entry.name, entry.version);

        let archive = self
            .fetcher
            .fetch(self.transport.as_ref(), entry, force_refresh, observer)
            .await?;
        let path = extractor.extract(&archive, entry, force_refresh)?;

        Ok(InstalledLibrary {
            name: entry.name.clone(),
            version: entry.version.clone(),
            archive,
            path,
        })
    }
}
