//! ardlib commands
//!
//! Install, search and inspect libraries from the Arduino library index.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use ardlib_core::catalog::{Catalog, CatalogEntry, VersionSelector, HIGHEST_SELECTOR};
use ardlib_core::config::Config;
use ardlib_core::installer::{InstallOutcome, InstallRequest, Installer};

use crate::progress::ProgressBarObserver;

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    /// Install a library from the index
    Install {
        /// Library name as listed in the index (e.g. "Servo")
        #[clap(long)]
        library: String,

        /// Exact version, "version-latest" for the highest, or "latest" for source control
        #[clap(long, default_value = HIGHEST_SELECTOR)]
        library_version: VersionSelector,

        /// Arduino SDK root holding the index cache and staging area
        #[clap(long, visible_alias = "sdk")]
        arduino_sdk: PathBuf,

        /// Directory the library folder is created in
        #[clap(long)]
        lib_path: PathBuf,

        /// Refresh the index and redo download and extraction
        #[clap(long, short)]
        force: bool,

        /// Also install the libraries it depends on
        #[clap(long)]
        with_deps: bool,
    },

    /// Search the index by name, summary or category
    Search {
        /// Search query (lists every library if omitted)
        query: Option<String>,

        #[clap(long, visible_alias = "sdk")]
        arduino_sdk: PathBuf,

        /// Output results as JSON
        #[clap(long)]
        json: bool,

        /// Force refresh of the library index
        #[clap(long)]
        refresh: bool,
    },

    /// Show the available versions of a library
    Show {
        /// Library name
        name: String,

        #[clap(long, visible_alias = "sdk")]
        arduino_sdk: PathBuf,

        /// Output as JSON
        #[clap(long)]
        json: bool,

        /// Force refresh of the library index
        #[clap(long)]
        refresh: bool,
    },

    /// Delete the cached library index
    ClearCache {
        #[clap(long, visible_alias = "sdk")]
        arduino_sdk: PathBuf,
    },
}

impl LibraryCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        match self {
            LibraryCommand::Install {
                library,
                library_version,
                arduino_sdk,
                lib_path,
                force,
                with_deps,
            } => {
                let request = InstallRequest::new(library, library_version, lib_path)
                    .force_refresh(force)
                    .with_dependencies(with_deps);
                execute_install(config, &arduino_sdk, request).await
            }
            LibraryCommand::Search {
                query,
                arduino_sdk,
                json,
                refresh,
            } => execute_search(config, &arduino_sdk, query.as_deref(), json, refresh).await,
            LibraryCommand::Show {
                name,
                arduino_sdk,
                json,
                refresh,
            } => execute_show(config, &arduino_sdk, &name, json, refresh).await,
            LibraryCommand::ClearCache { arduino_sdk } => execute_clear_cache(config, &arduino_sdk),
        }
    }
}

/// Attach `what` and the failing pipeline stage to a core error
fn stage_context(err: ardlib_core::Error, what: String) -> anyhow::Error {
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("{what} ({stage} stage)"))
}

/// Load the index; status goes to stderr when stdout carries JSON
async fn load_catalog(installer: &Installer, force_refresh: bool, json_output: bool) -> Result<Catalog> {
    let status = if force_refresh {
        "Fetching library index (refreshing cache)..."
    } else {
        "Fetching library index..."
    };
    if json_output {
        eprintln!("{status}");
    } else {
        println!("{status}");
    }

    installer
        .load_catalog(force_refresh)
        .await
        .map_err(|e| stage_context(e, "Failed to load the library index".to_string()))
}

async fn execute_install(config: &Config, sdk: &Path, request: InstallRequest) -> Result<()> {
    let installer = Installer::new(sdk, config)?;
    let describe = || format!("Failed to install '{}' (version: {})", request.name, request.selector);

    let catalog = load_catalog(&installer, request.force_refresh, false)
        .await
        .with_context(describe)?;

    let observer = ProgressBarObserver::new();
    let outcome = installer
        .install_from(&catalog, &request, &observer)
        .await
        .map_err(|e| stage_context(e, describe()))?;

    match outcome {
        InstallOutcome::Installed(libraries) => {
            for library in &libraries {
                println!("Installed {} v{}", library.name, library.version);
                println!("Location: {}", library.path.display());
            }
            Ok(())
        }
        InstallOutcome::Deferred { name } => {
            anyhow::bail!(
                "'{name}' was requested from source control, which ardlib does not support.\n\
                 Use --library-version {HIGHEST_SELECTOR} or an exact version to install from the index."
            )
        }
    }
}

/// Table row for search results
#[derive(Tabled)]
struct SearchResultRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Description")]
    description: String,
}

async fn execute_search(
    config: &Config,
    sdk: &Path,
    query: Option<&str>,
    json_output: bool,
    force_refresh: bool,
) -> Result<()> {
    let installer = Installer::new(sdk, config)?;
    let catalog = load_catalog(&installer, force_refresh, json_output).await?;

    let results = catalog.search(query.unwrap_or(""));

    if results.is_empty() && !json_output {
        println!("\nNo libraries found.");
        return Ok(());
    }

    if json_output {
        let json_results: Vec<serde_json::Value> = results
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "name": entry.name,
                    "version": entry.version,
                    "sentence": entry.sentence,
                    "category": entry.category,
                    "architectures": entry.architectures,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
    } else {
        println!("\nFound {} library(ies):\n", results.len());

        let table_rows: Vec<SearchResultRow> = results
            .iter()
            .map(|entry| SearchResultRow {
                name: entry.name.clone(),
                version: entry.version.clone(),
                category: entry.category.clone().unwrap_or_default(),
                description: truncate(entry.short_description(), 50),
            })
            .collect();

        let table = Table::new(&table_rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();

        println!("{table}");
    }

    Ok(())
}

async fn execute_show(
    config: &Config,
    sdk: &Path,
    name: &str,
    json_output: bool,
    force_refresh: bool,
) -> Result<()> {
    let installer = Installer::new(sdk, config)?;
    let catalog = load_catalog(&installer, force_refresh, json_output).await?;

    let versions = catalog.versions(name);
    let latest: &CatalogEntry = versions
        .first()
        .copied()
        .with_context(|| format!("Library '{name}' not found in the index"))?;

    if json_output {
        let output = serde_json::json!({
            "name": latest.name,
            "latest_version": latest.version,
            "sentence": latest.sentence,
            "author": latest.author,
            "website": latest.website,
            "dependencies": latest.dependencies,
            "available_versions": versions.iter().map(|v| &v.version).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("Library: {}", latest.name);
    println!("Latest:  v{}", latest.version);
    if let Some(author) = &latest.author {
        println!("Author:  {author}");
    }
    if let Some(website) = &latest.website {
        println!("Website: {website}");
    }
    if !latest.architectures.is_empty() {
        println!("Architectures: {}", latest.architectures.join(", "));
    }

    if let Some(sentence) = &latest.sentence {
        println!();
        println!("Description:");
        for line in sentence.lines() {
            println!("  {line}");
        }
    }

    if !latest.dependencies.is_empty() {
        println!();
        println!("Dependencies:");
        for dep in &latest.dependencies {
            match &dep.version {
                Some(version) => println!("  {} v{}", dep.name, version),
                None => println!("  {}", dep.name),
            }
        }
    }

    println!();
    println!("Available versions:");
    for (i, v) in versions.iter().take(10).enumerate() {
        let marker = if i == 0 { " (latest)" } else { "" };
        println!("  v{}{}", v.version, marker);
    }
    if versions.len() > 10 {
        println!("  ... and {} more", versions.len() - 10);
    }

    Ok(())
}

fn execute_clear_cache(config: &Config, sdk: &Path) -> Result<()> {
    let installer = Installer::new(sdk, config)?;
    installer
        .index_store()
        .clear_cache()
        .context("Failed to clear the index cache")?;
    println!("Cleared cached library index in {}", sdk.display());
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars - 3).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
