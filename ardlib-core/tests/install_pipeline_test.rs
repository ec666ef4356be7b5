//! End-to-end tests of the install pipeline against an in-memory transport

mod common;

use anyhow::Result;
use ardlib_core::catalog::{Dependency, VersionSelector, INDEX_FILE};
use ardlib_core::fetcher::NoProgress;
use ardlib_core::installer::{InstallOutcome, InstallRequest, Installer};
use ardlib_core::transport::{Body, MemoryTransport, Transport};
use ardlib_core::Error;
use common::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

/// Shares one transport between the installer and the test's assertions
struct Shared(Arc<MemoryTransport>);

#[async_trait::async_trait]
impl Transport for Shared {
    async fn get(&self, url: &str) -> ardlib_core::Result<Box<dyn Body>> {
        self.0.get(url).await
    }
}

fn installer(sdk: &std::path::Path, transport: &Arc<MemoryTransport>) -> Installer {
    Installer::with_transport(sdk, &test_config(), Box::new(Shared(Arc::clone(transport))))
}

fn installed(outcome: InstallOutcome) -> Vec<ardlib_core::installer::InstalledLibrary> {
    match outcome {
        InstallOutcome::Installed(libraries) => libraries,
        other => panic!("expected an install, got {other:?}"),
    }
}

fn servo_entries() -> Vec<ardlib_core::catalog::CatalogEntry> {
    vec![
        library("Servo", "1.0.0"),
        library("Servo", "1.1.2"),
        library("Servo", "1.1.10"),
    ]
}

#[tokio::test]
async fn test_installs_highest_version() -> Result<()> {
    init_test_logging();
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");
    let transport = Arc::new(transport_for(&servo_entries()));

    let request = InstallRequest::new("Servo", VersionSelector::Highest, &dest);
    let libraries = installed(installer(sdk.path(), &transport).install(&request, &NoProgress).await?);

    assert_eq!(libraries.len(), 1);
    assert_eq!(libraries[0].version, "1.1.10");
    assert_eq!(libraries[0].path, dest.join("Servo"));
    assert_eq!(
        libraries[0].archive,
        sdk.path().join("staging/libraries/Servo-1.1.10.zip")
    );

    let properties = std::fs::read_to_string(dest.join("Servo").join("library.properties"))?;
    assert!(properties.contains("version=1.1.10"));
    assert!(sdk.path().join(INDEX_FILE).exists());

    // index + archive
    assert_eq!(transport.request_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_installs_exact_version() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");
    let transport = Arc::new(transport_for(&servo_entries()));

    let request = InstallRequest::new("Servo", "1.0.0".parse()?, &dest);
    let libraries = installed(installer(sdk.path(), &transport).install(&request, &NoProgress).await?);

    assert_eq!(libraries[0].version, "1.0.0");
    let properties = std::fs::read_to_string(dest.join("Servo").join("library.properties"))?;
    assert!(properties.contains("version=1.0.0"));
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_idempotent_and_offline() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");
    let transport = Arc::new(transport_for(&servo_entries()));
    let installer = installer(sdk.path(), &transport);
    let request = InstallRequest::new("Servo", VersionSelector::Highest, &dest);

    let first = installer.install(&request, &NoProgress).await?;
    std::fs::write(dest.join("Servo").join("notes.txt"), "local edit")?;

    let second = installer.install(&request, &NoProgress).await?;

    assert_eq!(first, second);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(
        std::fs::read_to_string(dest.join("Servo").join("notes.txt"))?,
        "local edit"
    );
    Ok(())
}

#[tokio::test]
async fn test_force_refresh_redoes_every_stage() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");
    let transport = Arc::new(transport_for(&servo_entries()));
    let installer = installer(sdk.path(), &transport);

    let request = InstallRequest::new("Servo", VersionSelector::Highest, &dest);
    installer.install(&request, &NoProgress).await?;
    std::fs::write(dest.join("Servo").join("notes.txt"), "local edit")?;

    let forced = request.clone().force_refresh(true);
    installer.install(&forced, &NoProgress).await?;

    assert_eq!(transport.request_count(), 4);
    assert!(!dest.join("Servo").join("notes.txt").exists());
    assert!(dest.join("Servo").join("library.properties").exists());
    Ok(())
}

#[tokio::test]
async fn test_unknown_library_aborts_before_download() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");
    let transport = Arc::new(transport_for(&servo_entries()));

    let request = InstallRequest::new("Stepper", VersionSelector::Highest, &dest);
    let err = installer(sdk.path(), &transport)
        .install(&request, &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { ref name, .. } if name == "Stepper"));
    assert_eq!(transport.request_count(), 1);
    assert!(!dest.exists());
    Ok(())
}

#[tokio::test]
async fn test_deferred_selector_downloads_nothing() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");
    let transport = Arc::new(transport_for(&servo_entries()));

    let request = InstallRequest::new("Servo", "latest".parse()?, &dest);
    let outcome = installer(sdk.path(), &transport).install(&request, &NoProgress).await?;

    assert_eq!(
        outcome,
        InstallOutcome::Deferred {
            name: "Servo".to_string()
        }
    );
    assert_eq!(transport.request_count(), 1);
    assert!(!dest.exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_archive_is_fetch_error() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");
    let entries = servo_entries();
    let transport = Arc::new(MemoryTransport::new().with_body(INDEX_URL, gzipped_index(&entries)));

    let request = InstallRequest::new("Servo", VersionSelector::Highest, &dest);
    let err = installer(sdk.path(), &transport)
        .install(&request, &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "fetch");
    assert!(!dest.join("Servo").exists());
    Ok(())
}

#[tokio::test]
async fn test_installs_dependencies_once() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");

    let mut neopixel = library("Adafruit NeoPixel", "1.12.0");
    neopixel.dependencies = vec![
        Dependency {
            name: "Adafruit BusIO".to_string(),
            version: None,
        },
        Dependency {
            name: "Wire".to_string(),
            version: Some("1.0".to_string()),
        },
    ];
    let mut busio = library("Adafruit BusIO", "1.16.1");
    busio.dependencies = vec![
        Dependency {
            name: "Wire".to_string(),
            version: None,
        },
        Dependency {
            name: "Adafruit NeoPixel".to_string(),
            version: None,
        },
    ];
    let entries = vec![
        neopixel,
        library("Adafruit BusIO", "1.9.0"),
        busio,
        library("Wire", "1.0"),
        library("Wire", "1.1"),
    ];
    let transport = Arc::new(transport_for(&entries));

    let request = InstallRequest::new("Adafruit NeoPixel", VersionSelector::Highest, &dest)
        .with_dependencies(true);
    let libraries = installed(installer(sdk.path(), &transport).install(&request, &NoProgress).await?);

    let summary: Vec<(&str, &str)> = libraries
        .iter()
        .map(|l| (l.name.as_str(), l.version.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Adafruit NeoPixel", "1.12.0"),
            ("Adafruit BusIO", "1.16.1"),
            ("Wire", "1.0"),
        ]
    );
    assert!(dest.join("Adafruit BusIO").join("library.properties").exists());
    assert!(dest.join("Wire").join("library.properties").exists());
    Ok(())
}

#[tokio::test]
async fn test_dependencies_ignored_unless_requested() -> Result<()> {
    let sdk = TempDir::new()?;
    let dest = sdk.path().join("libraries");

    let mut neopixel = library("Adafruit NeoPixel", "1.12.0");
    neopixel.dependencies = vec![Dependency {
        name: "Missing".to_string(),
        version: None,
    }];
    let transport = Arc::new(transport_for(&[neopixel]));

    let request = InstallRequest::new("Adafruit NeoPixel", VersionSelector::Highest, &dest);
    let libraries = installed(installer(sdk.path(), &transport).install(&request, &NoProgress).await?);
    assert_eq!(libraries.len(), 1);

    let with_deps = request.with_dependencies(true);
    let err = installer(sdk.path(), &transport)
        .install(&with_deps, &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    Ok(())
}
