//! Test helper functions for integration tests
//!
//! Shared across the integration test files using the tests/common/ pattern.

#![allow(dead_code)]

use ardlib_core::catalog::CatalogEntry;
use ardlib_core::config::Config;
use ardlib_core::transport::MemoryTransport;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Once;

pub const INDEX_URL: &str = "https://downloads.example.com/libraries/library_index.json.gz";

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn test_config() -> Config {
    Config {
        index_url: INDEX_URL.to_string(),
        ..Config::default()
    }
}

pub fn archive_url(file: &str) -> String {
    format!("https://downloads.example.com/libraries/{file}")
}

/// Catalog entry whose archive lives at [`archive_url`]
pub fn library(name: &str, version: &str) -> CatalogEntry {
    let file = format!("{}-{}.zip", name.replace(' ', "_"), version);
    CatalogEntry::new(name, version, &archive_url(&file), &file)
}

/// Gzip-compressed index JSON for `entries`
pub fn gzipped_index(entries: &[CatalogEntry]) -> Vec<u8> {
    let json = serde_json::json!({ "libraries": entries });
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Zip archive with a root folder named after the archive, as the index serves them
pub fn library_zip(entry: &CatalogEntry) -> Vec<u8> {
    let root = entry.archive_stem();
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();

        writer
            .start_file(format!("{root}/library.properties"), options)
            .unwrap();
        write!(writer, "name={}\nversion={}\n", entry.name, entry.version).unwrap();

        writer
            .start_file(format!("{root}/src/{}.h", entry.archive_stem()), options)
            .unwrap();
        writer.write_all(b"#pragma once\n").unwrap();

        writer.finish().unwrap();
    }
    buffer.into_inner()
}

/// Transport serving the index plus an archive for every entry
pub fn transport_for(entries: &[CatalogEntry]) -> MemoryTransport {
    entries.iter().fold(
        MemoryTransport::new().with_body(INDEX_URL, gzipped_index(entries)),
        |transport, entry| transport.with_body(&entry.url, library_zip(entry)),
    )
}
